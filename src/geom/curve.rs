use super::core::{Point3, Tolerance, Vec3};

pub trait Curve3 {
    fn point_at(&self, t: f64) -> Point3;

    #[must_use]
    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn derivative_at(&self, t: f64) -> Vec3 {
        let (a, b) = self.domain();
        let span = b - a;
        if !span.is_finite() || span == 0.0 {
            return Vec3::ZERO;
        }

        let h = Tolerance::DERIVATIVE.relative_to(span);
        if !h.is_finite() || h == 0.0 {
            return Vec3::ZERO;
        }

        let t0 = (t - h).max(a);
        let t1 = (t + h).min(b);
        if t1 == t0 {
            return Vec3::ZERO;
        }

        let p0 = self.point_at(t0);
        let p1 = self.point_at(t1);
        p1.sub_point(p0).mul_scalar(1.0 / (t1 - t0))
    }

    #[must_use]
    fn second_derivative_at(&self, t: f64) -> Vec3 {
        let (a, b) = self.domain();
        let span = b - a;
        if !span.is_finite() || span == 0.0 {
            return Vec3::ZERO;
        }

        let h = Tolerance::SECOND_DERIVATIVE.relative_to(span);
        if !h.is_finite() || h == 0.0 {
            return Vec3::ZERO;
        }

        let t0 = (t - h).max(a);
        let t2 = (t + h).min(b);
        if t2 == t0 {
            return Vec3::ZERO;
        }
        let tm = 0.5 * (t0 + t2);
        let dt = tm - t0;
        if dt == 0.0 {
            return Vec3::ZERO;
        }

        let p0 = self.point_at(t0);
        let p1 = self.point_at(tm);
        let p2 = self.point_at(t2);
        vec3_from_points(p0, p1, p2).mul_scalar(1.0 / (dt * dt))
    }
}

/// A curve with a control polygon that bounds it, as needed by the
/// intersection engine.
///
/// Implementors must guarantee the convex hull property (the curve lies in
/// the convex hull of [`control_points`](Self::control_points)) and that
/// [`trimmed`](Self::trimmed) keeps both the geometry and the
/// parametrisation of the restricted interval unchanged.
pub trait BSplineCurve: Curve3 + Sized {
    fn degree(&self) -> usize;

    fn control_points(&self) -> &[Point3];

    /// Returns a new curve restricted to `[start, end]`.
    ///
    /// # Errors
    /// Returns an error if the interval is empty or leaves the domain.
    fn trimmed(&self, start: f64, end: f64) -> Result<Self, CurveError>;
}

/// Errors raised while building or editing a curve.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CurveError {
    #[error("nurbs curve requires at least 2 control points, got {count}")]
    TooFewControlPoints { count: usize },

    #[error("nurbs curve degree must be in 1..{count}, got {degree}")]
    InvalidDegree { degree: usize, count: usize },

    #[error("nurbs curve knot length must be {expected}, got {found}")]
    KnotCount { expected: usize, found: usize },

    #[error("nurbs curve knots must be finite and non-decreasing")]
    InvalidKnots,

    #[error("knot {value} has multiplicity {multiplicity}, exceeding the curve degree")]
    KnotMultiplicity { value: f64, multiplicity: usize },

    #[error("nurbs curve parameter domain is empty")]
    EmptyDomain,

    #[error("nurbs curve control points must be finite")]
    NonFiniteControlPoint,

    #[error("nurbs curve weights must match the control points and be finite and > 0")]
    InvalidWeights,

    #[error("parameter {t} is not strictly inside the domain [{start}, {end}]")]
    ParameterOutsideDomain { t: f64, start: f64, end: f64 },

    #[error("trim interval [{start}, {end}] is empty or outside the domain")]
    InvalidTrimInterval { start: f64, end: f64 },
}

/// Clamped B-spline curve, optionally rational.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsCurve3 {
    degree: usize,
    control_points: Vec<Point3>,
    knots: Vec<f64>,
    weights: Option<Vec<f64>>,
}

impl NurbsCurve3 {
    /// Builds a curve from its raw definition.
    ///
    /// # Errors
    /// Returns an error when the degree, knot vector, or weights do not
    /// describe a valid B-spline.
    pub fn new(
        degree: usize,
        control_points: Vec<Point3>,
        knots: Vec<f64>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self, CurveError> {
        let count = control_points.len();
        if count < 2 {
            return Err(CurveError::TooFewControlPoints { count });
        }
        if degree == 0 || degree >= count {
            return Err(CurveError::InvalidDegree { degree, count });
        }
        if control_points.iter().any(|p| !p.is_finite()) {
            return Err(CurveError::NonFiniteControlPoint);
        }

        let expected = count + degree + 1;
        if knots.len() != expected {
            return Err(CurveError::KnotCount {
                expected,
                found: knots.len(),
            });
        }
        if knots.iter().any(|k| !k.is_finite()) || !is_non_decreasing(&knots) {
            return Err(CurveError::InvalidKnots);
        }
        check_multiplicities(&knots, degree)?;
        if knots[degree] >= knots[count] {
            return Err(CurveError::EmptyDomain);
        }

        if let Some(ref weights) = weights {
            if weights.len() != count || weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
                return Err(CurveError::InvalidWeights);
            }
        }

        Ok(Self {
            degree,
            control_points,
            knots,
            weights,
        })
    }

    /// Non-rational curve on `[0, 1]` with a clamped, uniformly spaced knot vector.
    ///
    /// # Errors
    /// Returns an error if `degree` is not in `1..poles.len()`.
    pub fn clamped_uniform(degree: usize, poles: Vec<Point3>) -> Result<Self, CurveError> {
        let count = poles.len();
        if count < 2 {
            return Err(CurveError::TooFewControlPoints { count });
        }
        if degree == 0 || degree >= count {
            return Err(CurveError::InvalidDegree { degree, count });
        }

        let spans = count - degree;
        let mut knots = Vec::with_capacity(count + degree + 1);
        knots.extend(std::iter::repeat_n(0.0, degree + 1));
        knots.extend((1..spans).map(|i| i as f64 / spans as f64));
        knots.extend(std::iter::repeat_n(1.0, degree + 1));
        Self::new(degree, poles, knots, None)
    }

    #[must_use]
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    #[must_use]
    pub fn is_rational(&self) -> bool {
        self.weights.is_some()
    }

    /// Inserts `t` once, leaving the curve geometrically unchanged.
    ///
    /// # Errors
    /// Returns an error if `t` is not strictly inside the domain.
    pub fn insert_knot(&self, t: f64) -> Result<Self, CurveError> {
        let (start, end) = self.domain();
        if !(t > start && t < end) {
            return Err(CurveError::ParameterOutsideDomain { t, start, end });
        }

        let p = self.degree;
        let n = self.control_points.len() - 1;
        let k = find_span(n, p, t, &self.knots);

        let mut knots = Vec::with_capacity(self.knots.len() + 1);
        knots.extend_from_slice(&self.knots[..=k]);
        knots.push(t);
        knots.extend_from_slice(&self.knots[k + 1..]);

        let old: Vec<HPoint4> = (0..=n).map(|i| self.homogeneous_pole(i)).collect();
        let mut poles = Vec::with_capacity(n + 2);
        for i in 0..=n + 1 {
            if i + p <= k {
                poles.push(old[i]);
            } else if i > k {
                poles.push(old[i - 1]);
            } else {
                let denom = self.knots[i + p] - self.knots[i];
                let alpha = if denom == 0.0 { 0.0 } else { (t - self.knots[i]) / denom };
                poles.push(old[i - 1].lerp(old[i], alpha));
            }
        }

        Ok(self.with_homogeneous(knots, &poles))
    }

    /// Splits the curve at `t` into two curves meeting at `t`.
    ///
    /// The pieces keep the parent parametrisation: the left piece has the
    /// domain `[start, t]` and the right piece `[t, end]`.
    ///
    /// # Errors
    /// Returns an error if `t` is not strictly inside the domain.
    pub fn split_at(&self, t: f64) -> Result<(Self, Self), CurveError> {
        let p = self.degree;
        let multiplicity = self.knots.iter().filter(|&&k| k == t).count();

        let mut curve = self.clone();
        for _ in multiplicity..p {
            curve = curve.insert_knot(t)?;
        }
        if multiplicity >= p {
            // No insertion ran, so the domain was never checked.
            let (start, end) = self.domain();
            if !(t > start && t < end) {
                return Err(CurveError::ParameterOutsideDomain { t, start, end });
            }
        }

        let first = curve
            .knots
            .iter()
            .position(|&k| k == t)
            .ok_or(CurveError::InvalidKnots)?;
        let poles: Vec<HPoint4> = (0..curve.control_points.len())
            .map(|i| curve.homogeneous_pole(i))
            .collect();

        let mut left_knots = curve.knots[..first].to_vec();
        left_knots.extend(std::iter::repeat_n(t, p + 1));
        let left = curve.with_homogeneous(left_knots, &poles[..first]);

        let mut right_knots = vec![t; p + 1];
        right_knots.extend_from_slice(&curve.knots[first + p..]);
        let right = curve.with_homogeneous(right_knots, &poles[first - 1..]);

        Ok((left, right))
    }

    fn homogeneous_pole(&self, index: usize) -> HPoint4 {
        let point = self.control_points[index];
        let w = self.weights.as_ref().map_or(1.0, |weights| weights[index]);
        HPoint4::new(point.x * w, point.y * w, point.z * w, w)
    }

    fn with_homogeneous(&self, knots: Vec<f64>, poles: &[HPoint4]) -> Self {
        let control_points = poles
            .iter()
            .map(|h| h.to_point3().unwrap_or(Point3::ORIGIN))
            .collect();
        let weights = self
            .weights
            .as_ref()
            .map(|_| poles.iter().map(|h| h.w).collect());
        Self {
            degree: self.degree,
            control_points,
            knots,
            weights,
        }
    }

    /// Homogeneous value, first and second derivative at `u`.
    fn homogeneous_derivatives(&self, u: f64) -> [HPoint4; 3] {
        let p = self.degree;
        let n = self.control_points.len() - 1;
        let span = find_span(n, p, u, &self.knots);

        let mut value: Vec<HPoint4> = (0..=p).map(|j| self.homogeneous_pole(span - p + j)).collect();

        // Q_j = p (P_{i+1} - P_i) / (U_{i+p+1} - U_{i+1}), i = span - p + j
        let mut first: Vec<HPoint4> = (0..p)
            .map(|j| {
                let i = span - p + j;
                let factor = safe_ratio(p as f64, self.knots[i + p + 1] - self.knots[i + 1]);
                value[j + 1].sub(value[j]).scale(factor)
            })
            .collect();

        // R_j = (p - 1) (Q_{j+1} - Q_j) / (U_{i+p+1} - U_{i+2})
        let mut second: Vec<HPoint4> = (0..p.saturating_sub(1))
            .map(|j| {
                let i = span - p + j;
                let factor = safe_ratio((p - 1) as f64, self.knots[i + p + 1] - self.knots[i + 2]);
                first[j + 1].sub(first[j]).scale(factor)
            })
            .collect();

        de_boor(&mut value, span, p, u, &self.knots);
        let c0 = value[p];

        let c1 = if first.is_empty() {
            HPoint4::ZERO
        } else {
            de_boor(&mut first, span, p - 1, u, &self.knots);
            first[p - 1]
        };

        let c2 = if second.is_empty() {
            HPoint4::ZERO
        } else {
            de_boor(&mut second, span, p - 2, u, &self.knots);
            second[p - 2]
        };

        [c0, c1, c2]
    }

    /// Euclidean value, first and second derivative at `t` (clamped to the domain).
    fn derivatives(&self, t: f64) -> (Point3, Vec3, Vec3) {
        let (a, b) = self.domain();
        let [h0, h1, h2] = self.homogeneous_derivatives(t.clamp(a, b));

        let w = h0.w;
        if w.abs() <= 1e-14 {
            return (self.control_points[0], Vec3::ZERO, Vec3::ZERO);
        }
        // C = A / w, C' = (A' - w' C) / w, C'' = (A'' - 2 w' C' - w'' C) / w
        let c = Vec3::new(h0.x / w, h0.y / w, h0.z / w);
        let d1 = (h1.xyz() - c * h1.w) / w;
        let d2 = (h2.xyz() - d1 * (2.0 * h1.w) - c * h2.w) / w;
        (Point3::new(c.x, c.y, c.z), d1, d2)
    }
}

impl Curve3 for NurbsCurve3 {
    fn point_at(&self, t: f64) -> Point3 {
        let (a, b) = self.domain();
        let u = t.clamp(a, b);
        let p = self.degree;
        let n = self.control_points.len() - 1;
        let span = find_span(n, p, u, &self.knots);

        let mut d: Vec<HPoint4> = (0..=p).map(|j| self.homogeneous_pole(span - p + j)).collect();
        de_boor(&mut d, span, p, u, &self.knots);
        d[p].to_point3().unwrap_or(self.control_points[0])
    }

    fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.control_points.len()])
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        self.derivatives(t).1
    }

    fn second_derivative_at(&self, t: f64) -> Vec3 {
        self.derivatives(t).2
    }
}

impl BSplineCurve for NurbsCurve3 {
    fn degree(&self) -> usize {
        self.degree
    }

    fn control_points(&self) -> &[Point3] {
        &self.control_points
    }

    fn trimmed(&self, start: f64, end: f64) -> Result<Self, CurveError> {
        let (a, b) = self.domain();
        if !(start < end) || start < a || end > b {
            return Err(CurveError::InvalidTrimInterval { start, end });
        }

        let mut curve = self.clone();
        if start > a {
            curve = curve.split_at(start)?.1;
        }
        if end < b {
            curve = curve.split_at(end)?.0;
        }
        Ok(curve)
    }
}

fn safe_ratio(num: f64, denom: f64) -> f64 {
    if denom.abs() > 1e-14 { num / denom } else { 0.0 }
}

fn vec3_from_points(p0: Point3, p1: Point3, p2: Point3) -> Vec3 {
    Vec3::new(
        p0.x - 2.0 * p1.x + p2.x,
        p0.y - 2.0 * p1.y + p2.y,
        p0.z - 2.0 * p1.z + p2.z,
    )
}

fn is_non_decreasing(knots: &[f64]) -> bool {
    knots.windows(2).all(|w| w[0] <= w[1])
}

/// End runs may reach `degree + 1`, interior runs at most `degree`.
fn check_multiplicities(knots: &[f64], degree: usize) -> Result<(), CurveError> {
    let mut start = 0;
    while start < knots.len() {
        let value = knots[start];
        let len = knots[start..].iter().take_while(|&&k| k == value).count();
        let at_end = start == 0 || start + len == knots.len();
        let limit = if at_end { degree + 1 } else { degree };
        if len > limit {
            return Err(CurveError::KnotMultiplicity {
                value,
                multiplicity: len,
            });
        }
        start += len;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HPoint4 {
    x: f64,
    y: f64,
    z: f64,
    w: f64,
}

impl HPoint4 {
    const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    fn lerp(self, rhs: Self, t: f64) -> Self {
        let s = 1.0 - t;
        Self::new(
            self.x * s + rhs.x * t,
            self.y * s + rhs.y * t,
            self.z * s + rhs.z * t,
            self.w * s + rhs.w * t,
        )
    }

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z, self.w - rhs.w)
    }

    fn scale(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s, self.w * s)
    }

    const fn xyz(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    fn to_point3(self) -> Option<Point3> {
        if self.w.is_finite() && self.w != 0.0 {
            Some(Point3::new(self.x / self.w, self.y / self.w, self.z / self.w))
        } else {
            None
        }
    }
}

fn find_span(n: usize, p: usize, u: f64, knots: &[f64]) -> usize {
    if u >= knots[n + 1] {
        // Last non-empty span, so clamped end knots are skipped.
        let mut span = n;
        while span > p && knots[span] >= knots[n + 1] {
            span -= 1;
        }
        return span;
    }
    if u <= knots[p] {
        return p;
    }

    let mut low = p;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

fn de_boor(d: &mut [HPoint4], span: usize, p: usize, u: f64, knots: &[f64]) {
    for r in 1..=p {
        for j in (r..=p).rev() {
            let i = span - p + j;
            let denom = knots[i + p + 1 - r] - knots[i];
            let alpha = if denom == 0.0 { 0.0 } else { (u - knots[i]) / denom };
            d[j] = d[j - 1].lerp(d[j], alpha);
        }
    }
}
