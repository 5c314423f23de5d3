//! Opt-in timing hooks for the numerical kernels.
//!
//! Timing is only collected when the `geom_metrics` feature is enabled and the
//! target is not WASM (`std::time::Instant` is unavailable there). Otherwise
//! every call compiles down to invoking the wrapped closure.
//!
//! # Usage
//!
//! ```ignore
//! use aero_geom::geom::{GeomMetrics, TimingBucket};
//!
//! let mut metrics = GeomMetrics::default();
//! metrics.begin();
//!
//! let hits = metrics.time(TimingBucket::CandidateRefinement, || refine(candidates));
//!
//! if let Some(report) = metrics.end() {
//!     println!("refinement: {} ns", report.candidate_refinement_ns);
//! }
//! ```

/// Phases of the geometry kernels that can be timed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Recursive bisection of curves into straight, bounded pieces.
    CurveBisection,
    /// Newton refinement of candidate parameter ranges.
    CandidateRefinement,
    /// Bilinear patch point inversion.
    PointInversion,
}

/// Cumulative nanoseconds per [`TimingBucket`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GeomTimingReport {
    pub curve_bisection_ns: u64,
    pub candidate_refinement_ns: u64,
    pub point_inversion_ns: u64,
}

impl GeomTimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.curve_bisection_ns
            .saturating_add(self.candidate_refinement_ns)
            .saturating_add(self.point_inversion_ns)
    }

    /// Returns the total time in milliseconds (for display purposes).
    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }
}

/// Accumulator for timing geometry operations.
///
/// Call [`begin`](Self::begin) to reset, wrap work with [`time`](Self::time),
/// and call [`end`](Self::end) to retrieve the report. When `geom_metrics` is
/// disabled (or on WASM), [`end`](Self::end) always returns `None`.
#[derive(Debug, Default)]
pub struct GeomMetrics {
    #[cfg(all(feature = "geom_metrics", not(target_arch = "wasm32")))]
    report: GeomTimingReport,
}

impl GeomMetrics {
    pub fn begin(&mut self) {
        #[cfg(all(feature = "geom_metrics", not(target_arch = "wasm32")))]
        {
            self.report = GeomTimingReport::default();
        }
    }

    #[must_use]
    pub fn end(&self) -> Option<GeomTimingReport> {
        #[cfg(all(feature = "geom_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "geom_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Runs `f`, adding its elapsed time to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "geom_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
            self.add_to_bucket(bucket, nanos);
            result
        }

        #[cfg(not(all(feature = "geom_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }

    #[cfg(all(feature = "geom_metrics", not(target_arch = "wasm32")))]
    fn add_to_bucket(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = match bucket {
            TimingBucket::CurveBisection => &mut self.report.curve_bisection_ns,
            TimingBucket::CandidateRefinement => &mut self.report.candidate_refinement_ns,
            TimingBucket::PointInversion => &mut self.report.point_inversion_ns,
        };
        *slot = slot.saturating_add(nanos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_report_total() {
        let report = GeomTimingReport {
            curve_bisection_ns: 1000,
            candidate_refinement_ns: 2000,
            point_inversion_ns: 3000,
        };
        assert_eq!(report.total_ns(), 6000);
        assert!((report.total_ms() - 0.006).abs() < 1e-9);
    }

    #[test]
    fn test_time_returns_closure_result() {
        let mut metrics = GeomMetrics::default();
        metrics.begin();
        let result = metrics.time(TimingBucket::PointInversion, || 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_end_matches_feature() {
        let mut metrics = GeomMetrics::default();
        metrics.begin();
        metrics.time(TimingBucket::CurveBisection, || ());
        let report = metrics.end();
        if cfg!(all(feature = "geom_metrics", not(target_arch = "wasm32"))) {
            assert!(report.is_some());
        } else {
            assert!(report.is_none());
        }
    }
}
