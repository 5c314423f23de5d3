use aero_geom::geom::{
    BilinearPatch, Curve3, CurveIntersection, FnObjective, IntersectionOptions, NurbsCurve3,
    OptimizeError, OptimizeOptions, Point3, intersect_curves, intersect_curves_with_options,
    optimize_newton_2d,
};

fn line(a: [f64; 3], b: [f64; 3]) -> NurbsCurve3 {
    NurbsCurve3::clamped_uniform(1, vec![Point3::from(a), Point3::from(b)]).expect("valid line")
}

fn bezier2(p0: [f64; 2], p1: [f64; 2], p2: [f64; 2]) -> NurbsCurve3 {
    NurbsCurve3::clamped_uniform(
        2,
        vec![
            Point3::new(p0[0], p0[1], 0.0),
            Point3::new(p1[0], p1[1], 0.0),
            Point3::new(p2[0], p2[1], 0.0),
        ],
    )
    .expect("valid curve")
}

fn wiggle() -> NurbsCurve3 {
    NurbsCurve3::clamped_uniform(
        2,
        vec![
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, -1.0, 0.0),
            Point3::new(3.0, 1.0, 0.0),
            Point3::new(4.0, -1.0, 0.0),
            Point3::new(5.0, 1.0, 0.0),
        ],
    )
    .expect("valid curve")
}

fn assert_within_tolerance(c1: &NurbsCurve3, c2: &NurbsCurve3, hits: &[CurveIntersection], tol: f64) {
    for hit in hits {
        let p1 = c1.point_at(hit.parameter1);
        let p2 = c2.point_at(hit.parameter2);
        assert!(p1.distance_to(p2) <= tol.max(1e-10), "hit {hit:?} too far apart");
        assert!(hit.point.distance_to(p1) <= tol && hit.point.distance_to(p2) <= tol);
    }
}

#[test]
fn skew_segments_meet_in_the_gap() {
    let a = line([0.0, 0.0, 0.0], [0.95, 0.0, 0.0]);
    let b = line([1.0, 1.0, 0.0], [1.0, 0.05, 0.0]);
    let hits = intersect_curves(&a, &b, 0.1).expect("valid tolerance");

    assert_eq!(hits.len(), 1);
    assert!(hits[0].point.distance_to(Point3::new(0.975, 0.025, 0.0)) < 1e-6);
    assert!((hits[0].parameter1 - 1.0).abs() < 1e-6);
    assert!((hits[0].parameter2 - 1.0).abs() < 1e-6);
    assert_within_tolerance(&a, &b, &hits, 0.1);
}

#[test]
fn wiggle_crosses_axis_five_times() {
    let curve = wiggle();
    let axis = line([-1.0, 0.0, 0.0], [6.0, 0.0, 0.0]);
    let tol = 1e-4;
    let hits = intersect_curves(&curve, &axis, tol).expect("valid tolerance");

    let expected = [
        (1.0 / 12.0, 0.611_111_111_111_111),
        (0.25, 1.5),
        (0.5, 2.5),
        (0.75, 3.5),
        (11.0 / 12.0, 4.388_888_888_888_889),
    ];
    assert_eq!(hits.len(), expected.len());
    for (hit, (t, x)) in hits.iter().zip(expected) {
        assert!((hit.parameter1 - t).abs() < 1e-6, "{hit:?}");
        assert!((hit.parameter2 - (x + 1.0) / 7.0).abs() < 1e-6, "{hit:?}");
        assert!(hit.point.distance_to(Point3::new(x, 0.0, 0.0)) < 1e-6, "{hit:?}");
    }
    assert_within_tolerance(&curve, &axis, &hits, tol);
}

#[test]
fn parabolas_cross_twice() {
    let lower = bezier2([0.0, 0.0], [1.0, 2.0], [2.0, 0.0]);
    let upper = bezier2([0.0, 1.5], [1.0, -0.5], [2.0, 1.5]);
    let tol = 1e-6;
    let hits = intersect_curves(&lower, &upper, tol).expect("valid tolerance");

    assert_eq!(hits.len(), 2);
    assert!(hits[0].point.distance_to(Point3::new(0.5, 0.75, 0.0)) < 1e-6);
    assert!(hits[1].point.distance_to(Point3::new(1.5, 0.75, 0.0)) < 1e-6);
    for (hit, t) in hits.iter().zip([0.25, 0.75]) {
        assert!((hit.parameter1 - t).abs() < 1e-6);
        assert!((hit.parameter2 - t).abs() < 1e-6);
    }
    assert_within_tolerance(&lower, &upper, &hits, tol);
}

#[test]
fn swapping_curves_swaps_parameters() {
    let curve = wiggle();
    let axis = line([-1.0, 0.0, 0.0], [6.0, 0.0, 0.0]);
    let tol = 1e-4;
    let forward = intersect_curves(&curve, &axis, tol).expect("valid tolerance");
    let backward = intersect_curves(&axis, &curve, tol).expect("valid tolerance");

    assert_eq!(forward.len(), backward.len());
    for hit in &forward {
        let twin = backward
            .iter()
            .find(|other| other.point.distance_to(hit.point) <= tol)
            .expect("matching hit");
        assert!((twin.parameter1 - hit.parameter2).abs() < 1e-6);
        assert!((twin.parameter2 - hit.parameter1).abs() < 1e-6);
    }
}

#[test]
fn repeated_queries_are_identical() {
    let lower = bezier2([0.0, 0.0], [1.0, 2.0], [2.0, 0.0]);
    let upper = bezier2([0.0, 1.5], [1.0, -0.5], [2.0, 1.5]);
    let options = IntersectionOptions::new(1e-6);
    let first = intersect_curves_with_options(&lower, &upper, options).expect("valid options");
    let second = intersect_curves_with_options(&lower, &upper, options).expect("valid options");
    assert_eq!(first, second);
}

#[test]
fn collapsed_curve_terminates() {
    let dot = NurbsCurve3::clamped_uniform(2, vec![Point3::new(0.5, 0.0, 0.0); 3]).expect("valid curve");
    let axis = line([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
    let tol = 1e-5;
    let (hits, diagnostics) =
        intersect_curves_with_options(&dot, &axis, IntersectionOptions::new(tol)).expect("valid options");
    assert_eq!(diagnostics.depth_limit_hits, 0);
    assert_within_tolerance(&dot, &axis, &hits, tol);
}

#[test]
fn hits_serialize_to_json() {
    let a = line([0.0, 0.0, 0.0], [2.0, 2.0, 0.0]);
    let b = line([0.0, 2.0, 0.0], [2.0, 0.0, 0.0]);
    let (hits, diagnostics) =
        intersect_curves_with_options(&a, &b, IntersectionOptions::new(1e-6)).expect("valid options");

    let json = serde_json::to_value(&hits).expect("serialize hits");
    assert_eq!(json[0]["parameter1"].as_f64(), Some(hits[0].parameter1));
    assert!((json[0]["point"]["x"].as_f64().expect("x") - 1.0).abs() < 1e-9);

    let json = serde_json::to_value(&diagnostics).expect("serialize diagnostics");
    assert_eq!(json["candidate_count"], 1);
}

#[test]
fn patch_projection_round_trip() {
    let patch = BilinearPatch::new(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.1, 0.0),
        Point3::new(0.2, 1.0, 0.1),
        Point3::new(1.1, 1.2, 0.4),
    );
    for &(eta, xsi) in &[(0.0, 0.0), (1.0, 1.0), (0.5, 0.25), (0.8, 0.9)] {
        let target = patch.point_at(eta, xsi);
        let (e, x) = patch.invert(target).expect("inverts");
        assert!((0.0..=1.0).contains(&e) && (0.0..=1.0).contains(&x));
        assert!(patch.project(target).expect("projects").distance_to(target) < 1e-6);
    }
}

#[test]
fn optimizer_refuses_three_parameters() {
    let objective = FnObjective::new(3, |x: &[f64]| x[0] + x[1] + x[2]);
    let mut x = [0.0, 0.0];
    let result = optimize_newton_2d(&objective, &mut x, OptimizeOptions::default());
    assert_eq!(result, Err(OptimizeError::ParameterCount { found: 3 }));
}
