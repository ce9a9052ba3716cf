//! Solver configuration parsing and validation.

use taser_optim::{EstimatorError, PinholeIntrinsics, SolveOptions, TerminationType};

#[test]
fn partial_json_uses_defaults() {
    let opts: SolveOptions =
        serde_json::from_str(r#"{ "max_iterations": 7, "verbose": true }"#).unwrap();
    let defaults = SolveOptions::default();
    assert_eq!(opts.max_iterations, 7);
    assert!(opts.verbose);
    assert_eq!(opts.function_tolerance, defaults.function_tolerance);
    assert_eq!(opts.initial_trust_region_radius, defaults.initial_trust_region_radius);
    opts.validate().unwrap();
}

#[test]
fn empty_json_is_the_default_configuration() {
    let opts: SolveOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(opts, SolveOptions::default());
}

#[test]
fn options_survive_serialization() {
    let opts = SolveOptions::default()
        .with_max_iterations(12)
        .with_tolerances(1e-9, 1e-12, 1e-10);
    let json = serde_json::to_string_pretty(&opts).unwrap();
    assert!(json.contains("\"max_iterations\": 12"));
    let back: SolveOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(back, opts);
}

#[test]
fn negative_iteration_cap_does_not_parse() {
    let res: Result<SolveOptions, _> = serde_json::from_str(r#"{ "max_iterations": -1 }"#);
    assert!(res.is_err());
}

#[test]
fn inconsistent_radii_are_rejected() {
    let opts: SolveOptions = serde_json::from_str(
        r#"{ "min_trust_region_radius": 10.0, "initial_trust_region_radius": 1.0 }"#,
    )
    .unwrap();
    match opts.validate() {
        Err(EstimatorError::InvalidOptions(msg)) => assert!(msg.contains("radii"), "{msg}"),
        other => panic!("expected InvalidOptions, got {other:?}"),
    }
}

#[test]
fn termination_and_camera_serialize_by_name() {
    let json = serde_json::to_string(&TerminationType::UserAbort).unwrap();
    assert_eq!(json, "\"UserAbort\"");
    let camera: PinholeIntrinsics =
        serde_json::from_str(r#"{ "fx": 500.0, "fy": 505.0, "cx": 320.0, "cy": 240.0 }"#)
            .unwrap();
    assert_eq!(camera.fy, 505.0);
}
