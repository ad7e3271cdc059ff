use fdrcalib::{
    CalibrationError,
    Distribution,
    DistributionPoint,
};

fn synthetic_table() -> Distribution {
    // Test: strictly monotonic table, similar in shape to a PeptideProphet summary
    Distribution::new([
        (0.0005, 0.99),
        (0.001, 0.98),
        (0.005, 0.93),
        (0.01, 0.87),
        (0.025, 0.71),
        (0.05, 0.52),
        (0.1, 0.31),
        (0.25, 0.12),
        (0.5, 0.03),
    ])
    .unwrap()
    .with_sentinels()
}

#[test]
fn test_two_point_table_midpoint() {
    let dist = Distribution::new([(0.0, 1.0), (1.0, 0.0)]).unwrap();
    let prob = dist.error_to_probability(0.5).unwrap();
    assert!((prob - 0.5).abs() < 1e-12);
}

#[test]
fn test_round_trip_probability() {
    let dist = synthetic_table();
    for i in 1..100 {
        let p = i as f64 / 100.0;
        let error = dist.probability_to_error(p).unwrap();
        let back = dist.error_to_probability(error).unwrap();
        assert!(
            (back - p).abs() < 1e-9,
            "round trip failed for p={} (error={}, back={})",
            p,
            error,
            back
        );
    }
}

#[test]
fn test_round_trip_error() {
    let dist = synthetic_table();
    for i in 1..100 {
        let e = i as f64 / 100.0;
        let p = dist.error_to_probability(e).unwrap();
        let back = dist.probability_to_error(p).unwrap();
        assert!((back - e).abs() < 1e-9);
    }
}

#[test]
fn test_unpadded_table_is_unavailable_outside() {
    let dist = Distribution::new([(0.01, 0.9), (0.1, 0.4)]).unwrap();
    assert_eq!(
        dist.error_to_probability(0.001),
        Err(CalibrationError::Unavailable(0.001))
    );
    assert_eq!(
        dist.error_to_probability(0.5),
        Err(CalibrationError::Unavailable(0.5))
    );
    assert!(dist.error_to_probability(0.05).is_ok());
}

#[test]
fn test_empty_distribution() {
    let empty: Vec<DistributionPoint> = vec![];
    assert_eq!(Distribution::new(empty), Err(CalibrationError::NoPoints));
}

#[test]
fn test_serde_shape() {
    let dist = Distribution::new([(0.0, 1.0), (1.0, 0.0)]).unwrap();
    let json = serde_json::to_string(&dist).unwrap();
    assert_eq!(json, r#"[{"error":0.0,"prob":1.0},{"error":1.0,"prob":0.0}]"#);
}

#[test]
fn test_padded_table_stays_sorted() {
    for raw in [
        vec![(0.5, 0.5), (0.9, 0.1)],
        vec![(0.0, 0.8), (1.0, 0.2)],
        vec![(1.0, 0.0)],
        vec![(0.3, 1.0)],
    ] {
        let dist = Distribution::new(raw).unwrap().with_sentinels();
        let points = dist.points();
        assert_eq!(points.first().unwrap().error, 0.0);
        assert_eq!(points.last().unwrap().error, 1.0);
        assert!(points.windows(2).all(|w| w[0].error <= w[1].error));
        assert!(points.windows(2).all(|w| w[0].probability >= w[1].probability));
    }
}

#[test]
fn test_error_above_one_rejected() {
    let res = Distribution::new([(0.5, 0.5), (1.5, 0.2)]);
    assert!(matches!(res, Err(CalibrationError::OutOfRange { .. })));
}
