//! Types Module Tests
//!
//! Tests for domain types (Complex, RawObservation, ResultPoint, SweepParams)
//! Run with: cargo test --target x86_64-unknown-linux-gnu --no-default-features --features std --test types_tests

use vna_spi_firmware::config::{GAIN_CAL_FREQUENCY_HZ, SWEEP_START_HZ, SWEEP_STOP_HZ};
use vna_spi_firmware::types::{Complex, RawObservation, ResultPoint, SweepParams};

const EPS: f32 = 1e-6;

fn approx(a: Complex, b: Complex) -> bool {
    (a.re - b.re).abs() < EPS && (a.im - b.im).abs() < EPS
}

// =============================================================================
// Complex Tests
// =============================================================================

#[test]
fn test_complex_magnitude() {
    let z = Complex::new(3.0, 4.0);
    assert_eq!(z.norm_sqr(), 25.0);
    assert!((z.magnitude() - 5.0).abs() < EPS);
}

#[test]
fn test_complex_conj() {
    assert_eq!(Complex::new(1.0, 2.0).conj(), Complex::new(1.0, -2.0));
}

#[test]
fn test_complex_division() {
    // (1 + 2j) / (3 - 4j) = (-5 + 10j) / 25
    let q = Complex::new(1.0, 2.0)
        .checked_div(Complex::new(3.0, -4.0), 1e-18)
        .unwrap();
    assert!(approx(q, Complex::new(-0.2, 0.4)));
}

#[test]
fn test_complex_division_by_tiny_is_none() {
    let tiny = Complex::new(1e-10, -1e-10);
    assert!(Complex::new(1.0, 0.0).checked_div(tiny, 1e-18).is_none());
    assert!(Complex::new(1.0, 0.0).checked_div(Complex::ZERO, 1e-18).is_none());
}

#[test]
fn test_complex_division_by_nan_is_none() {
    let nan = Complex::new(f32::NAN, 0.0);
    assert!(Complex::new(1.0, 0.0).checked_div(nan, 1e-18).is_none());
}

#[test]
fn test_complex_add_and_scale() {
    let sum = Complex::new(1.0, 2.0) + Complex::new(0.5, -1.0);
    assert_eq!(sum, Complex::new(1.5, 1.0));
    assert_eq!(sum * 2.0, Complex::new(3.0, 2.0));
}

// =============================================================================
// Observation Tests
// =============================================================================

#[test]
fn test_observation_normalizes_to_reference() {
    let obs = RawObservation::new(
        Complex::new(0.0, 1.0),
        Complex::new(0.0, 2.0),
        Complex::new(1.0, 0.0),
    );
    let (s11, s21) = obs.s_parameters();
    assert!(approx(s11, Complex::new(0.5, 0.0)));
    assert!(approx(s21, Complex::new(0.0, -0.5)));
    assert!(!obs.reference_too_weak());
}

#[test]
fn test_weak_reference_forces_zero() {
    let obs = RawObservation::new(
        Complex::new(0.3, 0.1),
        Complex::new(1e-10, -1e-10),
        Complex::new(0.7, 0.0),
    );
    assert!(obs.reference_too_weak());
    assert_eq!(obs.s_parameters(), (Complex::ZERO, Complex::ZERO));
}

#[test]
fn test_reference_just_above_threshold() {
    let obs = RawObservation::new(
        Complex::new(1e-8, 0.0),
        Complex::new(1e-8, 0.0),
        Complex::new(0.0, 0.0),
    );
    assert!(!obs.reference_too_weak());
    let (s11, _) = obs.s_parameters();
    assert!(approx(s11, Complex::new(1.0, 0.0)));
}

#[test]
fn test_result_point_from_observation() {
    let obs = RawObservation::new(
        Complex::new(0.25, 0.0),
        Complex::new(0.5, 0.0),
        Complex::new(0.0, 0.5),
    );
    let point = ResultPoint::from_observation(7_000_000, &obs);
    assert_eq!(point.frequency_hz, 7_000_000);
    assert!(approx(point.s11, Complex::new(0.5, 0.0)));
    assert!(approx(point.s21, Complex::new(0.0, 1.0)));
}

// =============================================================================
// Sweep Parameter Tests
// =============================================================================

#[test]
fn test_fixed_sweep_grid_endpoints() {
    let p = SweepParams::FIXED;
    assert_eq!(p.frequency_at(0), SWEEP_START_HZ);
    assert_eq!(p.frequency_at(p.points - 1), SWEEP_STOP_HZ);
}

#[test]
fn test_fixed_sweep_grid_is_increasing() {
    let p = SweepParams::FIXED;
    let mut last = 0;
    for i in 0..p.points {
        let f = p.frequency_at(i);
        assert!(f > last || i == 0);
        last = f;
    }
}

#[test]
fn test_gain_cal_sweep_is_single_frequency() {
    let p = SweepParams::GAIN_CAL;
    assert_eq!(p.frequency_at(0), GAIN_CAL_FREQUENCY_HZ);
    assert_eq!(p.frequency_at(p.points - 1), GAIN_CAL_FREQUENCY_HZ);
}

#[test]
fn test_single_point_sweep() {
    let p = SweepParams {
        points: 1,
        ..SweepParams::FIXED
    };
    assert_eq!(p.frequency_at(0), SWEEP_START_HZ);
}

#[test]
fn test_default_is_fixed() {
    assert_eq!(SweepParams::default(), SweepParams::FIXED);
}
