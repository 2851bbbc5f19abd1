//! Gain Calibration Tests
//!
//! Run with: cargo test --target x86_64-unknown-linux-gnu --no-default-features --features std --test gain_cal_tests

mod common;

use common::{MockPort, ScriptedEngine, SteppingClock};
use vna_spi_firmware::app::Application;
use vna_spi_firmware::calibration::{verify_slot, SlotState, FLAG_GAIN_REFERENCE};
use vna_spi_firmware::config::{GAIN_CAL_FREQUENCY_HZ, GAIN_CAL_POINTS, GAIN_CAL_SLOT};
use vna_spi_firmware::flash::mock::MockFlash;
use vna_spi_firmware::flash::FlashStore;
use vna_spi_firmware::measurement::gain_cal::{
    capture_gain_reference, capture_gain_reference_default, GainCalError, GainCapture,
};
use vna_spi_firmware::measurement::synthetic::SyntheticSweep;
use vna_spi_firmware::measurement::{RawPoint, SweepEngine};
use vna_spi_firmware::types::{Complex, RawObservation};
use vna_spi_firmware::SpiTransport;

fn reading(index: u16, s11_re: f32, last: bool) -> RawPoint {
    RawPoint {
        index,
        frequency_hz: GAIN_CAL_FREQUENCY_HZ,
        observation: RawObservation::new(
            Complex::new(s11_re, 0.0),
            Complex::new(1.0, 0.0),
            Complex::new(0.5, -0.5),
        ),
        last,
    }
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

// =============================================================================
// Capture
// =============================================================================

#[test]
fn averages_all_readings() {
    let mut engine = ScriptedEngine::new(vec![
        reading(0, 0.1, false),
        reading(1, 0.2, false),
        reading(2, 0.3, false),
        reading(3, 0.4, true),
    ]);
    let clock = SteppingClock::new(1);
    let mut capture = GainCapture::new();

    let reference = capture_gain_reference(&mut engine, &clock, 1_000, &mut capture).unwrap();

    assert_eq!(reference.samples, 4);
    assert_eq!(reference.frequency_hz, GAIN_CAL_FREQUENCY_HZ);
    assert!(close(reference.s11.re, 0.25));
    assert!(close(reference.s21.re, 0.5));
    assert!(close(reference.s21.im, -0.5));
    assert!(capture.is_done());
    assert_eq!(capture.points().len(), 4);
}

#[test]
fn readings_beyond_capacity_are_counted() {
    let extra = 3;
    let total = GAIN_CAL_POINTS + extra;
    let script = (0..total)
        .map(|i| reading(i as u16, 0.5, i + 1 == total))
        .collect();
    let mut engine = ScriptedEngine::new(script);
    let clock = SteppingClock::new(1);
    let mut capture = GainCapture::new();

    let reference = capture_gain_reference(&mut engine, &clock, 10_000, &mut capture).unwrap();

    assert_eq!(usize::from(reference.samples), GAIN_CAL_POINTS);
    assert_eq!(capture.points().len(), GAIN_CAL_POINTS);
    assert_eq!(usize::from(capture.dropped()), extra);
    assert!(capture.is_done());

    // A new capture starts from zero
    let mut engine = ScriptedEngine::new(vec![reading(0, 0.5, true)]);
    capture_gain_reference(&mut engine, &clock, 10_000, &mut capture).unwrap();
    assert_eq!(capture.dropped(), 0);
}

#[test]
fn configures_single_frequency_sweep() {
    let mut engine = ScriptedEngine::new(vec![reading(0, 0.5, true)]);
    let clock = SteppingClock::new(1);
    let mut capture = GainCapture::new();
    capture_gain_reference_default(&mut engine, &clock, &mut capture).unwrap();

    let params = engine.configured[0];
    assert_eq!(params.start_hz, GAIN_CAL_FREQUENCY_HZ);
    assert_eq!(params.stop_hz, GAIN_CAL_FREQUENCY_HZ);
    assert_eq!(usize::from(params.points), GAIN_CAL_POINTS);
}

#[test]
fn synthetic_engine_delivers_full_capture() {
    let mut engine = SyntheticSweep::new();
    let clock = SteppingClock::new(1);
    let mut capture = GainCapture::new();
    let reference = capture_gain_reference(&mut engine, &clock, 10_000, &mut capture).unwrap();

    assert_eq!(usize::from(reference.samples), GAIN_CAL_POINTS);
    assert!(capture
        .points()
        .iter()
        .all(|p| p.frequency_hz == GAIN_CAL_FREQUENCY_HZ));
    // Every reading is identical, so the mean equals the first one
    let first = capture.points()[0];
    assert!(close(reference.s11.re, first.s11.re));
    assert!(close(reference.s21.im, first.s21.im));
    assert!(!engine.is_sweeping());
}

#[test]
fn stalled_sweep_times_out() {
    let mut engine = ScriptedEngine::stalled();
    let clock = SteppingClock::new(10);
    let mut capture = GainCapture::new();

    let result = capture_gain_reference(&mut engine, &clock, 100, &mut capture);

    assert_eq!(result, Err(GainCalError::Timeout));
    assert!(clock.elapsed() >= 100);
    assert!(clock.elapsed() < 200);
}

#[test]
fn new_capture_discards_previous_points() {
    let mut engine = ScriptedEngine::new(vec![reading(0, 0.1, false), reading(1, 0.3, true)]);
    let clock = SteppingClock::new(1);
    let mut capture = GainCapture::new();
    capture_gain_reference(&mut engine, &clock, 1_000, &mut capture).unwrap();
    let reference = capture_gain_reference(&mut engine, &clock, 1_000, &mut capture).unwrap();
    assert_eq!(reference.samples, 2);
    assert!(close(reference.s11.re, 0.2));
}

// =============================================================================
// Application integration
// =============================================================================

#[test]
fn refused_while_measuring() {
    let transport = SpiTransport::new();
    let mut port = MockPort::new();
    let mut app: Application<ScriptedEngine> = Application::new(ScriptedEngine::stalled());

    port.master_sends(&transport, 0xA0);
    app.poll(&transport, &mut port);

    let clock = SteppingClock::new(1);
    assert_eq!(
        app.run_gain_calibration(&clock),
        Err(GainCalError::NotIdle)
    );
    assert_eq!(app.engine().configured.len(), 1);
}

#[test]
fn capture_saved_to_gain_slot() {
    let mut app: Application<SyntheticSweep> = Application::new(SyntheticSweep::new());
    let clock = SteppingClock::new(1);
    app.run_gain_calibration(&clock).unwrap();

    let mut store = FlashStore::new(MockFlash::new());
    let header = app.save_gain_calibration(&mut store).unwrap();
    assert_eq!(usize::from(header.points), GAIN_CAL_POINTS);
    assert_eq!(header.flags, FLAG_GAIN_REFERENCE);
    assert_eq!(header.start_hz, GAIN_CAL_FREQUENCY_HZ);
    assert_eq!(
        verify_slot(&mut store, GAIN_CAL_SLOT).unwrap(),
        SlotState::Valid(header)
    );
    assert_eq!(app.gain_capture().points().len(), GAIN_CAL_POINTS);
}
