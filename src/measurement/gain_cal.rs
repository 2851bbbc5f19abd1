//! Gain Calibration Capture
//!
//! Operator-triggered single-frequency sweep used to record the raw
//! receiver gain. This is the only place that busy-waits, and it runs
//! outside the SPI command path.

use heapless::Vec;

use super::engine::{PointSink, RawPoint, SweepEngine};
use crate::config::{GAIN_CAL_POINTS, GAIN_CAL_TIMEOUT_MS};
use crate::types::{Complex, ResultPoint, SweepParams};

/// Millisecond time source
pub trait Clock {
    /// Milliseconds since an arbitrary epoch
    fn now_ms(&self) -> u64;
}

/// Embassy time driver as a [`Clock`]
#[cfg(feature = "embedded")]
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[cfg(feature = "embedded")]
impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}

/// Gain calibration failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GainCalError {
    /// A sweep or transfer is in progress
    NotIdle,
    /// The sweep did not finish in time
    Timeout,
    /// The sweep finished without delivering any point
    NoPoints,
}

impl core::fmt::Display for GainCalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotIdle => f.write_str("measurement lifecycle not idle"),
            Self::Timeout => f.write_str("gain calibration sweep timed out"),
            Self::NoPoints => f.write_str("gain calibration sweep returned no points"),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for GainCalError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::NotIdle => defmt::write!(f, "NotIdle"),
            Self::Timeout => defmt::write!(f, "Timeout"),
            Self::NoPoints => defmt::write!(f, "NoPoints"),
        }
    }
}

/// Averaged gain reference
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GainReference {
    /// Calibration frequency in Hz
    pub frequency_hz: u32,
    /// Mean S11 over all readings
    pub s11: Complex,
    /// Mean S21 over all readings
    pub s21: Complex,
    /// Number of readings averaged
    pub samples: u16,
}

/// Collects the points of a calibration sweep
#[derive(Debug, Default)]
pub struct GainCapture {
    points: Vec<ResultPoint, GAIN_CAL_POINTS>,
    dropped: u16,
    done: bool,
}

impl GainCapture {
    /// Empty capture
    #[must_use]
    pub const fn new() -> Self {
        Self {
            points: Vec::new(),
            dropped: 0,
            done: false,
        }
    }

    /// Whether the last point has arrived
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Readings that arrived after the capture was full
    #[must_use]
    pub const fn dropped(&self) -> u16 {
        self.dropped
    }

    /// Captured points in delivery order
    #[must_use]
    pub fn points(&self) -> &[ResultPoint] {
        &self.points
    }

    /// Mean of the captured points
    #[must_use]
    pub fn average(&self) -> Option<GainReference> {
        let first = self.points.first()?;
        let (s11, s21) = self
            .points
            .iter()
            .fold((Complex::ZERO, Complex::ZERO), |(a, b), p| (a + p.s11, b + p.s21));
        #[allow(clippy::cast_precision_loss)]
        let scale = 1.0 / self.points.len() as f32;
        #[allow(clippy::cast_possible_truncation)]
        let samples = self.points.len() as u16;
        Some(GainReference {
            frequency_hz: first.frequency_hz,
            s11: s11 * scale,
            s21: s21 * scale,
            samples,
        })
    }
}

impl PointSink for GainCapture {
    fn on_point(&mut self, point: &RawPoint) {
        let result = ResultPoint::from_observation(point.frequency_hz, &point.observation);
        if self.points.push(result).is_err() {
            self.dropped = self.dropped.saturating_add(1);
            warn!("gain capture full, point {} dropped", point.index);
        }
        if point.last {
            self.done = true;
        }
    }
}

/// Run a gain calibration sweep and wait for it to finish
///
/// Polls `engine` until the last point arrives or `timeout_ms` elapses.
///
/// # Errors
///
/// [`GainCalError::Timeout`] if the sweep does not finish in time,
/// [`GainCalError::NoPoints`] if it finished empty.
pub fn capture_gain_reference<E, C>(
    engine: &mut E,
    clock: &C,
    timeout_ms: u64,
    capture: &mut GainCapture,
) -> Result<GainReference, GainCalError>
where
    E: SweepEngine + ?Sized,
    C: Clock + ?Sized,
{
    *capture = GainCapture::new();
    engine.configure_sweep(&SweepParams::GAIN_CAL);
    info!("gain calibration at {} Hz", SweepParams::GAIN_CAL.start_hz);

    let start = clock.now_ms();
    while !capture.is_done() {
        if clock.now_ms().saturating_sub(start) >= timeout_ms {
            warn!("gain calibration timed out after {} points", capture.points().len());
            return Err(GainCalError::Timeout);
        }
        engine.poll(capture);
    }

    capture.average().ok_or(GainCalError::NoPoints)
}

/// [`capture_gain_reference`] with the default timeout
///
/// # Errors
///
/// See [`capture_gain_reference`].
pub fn capture_gain_reference_default<E, C>(
    engine: &mut E,
    clock: &C,
    capture: &mut GainCapture,
) -> Result<GainReference, GainCalError>
where
    E: SweepEngine + ?Sized,
    C: Clock + ?Sized,
{
    capture_gain_reference(engine, clock, GAIN_CAL_TIMEOUT_MS, capture)
}
