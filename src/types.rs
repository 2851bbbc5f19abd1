//! Shared types used across the VNA firmware
//!
//! This module defines the measurement domain types: complex readings,
//! raw receiver observations and the S-parameter result points that are
//! streamed to the SPI master.

#[cfg(feature = "embedded")]
use micromath::F32Ext;

use crate::config::REFERENCE_MAG_SQ_EPSILON;

/// Complex number with single precision parts
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Complex {
    /// Real part
    pub re: f32,
    /// Imaginary part
    pub im: f32,
}

impl Complex {
    /// Exactly zero
    pub const ZERO: Self = Self { re: 0.0, im: 0.0 };

    /// Create a complex number from its parts
    #[must_use]
    pub const fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    /// Squared magnitude
    #[must_use]
    pub fn norm_sqr(self) -> f32 {
        self.re * self.re + self.im * self.im
    }

    /// Magnitude
    #[must_use]
    pub fn magnitude(self) -> f32 {
        self.norm_sqr().sqrt()
    }

    /// Complex conjugate
    #[must_use]
    pub const fn conj(self) -> Self {
        Self {
            re: self.re,
            im: -self.im,
        }
    }

    /// Divide by `den`, or `None` when `|den|²` is below `epsilon_sq`
    #[must_use]
    pub fn checked_div(self, den: Self, epsilon_sq: f32) -> Option<Self> {
        let mag_sq = den.norm_sqr();
        if mag_sq < epsilon_sq || !mag_sq.is_finite() {
            return None;
        }
        Some(Self {
            re: (self.re * den.re + self.im * den.im) / mag_sq,
            im: (self.im * den.re - self.re * den.im) / mag_sq,
        })
    }
}

impl core::ops::Add for Complex {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl core::ops::Mul<f32> for Complex {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.re * rhs, self.im * rhs)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Complex {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "({}, {}j)", self.re, self.im);
    }
}

/// Raw receiver readings for one frequency point
///
/// `reference` is the forward (incident) wave; the S-parameters are the
/// reflected and through readings normalized to it.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct RawObservation {
    /// Reflected wave at port 1
    pub reflected: Complex,
    /// Forward reference wave
    pub reference: Complex,
    /// Transmitted wave at port 2
    pub through: Complex,
}

impl RawObservation {
    /// Create an observation from its three receiver channels
    #[must_use]
    pub const fn new(reflected: Complex, reference: Complex, through: Complex) -> Self {
        Self {
            reflected,
            reference,
            through,
        }
    }

    /// Whether the reference magnitude is too small to normalize against
    #[must_use]
    pub fn reference_too_weak(&self) -> bool {
        self.reference.norm_sqr() < REFERENCE_MAG_SQ_EPSILON
    }

    /// Compute `(S11, S21)`
    ///
    /// A near-zero reference yields exactly `(0, 0)` for both parameters.
    #[must_use]
    pub fn s_parameters(&self) -> (Complex, Complex) {
        let s11 = self
            .reflected
            .checked_div(self.reference, REFERENCE_MAG_SQ_EPSILON);
        let s21 = self
            .through
            .checked_div(self.reference, REFERENCE_MAG_SQ_EPSILON);
        match (s11, s21) {
            (Some(s11), Some(s21)) => (s11, s21),
            _ => (Complex::ZERO, Complex::ZERO),
        }
    }
}

/// One measured frequency point
///
/// Immutable once recorded; buffered in sweep order.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ResultPoint {
    /// Frequency in Hz
    pub frequency_hz: u32,
    /// Reflection coefficient
    pub s11: Complex,
    /// Transmission coefficient
    pub s21: Complex,
}

impl ResultPoint {
    /// Create a result point
    #[must_use]
    pub const fn new(frequency_hz: u32, s11: Complex, s21: Complex) -> Self {
        Self {
            frequency_hz,
            s11,
            s21,
        }
    }

    /// Build a result point from a raw observation
    #[must_use]
    pub fn from_observation(frequency_hz: u32, observation: &RawObservation) -> Self {
        let (s11, s21) = observation.s_parameters();
        Self::new(frequency_hz, s11, s21)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for ResultPoint {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} Hz S11={} S21={}", self.frequency_hz, self.s11, self.s21);
    }
}

/// Sweep configuration handed to the sweep engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepParams {
    /// First frequency in Hz
    pub start_hz: u32,
    /// Last frequency in Hz
    pub stop_hz: u32,
    /// Number of points
    pub points: u16,
    /// Readings averaged per point
    pub averages: u16,
    /// Apply stored calibration correction
    pub calibration_enabled: bool,
}

impl SweepParams {
    /// The fixed sweep triggered over SPI
    pub const FIXED: Self = Self {
        start_hz: crate::config::SWEEP_START_HZ,
        stop_hz: crate::config::SWEEP_STOP_HZ,
        points: crate::config::SWEEP_POINTS,
        averages: crate::config::SWEEP_AVERAGES,
        calibration_enabled: false,
    };

    /// Single-frequency sweep used for gain calibration
    pub const GAIN_CAL: Self = Self {
        start_hz: crate::config::GAIN_CAL_FREQUENCY_HZ,
        stop_hz: crate::config::GAIN_CAL_FREQUENCY_HZ,
        points: crate::config::GAIN_CAL_POINTS as u16,
        averages: crate::config::GAIN_CAL_AVERAGES,
        calibration_enabled: false,
    };

    /// Frequency of point `index` on a linear grid
    #[must_use]
    pub fn frequency_at(&self, index: u16) -> u32 {
        if self.points <= 1 || self.stop_hz <= self.start_hz {
            return self.start_hz;
        }
        let span = u64::from(self.stop_hz - self.start_hz);
        let step = span * u64::from(index) / u64::from(self.points - 1);
        // step <= span, which fits in u32
        self.start_hz + step as u32
    }
}

impl Default for SweepParams {
    fn default() -> Self {
        Self::FIXED
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for SweepParams {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Sweep({}..{} Hz, {} pts, avg {}, cal {})",
            self.start_hz,
            self.stop_hz,
            self.points,
            self.averages,
            self.calibration_enabled
        );
    }
}
