//! Synthetic Sweep Engine
//!
//! Stands in for the RF front end on bench builds. Models a DUT with a
//! delayed reflection at port 1 and a single-pole low-pass between the
//! ports, and delivers one point per poll.

use core::f32::consts::PI;
#[cfg(feature = "embedded")]
use micromath::F32Ext;

use super::engine::{PointSink, RawPoint, SweepEngine};
use crate::types::{Complex, RawObservation, SweepParams};

/// Deterministic sweep engine
#[derive(Clone, Copy, Debug)]
pub struct SyntheticSweep {
    params: SweepParams,
    next_index: u16,
    active: bool,
    reflection_gain: f32,
    delay_ns: f32,
    cutoff_hz: f32,
    reference_level: f32,
}

impl SyntheticSweep {
    /// Engine with the default DUT model
    #[must_use]
    pub const fn new() -> Self {
        Self {
            params: SweepParams::FIXED,
            next_index: 0,
            active: false,
            reflection_gain: 0.3,
            delay_ns: 2.0,
            cutoff_hz: 250_000_000.0,
            reference_level: 0.5,
        }
    }

    /// Set the amplitude of the forward reference reading
    #[must_use]
    pub const fn with_reference_level(mut self, level: f32) -> Self {
        self.reference_level = level;
        self
    }

    /// Index of the next point to be delivered
    #[must_use]
    pub const fn next_index(&self) -> u16 {
        self.next_index
    }

    #[allow(clippy::cast_precision_loss)]
    fn observe(&self, frequency_hz: u32) -> RawObservation {
        let f = frequency_hz as f32;

        let cycles = f * self.delay_ns * 1e-9;
        let phase = -2.0 * PI * (cycles - cycles.floor());
        let s11 = Complex::new(phase.cos(), phase.sin()) * self.reflection_gain;

        let x = f / self.cutoff_hz;
        let den = 1.0 + x * x;
        let s21 = Complex::new(1.0 / den, -x / den);

        let reference = Complex::new(self.reference_level, 0.0);
        RawObservation::new(
            s11 * self.reference_level,
            reference,
            s21 * self.reference_level,
        )
    }
}

impl Default for SyntheticSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepEngine for SyntheticSweep {
    fn configure_sweep(&mut self, params: &SweepParams) {
        self.params = *params;
        self.next_index = 0;
        self.active = params.points > 0;
        debug!("synthetic sweep configured: {}", *params);
    }

    fn poll(&mut self, sink: &mut dyn PointSink) {
        if !self.active {
            return;
        }
        let index = self.next_index;
        let frequency_hz = self.params.frequency_at(index);
        let last = index + 1 >= self.params.points;
        sink.on_point(&RawPoint {
            index,
            frequency_hz,
            observation: self.observe(frequency_hz),
            last,
        });
        if last {
            self.active = false;
        } else {
            self.next_index = index + 1;
        }
    }

    fn is_sweeping(&self) -> bool {
        self.active
    }
}
