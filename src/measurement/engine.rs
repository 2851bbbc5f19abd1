//! Sweep Engine Interface
//!
//! The synthesizer, ADC and DSP chain live behind this trait. The engine
//! delivers points synchronously from inside [`SweepEngine::poll`], so
//! callbacks always run in main-loop context.

use crate::types::{RawObservation, SweepParams};

/// One raw point delivered by the engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawPoint {
    /// Position in the sweep
    pub index: u16,
    /// Stimulus frequency in Hz
    pub frequency_hz: u32,
    /// Receiver readings
    pub observation: RawObservation,
    /// Final point of the sweep
    pub last: bool,
}

/// Receiver of per-point callbacks
pub trait PointSink {
    /// Called once per measured frequency point
    fn on_point(&mut self, point: &RawPoint);
}

/// Frequency sweep engine
pub trait SweepEngine {
    /// Configure and start a sweep
    fn configure_sweep(&mut self, params: &SweepParams);

    /// Advance the sweep, delivering any finished points to `sink`
    fn poll(&mut self, sink: &mut dyn PointSink);

    /// Whether a sweep is running
    fn is_sweeping(&self) -> bool;
}
