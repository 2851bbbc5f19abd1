//! Measurement Lifecycle
//!
//! Bridges SPI commands to the sweep engine and owns the result buffer.
//!
//! - [`state`]: lifecycle states and the pure transition function
//! - [`controller`]: result buffer, sweep callbacks and data requests
//! - [`engine`]: interface consumed from the sweep engine
//! - [`synthetic`]: bench engine producing a deterministic response
//! - [`gain_cal`]: operator-triggered gain reference capture

pub mod controller;
pub mod engine;
pub mod gain_cal;
pub mod state;
pub mod synthetic;

pub use controller::{MeasurementController, Reply};
pub use engine::{PointSink, RawPoint, SweepEngine};
pub use state::{apply_event, Effect, LifecycleEvent, LifecycleState, Transition};
