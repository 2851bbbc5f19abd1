//! Main Loop
//!
//! One [`Application::poll`] call is one pass of the cooperative loop:
//! handle at most one command byte, then advance the sweep. Chip-select
//! release is handled by its own interrupt, not here. Nothing here blocks
//! on the bus.

use crate::calibration::{save_slot, CalibrationHeader, FLAG_GAIN_REFERENCE};
use crate::config::{GAIN_CAL_SLOT, GAIN_CAL_TIMEOUT_MS, SWEEP_POINTS_MAX};
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::flash::{FlashDevice, FlashError, FlashStore};
use crate::measurement::gain_cal::{
    capture_gain_reference, Clock, GainCalError, GainCapture, GainReference,
};
use crate::measurement::{LifecycleState, MeasurementController, SweepEngine};
use crate::transport::{ByteTransport, SpiSlavePort};

/// Application state driven by the main loop
pub struct Application<E: SweepEngine, const N: usize = SWEEP_POINTS_MAX> {
    controller: MeasurementController<N>,
    dispatcher: Dispatcher,
    engine: E,
    capture: GainCapture,
}

impl<E: SweepEngine, const N: usize> Application<E, N> {
    /// Idle application around `engine`
    pub fn new(engine: E) -> Self {
        Self::with_controller(engine, MeasurementController::new())
    }

    /// Application with a preconfigured controller
    pub fn with_controller(engine: E, controller: MeasurementController<N>) -> Self {
        Self {
            controller,
            dispatcher: Dispatcher::new(),
            engine,
            capture: GainCapture::new(),
        }
    }

    /// Measurement controller
    pub const fn controller(&self) -> &MeasurementController<N> {
        &self.controller
    }

    /// Sweep engine
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Sweep engine, mutably
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Command counters
    pub const fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Run one main-loop pass
    ///
    /// Returns `true` if anything was done, so the caller can skip its idle
    /// wait.
    pub fn poll<const RX: usize, const TX: usize, P: SpiSlavePort>(
        &mut self,
        transport: &ByteTransport<RX, TX>,
        port: &mut P,
    ) -> bool {
        let mut worked = false;

        if let Some(received) = transport.recv() {
            let mut out = transport.responder(port, received);
            self.dispatcher.dispatch(
                received.byte,
                &mut self.controller,
                &mut self.engine,
                &mut out,
            );
            worked = true;
        }

        if self.controller.state() == LifecycleState::Measuring && self.engine.is_sweeping() {
            self.engine.poll(&mut self.controller);
            worked = true;
        }

        worked
    }

    /// Capture a gain reference with the default timeout
    ///
    /// # Errors
    ///
    /// [`GainCalError::NotIdle`] unless the lifecycle is idle, otherwise as
    /// [`capture_gain_reference`].
    pub fn run_gain_calibration<C: Clock + ?Sized>(
        &mut self,
        clock: &C,
    ) -> Result<GainReference, GainCalError> {
        self.run_gain_calibration_with_timeout(clock, GAIN_CAL_TIMEOUT_MS)
    }

    /// Capture a gain reference, giving up after `timeout_ms`
    ///
    /// # Errors
    ///
    /// As [`Self::run_gain_calibration`].
    pub fn run_gain_calibration_with_timeout<C: Clock + ?Sized>(
        &mut self,
        clock: &C,
        timeout_ms: u64,
    ) -> Result<GainReference, GainCalError> {
        if !self.controller.state().is_idle() {
            warn!("gain calibration refused in {}", self.controller.state());
            return Err(GainCalError::NotIdle);
        }
        capture_gain_reference(&mut self.engine, clock, timeout_ms, &mut self.capture)
    }

    /// Points of the last gain capture
    pub fn gain_capture(&self) -> &GainCapture {
        &self.capture
    }

    /// Store the last gain capture in its calibration slot
    ///
    /// # Errors
    ///
    /// Any flash failure from [`save_slot`].
    pub fn save_gain_calibration<F: FlashDevice>(
        &self,
        store: &mut FlashStore<F>,
    ) -> Result<CalibrationHeader, FlashError> {
        save_slot(
            store,
            GAIN_CAL_SLOT,
            FLAG_GAIN_REFERENCE,
            self.capture.points(),
        )
    }
}
