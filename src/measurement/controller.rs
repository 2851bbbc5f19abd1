//! Measurement Controller
//!
//! Owns the lifecycle state and the result buffer. Commands arrive from
//! the dispatcher, points from the sweep engine; both run in the main
//! loop, so no locking is needed here.

use heapless::Vec;

use super::engine::{PointSink, RawPoint, SweepEngine};
use super::state::{apply_event, Effect, LifecycleEvent, LifecycleState};
use crate::config::{SWEEP_POINTS_MAX, TX_CHUNK_SIZE};
use crate::protocol::{ResponseSink, Status};
use crate::transfer::serialize_chunk;
use crate::types::{Complex, ResultPoint, SweepParams};

/// Outcome of a data request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reply {
    /// This many data bytes were queued
    Chunk(usize),
    /// No data sent; answer with this status byte
    Status(Status),
}

/// Lifecycle controller with a result buffer of `N` points
pub struct MeasurementController<const N: usize = SWEEP_POINTS_MAX> {
    state: LifecycleState,
    results: Vec<ResultPoint, N>,
    params: SweepParams,
    chunk_capacity: usize,
    dropped_points: u32,
    ignored_points: u32,
}

impl<const N: usize> MeasurementController<N> {
    /// Create an idle controller for the fixed sweep
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
            results: Vec::new(),
            params: SweepParams::FIXED,
            chunk_capacity: TX_CHUNK_SIZE,
            dropped_points: 0,
            ignored_points: 0,
        }
    }

    /// Use a different chunk capacity
    #[must_use]
    pub fn with_chunk_capacity(mut self, capacity: usize) -> Self {
        self.chunk_capacity = capacity;
        self
    }

    /// Use different sweep parameters for triggered sweeps
    #[must_use]
    pub fn with_sweep(mut self, params: SweepParams) -> Self {
        self.params = params;
        self
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Current status byte
    #[must_use]
    pub const fn status(&self) -> Status {
        self.state.status()
    }

    /// Recorded points in sweep order
    #[must_use]
    pub fn results(&self) -> &[ResultPoint] {
        &self.results
    }

    /// Points dropped because the buffer was full
    #[must_use]
    pub const fn dropped_points(&self) -> u32 {
        self.dropped_points
    }

    /// Points delivered while no sweep was running
    #[must_use]
    pub const fn ignored_points(&self) -> u32 {
        self.ignored_points
    }

    /// Handle a trigger command
    ///
    /// Starts the sweep when idle and returns `Measuring`; otherwise the
    /// trigger is rejected with `Busy`.
    pub fn trigger<E: SweepEngine + ?Sized>(&mut self, engine: &mut E) -> Status {
        let transition = apply_event(self.state, LifecycleEvent::TriggerSweep);
        self.state = transition.next;
        match transition.effect {
            Effect::StartSweep => {
                self.notify_measurement_started();
                engine.configure_sweep(&self.params);
                Status::Measuring
            }
            Effect::Reply(status) => {
                debug!("trigger rejected in {}", self.state);
                status
            }
            _ => self.state.status(),
        }
    }

    /// Handle a data request, queueing the next chunk into `out`
    pub fn request_data<S: ResponseSink + ?Sized>(&mut self, out: &mut S) -> Reply {
        let transition = apply_event(self.state, LifecycleEvent::RequestData);
        self.state = transition.next;

        let Effect::SendChunk(cursor) = transition.effect else {
            return Reply::Status(self.state.status());
        };

        let next = serialize_chunk(&self.results, cursor, self.chunk_capacity, out);
        let sent = next.position() - cursor.position();
        let complete = next.is_complete(self.results.len());

        let transition = apply_event(
            self.state,
            LifecycleEvent::ChunkSent {
                cursor: next,
                complete,
            },
        );
        self.state = transition.next;
        if transition.effect == Effect::ReleaseResults {
            info!("transfer complete, {} points", self.results.len());
            self.results.clear();
        }

        if sent == 0 {
            Reply::Status(self.state.status())
        } else {
            Reply::Chunk(sent)
        }
    }

    /// Reset the buffer for a new sweep
    pub fn notify_measurement_started(&mut self) {
        self.results.clear();
        self.dropped_points = 0;
        info!("sweep started");
    }

    /// Mark the sweep finished
    pub fn notify_measurement_complete(&mut self) {
        let transition = apply_event(self.state, LifecycleEvent::SweepComplete);
        self.state = transition.next;
        if self.state == LifecycleState::DataReady {
            info!(
                "sweep complete, {} points ({} dropped)",
                self.results.len(),
                self.dropped_points
            );
        }
    }

    /// Store one converted point
    ///
    /// Returns `false` if the point was ignored (no sweep running) or
    /// dropped (buffer full).
    pub fn append_result_point(&mut self, frequency_hz: u32, s11: Complex, s21: Complex) -> bool {
        if self.state != LifecycleState::Measuring {
            self.ignored_points = self.ignored_points.saturating_add(1);
            return false;
        }
        if self.results.push(ResultPoint::new(frequency_hz, s11, s21)).is_err() {
            self.dropped_points = self.dropped_points.saturating_add(1);
            warn!("result buffer full, dropped {} Hz", frequency_hz);
            return false;
        }
        true
    }
}

impl<const N: usize> Default for MeasurementController<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PointSink for MeasurementController<N> {
    fn on_point(&mut self, point: &RawPoint) {
        let result = ResultPoint::from_observation(point.frequency_hz, &point.observation);
        if point.observation.reference_too_weak() {
            trace!("point {}: reference below threshold", point.index);
        }
        self.append_result_point(result.frequency_hz, result.s11, result.s21);
        if point.last {
            self.notify_measurement_complete();
        }
    }
}
