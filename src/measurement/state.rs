//! Lifecycle State Machine
//!
//! One tagged state replaces separate "in progress" and "data ready"
//! flags. The transfer cursor only exists while a transfer is running.

use crate::protocol::Status;
use crate::transfer::TransferCursor;

/// Lifecycle of one sweep and its transfer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LifecycleState {
    /// Waiting for a trigger
    #[default]
    Idle,
    /// Sweep running, results accumulating
    Measuring,
    /// Sweep finished, nothing sent yet
    DataReady,
    /// Transfer in progress
    Busy {
        /// Next byte to send
        cursor: TransferCursor,
    },
}

impl LifecycleState {
    /// Status byte reported for this state
    #[must_use]
    pub const fn status(self) -> Status {
        match self {
            Self::Idle => Status::Idle,
            Self::Measuring => Status::Measuring,
            Self::DataReady => Status::DataReady,
            Self::Busy { .. } => Status::Busy,
        }
    }

    /// Whether a new sweep may start
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for LifecycleState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Idle => defmt::write!(f, "Idle"),
            Self::Measuring => defmt::write!(f, "Measuring"),
            Self::DataReady => defmt::write!(f, "DataReady"),
            Self::Busy { cursor } => defmt::write!(f, "Busy({})", cursor),
        }
    }
}

/// Inputs to the lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Trigger command from the master
    TriggerSweep,
    /// Data request from the master
    RequestData,
    /// Status request from the master
    RequestStatus,
    /// Sweep engine delivered its last point
    SweepComplete,
    /// A chunk was queued; `complete` once every byte is out
    ChunkSent {
        /// Cursor after the chunk
        cursor: TransferCursor,
        /// No bytes remain
        complete: bool,
    },
}

/// Side effect the caller performs after a transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Nothing to do
    None,
    /// Answer with a status byte
    Reply(Status),
    /// Clear the buffer and configure a new sweep
    StartSweep,
    /// Serialize the next chunk from `cursor`
    SendChunk(TransferCursor),
    /// Transfer finished, release the buffer
    ReleaseResults,
}

/// Result of [`apply_event`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// State after the event
    pub next: LifecycleState,
    /// Work left to the caller
    pub effect: Effect,
}

impl Transition {
    const fn to(next: LifecycleState, effect: Effect) -> Self {
        Self { next, effect }
    }

    const fn stay(state: LifecycleState, effect: Effect) -> Self {
        Self { next: state, effect }
    }
}

/// Apply an event to a state (pure function)
#[must_use]
pub fn apply_event(state: LifecycleState, event: LifecycleEvent) -> Transition {
    use LifecycleState::{Busy, DataReady, Idle, Measuring};

    match (state, event) {
        (Idle, LifecycleEvent::TriggerSweep) => Transition::to(Measuring, Effect::StartSweep),
        (_, LifecycleEvent::TriggerSweep) => Transition::stay(state, Effect::Reply(Status::Busy)),

        (_, LifecycleEvent::RequestStatus) => {
            Transition::stay(state, Effect::Reply(state.status()))
        }

        (Measuring, LifecycleEvent::SweepComplete) => Transition::to(DataReady, Effect::None),
        (_, LifecycleEvent::SweepComplete) => Transition::stay(state, Effect::None),

        (DataReady, LifecycleEvent::RequestData) => {
            let cursor = TransferCursor::START;
            Transition::to(Busy { cursor }, Effect::SendChunk(cursor))
        }
        (Busy { cursor }, LifecycleEvent::RequestData) => {
            Transition::stay(state, Effect::SendChunk(cursor))
        }
        (Idle | Measuring, LifecycleEvent::RequestData) => {
            Transition::stay(state, Effect::Reply(state.status()))
        }

        (Busy { cursor }, LifecycleEvent::ChunkSent { cursor: next, complete }) => {
            if complete {
                Transition::to(Idle, Effect::ReleaseResults)
            } else if next.position() >= cursor.position() {
                Transition::to(Busy { cursor: next }, Effect::None)
            } else {
                // cursor never moves backwards
                Transition::stay(state, Effect::None)
            }
        }
        (_, LifecycleEvent::ChunkSent { .. }) => Transition::stay(state, Effect::None),
    }
}
