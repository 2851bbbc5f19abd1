//! Command Dispatcher
//!
//! Decodes one received byte, drives the measurement controller and
//! queues exactly the response bytes the protocol defines for that
//! command. One command is handled per call; there is no pipelining.
//!
//! Framing lives here: the returned [`Exchange`] carries the response
//! length, which the sink uses to discard the bytes the master shifts in
//! while clocking the response out.

use crate::measurement::{MeasurementController, Reply, SweepEngine};
use crate::protocol::{Command, ResponseSink, Status};

/// Command counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Commands handled
    pub commands: u32,
    /// Unrecognized command bytes
    pub unknown: u32,
    /// Triggers rejected because a sweep or transfer was active
    pub rejected_triggers: u32,
    /// Data bytes queued
    pub data_bytes: u32,
}

#[cfg(feature = "embedded")]
impl defmt::Format for DispatchStats {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "cmds={} unknown={} rejected={} data={}B",
            self.commands,
            self.unknown,
            self.rejected_triggers,
            self.data_bytes
        );
    }
}

/// One handled command and the length of its response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Exchange {
    /// Decoded command
    pub command: Command,
    /// Bytes the master clocks for the response
    pub response_len: usize,
}

/// Routes command bytes to the controller
#[derive(Debug, Default)]
pub struct Dispatcher {
    stats: DispatchStats,
}

impl Dispatcher {
    /// Create a dispatcher with zeroed counters
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stats: DispatchStats {
                commands: 0,
                unknown: 0,
                rejected_triggers: 0,
                data_bytes: 0,
            },
        }
    }

    /// Counters so far
    #[must_use]
    pub const fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Handle one command byte and queue its response into `out`
    ///
    /// The response is one status byte, or the data chunk for a data
    /// request that could send data.
    pub fn dispatch<const N: usize, E, S>(
        &mut self,
        byte: u8,
        controller: &mut MeasurementController<N>,
        engine: &mut E,
        out: &mut S,
    ) -> Exchange
    where
        E: SweepEngine + ?Sized,
        S: ResponseSink + ?Sized,
    {
        let command = Command::from_byte(byte);
        self.stats.commands = self.stats.commands.wrapping_add(1);
        trace!("command {}", command);

        let response_len = match command {
            Command::TriggerSweep => {
                let status = controller.trigger(engine);
                if status == Status::Busy {
                    self.stats.rejected_triggers = self.stats.rejected_triggers.wrapping_add(1);
                }
                reply(out, status)
            }
            Command::RequestData => match controller.request_data(out) {
                Reply::Chunk(bytes) => {
                    #[allow(clippy::cast_possible_truncation)]
                    let counted = bytes as u32;
                    self.stats.data_bytes = self.stats.data_bytes.wrapping_add(counted);
                    bytes
                }
                Reply::Status(status) => reply(out, status),
            },
            Command::RequestStatus => reply(out, controller.status()),
            Command::Unknown(other) => {
                self.stats.unknown = self.stats.unknown.wrapping_add(1);
                debug!("unknown command {:#04x}", other);
                reply(out, Status::UnknownCommand)
            }
        };

        out.finish(response_len);
        Exchange {
            command,
            response_len,
        }
    }
}

/// Queue one status byte; the response is one byte either way
fn reply<S: ResponseSink + ?Sized>(out: &mut S, status: Status) -> usize {
    if !out.push(status.as_byte()) {
        warn!("tx queue full, status {} dropped", status);
    }
    1
}
