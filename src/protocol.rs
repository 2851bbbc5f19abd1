//! SPI Wire Protocol
//!
//! Single-byte commands from the master, single-byte status replies and
//! the fixed 20-byte result record carried in data chunks.
//!
//! The master drives every transaction: it shifts one command byte, then
//! clocks exactly as many response bytes as the command defines. The bytes
//! it shifts in while clocking are not commands.
//!
//! | Command | Byte | Response |
//! |---|---|---|
//! | Trigger sweep | `0xA0` | 1 status byte |
//! | Request data | `0xB0` | one chunk, or 1 status byte when no data can be sent |
//! | Request status | `0xC0` | 1 status byte |
//! | anything else | | `0xFF` |

use crate::config::{BYTES_PER_FLOAT, RECORD_BYTES};
use crate::types::{Complex, ResultPoint};

/// Trigger a fixed-parameter sweep
pub const CMD_TRIGGER_SWEEP: u8 = 0xA0;

/// Request the next chunk of result bytes
pub const CMD_REQUEST_DATA: u8 = 0xB0;

/// Request one status byte
pub const CMD_REQUEST_STATUS: u8 = 0xC0;

/// Command decoded from one received byte
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start a sweep if idle
    TriggerSweep,
    /// Send the next chunk of result data
    RequestData,
    /// Send the current status
    RequestStatus,
    /// Unrecognized command byte
    Unknown(u8),
}

impl Command {
    /// Decode a command byte
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            CMD_TRIGGER_SWEEP => Self::TriggerSweep,
            CMD_REQUEST_DATA => Self::RequestData,
            CMD_REQUEST_STATUS => Self::RequestStatus,
            other => Self::Unknown(other),
        }
    }

    /// Encode back to the wire byte
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::TriggerSweep => CMD_TRIGGER_SWEEP,
            Self::RequestData => CMD_REQUEST_DATA,
            Self::RequestStatus => CMD_REQUEST_STATUS,
            Self::Unknown(byte) => byte,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Command {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::TriggerSweep => defmt::write!(f, "TRIGGER"),
            Self::RequestData => defmt::write!(f, "DATA"),
            Self::RequestStatus => defmt::write!(f, "STATUS"),
            Self::Unknown(b) => defmt::write!(f, "UNKNOWN({:#04x})", b),
        }
    }
}

/// Status byte sent to the master
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Idle, waiting for a trigger
    Idle = 0x01,
    /// Sweep in progress
    Measuring = 0x02,
    /// Sweep complete, data not yet requested
    DataReady = 0x03,
    /// Transfer in progress or trigger rejected
    Busy = 0x04,
    /// Internal error
    Error = 0xFE,
    /// Command byte not recognized
    UnknownCommand = 0xFF,
}

impl Status {
    /// Wire value
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Decode a wire value (master side)
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Idle),
            0x02 => Some(Self::Measuring),
            0x03 => Some(Self::DataReady),
            0x04 => Some(Self::Busy),
            0xFE => Some(Self::Error),
            0xFF => Some(Self::UnknownCommand),
            _ => None,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Status {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Idle => defmt::write!(f, "IDLE"),
            Self::Measuring => defmt::write!(f, "MEASURING"),
            Self::DataReady => defmt::write!(f, "DATA_READY"),
            Self::Busy => defmt::write!(f, "BUSY"),
            Self::Error => defmt::write!(f, "ERROR"),
            Self::UnknownCommand => defmt::write!(f, "UNKNOWN_CMD"),
        }
    }
}

/// Destination for response bytes
///
/// Implemented by the transmit side of the byte transport; plain buffers
/// implement it for tests and host tools.
///
/// Every command gets exactly one response. The master clocks one byte per
/// response byte and shifts a byte in for each; the sink's `finish` tells
/// the transport how many.
pub trait ResponseSink {
    /// Bytes that can still be accepted
    fn free(&self) -> usize;

    /// Append one byte, returns `false` if it was not accepted
    fn push(&mut self, byte: u8) -> bool;

    /// Close the response
    ///
    /// `response_len` is the number of bytes the master clocks for it,
    /// whether or not all of them were accepted.
    fn finish(&mut self, response_len: usize) {
        let _ = response_len;
    }

    /// Append as many bytes of `data` as fit, returns the count accepted
    fn extend(&mut self, data: &[u8]) -> usize {
        let mut accepted = 0;
        for &byte in data {
            if !self.push(byte) {
                break;
            }
            accepted += 1;
        }
        accepted
    }
}

impl<const N: usize> ResponseSink for heapless::Vec<u8, N> {
    fn free(&self) -> usize {
        N - self.len()
    }

    fn push(&mut self, byte: u8) -> bool {
        heapless::Vec::push(self, byte).is_ok()
    }
}

#[cfg(feature = "std")]
impl ResponseSink for std::vec::Vec<u8> {
    fn free(&self) -> usize {
        usize::MAX - self.len()
    }

    fn push(&mut self, byte: u8) -> bool {
        std::vec::Vec::push(self, byte);
        true
    }
}

/// Serialize a result point as `(frequency, s11.re, s11.im, s21.re, s21.im)`
///
/// Each field is a little-endian IEEE-754 `f32`.
#[must_use]
pub fn encode_record(point: &ResultPoint) -> [u8; RECORD_BYTES] {
    #[allow(clippy::cast_precision_loss)]
    let fields = [
        point.frequency_hz as f32,
        point.s11.re,
        point.s11.im,
        point.s21.re,
        point.s21.im,
    ];
    let mut out = [0u8; RECORD_BYTES];
    for (chunk, value) in out.chunks_exact_mut(BYTES_PER_FLOAT).zip(fields) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    out
}

/// Record as seen by the master after reassembly
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WireRecord {
    /// Frequency in Hz, as transmitted (single precision)
    pub frequency_hz: f32,
    /// Reflection coefficient
    pub s11: Complex,
    /// Transmission coefficient
    pub s21: Complex,
}

/// Decode one 20-byte record (master side)
#[must_use]
pub fn decode_record(bytes: &[u8; RECORD_BYTES]) -> WireRecord {
    let field = |i: usize| {
        let mut raw = [0u8; BYTES_PER_FLOAT];
        raw.copy_from_slice(&bytes[i * BYTES_PER_FLOAT..(i + 1) * BYTES_PER_FLOAT]);
        f32::from_le_bytes(raw)
    };
    WireRecord {
        frequency_hz: field(0),
        s11: Complex::new(field(1), field(2)),
        s21: Complex::new(field(3), field(4)),
    }
}
