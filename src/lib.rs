//! VNA SPI Slave Firmware Library
//!
//! Turns an STM32F303-based vector network analyzer module into an SPI
//! peripheral. The external host is the bus master: it triggers a fixed
//! sweep, polls status and pulls the S-parameter results in chunks.
//! Calibration data persists in on-chip flash.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      MAIN LOOP (app)                         │
//! │  Dispatcher  │  Measurement Controller  │  Gain Calibration  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   PROTOCOL / STORAGE                         │
//! │  Chunked Transfer  │  Wire Codec  │  Flash Store + Records   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   TRANSPORT / PLATFORM                       │
//! │  SPI1 IRQ ⇄ Byte Queues  │  Platform bring-up  │  Flash HAL  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    RTOS / SCHEDULER                          │
//! │           embassy-rs (async/await executor)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **One lifecycle value**: a tagged state with a pure transition function
//! - **Locking inside the channel**: queues take their own critical sections
//! - **No unsafe in application code**: all unsafe isolated in `hal`
//! - **Fail closed**: flash ranges are validated before any hardware access
//! - **Explicit error handling**: all fallible operations return `Result`

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Must come first so the logging macros are visible in every module
#[macro_use]
mod fmt;

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_stm32;
#[cfg(feature = "embedded")]
pub use embassy_sync;
#[cfg(feature = "embedded")]
pub use embassy_time;

/// Hardware Abstraction Layer
///
/// STM32F303 bindings for SPI1, flash and board bring-up.
#[cfg(feature = "embedded")]
#[allow(unsafe_code)]
pub mod hal;

/// Main polling loop
pub mod app;

/// Calibration slot records
pub mod calibration;

/// Command decoding and response framing
pub mod dispatcher;

/// Flash calibration store
pub mod flash;

/// Measurement lifecycle and sweep engine interface
pub mod measurement;

/// Platform bring-up capability interface
pub mod platform;

/// Wire protocol: command and status bytes, result record codec
pub mod protocol;

/// Chunked result transfer
pub mod transfer;

/// Interrupt-driven byte transport
pub mod transport;

/// Shared types used across modules
pub mod types;

/// System configuration and constants
pub mod config;

/// Transport sized for the wire protocol
pub type SpiTransport = transport::ByteTransport<{ config::RX_QUEUE_SIZE }, { config::TX_QUEUE_SIZE }>;

/// Prelude module for common imports
#[cfg(feature = "embedded")]
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::config::*;
    pub use crate::types::*;

    pub use crate::app::Application;
    pub use crate::flash::{FlashDevice, FlashStore};
    pub use crate::measurement::{MeasurementController, SweepEngine};
    pub use crate::platform::{bring_up, OperatorButton, Platform};
    pub use crate::transport::SpiSlavePort;

    // Embassy
    pub use embassy_time::{Duration, Instant, Timer};

    // Error handling
    pub use core::result::Result;

    // Logging
    pub use defmt::{debug, error, info, trace, warn};
}
