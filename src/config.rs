//! System configuration and hardware constants
//!
//! This module defines compile-time constants for the VNA SPI slave module.
//! Pin mappings, protocol sizes, sweep parameters and the flash layout are
//! centralized here.

/// System clock frequency (STM32F303 @ 72MHz from an 8MHz crystal)
pub const SYSTEM_CLOCK_HZ: u32 = 72_000_000;

/// External crystal frequency
pub const HSE_FREQUENCY_HZ: u32 = 8_000_000;

/// Maximum number of points in one sweep
pub const SWEEP_POINTS_MAX: usize = 201;

/// Fixed sweep start frequency (50 kHz)
pub const SWEEP_START_HZ: u32 = 50_000;

/// Fixed sweep stop frequency (900 MHz)
pub const SWEEP_STOP_HZ: u32 = 900_000_000;

/// Fixed number of sweep points
pub const SWEEP_POINTS: u16 = SWEEP_POINTS_MAX as u16;

/// Fixed averaging count per point
pub const SWEEP_AVERAGES: u16 = 1;

/// Receive queue capacity (command bytes from the master)
pub const RX_QUEUE_SIZE: usize = 16;

/// Transmit queue capacity (one data chunk plus status bytes)
pub const TX_QUEUE_SIZE: usize = 128;

/// Maximum length of one data chunk in bytes
///
/// Not a multiple of the record size; records straddle chunk boundaries.
pub const TX_CHUNK_SIZE: usize = 64;

/// Byte shifted out when the transmit queue is empty
pub const FILLER_BYTE: u8 = 0xFF;

/// Bytes per serialized float
pub const BYTES_PER_FLOAT: usize = 4;

/// Complex parameters per point (S11, S21)
pub const COMPLEX_PARAMS_PER_POINT: usize = 2;

/// Bytes per serialized result point: frequency + S11(re, im) + S21(re, im)
pub const RECORD_BYTES: usize = BYTES_PER_FLOAT + COMPLEX_PARAMS_PER_POINT * 2 * BYTES_PER_FLOAT;

/// Squared reference magnitude below which S-parameters are forced to zero
///
/// Corresponds to a reference magnitude of 1e-9.
pub const REFERENCE_MAG_SQ_EPSILON: f32 = 1e-18;

/// Idle wait of the main loop when no work is pending
pub const MAIN_LOOP_IDLE_US: u64 = 1_000;

/// Gain calibration frequency (single-frequency sweep)
pub const GAIN_CAL_FREQUENCY_HZ: u32 = 100_000_000;

/// Number of repeated readings taken during gain calibration
pub const GAIN_CAL_POINTS: usize = 101;

/// Gain calibration averaging count
pub const GAIN_CAL_AVERAGES: u16 = 1;

/// Gain calibration timeout
pub const GAIN_CAL_TIMEOUT_MS: u64 = 5_000;

/// Calibration slot the gain reference is saved to
pub const GAIN_CAL_SLOT: usize = 0;

/// Flash layout
pub mod flash {
    //! Static partitioning of the user flash window
    //!
    //! ```text
    //! USERFLASH_START
    //! [slot 0][slot 1] ... [slot SAVEAREA_MAX-1][config area] ... USERFLASH_END
    //! ```

    use super::SWEEP_POINTS_MAX;

    /// Start of the memory-mapped flash
    pub const FLASH_BASE: u32 = 0x0800_0000;

    /// Total flash size of the STM32F303CC (256 KiB)
    pub const FLASH_SIZE: u32 = 256 * 1024;

    /// Erase page size
    pub const FLASH_PAGE_SIZE: u32 = 2048;

    /// First byte of the user flash window
    pub const USERFLASH_START: u32 = 0x0803_4000;

    /// One past the last byte of the user flash window
    pub const USERFLASH_END: u32 = FLASH_BASE + FLASH_SIZE;

    /// Number of calibration slots
    pub const SAVEAREA_MAX: usize = 7;

    /// Serialized calibration record header
    pub const CAL_RECORD_BYTES: u32 = 32;

    /// Serialized calibration point: frequency (u32) + two complex values
    pub const CAL_POINT_BYTES: u32 = 4 + 2 * 8;

    /// Minimum slack reserved after each slot's data
    pub const SAVEAREA_SLACK_BYTES: u32 = 256;

    /// Bytes used by one slot's per-point arrays
    pub const SAVEAREA_ARRAY_BYTES: u32 = SWEEP_POINTS_MAX as u32 * CAL_POINT_BYTES;

    /// Slot stride, rounded up so that every slot starts on a page boundary
    pub const SAVEAREA_BYTES: u32 = align_up(
        SAVEAREA_ARRAY_BYTES + CAL_RECORD_BYTES + SAVEAREA_SLACK_BYTES,
        FLASH_PAGE_SIZE,
    );

    /// Bytes used by all slots
    pub const SAVETOTAL_BYTES: u32 = SAVEAREA_MAX as u32 * SAVEAREA_BYTES;

    /// Configuration area size
    pub const CONFIGAREA_BYTES: u32 = 1024;

    /// Round `value` up to a multiple of `align`
    #[must_use]
    pub const fn align_up(value: u32, align: u32) -> u32 {
        value.div_ceil(align) * align
    }

    const _: () = assert!(USERFLASH_START % FLASH_PAGE_SIZE == 0);
    const _: () = assert!(USERFLASH_START >= FLASH_BASE);
    const _: () = assert!(
        USERFLASH_START + SAVETOTAL_BYTES + CONFIGAREA_BYTES <= USERFLASH_END,
        "calibration slots and config area must fit the user flash window"
    );
}

/// Pin assignments for GPIO
pub mod pins {
    //! GPIO pin assignments matching the schematic

    /// SPI1 NSS (slave select from the master, active low)
    pub const SPI_NSS: &str = "PA4";

    /// SPI1 SCK
    pub const SPI_SCK: &str = "PA5";

    /// SPI1 MISO
    pub const SPI_MISO: &str = "PA6";

    /// SPI1 MOSI
    pub const SPI_MOSI: &str = "PA7";

    /// Alternate function number of SPI1 on PA4..PA7
    pub const SPI_AF: u8 = 5;

    /// GPIOA index of the NSS pin
    pub const SPI_NSS_INDEX: usize = 4;

    /// Operator button (active low, gain calibration)
    pub const BUTTON: &str = "PA0";
}

/// Interrupt priorities
pub mod irq {
    //! NVIC priority assignments

    /// SPI1 byte shifter priority (numerically lower is more urgent)
    pub const SPI1_PRIORITY: u8 = 1;

    /// Chip-select release; same level as SPI1 so neither preempts the other
    pub const NSS_PRIORITY: u8 = SPI1_PRIORITY;
}
