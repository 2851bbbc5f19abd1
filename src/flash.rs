//! Flash Calibration Store
//!
//! Durable storage for calibration slots and one configuration block in a
//! statically partitioned region at the end of on-chip flash.
//!
//! ```text
//! USERFLASH_START
//! ├── slot 0      (SAVEAREA_BYTES, page aligned)
//! ├── ...
//! ├── slot 6
//! ├── config area (CONFIGAREA_BYTES)
//! └── free        ... USERFLASH_END
//! ```
//!
//! Every range check happens in [`window`] before the device is touched, so
//! invalid input fails with no hardware side effects. Writes are verified
//! by read-back and never retried.

#[cfg(feature = "std")]
pub mod mock;
pub mod store;
pub mod window;

pub use store::{FlashSession, FlashStore};
pub use window::{FlashSpan, FlashWindow, PageIter};

/// Flash operation failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashError {
    /// Address range leaves the user flash window
    OutOfRange,
    /// Address not aligned to the required unit
    Misaligned,
    /// Calibration slot index out of range
    InvalidSlot,
    /// Program or erase attempted while the flash is locked
    Locked,
    /// Page erase reported an error
    EraseFailed {
        /// Page address
        address: u32,
    },
    /// Programming reported an error
    ProgramFailed {
        /// Half-word address
        address: u32,
    },
    /// Read-back did not match the written data
    VerifyFailed {
        /// Half-word address
        address: u32,
    },
}

impl core::fmt::Display for FlashError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfRange => f.write_str("address outside user flash"),
            Self::Misaligned => f.write_str("misaligned flash address"),
            Self::InvalidSlot => f.write_str("invalid calibration slot"),
            Self::Locked => f.write_str("flash is locked"),
            Self::EraseFailed { address } => write!(f, "erase failed at {address:#010x}"),
            Self::ProgramFailed { address } => write!(f, "program failed at {address:#010x}"),
            Self::VerifyFailed { address } => write!(f, "verify failed at {address:#010x}"),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for FlashError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::OutOfRange => defmt::write!(f, "OutOfRange"),
            Self::Misaligned => defmt::write!(f, "Misaligned"),
            Self::InvalidSlot => defmt::write!(f, "InvalidSlot"),
            Self::Locked => defmt::write!(f, "Locked"),
            Self::EraseFailed { address } => defmt::write!(f, "EraseFailed({=u32:#x})", address),
            Self::ProgramFailed { address } => {
                defmt::write!(f, "ProgramFailed({=u32:#x})", address);
            }
            Self::VerifyFailed { address } => defmt::write!(f, "VerifyFailed({=u32:#x})", address),
        }
    }
}

/// Raw flash device
///
/// Addresses are absolute bus addresses. Implementations perform no range
/// checks of their own beyond what the hardware enforces; [`FlashStore`]
/// validates everything first.
pub trait FlashDevice {
    /// Enable program and erase
    ///
    /// # Errors
    ///
    /// [`FlashError::Locked`] if the unlock sequence was rejected.
    fn unlock(&mut self) -> Result<(), FlashError>;

    /// Disable program and erase
    fn lock(&mut self);

    /// Erase the page starting at `address`
    ///
    /// # Errors
    ///
    /// [`FlashError::EraseFailed`] or [`FlashError::Locked`].
    fn erase_page(&mut self, address: u32) -> Result<(), FlashError>;

    /// Program one half-word at an even `address`
    ///
    /// # Errors
    ///
    /// [`FlashError::ProgramFailed`] or [`FlashError::Locked`].
    fn program_half_word(&mut self, address: u32, value: u16) -> Result<(), FlashError>;

    /// Copy `buf.len()` bytes starting at `address`
    ///
    /// # Errors
    ///
    /// [`FlashError::OutOfRange`] if the device cannot read there.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), FlashError>;
}

impl<T: FlashDevice + ?Sized> FlashDevice for &mut T {
    fn unlock(&mut self) -> Result<(), FlashError> {
        (**self).unlock()
    }

    fn lock(&mut self) {
        (**self).lock();
    }

    fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        (**self).erase_page(address)
    }

    fn program_half_word(&mut self, address: u32, value: u16) -> Result<(), FlashError> {
        (**self).program_half_word(address, value)
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        (**self).read(address, buf)
    }
}
