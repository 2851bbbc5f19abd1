//! On-chip Flash
//!
//! [`FlashDevice`] over embassy's blocking flash driver. embassy unlocks and
//! relocks the controller around every operation; the unlocked flag here
//! keeps the store's session discipline enforced on hardware too.

use embassy_stm32::flash::{Blocking, Flash};

use crate::config::flash::{FLASH_BASE, FLASH_PAGE_SIZE};
use crate::flash::{FlashDevice, FlashError};

/// Internal flash of the STM32F303
pub struct Stm32Flash<'d> {
    flash: Flash<'d, Blocking>,
    unlocked: bool,
}

impl<'d> Stm32Flash<'d> {
    /// Wrap embassy's flash driver
    #[must_use]
    pub fn new(flash: Flash<'d, Blocking>) -> Self {
        Self {
            flash,
            unlocked: false,
        }
    }

    fn offset(address: u32) -> Result<u32, FlashError> {
        address.checked_sub(FLASH_BASE).ok_or(FlashError::OutOfRange)
    }
}

impl FlashDevice for Stm32Flash<'_> {
    fn unlock(&mut self) -> Result<(), FlashError> {
        self.unlocked = true;
        Ok(())
    }

    fn lock(&mut self) {
        self.unlocked = false;
    }

    fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        if !self.unlocked {
            return Err(FlashError::Locked);
        }
        let from = Self::offset(address)?;
        self.flash
            .blocking_erase(from, from + FLASH_PAGE_SIZE)
            .map_err(|_| FlashError::EraseFailed { address })
    }

    fn program_half_word(&mut self, address: u32, value: u16) -> Result<(), FlashError> {
        if !self.unlocked {
            return Err(FlashError::Locked);
        }
        let offset = Self::offset(address)?;
        self.flash
            .blocking_write(offset, &value.to_le_bytes())
            .map_err(|_| FlashError::ProgramFailed { address })
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let offset = Self::offset(address)?;
        self.flash
            .blocking_read(offset, buf)
            .map_err(|_| FlashError::OutOfRange)
    }
}
