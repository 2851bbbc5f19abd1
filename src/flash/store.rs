//! Verified flash store
//!
//! [`FlashStore::unlock`] hands out a [`FlashSession`]; program and erase
//! exist only on the session, and dropping it locks the flash again. The
//! session borrows the store mutably, so two sessions cannot overlap.

use super::window::FlashWindow;
use super::{FlashDevice, FlashError};
use crate::config::flash::{
    CONFIGAREA_BYTES, SAVEAREA_BYTES, SAVEAREA_MAX, SAVETOTAL_BYTES, USERFLASH_START,
};

/// Byte returned for reads outside the window
pub const POISON_BYTE: u8 = 0xFF;

/// Padding for the last half-word of an odd-length block
pub const PAD_BYTE: u8 = 0xFF;

/// Flash store over a raw device
pub struct FlashStore<F: FlashDevice> {
    device: F,
    window: FlashWindow,
}

impl<F: FlashDevice> FlashStore<F> {
    /// Store over the board's user flash window
    pub const fn new(device: F) -> Self {
        Self::with_window(device, FlashWindow::USER)
    }

    /// Store over a custom window
    pub const fn with_window(device: F, window: FlashWindow) -> Self {
        Self { device, window }
    }

    /// The window all operations are confined to
    pub const fn window(&self) -> FlashWindow {
        self.window
    }

    /// Underlying device
    pub const fn device(&self) -> &F {
        &self.device
    }

    /// Give back the device
    pub fn into_inner(self) -> F {
        self.device
    }

    /// Address of calibration slot `slot`
    ///
    /// # Errors
    ///
    /// [`FlashError::InvalidSlot`] if `slot >= SAVEAREA_MAX`.
    pub fn savearea_addr(slot: usize) -> Result<u32, FlashError> {
        if slot >= SAVEAREA_MAX {
            return Err(FlashError::InvalidSlot);
        }
        #[allow(clippy::cast_possible_truncation)]
        let slot = slot as u32;
        Ok(USERFLASH_START + slot * SAVEAREA_BYTES)
    }

    /// Address of the configuration area
    #[must_use]
    pub const fn configarea_addr() -> u32 {
        USERFLASH_START + SAVETOTAL_BYTES
    }

    /// Open a write session
    ///
    /// # Errors
    ///
    /// Propagates the device's unlock failure.
    pub fn unlock(&mut self) -> Result<FlashSession<'_, F>, FlashError> {
        self.device.unlock()?;
        trace!("flash unlocked");
        Ok(FlashSession {
            device: &mut self.device,
            window: self.window,
        })
    }

    /// Copy flash contents into `buf`
    ///
    /// # Errors
    ///
    /// [`FlashError::OutOfRange`] if the range leaves the window; `buf` is
    /// then filled with [`POISON_BYTE`].
    pub fn read_block(&mut self, address: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let result = self
            .window
            .span(address, buf.len())
            .and_then(|span| self.device.read(span.start(), buf));
        if result.is_err() {
            buf.fill(POISON_BYTE);
        }
        result
    }
}

/// Unlocked flash, locked again on drop
pub struct FlashSession<'a, F: FlashDevice> {
    device: &'a mut F,
    window: FlashWindow,
}

impl<F: FlashDevice> FlashSession<'_, F> {
    /// Erase the page starting at `address`
    ///
    /// # Errors
    ///
    /// [`FlashError::OutOfRange`] or [`FlashError::Misaligned`] before any
    /// hardware access, otherwise the device error.
    pub fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        let page = self.window.page(address)?;
        self.device.erase_page(page.start()).map_err(|e| {
            error!("erase {=u32:#x}: {}", address, e);
            e
        })
    }

    /// Program and verify one half-word
    ///
    /// # Errors
    ///
    /// Range and alignment errors before any hardware access, then
    /// [`FlashError::VerifyFailed`] if the read-back differs.
    pub fn program_half_word(&mut self, address: u32, value: u16) -> Result<(), FlashError> {
        let span = self.window.span(address, 2)?;
        if span.start() % 2 != 0 {
            return Err(FlashError::Misaligned);
        }
        self.write_verified(address, value)
    }

    /// Program and verify one little-endian word as two half-words
    ///
    /// # Errors
    ///
    /// As [`Self::program_half_word`].
    pub fn program_word(&mut self, address: u32, value: u32) -> Result<(), FlashError> {
        let span = self.window.span(address, 4)?;
        if span.start() % 2 != 0 {
            return Err(FlashError::Misaligned);
        }
        let [b0, b1, b2, b3] = value.to_le_bytes();
        self.write_verified(address, u16::from_le_bytes([b0, b1]))?;
        self.write_verified(address + 2, u16::from_le_bytes([b2, b3]))
    }

    /// Program and verify a block in half-word units
    ///
    /// An odd trailing byte is padded with [`PAD_BYTE`]. The whole padded
    /// range is checked before the first write.
    ///
    /// # Errors
    ///
    /// As [`Self::program_half_word`]; on failure the destination must be
    /// treated as corrupt.
    pub fn program_block(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        let padded = data.len() + data.len() % 2;
        let span = self.window.span(address, padded)?;
        if span.start() % 2 != 0 {
            return Err(FlashError::Misaligned);
        }
        let mut cursor = span.start();
        for pair in data.chunks(2) {
            let hi = pair.get(1).copied().unwrap_or(PAD_BYTE);
            self.write_verified(cursor, u16::from_le_bytes([pair[0], hi]))?;
            cursor += 2;
        }
        Ok(())
    }

    /// Erase every page of calibration slot `slot`
    ///
    /// # Errors
    ///
    /// [`FlashError::InvalidSlot`] or a range error before any hardware
    /// access; stops at the first failing page.
    pub fn erase_savearea(&mut self, slot: usize) -> Result<(), FlashError> {
        let base = FlashStore::<F>::savearea_addr(slot)?;
        let span = self.window.span(base, SAVEAREA_BYTES as usize)?;
        debug!("erasing slot {} at {=u32:#x}", slot, base);
        for page in span.pages() {
            self.erase_page(page)?;
        }
        Ok(())
    }

    /// Erase every page overlapping the configuration area
    ///
    /// # Errors
    ///
    /// As [`Self::erase_savearea`].
    pub fn erase_configarea(&mut self) -> Result<(), FlashError> {
        let span = self
            .window
            .span(FlashStore::<F>::configarea_addr(), CONFIGAREA_BYTES as usize)?;
        for page in span.pages() {
            self.erase_page(page)?;
        }
        Ok(())
    }

    /// Erase the whole user window
    ///
    /// # Errors
    ///
    /// Stops at the first failing page.
    pub fn clear_user(&mut self) -> Result<(), FlashError> {
        warn!("erasing all user flash");
        for page in self.window.full().pages() {
            self.erase_page(page)?;
        }
        Ok(())
    }

    fn write_verified(&mut self, address: u32, value: u16) -> Result<(), FlashError> {
        self.device.program_half_word(address, value)?;
        let mut readback = [0u8; 2];
        self.device
            .read(address, &mut readback)
            .map_err(|_| FlashError::VerifyFailed { address })?;
        if u16::from_le_bytes(readback) == value {
            Ok(())
        } else {
            error!("verify failed at {=u32:#x}", address);
            Err(FlashError::VerifyFailed { address })
        }
    }
}

impl<F: FlashDevice> Drop for FlashSession<'_, F> {
    fn drop(&mut self) {
        self.device.lock();
        trace!("flash locked");
    }
}
