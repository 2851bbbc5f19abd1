//! In-memory flash for host tests
//!
//! Models the STM32F3 flash closely enough to exercise the store: erased
//! bytes read `0xFF`, programming can only clear bits, and program/erase
//! are refused while locked.

use std::collections::BTreeSet;
use std::vec::Vec;

use super::{FlashDevice, FlashError};
use crate::config::flash::{FLASH_BASE, FLASH_PAGE_SIZE, FLASH_SIZE};

/// Simulated flash array
///
/// ```
/// use vna_spi_firmware::flash::mock::MockFlash;
/// use vna_spi_firmware::flash::FlashStore;
///
/// let mut store = FlashStore::new(MockFlash::new());
/// let addr = FlashStore::<MockFlash>::configarea_addr();
/// {
///     let mut session = store.unlock().unwrap();
///     session.erase_configarea().unwrap();
///     session.program_block(addr, b"VNA").unwrap();
/// }
/// let mut buf = [0u8; 4];
/// store.read_block(addr, &mut buf).unwrap();
/// assert_eq!(&buf, b"VNA\xFF");
/// ```
#[derive(Debug)]
pub struct MockFlash {
    memory: Vec<u8>,
    unlocked: bool,
    erases: u32,
    programs: u32,
    unlocks: u32,
    locks: u32,
    failing_erases: BTreeSet<u32>,
    failing_programs: BTreeSet<u32>,
    corrupting_programs: BTreeSet<u32>,
}

impl MockFlash {
    /// Fully erased flash
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: vec![0xFF; FLASH_SIZE as usize],
            unlocked: false,
            erases: 0,
            programs: 0,
            unlocks: 0,
            locks: 0,
            failing_erases: BTreeSet::new(),
            failing_programs: BTreeSet::new(),
            corrupting_programs: BTreeSet::new(),
        }
    }

    /// Flash with every byte set to `fill`
    #[must_use]
    pub fn filled(fill: u8) -> Self {
        let mut flash = Self::new();
        flash.memory.fill(fill);
        flash
    }

    /// Page erases performed
    #[must_use]
    pub const fn erase_count(&self) -> u32 {
        self.erases
    }

    /// Half-word programs performed
    #[must_use]
    pub const fn program_count(&self) -> u32 {
        self.programs
    }

    /// Erases plus programs
    #[must_use]
    pub const fn hardware_ops(&self) -> u32 {
        self.erases + self.programs
    }

    /// Times the flash was unlocked
    #[must_use]
    pub const fn unlock_count(&self) -> u32 {
        self.unlocks
    }

    /// Times the flash was locked
    #[must_use]
    pub const fn lock_count(&self) -> u32 {
        self.locks
    }

    /// Whether program/erase is currently enabled
    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Make the erase of the page at `address` fail
    pub fn fail_erase_at(&mut self, address: u32) {
        self.failing_erases.insert(address);
    }

    /// Make programming the half-word at `address` report an error
    pub fn fail_program_at(&mut self, address: u32) {
        self.failing_programs.insert(address);
    }

    /// Make programming the half-word at `address` store a wrong value
    pub fn corrupt_program_at(&mut self, address: u32) {
        self.corrupting_programs.insert(address);
    }

    /// Raw contents, bypassing all checks
    #[must_use]
    pub fn contents(&self, address: u32, len: usize) -> &[u8] {
        let offset = (address - FLASH_BASE) as usize;
        &self.memory[offset..offset + len]
    }

    /// Overwrite raw contents, bypassing all checks
    pub fn poke(&mut self, address: u32, data: &[u8]) {
        let offset = (address - FLASH_BASE) as usize;
        self.memory[offset..offset + data.len()].copy_from_slice(data);
    }

    fn offset(address: u32, len: usize) -> Result<usize, FlashError> {
        let offset = address.checked_sub(FLASH_BASE).ok_or(FlashError::OutOfRange)? as usize;
        if offset + len > FLASH_SIZE as usize {
            return Err(FlashError::OutOfRange);
        }
        Ok(offset)
    }
}

impl Default for MockFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashDevice for MockFlash {
    fn unlock(&mut self) -> Result<(), FlashError> {
        self.unlocked = true;
        self.unlocks += 1;
        Ok(())
    }

    fn lock(&mut self) {
        self.unlocked = false;
        self.locks += 1;
    }

    fn erase_page(&mut self, address: u32) -> Result<(), FlashError> {
        if !self.unlocked {
            return Err(FlashError::Locked);
        }
        if address % FLASH_PAGE_SIZE != 0 {
            return Err(FlashError::Misaligned);
        }
        let offset = Self::offset(address, FLASH_PAGE_SIZE as usize)?;
        self.erases += 1;
        if self.failing_erases.contains(&address) {
            return Err(FlashError::EraseFailed { address });
        }
        self.memory[offset..offset + FLASH_PAGE_SIZE as usize].fill(0xFF);
        Ok(())
    }

    fn program_half_word(&mut self, address: u32, value: u16) -> Result<(), FlashError> {
        if !self.unlocked {
            return Err(FlashError::Locked);
        }
        if address % 2 != 0 {
            return Err(FlashError::Misaligned);
        }
        let offset = Self::offset(address, 2)?;
        self.programs += 1;
        if self.failing_programs.contains(&address) {
            return Err(FlashError::ProgramFailed { address });
        }
        let value = if self.corrupting_programs.contains(&address) {
            value ^ 0x0001
        } else {
            value
        };
        let [lo, hi] = value.to_le_bytes();
        self.memory[offset] &= lo;
        self.memory[offset + 1] &= hi;
        Ok(())
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let offset = Self::offset(address, buf.len())?;
        buf.copy_from_slice(&self.memory[offset..offset + buf.len()]);
        Ok(())
    }
}
