//! SPI1 Slave Port
//!
//! Register-level binding of SPI1 as an 8-bit, mode 1 slave with hardware
//! NSS. embassy's SPI driver is master-only, so the peripheral is driven
//! through the PAC. The rising NSS edge also raises EXTI line 4.

use core::ptr;

use embassy_stm32::pac;
use embassy_stm32::pac::spi::vals;

use crate::config::pins::SPI_NSS_INDEX;
use crate::transport::{SpiEvents, SpiSlavePort};

/// Handle to the SPI1 registers
///
/// Copyable so the interrupt handler and the main loop each own one; the
/// only register both sides write (CR2) is modified inside a critical
/// section.
#[derive(Clone, Copy)]
pub struct Spi1Slave {
    regs: pac::spi::Spi,
}

impl Spi1Slave {
    /// Configure SPI1 as slave and enable it
    ///
    /// The peripheral clock must already be on and PA4..PA7 routed to AF5.
    pub(crate) fn configure() -> Self {
        let regs = pac::SPI1;

        regs.cr1().modify(|w| w.set_spe(false));
        regs.cr2().write(|w| {
            w.set_ds(vals::Ds::BITS8);
            w.set_frxth(vals::Frxth::QUARTER);
            w.set_ssoe(false);
            w.set_rxneie(true);
            w.set_errie(true);
            w.set_txeie(false);
        });
        regs.cr1().write(|w| {
            w.set_cpol(vals::Cpol::IDLE_LOW);
            w.set_cpha(vals::Cpha::SECOND_EDGE);
            w.set_mstr(vals::Mstr::SLAVE);
            w.set_lsbfirst(vals::Lsbfirst::MSBFIRST);
            w.set_ssm(false);
            w.set_crcen(false);
            w.set_bidimode(vals::Bidimode::UNIDIRECTIONAL);
        });

        let port = Self { regs };
        port.load(crate::config::FILLER_BYTE);
        regs.cr1().modify(|w| w.set_spe(true));
        port
    }

    /// Handle for use inside the SPI1 interrupt
    #[must_use]
    pub fn isr_handle() -> Self {
        Self { regs: pac::SPI1 }
    }

    /// Clear the pending chip-select release edge
    pub fn acknowledge_deselect() {
        pac::EXTI.pr(0).write(|w| w.set_line(SPI_NSS_INDEX, true));
    }

    fn load(&self, byte: u8) {
        // 8-bit access so the FIFO packs single bytes
        unsafe { ptr::write_volatile(self.regs.dr().as_ptr().cast::<u8>(), byte) }
    }
}

impl SpiSlavePort for Spi1Slave {
    fn events(&self) -> SpiEvents {
        let sr = self.regs.sr().read();
        let txeie = self.regs.cr2().read().txeie();
        SpiEvents {
            rx_ready: sr.rxne(),
            tx_ready: sr.txe() && txeie,
            overrun: sr.ovr(),
        }
    }

    fn read_byte(&mut self) -> u8 {
        unsafe { ptr::read_volatile(self.regs.dr().as_ptr().cast::<u8>()) }
    }

    fn write_byte(&mut self, byte: u8) {
        self.load(byte);
    }

    fn clear_overrun(&mut self) {
        // OVR clears on a DR read followed by an SR read
        let _ = unsafe { ptr::read_volatile(self.regs.dr().as_ptr().cast::<u8>()) };
        let _ = self.regs.sr().read();
    }

    fn set_tx_interrupt(&mut self, enabled: bool) {
        critical_section::with(|_| {
            self.regs.cr2().modify(|w| w.set_txeie(enabled));
        });
    }
}
