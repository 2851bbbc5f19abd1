//! SPI Slave Byte Transport
//!
//! Interrupt-side half of the SPI link. The handler captures every byte the
//! master shifts in and always has a byte loaded for the next clock burst.
//! The main loop reads commands with [`ByteTransport::recv`] and queues
//! responses through [`ByteTransport::responder`].
//!
//! ```text
//!  SPI1 IRQ ──► rx queue (16) ──► main loop ──► tx queue (128) ──► SPI1 IRQ
//! ```
//!
//! Bytes flow strictly FIFO. The transport does not decode commands, but it
//! is told how long each response is: the master shifts one byte in for
//! every response byte it clocks out, and those bytes are discarded instead
//! of reaching the main loop.
//!
//! Chip-select release is latched by its own edge interrupt, which calls
//! [`ByteTransport::reset`].

pub mod queue;

use core::cell::Cell;

use critical_section::Mutex;

use crate::config::FILLER_BYTE;
use crate::protocol::ResponseSink;

pub use queue::{ByteQueue, QueueFull};

/// Pending event flags of the SPI peripheral
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpiEvents {
    /// A received byte is waiting in the data register
    pub rx_ready: bool,
    /// The transmit register can accept the next byte
    pub tx_ready: bool,
    /// A byte arrived before the previous one was read
    pub overrun: bool,
}

/// Register-level access to an SPI peripheral running as slave
///
/// Implemented by the STM32 SPI1 binding and by test doubles.
pub trait SpiSlavePort {
    /// Sample the status flags
    fn events(&self) -> SpiEvents;

    /// Read the received byte (clears the receive flag)
    fn read_byte(&mut self) -> u8;

    /// Load the byte to shift out on the next master clock
    fn write_byte(&mut self, byte: u8);

    /// Clear an overrun condition using the peripheral's read sequence
    fn clear_overrun(&mut self);

    /// Enable or disable the transmit-ready interrupt
    fn set_tx_interrupt(&mut self, enabled: bool);
}

/// Command byte taken from the receive queue
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Received {
    /// The byte as shifted in
    pub byte: u8,
    /// Bus reset count when it was taken
    pub epoch: u32,
}

/// Counters of non-fatal transport faults
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Received bytes dropped because the receive queue was full
    pub rx_overflows: u32,
    /// Response bytes rejected because the transmit queue was full
    pub tx_overflows: u32,
    /// Hardware overruns (byte lost in the shifter)
    pub overruns: u32,
    /// Queue resets caused by chip-select deassertion
    pub bus_resets: u32,
}

#[cfg(feature = "embedded")]
impl defmt::Format for TransportStats {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "rx_ovf={} tx_ovf={} ovr={} resets={}",
            self.rx_overflows,
            self.tx_overflows,
            self.overruns,
            self.bus_resets
        );
    }
}

/// Byte transport between the SPI interrupt and the main loop
///
/// Intended to live in a `static`; all methods take `&self`.
pub struct ByteTransport<const RX: usize, const TX: usize> {
    rx: ByteQueue<RX>,
    tx: ByteQueue<TX>,
    overruns: Mutex<Cell<u32>>,
    bus_resets: Mutex<Cell<u32>>,
    /// Received bytes still owed to the current response
    clocking: Mutex<Cell<usize>>,
    /// Receive overflows since the last response was framed
    unframed_drops: Mutex<Cell<usize>>,
}

impl<const RX: usize, const TX: usize> ByteTransport<RX, TX> {
    /// Create a transport with empty queues
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rx: ByteQueue::new(),
            tx: ByteQueue::new(),
            overruns: Mutex::new(Cell::new(0)),
            bus_resets: Mutex::new(Cell::new(0)),
            clocking: Mutex::new(Cell::new(0)),
            unframed_drops: Mutex::new(Cell::new(0)),
        }
    }

    /// Service one SPI interrupt
    ///
    /// Returns `true` if a command byte was queued, so the caller can wake
    /// the main loop. Bytes shifted in while a response is clocked out are
    /// discarded here.
    pub fn on_interrupt<P: SpiSlavePort>(&self, port: &mut P) -> bool {
        let events = port.events();
        let mut received = false;

        if events.rx_ready {
            let byte = port.read_byte();
            received = critical_section::with(|cs| {
                let clocking = self.clocking.borrow(cs);
                if clocking.get() > 0 {
                    clocking.set(clocking.get() - 1);
                    return false;
                }
                if self.rx.push(byte).is_err() {
                    let drops = self.unframed_drops.borrow(cs);
                    drops.set(drops.get().saturating_add(1));
                    warn!("SPI rx queue full, dropped {:#04x}", byte);
                    return false;
                }
                true
            });
        }

        if events.overrun {
            port.clear_overrun();
            bump(&self.overruns);
            warn!("SPI overrun");
        }

        if events.tx_ready {
            if let Some(byte) = self.tx.pop() {
                port.write_byte(byte);
            } else {
                port.write_byte(FILLER_BYTE);
                port.set_tx_interrupt(false);
            }
        }

        received
    }

    /// Take the oldest received command byte
    pub fn recv(&self) -> Option<Received> {
        critical_section::with(|cs| {
            let byte = self.rx.pop()?;
            Some(Received {
                byte,
                epoch: self.bus_resets.borrow(cs).get(),
            })
        })
    }

    /// Received bytes that will be discarded as response clocking
    #[must_use]
    pub fn clocking(&self) -> usize {
        critical_section::with(|cs| self.clocking.borrow(cs).get())
    }

    /// Bytes waiting to be read by the main loop
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Bytes queued for transmission
    #[must_use]
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    /// Response sink for the command `received`
    ///
    /// [`ResponseSink::finish`] frames the response and re-arms the
    /// transmit interrupt.
    pub fn responder<'a, P: SpiSlavePort>(
        &'a self,
        port: &'a mut P,
        received: Received,
    ) -> Responder<'a, RX, TX, P> {
        Responder {
            transport: self,
            port,
            epoch: received.epoch,
        }
    }

    /// Drop everything queued in both directions
    ///
    /// Called from the chip-select interrupt on deassertion. A response
    /// still being built for the old transaction is discarded when it is
    /// finished.
    pub fn reset<P: SpiSlavePort>(&self, port: &mut P) {
        critical_section::with(|cs| {
            self.rx.clear();
            self.tx.clear();
            self.clocking.borrow(cs).set(0);
            self.unframed_drops.borrow(cs).set(0);
            port.set_tx_interrupt(false);
            let resets = self.bus_resets.borrow(cs);
            resets.set(resets.get().wrapping_add(1));
        });
        debug!("SPI transport reset");
    }

    /// Frame a response of `len` bytes queued for the command of `epoch`
    ///
    /// The master shifts in `len` bytes while clocking it out. Those already
    /// received were clocked before the response was ready; the master saw
    /// filler for them, so the same number of response bytes is dropped.
    fn frame<P: SpiSlavePort>(&self, port: &mut P, epoch: u32, len: usize) {
        let outcome = critical_section::with(|cs| {
            if self.bus_resets.borrow(cs).get() != epoch {
                self.tx.clear();
                return None;
            }
            let mut missed = 0;
            while missed < len && self.rx.pop().is_some() {
                missed += 1;
            }
            let lost = self.unframed_drops.borrow(cs).replace(0);
            missed = (missed + lost).min(len);
            for _ in 0..missed {
                let _ = self.tx.pop();
            }
            self.clocking.borrow(cs).set(len - missed);
            if !self.tx.is_empty() {
                port.set_tx_interrupt(true);
            }
            Some(missed)
        });
        match outcome {
            None => debug!("response dropped, bus reset while dispatching"),
            Some(missed) if missed > 0 => {
                debug!("master clocked {} bytes before the response", missed);
            }
            Some(_) => {}
        }
    }

    /// Snapshot of the fault counters
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        critical_section::with(|cs| TransportStats {
            rx_overflows: self.rx.dropped(),
            tx_overflows: self.tx.dropped(),
            overruns: self.overruns.borrow(cs).get(),
            bus_resets: self.bus_resets.borrow(cs).get(),
        })
    }
}

impl<const RX: usize, const TX: usize> Default for ByteTransport<RX, TX> {
    fn default() -> Self {
        Self::new()
    }
}

fn bump(counter: &Mutex<Cell<u32>>) {
    critical_section::with(|cs| {
        let c = counter.borrow(cs);
        c.set(c.get().saturating_add(1));
    });
}

/// Transmit side of a [`ByteTransport`] as a [`ResponseSink`]
pub struct Responder<'a, const RX: usize, const TX: usize, P: SpiSlavePort> {
    transport: &'a ByteTransport<RX, TX>,
    port: &'a mut P,
    epoch: u32,
}

impl<const RX: usize, const TX: usize, P: SpiSlavePort> ResponseSink for Responder<'_, RX, TX, P> {
    fn free(&self) -> usize {
        self.transport.tx.free()
    }

    fn push(&mut self, byte: u8) -> bool {
        self.transport.tx.push(byte).is_ok()
    }

    fn finish(&mut self, response_len: usize) {
        self.transport.frame(self.port, self.epoch, response_len);
    }

    fn extend(&mut self, data: &[u8]) -> usize {
        self.transport.tx.extend(data)
    }
}
