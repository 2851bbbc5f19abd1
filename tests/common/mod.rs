//! Shared test doubles: a scripted SPI port and a scripted sweep engine.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;

use vna_spi_firmware::measurement::gain_cal::Clock;
use vna_spi_firmware::measurement::{PointSink, RawPoint, SweepEngine};
use vna_spi_firmware::transport::{ByteTransport, SpiEvents, SpiSlavePort};
use vna_spi_firmware::types::{Complex, RawObservation, SweepParams};

/// SPI port driven by the test acting as bus master
#[derive(Debug, Default)]
pub struct MockPort {
    /// Bytes the master has shifted in but the slave has not read
    pub incoming: VecDeque<u8>,
    /// Bytes the slave loaded for transmission
    pub loaded: Vec<u8>,
    /// Transmit interrupt enable
    pub tx_irq: bool,
    /// Pending overrun flag
    pub overrun: bool,
    /// Overrun clear sequences performed
    pub overrun_clears: u32,
    /// Byte the master shifts in while clocking a response
    pub dummy: u8,
    clocking: bool,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Master shifts one byte in; the interrupt runs once
    pub fn master_sends<const RX: usize, const TX: usize>(
        &mut self,
        transport: &ByteTransport<RX, TX>,
        byte: u8,
    ) -> bool {
        self.incoming.push_back(byte);
        transport.on_interrupt(self)
    }

    /// Master clocks `n` bytes out of the slave
    ///
    /// Full duplex: the master shifts `dummy` in for every byte it clocks.
    pub fn master_reads<const RX: usize, const TX: usize>(
        &mut self,
        transport: &ByteTransport<RX, TX>,
        n: usize,
    ) -> Vec<u8> {
        let start = self.loaded.len();
        for _ in 0..n {
            self.incoming.push_back(self.dummy);
            self.clocking = true;
            transport.on_interrupt(self);
            self.clocking = false;
        }
        self.loaded[start..].to_vec()
    }

    /// Master releases chip-select; the edge interrupt runs once
    pub fn master_deselects<const RX: usize, const TX: usize>(
        &mut self,
        transport: &ByteTransport<RX, TX>,
    ) {
        transport.reset(self);
    }
}

impl SpiSlavePort for MockPort {
    fn events(&self) -> SpiEvents {
        SpiEvents {
            rx_ready: !self.incoming.is_empty(),
            tx_ready: self.clocking,
            overrun: self.overrun,
        }
    }

    fn read_byte(&mut self) -> u8 {
        self.incoming.pop_front().unwrap_or(0)
    }

    fn write_byte(&mut self, byte: u8) {
        self.loaded.push(byte);
    }

    fn clear_overrun(&mut self) {
        self.overrun = false;
        self.overrun_clears += 1;
    }

    fn set_tx_interrupt(&mut self, enabled: bool) {
        self.tx_irq = enabled;
    }
}

/// Engine replaying a fixed list of points, one per poll
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    pub script: Vec<RawPoint>,
    pub configured: Vec<SweepParams>,
    pending: VecDeque<RawPoint>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<RawPoint>) -> Self {
        Self {
            script,
            configured: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Engine that accepts a sweep but never produces a point
    pub fn stalled() -> Self {
        Self::new(Vec::new())
    }

    /// Run until the script is exhausted
    pub fn run_to_end(&mut self, sink: &mut dyn PointSink) {
        while self.is_sweeping() {
            self.poll(sink);
        }
    }
}

impl SweepEngine for ScriptedEngine {
    fn configure_sweep(&mut self, params: &SweepParams) {
        self.configured.push(*params);
        self.pending = self.script.iter().copied().collect();
    }

    fn poll(&mut self, sink: &mut dyn PointSink) {
        if let Some(point) = self.pending.pop_front() {
            sink.on_point(&point);
        }
    }

    fn is_sweeping(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Raw point with the given reference and fixed reflected/through readings
pub fn raw_point(index: u16, frequency_hz: u32, reference: Complex, last: bool) -> RawPoint {
    RawPoint {
        index,
        frequency_hz,
        observation: RawObservation::new(
            Complex::new(0.5, 0.25),
            reference,
            Complex::new(0.75, -0.125),
        ),
        last,
    }
}

/// `n` points with a unit reference, frequencies 1, 2, 3 ... MHz
pub fn unit_sweep(n: u16) -> Vec<RawPoint> {
    (0..n)
        .map(|i| raw_point(i, (u32::from(i) + 1) * 1_000_000, Complex::new(1.0, 0.0), i + 1 == n))
        .collect()
}

/// Clock that advances a fixed step on every read
#[derive(Debug)]
pub struct SteppingClock {
    now: Cell<u64>,
    step: u64,
}

impl SteppingClock {
    pub fn new(step: u64) -> Self {
        Self {
            now: Cell::new(0),
            step,
        }
    }

    pub fn elapsed(&self) -> u64 {
        self.now.get()
    }
}

impl Clock for SteppingClock {
    fn now_ms(&self) -> u64 {
        let t = self.now.get();
        self.now.set(t + self.step);
        t
    }
}
