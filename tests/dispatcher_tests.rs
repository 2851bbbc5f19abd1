//! Command Dispatcher and Main Loop Tests
//!
//! End-to-end exchanges as the SPI master sees them: command byte in,
//! response bytes clocked out.
//! Run with: cargo test --target x86_64-unknown-linux-gnu --no-default-features --features std --test dispatcher_tests

mod common;

use common::{raw_point, unit_sweep, MockPort, ScriptedEngine};
use vna_spi_firmware::app::Application;
use vna_spi_firmware::config::{FILLER_BYTE, RECORD_BYTES, TX_CHUNK_SIZE};
use vna_spi_firmware::dispatcher::{Dispatcher, Exchange};
use vna_spi_firmware::measurement::{LifecycleState, MeasurementController, SweepEngine};
use vna_spi_firmware::protocol::{decode_record, Command, Status};
use vna_spi_firmware::types::Complex;
use vna_spi_firmware::transfer::TransferCursor;
use vna_spi_firmware::transport::TransportStats;
use vna_spi_firmware::SpiTransport;

const TRIGGER: u8 = 0xA0;
const DATA: u8 = 0xB0;
const STATUS: u8 = 0xC0;

struct Bench {
    transport: SpiTransport,
    port: MockPort,
    app: Application<ScriptedEngine>,
}

impl Bench {
    fn new(engine: ScriptedEngine) -> Self {
        Self {
            transport: SpiTransport::new(),
            port: MockPort::new(),
            app: Application::new(engine),
        }
    }

    /// Send one command, run one main-loop pass, clock out `n` bytes
    fn exchange(&mut self, command: u8, n: usize) -> Vec<u8> {
        self.port.master_sends(&self.transport, command);
        self.app.poll(&self.transport, &mut self.port);
        self.port.master_reads(&self.transport, n)
    }

    fn run_sweep(&mut self) {
        while self.app.engine().is_sweeping() {
            self.app.poll(&self.transport, &mut self.port);
        }
    }

    fn state(&self) -> LifecycleState {
        self.app.controller().state()
    }
}

// =============================================================================
// Single-byte replies
// =============================================================================

#[test]
fn status_request_in_idle() {
    let mut bench = Bench::new(ScriptedEngine::stalled());
    assert_eq!(bench.exchange(STATUS, 1), [Status::Idle.as_byte()]);
}

#[test]
fn unknown_command_replies_ff_without_state_change() {
    let mut bench = Bench::new(ScriptedEngine::stalled());
    assert_eq!(bench.exchange(0x42, 1), [0xFF]);
    assert_eq!(bench.state(), LifecycleState::Idle);
    assert_eq!(bench.app.dispatch_stats().unknown, 1);
}

#[test]
fn trigger_replies_measuring() {
    let mut bench = Bench::new(ScriptedEngine::new(unit_sweep(3)));
    assert_eq!(bench.exchange(TRIGGER, 1), [Status::Measuring.as_byte()]);
    assert_eq!(bench.state(), LifecycleState::Measuring);
}

#[test]
fn back_to_back_triggers_second_is_busy() {
    let mut bench = Bench::new(ScriptedEngine::stalled());
    assert_eq!(bench.exchange(TRIGGER, 1), [0x02]);
    assert_eq!(bench.exchange(TRIGGER, 1), [0x04]);
    assert_eq!(bench.app.engine().configured.len(), 1);
    assert_eq!(bench.app.dispatch_stats().rejected_triggers, 1);
}

#[test]
fn trigger_rejected_in_every_non_idle_state() {
    let mut bench = Bench::new(ScriptedEngine::new(unit_sweep(5)));
    bench.exchange(TRIGGER, 1);
    // Measuring
    assert_eq!(bench.exchange(TRIGGER, 1), [0x04]);
    bench.run_sweep();
    // DataReady
    assert_eq!(bench.state(), LifecycleState::DataReady);
    assert_eq!(bench.exchange(TRIGGER, 1), [0x04]);
    assert_eq!(bench.state(), LifecycleState::DataReady);
    // Busy
    bench.exchange(DATA, TX_CHUNK_SIZE);
    assert!(matches!(bench.state(), LifecycleState::Busy { .. }));
    assert_eq!(bench.exchange(TRIGGER, 1), [0x04]);
    assert!(matches!(bench.state(), LifecycleState::Busy { .. }));
    assert_eq!(bench.app.engine().configured.len(), 1);
}

#[test]
fn data_request_while_measuring_sends_no_data() {
    let mut bench = Bench::new(ScriptedEngine::stalled());
    bench.exchange(TRIGGER, 1);
    assert_eq!(bench.exchange(DATA, 2), [0x02, FILLER_BYTE]);
}

// =============================================================================
// Full sweep scenarios
// =============================================================================

#[test]
fn three_point_sweep_with_weak_reference() {
    let engine = ScriptedEngine::new(vec![
        raw_point(0, 1_000_000, Complex::new(1.0, 0.0), false),
        raw_point(1, 2_000_000, Complex::new(2.0, 0.0), false),
        raw_point(2, 3_000_000, Complex::new(1e-12, 0.0), true),
    ]);
    let mut bench = Bench::new(engine);

    assert_eq!(bench.exchange(TRIGGER, 1), [0x02]);
    bench.run_sweep();
    assert_eq!(bench.state(), LifecycleState::DataReady);
    assert_eq!(bench.app.controller().results().len(), 3);
    assert_eq!(bench.exchange(STATUS, 1), [0x03]);

    let data = bench.exchange(DATA, 60);
    assert_eq!(data.len(), 60);
    assert_eq!(bench.state(), LifecycleState::Idle);

    let records: Vec<_> = data
        .chunks_exact(RECORD_BYTES)
        .map(|r| decode_record(r.try_into().unwrap()))
        .collect();
    assert_eq!(records[0].frequency_hz, 1.0e6);
    assert_eq!(records[0].s11, Complex::new(0.5, 0.25));
    assert_eq!(records[1].frequency_hz, 2.0e6);
    assert_eq!(records[1].s11, Complex::new(0.25, 0.125));
    assert_eq!(records[2].frequency_hz, 3.0e6);
    assert_eq!(records[2].s11, Complex::ZERO);
    assert_eq!(records[2].s21, Complex::ZERO);

    // Nothing left; the master sees filler
    assert_eq!(bench.port.master_reads(&bench.transport, 1), [FILLER_BYTE]);
}

#[test]
fn repeated_requests_drain_exactly_once() {
    let mut bench = Bench::new(ScriptedEngine::new(unit_sweep(10)));
    bench.exchange(TRIGGER, 1);
    bench.run_sweep();

    let mut total = Vec::new();
    for _ in 0..3 {
        let chunk = bench.exchange(DATA, TX_CHUNK_SIZE);
        total.extend(chunk);
        assert!(matches!(bench.state(), LifecycleState::Busy { .. }));
    }
    let last = bench.exchange(DATA, 8);
    total.extend(last);
    assert_eq!(total.len(), 10 * RECORD_BYTES);
    assert_eq!(bench.state(), LifecycleState::Idle);

    // Drained: further requests answer IDLE and do not fault
    assert_eq!(bench.exchange(DATA, 1), [Status::Idle.as_byte()]);
    assert_eq!(bench.exchange(DATA, 1), [Status::Idle.as_byte()]);
    assert_eq!(bench.app.dispatch_stats().data_bytes, 200);
}

#[test]
fn unread_chunk_is_not_resent() {
    let mut bench = Bench::new(ScriptedEngine::new(unit_sweep(4)));
    bench.exchange(TRIGGER, 1);
    bench.run_sweep();
    // Master reads only part of the first chunk, then abandons it
    let partial = bench.exchange(DATA, 10);
    assert_eq!(partial.len(), 10);
    bench.port.master_deselects(&bench.transport);
    let rest = bench.exchange(DATA, 16);
    // Resumes inside the fourth record, after its frequency
    assert_eq!(rest[..4], 0.5f32.to_le_bytes());
    assert_eq!(bench.state(), LifecycleState::Idle);
}

// =============================================================================
// Consecutive transactions, full duplex
// =============================================================================

fn busy_at(point_index: usize, byte_offset: usize) -> LifecycleState {
    LifecycleState::Busy {
        cursor: TransferCursor {
            point_index,
            byte_offset,
        },
    }
}

#[test]
fn consecutive_status_requests_both_answered() {
    let mut bench = Bench::new(ScriptedEngine::stalled());
    assert_eq!(bench.exchange(STATUS, 1), [0x01]);
    assert_eq!(bench.exchange(STATUS, 1), [0x01]);
    assert_eq!(bench.exchange(STATUS, 1), [0x01]);
    assert_eq!(bench.app.dispatch_stats().unknown, 0);
    assert_eq!(bench.app.dispatch_stats().commands, 3);
}

#[test]
fn clocking_bytes_equal_to_a_command_are_ignored() {
    let mut bench = Bench::new(ScriptedEngine::new(unit_sweep(3)));
    // The master shifts trigger codes in while reading
    bench.port.dummy = TRIGGER;
    assert_eq!(bench.exchange(TRIGGER, 1), [0x02]);
    assert_eq!(bench.exchange(STATUS, 1), [0x02]);
    assert_eq!(bench.app.engine().configured.len(), 1);
    assert_eq!(bench.app.dispatch_stats().rejected_triggers, 0);
}

#[test]
fn ten_point_sweep_drained_in_consecutive_chunks() {
    let mut bench = Bench::new(ScriptedEngine::new(unit_sweep(10)));
    assert_eq!(bench.exchange(TRIGGER, 1), [0x02]);
    bench.run_sweep();
    assert_eq!(bench.exchange(STATUS, 1), [0x03]);

    let mut data = bench.exchange(DATA, TX_CHUNK_SIZE);
    assert_eq!(bench.state(), busy_at(3, 4));
    let second = bench.exchange(DATA, TX_CHUNK_SIZE);
    assert_eq!(bench.state(), busy_at(6, 8));
    // Picks up inside the fourth record, not a status or filler
    assert_eq!(second[..4], 0.5f32.to_le_bytes());
    data.extend(second);
    data.extend(bench.exchange(DATA, TX_CHUNK_SIZE));
    data.extend(bench.exchange(DATA, 8));

    assert_eq!(bench.state(), LifecycleState::Idle);
    assert_eq!(bench.transport.stats(), TransportStats::default());
    assert_eq!(bench.transport.pending(), 0);
    assert_eq!(bench.app.dispatch_stats().unknown, 0);

    let records: Vec<_> = data
        .chunks_exact(RECORD_BYTES)
        .map(|r| decode_record(r.try_into().unwrap()))
        .collect();
    assert_eq!(records.len(), 10);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.frequency_hz, (i as f32 + 1.0) * 1.0e6);
        assert_eq!(record.s11, Complex::new(0.5, 0.25));
    }
    assert_eq!(bench.exchange(STATUS, 1), [0x01]);
}

#[test]
fn master_clocking_before_main_loop_keeps_stream_aligned() {
    let mut bench = Bench::new(ScriptedEngine::stalled());
    // The master reads its response before the main loop ran
    bench.port.master_sends(&bench.transport, STATUS);
    assert_eq!(bench.port.master_reads(&bench.transport, 1), [FILLER_BYTE]);
    bench.app.poll(&bench.transport, &mut bench.port);
    assert_eq!(bench.transport.pending(), 0);
    assert_eq!(bench.transport.queued(), 0);

    // The next transaction is answered normally
    assert_eq!(bench.exchange(TRIGGER, 1), [0x02]);
    assert_eq!(bench.exchange(STATUS, 1), [0x02]);
    assert_eq!(bench.app.dispatch_stats().unknown, 0);
}

#[test]
fn early_clocking_of_a_chunk_skips_what_the_master_missed() {
    let mut bench = Bench::new(ScriptedEngine::new(unit_sweep(2)));
    bench.exchange(TRIGGER, 1);
    bench.run_sweep();

    bench.port.master_sends(&bench.transport, DATA);
    assert_eq!(bench.port.master_reads(&bench.transport, 4), [FILLER_BYTE; 4]);
    bench.app.poll(&bench.transport, &mut bench.port);
    let rest = bench.port.master_reads(&bench.transport, 2 * RECORD_BYTES - 4);
    assert_eq!(rest[..4], 0.5f32.to_le_bytes());
    assert_eq!(bench.state(), LifecycleState::Idle);
    assert_eq!(bench.exchange(STATUS, 1), [0x01]);
}

// =============================================================================
// Bus reset
// =============================================================================

#[test]
fn chip_select_release_discards_unread_response() {
    let mut bench = Bench::new(ScriptedEngine::stalled());
    bench.port.master_sends(&bench.transport, STATUS);
    bench.app.poll(&bench.transport, &mut bench.port);
    assert_eq!(bench.transport.queued(), 1);

    bench.port.master_deselects(&bench.transport);
    assert_eq!(bench.transport.queued(), 0);
    assert_eq!(bench.transport.clocking(), 0);
    assert_eq!(bench.transport.stats().bus_resets, 1);
}

#[test]
fn short_deselect_between_polls_is_not_missed() {
    let mut bench = Bench::new(ScriptedEngine::new(unit_sweep(4)));
    bench.exchange(TRIGGER, 1);
    bench.run_sweep();
    bench.exchange(DATA, 8);

    // Release and reselect with no main-loop pass in between
    bench.port.master_deselects(&bench.transport);
    bench.port.master_sends(&bench.transport, STATUS);
    bench.app.poll(&bench.transport, &mut bench.port);
    assert_eq!(bench.port.master_reads(&bench.transport, 1), [0x04]);
    assert_eq!(bench.transport.stats().bus_resets, 1);
    assert_eq!(bench.app.dispatch_stats().unknown, 0);
}

#[test]
fn deselect_while_response_is_built_drops_it() {
    let mut bench = Bench::new(ScriptedEngine::stalled());
    bench.port.master_sends(&bench.transport, STATUS);
    let received = bench.transport.recv().unwrap();
    bench.port.master_deselects(&bench.transport);

    let mut dispatcher = Dispatcher::new();
    let mut controller: MeasurementController = MeasurementController::new();
    let mut engine = ScriptedEngine::stalled();
    let mut out = bench.transport.responder(&mut bench.port, received);
    dispatcher.dispatch(received.byte, &mut controller, &mut engine, &mut out);
    drop(out);

    assert_eq!(bench.transport.queued(), 0);
    assert_eq!(bench.exchange(STATUS, 1), [0x01]);
}

// =============================================================================
// Dispatcher alone
// =============================================================================

#[test]
fn dispatcher_returns_decoded_command() {
    let mut dispatcher = Dispatcher::new();
    let mut controller: MeasurementController = MeasurementController::new();
    let mut engine = ScriptedEngine::stalled();
    let mut out = Vec::<u8>::new();
    let exchange = dispatcher.dispatch(STATUS, &mut controller, &mut engine, &mut out);
    assert_eq!(
        exchange,
        Exchange {
            command: Command::RequestStatus,
            response_len: 1,
        }
    );
    assert_eq!(out, [0x01]);
    assert_eq!(dispatcher.stats().commands, 1);
}

#[test]
fn data_exchange_reports_chunk_length() {
    let mut dispatcher = Dispatcher::new();
    let mut controller: MeasurementController = MeasurementController::new();
    let mut engine = ScriptedEngine::new(unit_sweep(2));
    let mut out = Vec::<u8>::new();
    dispatcher.dispatch(TRIGGER, &mut controller, &mut engine, &mut out);
    engine.run_to_end(&mut controller);
    out.clear();

    let exchange = dispatcher.dispatch(DATA, &mut controller, &mut engine, &mut out);
    assert_eq!(exchange.command, Command::RequestData);
    assert_eq!(exchange.response_len, 2 * RECORD_BYTES);
    assert_eq!(out.len(), 2 * RECORD_BYTES);
}

#[test]
fn one_command_per_pass() {
    let mut bench = Bench::new(ScriptedEngine::stalled());
    bench.port.master_sends(&bench.transport, STATUS);
    bench.port.master_sends(&bench.transport, STATUS);
    bench.app.poll(&bench.transport, &mut bench.port);
    assert_eq!(bench.transport.pending(), 1);
    assert_eq!(bench.transport.queued(), 1);
}
