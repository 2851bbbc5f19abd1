//! VNA SPI Slave Main Application
//!
//! Entry point for the STM32F303-based VNA module. Brings up the board,
//! binds the SPI1 and chip-select interrupts to the byte transport and runs
//! the main loop.

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_futures::select::select;
use embassy_stm32::interrupt;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use {defmt_rtt as _, panic_probe as _};

use vna_spi_firmware::calibration::{verify_slot, SlotState};
use vna_spi_firmware::hal::{Spi1Slave, Stm32Board};
use vna_spi_firmware::measurement::gain_cal::SystemClock;
use vna_spi_firmware::measurement::synthetic::SyntheticSweep;
use vna_spi_firmware::prelude::*;
use vna_spi_firmware::SpiTransport;

/// Bytes exchanged between the SPI1 interrupt and the main loop
static TRANSPORT: SpiTransport = SpiTransport::new();

/// Raised by the interrupt whenever a command byte arrives
static RX_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Button samples a press must stay low for
const BUTTON_DEBOUNCE: u8 = 20;

#[interrupt]
fn SPI1() {
    let mut port = Spi1Slave::isr_handle();
    if TRANSPORT.on_interrupt(&mut port) {
        RX_SIGNAL.signal(());
    }
}

#[interrupt]
fn EXTI4() {
    Spi1Slave::acknowledge_deselect();
    TRANSPORT.reset(&mut Spi1Slave::isr_handle());
}

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("VNA SPI slave firmware v{}", env!("CARGO_PKG_VERSION"));

    let parts = bring_up(Stm32Board::new());
    let mut port = parts.spi;
    let mut store = FlashStore::new(parts.flash);
    let mut button = OperatorButton::new(parts.button, BUTTON_DEBOUNCE);

    match verify_slot(&mut store, GAIN_CAL_SLOT) {
        Ok(SlotState::Valid(header)) => info!("gain calibration present: {}", header),
        Ok(SlotState::Corrupt(_)) => warn!("gain calibration slot corrupt"),
        Ok(SlotState::Empty) => info!("no gain calibration stored"),
        Err(e) => warn!("calibration check failed: {}", e),
    }

    let mut app: Application<SyntheticSweep> = Application::new(SyntheticSweep::new());
    let mut last_report = Instant::now();

    info!("SPI slave ready, entering main loop");

    loop {
        if app.poll(&TRANSPORT, &mut port) {
            continue;
        }

        if button.pressed() {
            match app.run_gain_calibration(&SystemClock) {
                Ok(reference) => {
                    info!(
                        "gain reference S11={} S21={} ({} readings)",
                        reference.s11, reference.s21, reference.samples
                    );
                    if let Err(e) = app.save_gain_calibration(&mut store) {
                        warn!("saving gain calibration failed: {}", e);
                    }
                }
                Err(e) => warn!("gain calibration failed: {}", e),
            }
        }

        if last_report.elapsed() >= Duration::from_secs(10) {
            last_report = Instant::now();
            info!("transport {} | dispatch {}", TRANSPORT.stats(), app.dispatch_stats());
        }

        select(
            RX_SIGNAL.wait(),
            Timer::after(Duration::from_micros(MAIN_LOOP_IDLE_US)),
        )
        .await;
    }
}
