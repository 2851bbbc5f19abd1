//! Platform Bring-up
//!
//! The protocol core never touches clocks or pins directly. A board
//! implements [`Platform`] and hands out the three peripherals the core
//! uses; which implementation is linked does not matter to the rest of
//! the crate.

use embedded_hal::digital::InputPin;

use crate::flash::FlashDevice;
use crate::transport::SpiSlavePort;

/// Peripherals handed to the application after bring-up
pub struct Peripherals<S, F, B> {
    /// SPI peripheral in slave mode
    pub spi: S,
    /// On-chip flash
    pub flash: F,
    /// Operator button
    pub button: B,
}

/// Board-specific bring-up
pub trait Platform {
    /// SPI slave binding
    type Spi: SpiSlavePort;
    /// Flash binding
    type Flash: FlashDevice;
    /// Operator button input
    type Button: InputPin;

    /// Configure the system clock tree
    fn init_clocks(&mut self);

    /// Route pins to their alternate functions
    fn init_pins(&mut self);

    /// Enable and configure peripherals and their interrupts
    fn enable_peripherals(&mut self);

    /// Hand out the peripherals
    fn split(self) -> Peripherals<Self::Spi, Self::Flash, Self::Button>;
}

/// Run the bring-up sequence in order and split the platform
pub fn bring_up<P: Platform>(
    mut platform: P,
) -> Peripherals<P::Spi, P::Flash, P::Button> {
    platform.init_clocks();
    platform.init_pins();
    platform.enable_peripherals();
    info!("platform ready");
    platform.split()
}

/// Debounced press detector for an active-low button
///
/// Reports one press per high-to-low transition that stays low for
/// `debounce` consecutive samples.
pub struct OperatorButton<B: InputPin> {
    pin: B,
    debounce: u8,
    low_samples: u8,
    latched: bool,
}

impl<B: InputPin> OperatorButton<B> {
    /// Wrap a pin with the given debounce count (in samples)
    pub fn new(pin: B, debounce: u8) -> Self {
        Self {
            pin,
            debounce: debounce.max(1),
            low_samples: 0,
            latched: false,
        }
    }

    /// Sample the pin; `true` once per press
    pub fn pressed(&mut self) -> bool {
        // A read error is treated as released
        let low = self.pin.is_low().unwrap_or(false);
        if !low {
            self.low_samples = 0;
            self.latched = false;
            return false;
        }
        self.low_samples = self.low_samples.saturating_add(1);
        if !self.latched && self.low_samples >= self.debounce {
            self.latched = true;
            return true;
        }
        false
    }

    /// Give back the pin
    pub fn release(self) -> B {
        self.pin
    }
}
