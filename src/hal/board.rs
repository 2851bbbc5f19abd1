//! STM32F303CC Board Bring-up
//!
//! 8 MHz HSE, PLL x9 to 72 MHz. SPI1 slave on PA4..PA7 (AF5), operator
//! button on PA0 with pull-up. The NSS pin also feeds EXTI line 4 on its
//! rising edge, so a chip-select release is caught however short.

use embassy_stm32::flash::Flash;
use embassy_stm32::gpio::{Input, Pull};
use embassy_stm32::interrupt::{self, InterruptExt, Priority};
use embassy_stm32::pac;
use embassy_stm32::pac::gpio::vals::{Moder, Ospeedr};
use embassy_stm32::time::Hertz;
use embassy_stm32::Config;

use super::flash::Stm32Flash;
use super::spi_slave::Spi1Slave;
use crate::config::pins::{SPI_AF, SPI_NSS_INDEX};
use crate::config::HSE_FREQUENCY_HZ;
use crate::platform::{Peripherals, Platform};

/// GPIOA pins carrying SPI1 (NSS, SCK, MISO, MOSI)
const SPI1_PINS: [usize; 4] = [4, 5, 6, 7];

/// Clock tree for 72 MHz from the 8 MHz crystal
#[must_use]
pub fn clock_config() -> Config {
    use embassy_stm32::rcc::{
        AHBPrescaler, APBPrescaler, Hse, HseMode, Pll, PllMul, PllPreDiv, PllSource, Sysclk,
    };

    let mut config = Config::default();
    config.rcc.hse = Some(Hse {
        freq: Hertz(HSE_FREQUENCY_HZ),
        mode: HseMode::Oscillator,
    });
    config.rcc.pll = Some(Pll {
        src: PllSource::HSE,
        prediv: PllPreDiv::DIV1,
        mul: PllMul::MUL9,
    });
    config.rcc.sys = Sysclk::PLL1_P;
    config.rcc.ahb_pre = AHBPrescaler::DIV1;
    config.rcc.apb1_pre = APBPrescaler::DIV2;
    config.rcc.apb2_pre = APBPrescaler::DIV1;
    config
}

/// STM32F303CC VNA module
pub struct Stm32Board {
    peripherals: Option<embassy_stm32::Peripherals>,
}

impl Stm32Board {
    /// Board before bring-up
    #[must_use]
    pub const fn new() -> Self {
        Self { peripherals: None }
    }
}

impl Default for Stm32Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for Stm32Board {
    type Spi = Spi1Slave;
    type Flash = Stm32Flash<'static>;
    type Button = Input<'static>;

    fn init_clocks(&mut self) {
        if self.peripherals.is_none() {
            self.peripherals = Some(embassy_stm32::init(clock_config()));
            info!("clocks: {} Hz", crate::config::SYSTEM_CLOCK_HZ);
        }
    }

    fn init_pins(&mut self) {
        // GPIO clocks are already on after embassy init
        let gpioa = pac::GPIOA;
        for pin in SPI1_PINS {
            gpioa.afr(pin / 8).modify(|w| w.set_afr(pin % 8, SPI_AF));
            gpioa.ospeedr().modify(|w| w.set_ospeedr(pin, Ospeedr::VERY_HIGH_SPEED));
            gpioa.moder().modify(|w| w.set_moder(pin, Moder::ALTERNATE));
        }
        debug!("SPI1 pins on AF{}", SPI_AF);
    }

    fn enable_peripherals(&mut self) {
        pac::RCC.apb2enr().modify(|w| w.set_spi1en(true));
        pac::RCC.apb2rstr().modify(|w| w.set_spi1rst(true));
        pac::RCC.apb2rstr().modify(|w| w.set_spi1rst(false));

        interrupt::SPI1.set_priority(Priority::from(crate::config::irq::SPI1_PRIORITY << 4));
        debug!("SPI1 clock enabled");

        // EXTI4 <- PA4, rising edge only
        pac::RCC.apb2enr().modify(|w| w.set_syscfgen(true));
        pac::SYSCFG
            .exticr(SPI_NSS_INDEX / 4)
            .modify(|w| w.set_exti(SPI_NSS_INDEX % 4, 0));
        pac::EXTI.ftsr(0).modify(|w| w.set_line(SPI_NSS_INDEX, false));
        pac::EXTI.rtsr(0).modify(|w| w.set_line(SPI_NSS_INDEX, true));
        pac::EXTI.pr(0).write(|w| w.set_line(SPI_NSS_INDEX, true));
        pac::EXTI.imr(0).modify(|w| w.set_line(SPI_NSS_INDEX, true));
        interrupt::EXTI4.set_priority(Priority::from(crate::config::irq::NSS_PRIORITY << 4));
        debug!("NSS release on EXTI{}", SPI_NSS_INDEX);
    }

    fn split(mut self) -> Peripherals<Self::Spi, Self::Flash, Self::Button> {
        self.init_clocks();
        let p = self
            .peripherals
            .take()
            .unwrap_or_else(|| embassy_stm32::init(clock_config()));

        let spi = Spi1Slave::configure();
        interrupt::SPI1.unpend();
        // SAFETY: the handler only touches the static transport and SPI1
        unsafe { interrupt::SPI1.enable() };
        interrupt::EXTI4.unpend();
        // SAFETY: as above, plus the EXTI pending bit
        unsafe { interrupt::EXTI4.enable() };

        Peripherals {
            spi,
            flash: Stm32Flash::new(Flash::new_blocking(p.FLASH)),
            button: Input::new(p.PA0, Pull::Up),
        }
    }
}
