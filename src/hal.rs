//! Hardware Abstraction Layer
//!
//! STM32F303CC bindings for the capability traits used by the core:
//! [`SpiSlavePort`](crate::transport::SpiSlavePort),
//! [`FlashDevice`](crate::flash::FlashDevice) and
//! [`Platform`](crate::platform::Platform). All unsafe code of the crate
//! lives here.

pub mod board;
pub mod flash;
pub mod spi_slave;

pub use board::Stm32Board;
pub use flash::Stm32Flash;
pub use spi_slave::Spi1Slave;
