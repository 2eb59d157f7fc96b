//! USART Driver Subsystem
//!
//! Interrupt-driven USART driver instances with length-bounded transfers,
//! plus a block relay that forwards one instance's received data out of
//! another instance's transmitter.
//!
//! # Module Organization
//!
//! - [`hal`]: Line settings, block identifiers and the platform trait
//! - [`usart`]: Driver instances, their registry and completion dispatch
//! - [`relay`]: The relay controller and its block queue
//!
//! # Usage Example
//!
//! ```ignore
//! use drivers::{HardwareBlockId, Relay, RelayConfig, UsartConfig, UsartRegistry};
//!
//! let mut usarts = UsartRegistry::new(soc);
//! let rx = usarts.claim(HardwareBlockId::Usart1)?;
//! let tx = usarts.claim(HardwareBlockId::Usart2)?;
//! usarts.usart(&rx).init(&UsartConfig::default().baud_rate(9600).rx_only())?;
//! usarts.usart(&tx).init(&UsartConfig::default().tx_only())?;
//! let relay = Relay::start(&mut usarts, rx, tx, RelayConfig::default())?;
//! ```

#![no_std]

extern crate alloc;

pub mod hal;
pub mod relay;
pub mod usart;

// Re-export commonly used types
pub use hal::serial::{Parity, UsartConfig, UsartError, UsartMode};
pub use hal::usart::{ByteEvent, Direction, HardwareBlockId, UsartPlatform};
pub use relay::{Relay, RelayConfig, RelayStats};
pub use usart::{Completion, CompletionSink, UsartHandle, UsartRegistry};
