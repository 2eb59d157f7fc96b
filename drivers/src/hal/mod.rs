//! Hardware Abstraction Layer (HAL) - Platform-Independent Traits
//!
//! The driver core never touches registers. Everything it needs from the
//! SoC goes through [`usart::UsartPlatform`], and everything the SoC
//! reports back arrives as a [`usart::ByteEvent`].
//!
//! # Available Interfaces
//!
//! - [`serial`]: Line settings and the driver error type
//! - [`usart`]: Hardware block identifiers and the platform trait

pub mod serial;
pub mod usart;
