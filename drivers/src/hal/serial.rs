//! Serial line configuration and driver errors.
//!
//! A [`UsartConfig`] is what callers fill in; init validates it into a
//! [`LineConfig`], which is what driver instances keep and what the
//! platform is programmed with.

use core::fmt;

/// Line configuration as supplied by the caller.
///
/// Valued fields start unset with [`UsartConfig::new`]. Any field still unset at
/// init makes it fail with [`UsartError::InvalidConfig`]; nothing is
/// defaulted behind the caller's back. [`UsartConfig::default`] is the
/// explicit safe baseline to start from instead.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UsartConfig {
    /// Baud rate in bits per second.
    pub baud_rate: Option<u32>,
    /// Parity checking mode.
    pub parity: Option<Parity>,
    /// Stop-bit duration in device-defined units.
    pub stop_bits: Option<u32>,
    /// Asynchronous or synchronous operation.
    pub mode: Option<UsartMode>,
    pub rx_enabled: bool,
    pub tx_enabled: bool,
}

impl UsartConfig {
    /// A configuration with every valued field unset and both directions
    /// disabled.
    pub const fn new() -> Self {
        Self {
            baud_rate: None,
            parity: None,
            stop_bits: None,
            mode: None,
            rx_enabled: false,
            tx_enabled: false,
        }
    }

    pub const fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    pub const fn parity(mut self, parity: Parity) -> Self {
        self.parity = Some(parity);
        self
    }

    pub const fn stop_bits(mut self, stop_bits: u32) -> Self {
        self.stop_bits = Some(stop_bits);
        self
    }

    pub const fn mode(mut self, mode: UsartMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub const fn receiver(mut self, enabled: bool) -> Self {
        self.rx_enabled = enabled;
        self
    }

    pub const fn transmitter(mut self, enabled: bool) -> Self {
        self.tx_enabled = enabled;
        self
    }

    /// Receive line active, transmit line off.
    pub const fn rx_only(self) -> Self {
        self.receiver(true).transmitter(false)
    }

    /// Transmit line active, receive line off.
    pub const fn tx_only(self) -> Self {
        self.receiver(false).transmitter(true)
    }

    /// Resolve into a [`LineConfig`].
    ///
    /// Fails with [`UsartError::InvalidConfig`] if a field is unset, if the
    /// baud rate or stop duration is zero, or if neither direction is
    /// enabled.
    pub fn validate(&self) -> Result<LineConfig, UsartError> {
        let (Some(baud_rate), Some(parity), Some(stop_bits), Some(mode)) =
            (self.baud_rate, self.parity, self.stop_bits, self.mode)
        else {
            return Err(UsartError::InvalidConfig);
        };

        if baud_rate == 0 || stop_bits == 0 {
            return Err(UsartError::InvalidConfig);
        }

        if !self.rx_enabled && !self.tx_enabled {
            return Err(UsartError::InvalidConfig);
        }

        Ok(LineConfig {
            baud_rate,
            parity,
            stop_bits,
            mode,
            rx_enabled: self.rx_enabled,
            tx_enabled: self.tx_enabled,
        })
    }
}

impl Default for UsartConfig {
    /// Baseline: 115200 baud, no parity, one stop unit, UART mode, both
    /// directions enabled.
    fn default() -> Self {
        Self::new()
            .baud_rate(115_200)
            .parity(Parity::None)
            .stop_bits(1)
            .mode(UsartMode::Uart)
            .receiver(true)
            .transmitter(true)
    }
}

/// A fully resolved line configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineConfig {
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: u32,
    pub mode: UsartMode,
    pub rx_enabled: bool,
    pub tx_enabled: bool,
}

/// Parity mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Operating mode of the hardware block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UsartMode {
    /// Asynchronous only.
    Uart,
    /// Synchronous clock output available.
    Usart,
}

/// USART driver errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UsartError {
    /// The operation requires an initialized instance with the matching
    /// direction enabled.
    NotInitialized,
    /// `init` called twice without an intervening `deinit`.
    AlreadyInitialized,
    /// The hardware block is owned by another live handle.
    AlreadyClaimed,
    /// A configuration field is missing or contradictory.
    InvalidConfig,
    /// Zero length, undersized buffer, unknown block, or a foreign slot.
    InvalidArgument,
    /// A transfer is already active in the requested direction.
    Busy,
    /// The relay queue had no free slot for newly received data.
    Overrun,
    /// The platform layer refused the operation.
    Hardware,
}

impl fmt::Display for UsartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            UsartError::NotInitialized => "instance not initialized for this direction",
            UsartError::AlreadyInitialized => "instance already initialized",
            UsartError::AlreadyClaimed => "hardware block already claimed",
            UsartError::InvalidConfig => "configuration incomplete or contradictory",
            UsartError::InvalidArgument => "invalid argument",
            UsartError::Busy => "transfer already active",
            UsartError::Overrun => "relay queue overrun",
            UsartError::Hardware => "platform rejected the operation",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for UsartError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn rx_9600() -> UsartConfig {
        UsartConfig::default().baud_rate(9600).rx_only()
    }

    #[test]
    fn default_is_a_valid_baseline() {
        let line = UsartConfig::default().validate().unwrap();
        assert_eq!(line.baud_rate, 115_200);
        assert_eq!(line.parity, Parity::None);
        assert_eq!(line.stop_bits, 1);
        assert_eq!(line.mode, UsartMode::Uart);
        assert!(line.rx_enabled && line.tx_enabled);
    }

    #[test]
    fn unset_fields_are_rejected() {
        assert_eq!(UsartConfig::new().validate(), Err(UsartError::InvalidConfig));

        let missing_parity = UsartConfig::new()
            .baud_rate(9600)
            .stop_bits(1)
            .mode(UsartMode::Uart)
            .receiver(true);
        assert_eq!(missing_parity.validate(), Err(UsartError::InvalidConfig));

        let mut missing_mode = rx_9600();
        missing_mode.mode = None;
        assert_eq!(missing_mode.validate(), Err(UsartError::InvalidConfig));
    }

    #[test]
    fn contradictory_fields_are_rejected() {
        assert_eq!(
            rx_9600().baud_rate(0).validate(),
            Err(UsartError::InvalidConfig)
        );
        assert_eq!(
            rx_9600().stop_bits(0).validate(),
            Err(UsartError::InvalidConfig)
        );
        assert_eq!(
            rx_9600().receiver(false).validate(),
            Err(UsartError::InvalidConfig)
        );
    }

    #[test]
    fn builder_overrides_baseline() {
        let line = UsartConfig::default()
            .baud_rate(9600)
            .parity(Parity::Even)
            .stop_bits(2)
            .mode(UsartMode::Usart)
            .tx_only()
            .validate()
            .unwrap();
        assert_eq!(line.baud_rate, 9600);
        assert_eq!(line.parity, Parity::Even);
        assert_eq!(line.stop_bits, 2);
        assert_eq!(line.mode, UsartMode::Usart);
        assert!(!line.rx_enabled);
        assert!(line.tx_enabled);
    }
}
