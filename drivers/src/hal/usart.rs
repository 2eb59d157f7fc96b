//! Interrupt-driven USART Hardware Abstraction Layer.
//!
//! This module defines the contract between the driver instances and the
//! register-level platform code. The platform only has to arm a receive or
//! transmit of N bytes; the bytes themselves cross back through
//! [`ByteEvent`]s delivered by the platform's interrupt handler.

use super::serial::{LineConfig, UsartError};

/// Number of USART blocks the driver can manage.
pub const MAX_BLOCKS: usize = 8;

/// Identifier of a physical USART block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HardwareBlockId {
    Usart1 = 1,
    Usart2 = 2,
    Usart3 = 3,
    Usart4 = 4,
    Usart5 = 5,
    Usart6 = 6,
    Usart7 = 7,
    Usart8 = 8,
}

impl HardwareBlockId {
    pub const ALL: [HardwareBlockId; MAX_BLOCKS] = [
        HardwareBlockId::Usart1,
        HardwareBlockId::Usart2,
        HardwareBlockId::Usart3,
        HardwareBlockId::Usart4,
        HardwareBlockId::Usart5,
        HardwareBlockId::Usart6,
        HardwareBlockId::Usart7,
        HardwareBlockId::Usart8,
    ];

    /// Zero-based table index.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize - 1
    }

    /// Block number as printed on the datasheet (1-based).
    #[inline]
    pub const fn number(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for HardwareBlockId {
    type Error = UsartError;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        match number {
            1..=8 => Ok(Self::ALL[number as usize - 1]),
            _ => Err(UsartError::InvalidArgument),
        }
    }
}

/// Transfer direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Receive,
    Transmit,
}

/// Data-path event raised by the platform's interrupt handler.
///
/// A one-byte slice is the per-byte interrupt case; longer slices model
/// FIFO-threshold or chunk interrupts.
#[derive(Debug)]
pub enum ByteEvent<'a> {
    /// Bytes read from the receive data register or FIFO.
    Received(&'a [u8]),
    /// The transmitter can accept up to `buf.len()` more bytes; the driver
    /// fills the front of `buf` with the next bytes to shift out.
    TransmitReady(&'a mut [u8]),
}

impl ByteEvent<'_> {
    pub fn direction(&self) -> Direction {
        match self {
            ByteEvent::Received(_) => Direction::Receive,
            ByteEvent::TransmitReady(_) => Direction::Transmit,
        }
    }
}

/// Register-level access to the USART blocks of one SoC.
///
/// Implementations program clocks and divisors, unmask the per-block
/// interrupts, and call
/// [`UsartRegistry::on_byte_event`](crate::usart::UsartRegistry::on_byte_event)
/// from the interrupt vector. None of these calls block.
pub trait UsartPlatform {
    /// Error type for platform operations.
    type Error: core::fmt::Debug;

    /// Program the line settings of `block`.
    fn configure(&mut self, block: HardwareBlockId, config: &LineConfig) -> Result<(), Self::Error>;

    /// Arm the receive interrupt for `length` bytes.
    fn start_receive(&mut self, block: HardwareBlockId, length: usize);

    /// Arm the transmit interrupt for `length` bytes.
    fn start_transmit(&mut self, block: HardwareBlockId, length: usize);

    /// Disarm `direction` on `block`, discarding anything in flight.
    fn stop(&mut self, block: HardwareBlockId, direction: Direction);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_numbers_round_trip_through_try_from() {
        for block in HardwareBlockId::ALL {
            assert_eq!(HardwareBlockId::try_from(block.number()), Ok(block));
        }
        assert_eq!(HardwareBlockId::Usart1.index(), 0);
        assert_eq!(HardwareBlockId::Usart8.index(), 7);
    }

    #[test]
    fn out_of_range_block_numbers_are_rejected() {
        assert_eq!(
            HardwareBlockId::try_from(0),
            Err(UsartError::InvalidArgument)
        );
        assert_eq!(
            HardwareBlockId::try_from(9),
            Err(UsartError::InvalidArgument)
        );
    }
}
