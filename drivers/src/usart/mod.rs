//! Interrupt-driven USART driver instances.
//!
//! # Ownership
//!
//! Every hardware block has exactly one [`DriverInstance`](instance) slot in
//! the [`UsartRegistry`]. Callers [`claim`](UsartRegistry::claim) a block to
//! get a non-clonable [`UsartHandle`], and borrow a [`Usart`] view through it
//! for each operation.
//!
//! Transfer buffers are moved into the driver when a transfer starts and
//! handed back in the [`Completion`] passed to the direction's
//! [`CompletionSink`], or in the [`Aborted`] set returned by `deinit`. A
//! buffer can therefore never be touched by the caller, or by a second
//! transfer, while the hardware owns it.
//!
//! # Interrupt context
//!
//! The platform's interrupt handler calls
//! [`UsartRegistry::on_byte_event`]. That is the only path on which
//! transfers complete and sinks fire. An embedding application that shares
//! the registry between thread code and its ISR keeps it behind a
//! [`common::sync::IrqSpinLock`]:
//!
//! ```ignore
//! static USARTS: IrqSpinLock<Option<UsartRegistry<Soc>>, LocalIrq> = IrqSpinLock::new(None);
//!
//! fn usart1_irq() {
//!     let mut fifo = [0u8; 16];
//!     let n = Soc::drain_rx_fifo(HardwareBlockId::Usart1, &mut fifo);
//!     if let Some(usarts) = USARTS.lock().as_mut() {
//!         usarts.on_byte_event(HardwareBlockId::Usart1, ByteEvent::Received(&fifo[..n]));
//!     }
//! }
//! ```

use alloc::boxed::Box;

use crate::hal::usart::{Direction, HardwareBlockId, UsartPlatform};
use crate::hal::serial::UsartError;

mod dispatch;
mod instance;
mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use instance::{TransferState, Usart};
pub use registry::{UsartHandle, UsartRegistry};

/// Owned transfer buffer.
pub type Buffer = Box<[u8]>;

/// A finished transfer, handed to the direction's sink.
#[derive(Debug)]
pub struct Completion {
    pub block: HardwareBlockId,
    pub direction: Direction,
    /// The buffer the transfer was started with. For a receive,
    /// `buffer[..length]` holds the received bytes.
    pub buffer: Buffer,
    pub length: usize,
}

/// Receiver of completion notifications.
///
/// Invoked synchronously from interrupt context on the Active→Idle edge,
/// with the registry so it can start the next transfer. Sinks must not
/// block.
pub trait CompletionSink<P: UsartPlatform>: Send + Sync {
    fn on_complete(&self, usarts: &mut UsartRegistry<P>, completion: Completion);
}

impl<P, F> CompletionSink<P> for F
where
    P: UsartPlatform,
    F: Fn(&mut UsartRegistry<P>, Completion) + Send + Sync,
{
    fn on_complete(&self, usarts: &mut UsartRegistry<P>, completion: Completion) {
        self(usarts, completion)
    }
}

/// A transfer start that was refused. The buffer is handed back.
#[derive(Debug)]
pub struct Rejected {
    pub error: UsartError,
    pub buffer: Buffer,
}

impl From<Rejected> for UsartError {
    fn from(rejected: Rejected) -> Self {
        rejected.error
    }
}

/// Buffers recovered from transfers aborted by `deinit`.
#[derive(Debug, Default)]
pub struct Aborted {
    pub receive: Option<Buffer>,
    pub transmit: Option<Buffer>,
}

impl Aborted {
    pub fn is_empty(&self) -> bool {
        self.receive.is_none() && self.transmit.is_none()
    }
}
