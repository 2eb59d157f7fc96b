//! Per-block driver state machine.

use alloc::sync::Arc;

use log::{debug, trace, warn};

use super::{Aborted, Buffer, Completion, CompletionSink, Rejected};
use crate::hal::serial::{LineConfig, UsartConfig, UsartError};
use crate::hal::usart::{Direction, HardwareBlockId, UsartPlatform};

/// Observable state of one transfer direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Active { length: usize, count: usize },
}

/// An in-flight transfer. `count <= length <= buffer.len()` always holds.
#[derive(Debug)]
struct Transfer {
    buffer: Buffer,
    length: usize,
    count: usize,
}

impl Transfer {
    fn remaining(&self) -> usize {
        self.length - self.count
    }

    fn is_complete(&self) -> bool {
        self.count == self.length
    }

    /// Copy received bytes in, capped at what the transfer still expects.
    fn accept(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.remaining());
        self.buffer[self.count..self.count + n].copy_from_slice(&data[..n]);
        self.count += n;
        n
    }

    /// Copy the next bytes to send out, capped likewise.
    fn supply(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.remaining());
        out[..n].copy_from_slice(&self.buffer[self.count..self.count + n]);
        self.count += n;
        n
    }

    fn state(&self) -> TransferState {
        TransferState::Active {
            length: self.length,
            count: self.count,
        }
    }
}

#[derive(Debug, Copy, Clone)]
enum Lifecycle {
    Uninitialized,
    Initialized(LineConfig),
}

/// Driver state for one hardware block, owned by the registry.
pub(crate) struct DriverInstance<P: UsartPlatform> {
    block: HardwareBlockId,
    pub(crate) claimed: bool,
    lifecycle: Lifecycle,
    rx: Option<Transfer>,
    tx: Option<Transfer>,
    rx_sink: Option<Arc<dyn CompletionSink<P>>>,
    tx_sink: Option<Arc<dyn CompletionSink<P>>>,
}

impl<P: UsartPlatform> DriverInstance<P> {
    pub(crate) fn new(block: HardwareBlockId) -> Self {
        Self {
            block,
            claimed: false,
            lifecycle: Lifecycle::Uninitialized,
            rx: None,
            tx: None,
            rx_sink: None,
            tx_sink: None,
        }
    }

    fn line(&self) -> Option<&LineConfig> {
        match &self.lifecycle {
            Lifecycle::Initialized(line) => Some(line),
            Lifecycle::Uninitialized => None,
        }
    }

    fn enabled(&self, direction: Direction) -> bool {
        match (self.line(), direction) {
            (Some(line), Direction::Receive) => line.rx_enabled,
            (Some(line), Direction::Transmit) => line.tx_enabled,
            (None, _) => false,
        }
    }

    fn transfer_mut(&mut self, direction: Direction) -> &mut Option<Transfer> {
        match direction {
            Direction::Receive => &mut self.rx,
            Direction::Transmit => &mut self.tx,
        }
    }

    pub(crate) fn sink(&self, direction: Direction) -> Option<Arc<dyn CompletionSink<P>>> {
        match direction {
            Direction::Receive => self.rx_sink.clone(),
            Direction::Transmit => self.tx_sink.clone(),
        }
    }

    pub(crate) fn set_sink(&mut self, direction: Direction, sink: Option<Arc<dyn CompletionSink<P>>>) {
        match direction {
            Direction::Receive => self.rx_sink = sink,
            Direction::Transmit => self.tx_sink = sink,
        }
    }

    pub(crate) fn is_active(&self, direction: Direction) -> bool {
        match direction {
            Direction::Receive => self.rx.is_some(),
            Direction::Transmit => self.tx.is_some(),
        }
    }

    /// Move received bytes into the active receive. Returns the number
    /// consumed and, if the transfer just finished, its completion.
    pub(crate) fn receive_bytes(&mut self, data: &[u8]) -> (usize, Option<Completion>) {
        let Some(rx) = self.rx.as_mut() else {
            return (0, None);
        };
        let n = rx.accept(data);
        (n, self.retire_if_complete(Direction::Receive))
    }

    /// Fill `out` from the active transmit; see [`Self::receive_bytes`].
    pub(crate) fn transmit_bytes(&mut self, out: &mut [u8]) -> (usize, Option<Completion>) {
        let Some(tx) = self.tx.as_mut() else {
            return (0, None);
        };
        let n = tx.supply(out);
        (n, self.retire_if_complete(Direction::Transmit))
    }

    fn retire_if_complete(&mut self, direction: Direction) -> Option<Completion> {
        let slot = self.transfer_mut(direction);
        if !slot.as_ref().is_some_and(Transfer::is_complete) {
            return None;
        }
        let transfer = slot.take()?;
        trace!("{:?}: {:?} of {} bytes complete", self.block, direction, transfer.length);
        Some(Completion {
            block: self.block,
            direction,
            buffer: transfer.buffer,
            length: transfer.length,
        })
    }

    /// Abort everything and forget the configuration.
    pub(crate) fn reset(&mut self, platform: &mut P) -> Aborted {
        if matches!(self.lifecycle, Lifecycle::Uninitialized) {
            return Aborted::default();
        }

        let receive = self.rx.take().map(|rx| {
            platform.stop(self.block, Direction::Receive);
            debug!("{:?}: receive aborted at {}/{}", self.block, rx.count, rx.length);
            rx.buffer
        });
        let transmit = self.tx.take().map(|tx| {
            platform.stop(self.block, Direction::Transmit);
            debug!("{:?}: transmit aborted at {}/{}", self.block, tx.count, tx.length);
            tx.buffer
        });

        self.rx_sink = None;
        self.tx_sink = None;
        self.lifecycle = Lifecycle::Uninitialized;
        debug!("{:?}: deinitialized", self.block);

        Aborted { receive, transmit }
    }
}

/// Borrowed view of one claimed driver instance.
///
/// Obtained from [`UsartRegistry::usart`](super::UsartRegistry::usart).
pub struct Usart<'a, P: UsartPlatform> {
    pub(crate) instance: &'a mut DriverInstance<P>,
    pub(crate) platform: &'a mut P,
}

impl<P: UsartPlatform> Usart<'_, P> {
    pub fn block(&self) -> HardwareBlockId {
        self.instance.block
    }

    pub fn is_initialized(&self) -> bool {
        self.instance.line().is_some()
    }

    /// The configuration in effect, if initialized.
    pub fn config(&self) -> Option<LineConfig> {
        self.instance.line().copied()
    }

    pub fn receive_state(&self) -> TransferState {
        self.instance
            .rx
            .as_ref()
            .map_or(TransferState::Idle, Transfer::state)
    }

    pub fn transmit_state(&self) -> TransferState {
        self.instance
            .tx
            .as_ref()
            .map_or(TransferState::Idle, Transfer::state)
    }

    /// Validate `config`, program the block and mark it initialized.
    ///
    /// # Errors
    ///
    /// - [`UsartError::AlreadyInitialized`] without an intervening `deinit`
    /// - [`UsartError::InvalidConfig`] if `config` is incomplete or
    ///   contradictory
    /// - [`UsartError::Hardware`] if the platform refuses the settings
    pub fn init(&mut self, config: &UsartConfig) -> Result<(), UsartError> {
        let block = self.instance.block;
        if self.is_initialized() {
            return Err(UsartError::AlreadyInitialized);
        }

        let line = config.validate().inspect_err(|_| {
            warn!("{:?}: rejected configuration {:?}", block, config);
        })?;

        self.platform.configure(block, &line).map_err(|e| {
            warn!("{:?}: platform configure failed: {:?}", block, e);
            UsartError::Hardware
        })?;

        self.instance.rx = None;
        self.instance.tx = None;
        self.instance.lifecycle = Lifecycle::Initialized(line);
        debug!(
            "{:?}: initialized at {} baud (rx: {}, tx: {})",
            block, line.baud_rate, line.rx_enabled, line.tx_enabled
        );
        Ok(())
    }

    /// Abort any in-flight transfers and return to the uninitialized
    /// state. No sink fires for an aborted transfer, and both sinks are
    /// cleared.
    ///
    /// Calling this on an uninitialized instance is a no-op.
    pub fn deinit(&mut self) -> Result<Aborted, UsartError> {
        Ok(self.instance.reset(self.platform))
    }

    /// Register (or clear, with `None`) the receive-complete sink.
    ///
    /// A replacement made while a receive is active is the one notified
    /// when that receive completes.
    pub fn set_receive_callback(
        &mut self,
        sink: Option<Arc<dyn CompletionSink<P>>>,
    ) -> Result<(), UsartError> {
        self.require(Direction::Receive)?;
        self.instance.set_sink(Direction::Receive, sink);
        Ok(())
    }

    /// Register (or clear) the transmit-complete sink.
    pub fn set_transmit_callback(
        &mut self,
        sink: Option<Arc<dyn CompletionSink<P>>>,
    ) -> Result<(), UsartError> {
        self.require(Direction::Transmit)?;
        self.instance.set_sink(Direction::Transmit, sink);
        Ok(())
    }

    /// Start receiving `length` bytes into the front of `buffer`.
    ///
    /// Returns immediately; the buffer comes back through the receive sink
    /// once `length` bytes have arrived.
    pub fn start_receive(&mut self, buffer: Buffer, length: usize) -> Result<(), Rejected> {
        self.start(Direction::Receive, buffer, length)
    }

    /// Start transmitting `buffer[..length]`.
    ///
    /// The buffer is returned unchanged through the transmit sink.
    pub fn start_transmit(&mut self, buffer: Buffer, length: usize) -> Result<(), Rejected> {
        self.start(Direction::Transmit, buffer, length)
    }

    fn require(&self, direction: Direction) -> Result<(), UsartError> {
        if self.instance.enabled(direction) {
            Ok(())
        } else {
            Err(UsartError::NotInitialized)
        }
    }

    fn start(&mut self, direction: Direction, buffer: Buffer, length: usize) -> Result<(), Rejected> {
        let checked = self.require(direction).and_then(|()| {
            if self.instance.is_active(direction) {
                Err(UsartError::Busy)
            } else if length == 0 || buffer.len() < length {
                Err(UsartError::InvalidArgument)
            } else {
                Ok(())
            }
        });
        if let Err(error) = checked {
            return Err(Rejected { error, buffer });
        }

        let block = self.instance.block;
        *self.instance.transfer_mut(direction) = Some(Transfer {
            buffer,
            length,
            count: 0,
        });
        match direction {
            Direction::Receive => self.platform.start_receive(block, length),
            Direction::Transmit => self.platform.start_transmit(block, length),
        }
        trace!("{:?}: {:?} of {} bytes started", block, direction, length);
        Ok(())
    }
}
