//! Block relay from one USART receiver to another USART transmitter.
//!
//! The relay is the completion sink of both instances. Received blocks are
//! committed to a [`RelayQueue`] and transmitted strictly in arrival order,
//! so the receiver can keep filling one block while the transmitter, running
//! at its own rate, drains an older one.
//!
//! # Backpressure
//!
//! When a receive completes and every slot is still occupied, no new
//! receive is started and an overrun is counted. The receiver resumes as
//! soon as the transmitter frees a slot. Bytes the hardware delivers in
//! between show up in
//! [`UsartRegistry::stray_bytes`](crate::usart::UsartRegistry::stray_bytes).
//! Overruns are read back through [`Relay::take_overrun`] and
//! [`RelayStats::overruns`]; nothing is dropped silently.

use alloc::sync::Arc;

use common::arch::LocalIrq;
use common::sync::IrqSpinLock;
use log::{info, trace, warn};

use crate::hal::serial::UsartError;
use crate::hal::usart::{Direction, UsartPlatform};
use crate::usart::{Buffer, Completion, CompletionSink, UsartHandle, UsartRegistry};

pub mod queue;


pub use queue::{RelayQueue, Slot, SlotTicket};

/// Relay geometry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Bytes per transmitted block.
    pub block_size: usize,
    /// Number of blocks in the queue; at least 2.
    pub depth: usize,
}

impl RelayConfig {
    pub const fn new(block_size: usize, depth: usize) -> Self {
        Self { block_size, depth }
    }
}

impl Default for RelayConfig {
    /// 128-byte blocks, double buffered.
    fn default() -> Self {
        Self::new(128, 2)
    }
}

/// Counters describing relay progress.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RelayStats {
    pub blocks_received: u32,
    pub blocks_transmitted: u32,
    /// Receive completions that found no free slot for the next block.
    pub overruns: u32,
    /// Stalled receives restarted after a transmit freed a slot.
    pub stalls_resumed: u32,
    /// Blocks received and not yet fully transmitted.
    pub pending_blocks: usize,
}

/// A relay that could not start. The handles are given back.
#[derive(Debug)]
pub struct StartError {
    pub error: UsartError,
    pub receiver: UsartHandle,
    pub transmitter: UsartHandle,
}

impl From<StartError> for UsartError {
    fn from(e: StartError) -> Self {
        e.error
    }
}

struct RelayState {
    queue: RelayQueue,
    /// Ticket of the slot lent to the receiver.
    filling: Option<SlotTicket>,
    /// Ticket of the slot lent to the transmitter.
    draining: Option<SlotTicket>,
    stalled: bool,
    stats: RelayStats,
    unreported_overruns: u32,
}

pub struct Relay {
    receiver: UsartHandle,
    transmitter: UsartHandle,
    state: IrqSpinLock<RelayState, LocalIrq>,
}

impl Relay {
    /// Wire `receiver` to `transmitter` and start the first receive.
    ///
    /// Both instances must already be initialized, with receive enabled on
    /// `receiver` and transmit enabled on `transmitter`, and both must be
    /// idle in the relayed direction.
    ///
    /// # Errors
    ///
    /// - [`UsartError::InvalidArgument`] if `config` is unusable
    /// - [`UsartError::NotInitialized`] if either side is not ready
    /// - [`UsartError::Busy`] if either side has a transfer in flight
    ///
    /// The handles are returned inside the [`StartError`].
    pub fn start<P: UsartPlatform>(
        usarts: &mut UsartRegistry<P>,
        receiver: UsartHandle,
        transmitter: UsartHandle,
        config: RelayConfig,
    ) -> Result<Arc<Self>, StartError> {
        let prepared = Self::preflight(usarts, &receiver, &transmitter)
            .and_then(|()| RelayQueue::new(config.depth, config.block_size));
        let queue = match prepared {
            Ok(queue) => queue,
            Err(error) => {
                return Err(StartError {
                    error,
                    receiver,
                    transmitter,
                });
            }
        };

        let relay = Arc::new(Self {
            receiver,
            transmitter,
            state: IrqSpinLock::new(RelayState {
                queue,
                filling: None,
                draining: None,
                stalled: false,
                stats: RelayStats::default(),
                unreported_overruns: 0,
            }),
        });

        // The preflight checks above are exactly what registering the sinks
        // and starting the first receive require.
        let sink: Arc<dyn CompletionSink<P>> = relay.clone();
        usarts.install_sink(&relay.receiver, Direction::Receive, sink.clone());
        usarts.install_sink(&relay.transmitter, Direction::Transmit, sink);
        relay.arm_receive(&mut relay.state.lock(), usarts);

        info!(
            "relay {:?} -> {:?} started ({} x {} bytes)",
            relay.receiver.block(),
            relay.transmitter.block(),
            config.depth,
            config.block_size
        );
        Ok(relay)
    }

    fn preflight<P: UsartPlatform>(
        usarts: &mut UsartRegistry<P>,
        receiver: &UsartHandle,
        transmitter: &UsartHandle,
    ) -> Result<(), UsartError> {
        let rx = usarts.usart(receiver);
        if !rx.config().is_some_and(|line| line.rx_enabled) {
            return Err(UsartError::NotInitialized);
        }
        if rx.receive_state() != crate::usart::TransferState::Idle {
            return Err(UsartError::Busy);
        }

        let tx = usarts.usart(transmitter);
        if !tx.config().is_some_and(|line| line.tx_enabled) {
            return Err(UsartError::NotInitialized);
        }
        if tx.transmit_state() != crate::usart::TransferState::Idle {
            return Err(UsartError::Busy);
        }
        Ok(())
    }

    pub fn stats(&self) -> RelayStats {
        let state = self.state.lock();
        RelayStats {
            pending_blocks: state.queue.len(),
            ..state.stats
        }
    }

    /// Report overruns counted since the last call as
    /// [`UsartError::Overrun`].
    pub fn take_overrun(&self) -> Result<(), UsartError> {
        let mut state = self.state.lock();
        if state.unreported_overruns == 0 {
            return Ok(());
        }
        state.unreported_overruns = 0;
        Err(UsartError::Overrun)
    }

    /// Deinitialize both instances, which aborts in-flight transfers and
    /// unregisters the relay. Aborted buffers go back into the queue; a
    /// block that was mid-transmit stays pending.
    pub fn stop<P: UsartPlatform>(&self, usarts: &mut UsartRegistry<P>) -> Result<(), UsartError> {
        let mut state = self.state.lock();
        let rx_aborted = usarts.usart(&self.receiver).deinit()?;
        let tx_aborted = usarts.usart(&self.transmitter).deinit()?;

        if let (Some(ticket), Some(buffer)) = (state.filling.take(), rx_aborted.receive) {
            if let Err((e, _)) = state.queue.abandon_fill(Slot::from_parts(ticket, buffer)) {
                warn!("relay: receive slot not returned: {}", e);
            }
        }
        if let (Some(ticket), Some(buffer)) = (state.draining.take(), tx_aborted.transmit) {
            if let Err((e, _)) = state.queue.abandon_drain(Slot::from_parts(ticket, buffer)) {
                warn!("relay: transmit slot not returned: {}", e);
            }
        }
        state.stalled = false;

        info!(
            "relay {:?} -> {:?} stopped with {} blocks pending",
            self.receiver.block(),
            self.transmitter.block(),
            state.queue.len()
        );
        Ok(())
    }

    /// Recover the handles of a relay no instance refers to any more,
    /// i.e. after [`stop`](Self::stop).
    pub fn into_handles(self) -> (UsartHandle, UsartHandle) {
        (self.receiver, self.transmitter)
    }

    fn on_received<P: UsartPlatform>(&self, usarts: &mut UsartRegistry<P>, buffer: Buffer) {
        let mut state = self.state.lock();
        let Some(ticket) = state.filling.take() else {
            warn!("relay: receive completed with no slot lent out");
            return;
        };

        if let Err((e, _)) = state.queue.commit_filled(Slot::from_parts(ticket, buffer)) {
            warn!("relay: received block rejected by queue: {}", e);
            return;
        }
        state.stats.blocks_received += 1;
        trace!("relay: block {} received", state.stats.blocks_received);

        self.kick_transmit(&mut state, usarts);
        self.arm_receive(&mut state, usarts);
    }

    fn on_transmitted<P: UsartPlatform>(&self, usarts: &mut UsartRegistry<P>, buffer: Buffer) {
        let mut state = self.state.lock();
        let Some(ticket) = state.draining.take() else {
            warn!("relay: transmit completed with no slot lent out");
            return;
        };

        if let Err((e, _)) = state.queue.commit_drained(Slot::from_parts(ticket, buffer)) {
            warn!("relay: transmitted block rejected by queue: {}", e);
            return;
        }
        state.stats.blocks_transmitted += 1;
        trace!("relay: block {} transmitted", state.stats.blocks_transmitted);

        if state.stalled {
            state.stalled = false;
            state.stats.stalls_resumed += 1;
            self.arm_receive(&mut state, usarts);
        }
        self.kick_transmit(&mut state, usarts);
    }

    /// Start transmitting the oldest ready block unless a transmit is
    /// already running.
    fn kick_transmit<P: UsartPlatform>(&self, state: &mut RelayState, usarts: &mut UsartRegistry<P>) {
        if state.draining.is_some() {
            return;
        }
        let Some(slot) = state.queue.try_reserve_for_drain() else {
            return;
        };

        let (ticket, buffer) = slot.into_parts();
        let length = buffer.len();
        match usarts.usart(&self.transmitter).start_transmit(buffer, length) {
            Ok(()) => state.draining = Some(ticket),
            Err(rejected) => {
                warn!("relay: transmit refused: {}", rejected.error);
                let _ = state
                    .queue
                    .abandon_drain(Slot::from_parts(ticket, rejected.buffer));
            }
        }
    }

    /// Lend the next free slot to the receiver, or record an overrun and
    /// stall if there is none.
    fn arm_receive<P: UsartPlatform>(&self, state: &mut RelayState, usarts: &mut UsartRegistry<P>) {
        if state.filling.is_some() {
            return;
        }
        let slot = match state.queue.reserve_for_fill() {
            Ok(slot) => slot,
            Err(e) => {
                state.stalled = true;
                state.stats.overruns += 1;
                state.unreported_overruns += 1;
                warn!(
                    "relay: {} ({:?} stalled, {} blocks pending)",
                    e,
                    self.receiver.block(),
                    state.queue.len()
                );
                return;
            }
        };

        let (ticket, buffer) = slot.into_parts();
        let length = buffer.len();
        match usarts.usart(&self.receiver).start_receive(buffer, length) {
            Ok(()) => state.filling = Some(ticket),
            Err(rejected) => {
                warn!("relay: receive refused: {}", rejected.error);
                let _ = state
                    .queue
                    .abandon_fill(Slot::from_parts(ticket, rejected.buffer));
            }
        }
    }
}

impl<P: UsartPlatform> CompletionSink<P> for Relay {
    fn on_complete(&self, usarts: &mut UsartRegistry<P>, completion: Completion) {
        match completion.direction {
            Direction::Receive => self.on_received(usarts, completion.buffer),
            Direction::Transmit => self.on_transmitted(usarts, completion.buffer),
        }
    }
}
