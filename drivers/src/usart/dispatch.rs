//! Completion dispatch.
//!
//! Called from the platform's USART interrupt handlers.

use log::{trace, warn};

use super::UsartRegistry;
use crate::hal::usart::{ByteEvent, Direction, HardwareBlockId, UsartPlatform};

impl<P: UsartPlatform> UsartRegistry<P> {
    /// Advance the active transfer of `block` by one data-path event.
    ///
    /// Returns the number of bytes moved: consumed from a
    /// [`ByteEvent::Received`] slice or written to the front of a
    /// [`ByteEvent::TransmitReady`] slice.
    ///
    /// # Process
    /// 1. Move bytes into (or out of) the active buffer, never past the
    ///    requested length
    /// 2. If that completes the transfer, set the direction idle and hand
    ///    the completion to the sink registered at that moment
    /// 3. If the sink started a new transfer in the same direction and
    ///    bytes remain in the event, continue with it
    ///
    /// Received bytes left over once no receive is active are counted in
    /// [`stray_bytes`](Self::stray_bytes).
    pub fn on_byte_event(&mut self, block: HardwareBlockId, event: ByteEvent<'_>) -> usize {
        let direction = event.direction();
        let mut moved = 0;

        match event {
            ByteEvent::Received(data) => {
                while moved < data.len() {
                    let (n, completion) =
                        self.instances[block.index()].receive_bytes(&data[moved..]);
                    moved += n;
                    let Some(completion) = completion else { break };
                    self.complete(block, direction, completion);
                }

                let stray = data.len() - moved;
                if stray > 0 {
                    self.stray_bytes += stray;
                    warn!("{:?}: dropped {} bytes with no receive active", block, stray);
                }
            }
            ByteEvent::TransmitReady(out) => {
                while moved < out.len() {
                    let (n, completion) =
                        self.instances[block.index()].transmit_bytes(&mut out[moved..]);
                    moved += n;
                    let Some(completion) = completion else { break };
                    self.complete(block, direction, completion);
                }
                if moved == 0 {
                    trace!("{:?}: transmitter ready with nothing to send", block);
                }
            }
        }

        moved
    }

    fn complete(&mut self, block: HardwareBlockId, direction: Direction, completion: super::Completion) {
        match self.instances[block.index()].sink(direction) {
            Some(sink) => sink.on_complete(self, completion),
            None => trace!("{:?}: {:?} complete with no sink registered", block, direction),
        }
    }
}
