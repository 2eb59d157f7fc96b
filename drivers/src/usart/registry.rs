use alloc::sync::Arc;

use log::debug;

use super::{Aborted, CompletionSink};
use super::instance::{DriverInstance, Usart};
use crate::hal::serial::UsartError;
use crate::hal::usart::{Direction, HardwareBlockId, MAX_BLOCKS, UsartPlatform};

/// Proof of ownership of one hardware block.
///
/// Not `Clone`: at most one handle per block exists at a time, and giving
/// it back to [`UsartRegistry::release`] is the only way to free the block.
#[derive(Debug, PartialEq, Eq)]
pub struct UsartHandle {
    block: HardwareBlockId,
}

impl UsartHandle {
    pub fn block(&self) -> HardwareBlockId {
        self.block
    }
}

/// Owner of every USART driver instance on the platform.
pub struct UsartRegistry<P: UsartPlatform> {
    pub(crate) platform: P,
    pub(crate) instances: [DriverInstance<P>; MAX_BLOCKS],
    pub(crate) stray_bytes: usize,
}

impl<P: UsartPlatform> UsartRegistry<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            instances: HardwareBlockId::ALL.map(DriverInstance::new),
            stray_bytes: 0,
        }
    }

    /// Take ownership of `block`.
    ///
    /// Fails with [`UsartError::AlreadyClaimed`] while another handle for
    /// the block is live.
    pub fn claim(&mut self, block: HardwareBlockId) -> Result<UsartHandle, UsartError> {
        let instance = &mut self.instances[block.index()];
        if instance.claimed {
            return Err(UsartError::AlreadyClaimed);
        }
        instance.claimed = true;
        debug!("{:?}: claimed", block);
        Ok(UsartHandle { block })
    }

    /// Deinitialize the block behind `handle` and make it claimable again.
    pub fn release(&mut self, handle: UsartHandle) -> Aborted {
        let instance = &mut self.instances[handle.block.index()];
        let aborted = instance.reset(&mut self.platform);
        instance.claimed = false;
        debug!("{:?}: released", handle.block);
        aborted
    }

    /// Borrow the driver instance behind `handle`.
    pub fn usart(&mut self, handle: &UsartHandle) -> Usart<'_, P> {
        Usart {
            instance: &mut self.instances[handle.block.index()],
            platform: &mut self.platform,
        }
    }

    /// The instance of `block`, claimed or not.
    #[cfg(test)]
    pub(crate) fn usart_at(&mut self, block: HardwareBlockId) -> Usart<'_, P> {
        Usart {
            instance: &mut self.instances[block.index()],
            platform: &mut self.platform,
        }
    }

    /// Register a sink without the enable check of
    /// [`Usart::set_receive_callback`]; the caller has already verified
    /// the direction is enabled.
    pub(crate) fn install_sink(
        &mut self,
        handle: &UsartHandle,
        direction: Direction,
        sink: Arc<dyn CompletionSink<P>>,
    ) {
        self.instances[handle.block.index()].set_sink(direction, Some(sink));
    }

    pub fn is_claimed(&self, block: HardwareBlockId) -> bool {
        self.instances[block.index()].claimed
    }

    /// Bytes delivered by the platform while no receive was active on
    /// their block. Each one is data the hardware has already lost.
    pub fn stray_bytes(&self) -> usize {
        self.stray_bytes
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}
