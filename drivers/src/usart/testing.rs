//! Recording platform for unit tests.

use alloc::vec;
use alloc::vec::Vec;

use super::Buffer;
use crate::hal::serial::LineConfig;
use crate::hal::usart::{Direction, HardwareBlockId, UsartPlatform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlatformCall {
    Configure(HardwareBlockId, LineConfig),
    StartReceive(HardwareBlockId, usize),
    StartTransmit(HardwareBlockId, usize),
    Stop(HardwareBlockId, Direction),
}

#[derive(Debug, Default)]
pub(crate) struct MockPlatform {
    pub calls: Vec<PlatformCall>,
    pub refuse_configure: bool,
}

#[derive(Debug)]
pub(crate) struct Refused;

impl UsartPlatform for MockPlatform {
    type Error = Refused;

    fn configure(&mut self, block: HardwareBlockId, config: &LineConfig) -> Result<(), Refused> {
        if self.refuse_configure {
            return Err(Refused);
        }
        self.calls.push(PlatformCall::Configure(block, *config));
        Ok(())
    }

    fn start_receive(&mut self, block: HardwareBlockId, length: usize) {
        self.calls.push(PlatformCall::StartReceive(block, length));
    }

    fn start_transmit(&mut self, block: HardwareBlockId, length: usize) {
        self.calls.push(PlatformCall::StartTransmit(block, length));
    }

    fn stop(&mut self, block: HardwareBlockId, direction: Direction) {
        self.calls.push(PlatformCall::Stop(block, direction));
    }
}

/// A zeroed buffer of `len` bytes.
pub(crate) fn buffer(len: usize) -> Buffer {
    vec![0u8; len].into_boxed_slice()
}
