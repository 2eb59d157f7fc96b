use crate::sync::irq::IrqControl;

/// Interrupt control for hosted builds (simulation and unit tests).
///
/// There are no hardware interrupts to mask, so the saved state is empty.
#[derive(Debug, Clone, Copy)]
pub struct NoIrq;

impl IrqControl for NoIrq {
    type State = ();

    #[inline(always)]
    fn disable() {}

    #[inline(always)]
    fn restore(_state: ()) {}
}
