use crate::sync::irq::IrqControl;

/// CPSR bit that masks IRQs when set.
const CPSR_IRQ_MASK: u32 = 1 << 7;

/// IRQ masking for ARMv6/ARMv7-A cores through the CPSR I bit.
///
/// The saved state records whether IRQs were unmasked before `disable`,
/// so nested critical sections only re-enable at the outermost level.
#[derive(Debug, Clone, Copy)]
pub struct ArmIrq;

impl IrqControl for ArmIrq {
    type State = bool;

    #[inline(always)]
    fn disable() -> bool {
        let cpsr: u32;
        // SAFETY: reading CPSR and setting the I bit has no memory effects.
        unsafe {
            core::arch::asm!(
                "mrs {0}, cpsr",
                "cpsid i",
                out(reg) cpsr,
                options(nomem, nostack)
            );
        }
        cpsr & CPSR_IRQ_MASK == 0
    }

    #[inline(always)]
    fn restore(were_enabled: bool) {
        if !were_enabled {
            return;
        }
        // SAFETY: only re-enables IRQs that were enabled before `disable`.
        unsafe {
            core::arch::asm!("cpsie i", options(nomem, nostack));
        }
    }
}
