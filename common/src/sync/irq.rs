use core::fmt::Debug;

/// Architecture-specific interrupt masking interface.
///
/// Implemented per target in [`crate::arch`]; [`crate::arch::LocalIrq`]
/// selects the one for the current build.
pub trait IrqControl {
    /// Saved interrupt state.
    type State: Copy + Debug;

    /// Mask interrupts on the current core and return the previous state.
    fn disable() -> Self::State;

    /// Restore the state returned by a matching [`disable`](Self::disable).
    fn restore(state: Self::State);
}

