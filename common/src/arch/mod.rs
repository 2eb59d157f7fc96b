//! Per-target interrupt masking.
//!
//! [`LocalIrq`] names the [`IrqControl`](crate::sync::irq::IrqControl)
//! implementation for the target being built. On ARM it masks IRQs through
//! CPSR; on hosted targets there is no interrupt controller to mask, so it
//! degrades to a no-op and locks rely on the spin flag alone.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        pub mod arm;
        pub use arm::irq::ArmIrq as LocalIrq;
    } else {
        pub mod host;
        pub use host::NoIrq as LocalIrq;
    }
}
