//! Architecture-neutral building blocks shared by the driver crates.
//!
//! - [`sync`]: spinning locks, including an interrupt-masking variant that
//!   is safe to take from both thread and interrupt context
//! - [`arch`]: the interrupt-masking backend for the current target

#![no_std]

pub mod arch;
pub mod sync;
