//! Domain layer for the AMAS orchestration kernel.
//!
//! Pure business logic and port definitions; no infrastructure concerns.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{KernelError, KernelResult};
