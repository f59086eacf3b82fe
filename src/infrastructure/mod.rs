//! Infrastructure: configuration loading and structured logging. Durable
//! storage adapters live under `crate::adapters` alongside the other
//! domain-port implementations.

pub mod config;
pub mod logging;
