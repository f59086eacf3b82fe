//! Configuration loading (spec §6 "Configuration surface").
//!
//! Hierarchical `figment` merge: programmatic defaults -> project YAML ->
//! environment overrides (`AMAS_` prefix), same precedence chain as the
//! teacher's `ConfigLoader`.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
