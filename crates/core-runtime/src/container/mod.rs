//! # Core Container
//!
//! Configuration and the dependency-injected service container.
//!
//! - The store, bus and engine are built once, in dependency order
//! - Subscribers are registered before the bus is frozen
//! - Outbound ports are filled with the in-process adapters

pub mod config;
pub mod services;

pub use config::{ConfigError, RuntimeConfig};
pub use services::CoreContainer;
