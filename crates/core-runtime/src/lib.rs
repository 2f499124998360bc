//! # Core Runtime Library
//!
//! Process wiring for the grants core, exposed as a library so integration
//! tests build the same container the binary runs.
//!
//! ## Modules
//!
//! - `container/` - runtime configuration and the service container
//! - `demo` - seed data and the demonstration scenario run by `main.rs`
//!
//! ## Architectural Patterns
//!
//! - **EDA**: history builders react to domain events on the bus only
//! - **Hexagonal**: the engine reaches storage, reviewers and notifications
//!   through ports; the container plugs in the in-process adapters
//! - **Freeze at start-up**: no subscriber is added after the bus is built

pub mod container;
pub mod demo;

pub use container::{ConfigError, CoreContainer, RuntimeConfig};
