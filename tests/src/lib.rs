//! # Grants-Core Test Suite
//!
//! Cross-crate scenarios run against the in-memory store and a fully wired
//! bus.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs           # seeded store, wired engine, actors
//!     ├── audit_flows.rs        # exactly-once audit, rollback, diff laws
//!     ├── bus_isolation.rs      # failing and panicking subscribers
//!     ├── change_requests.rs    # gating, approval, rejection, races
//!     └── history_flows.rs      # CAN and agreement timelines
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p gc-tests
//! cargo test -p gc-tests integration::change_requests
//! ```

pub mod integration;
