//! # gc-02-event-tracker
//!
//! The event-scoped unit tracker: one logical operation in, exactly one
//! persisted and published [`DomainEvent`](shared_types::DomainEvent) out.
//!
//! ## Scope lifecycle
//!
//! ```text
//! enter ── allocate event id, set event context, capture user + request
//!   │
//!   ├── operation Ok  ── flush ──────────────┐
//!   │                                        ├── persist event ── publish ── flush
//!   └── operation Err ── rollback, FAILED ───┘
//!   │
//! exit ── restore previous context, return the operation's own result
//! ```
//!
//! Persistence or dispatch failures in teardown are logged and counted, never
//! returned in place of the operation's outcome. The caller owns the commit.

pub mod operations;
pub mod scope;

pub use operations::{create_entity, delete_entity, update_entity};
pub use scope::{EventScope, TrackedOutcome};
