//! # gc-01-audit-trail
//!
//! Exactly-once, field-level audit capture for every audited entity mutation.
//!
//! ## Overview
//!
//! - **Diff Engine** ([`domain::diff`]): ordered before/after mapping of the
//!   fields that actually changed. Pure and deterministic.
//! - **Audit Recorder** ([`AuditRecorder`]): a session listener that stamps
//!   the acting user before commit and, after every flush, writes one
//!   [`AuditRecord`](shared_types::AuditRecord) per entity whose diff is
//!   non-empty, inside the same transaction.
//!
//! ```text
//! Session ──flush──→ AuditRecorder ──diff──→ AuditRecord (same transaction)
//!    │                     │
//!    └──before_commit──────┘ stamps created_by / updated_by
//! ```
//!
//! A failed audit write for one entity is logged and counted; the recorder
//! moves on to the next entity and the commit proceeds.

pub mod config;
pub mod domain;
pub mod service;

pub use config::AuditConfig;
pub use domain::diff::{diff, diff_partial};
pub use service::AuditRecorder;
