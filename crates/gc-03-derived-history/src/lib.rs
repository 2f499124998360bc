//! # gc-03-derived-history
//!
//! Bus subscribers that turn successful domain events into human-readable,
//! aggregate-scoped history rows.
//!
//! | Builder | Subject | Events |
//! |---------|---------|--------|
//! | [`CanHistoryBuilder`] | CAN | CAN and CAN funding create/update/delete |
//! | [`AgreementHistoryBuilder`] | Agreement | agreement, budget line item and change-request events |
//!
//! Builders read entity snapshots from the event details and fall back to the
//! audit records linked to the event. Each entry is keyed by
//! `(event_id, subject, history_type)`; with deduplication on, a re-dispatched
//! event adds nothing.

pub mod config;
pub mod domain;
pub mod facts;
pub mod service;

pub use config::HistoryConfig;
pub use domain::HistoryDraft;
pub use facts::EventFacts;
pub use service::{history_for, register, AgreementHistoryBuilder, CanHistoryBuilder};
