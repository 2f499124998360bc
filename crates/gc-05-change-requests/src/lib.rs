//! # gc-05-change-requests
//!
//! Review gating for sensitive field changes.
//!
//! ## State machine
//!
//! ```text
//!              ┌──→ APPROVED   (applies requested_change_data)
//! IN_REVIEW ───┤
//!              └──→ REJECTED   (target untouched)
//! ```
//!
//! Terminal states are final. Two concurrent resolutions of one request are
//! serialized by the store's status check at commit; the loser gets
//! `Conflict`.
//!
//! ## Gating
//!
//! [`GatingPolicy`] is a static table of [`GateRule`]s keyed by target class.
//! A proposal's diff is split: fields no rule holds are applied at once, and
//! each holding rule gets its own change request.
//!
//! ## Ports
//!
//! | Port | Default adapter |
//! |------|-----------------|
//! | [`ReviewerDirectory`] | [`StaticReviewerDirectory`] |
//! | [`NotificationSink`] | [`StoreNotificationSink`] |

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{StaticReviewerDirectory, StoreNotificationSink};
pub use domain::{GateCondition, GateRule, GatingPolicy, ProposalPlan};
pub use ports::{NotificationSink, ReviewerDirectory};
pub use service::{ChangeRequestEngine, ProposalOutcome};
