//! # gc-04-validation
//!
//! Rejects invalid or unauthorized mutation requests before they reach
//! persistence.
//!
//! A [`ValidationPipeline`] is an ordered list of [`ValidationRule`]s run
//! strictly in order; the first failure stops the pipeline and propagates to
//! the caller unchanged.
//!
//! ```text
//! ValidationContext ──→ [1 exists] → [2 authz] → [3 immutable] → [4 business] → [5 type] ──→ Ok
//!                            │            │            │              │             │
//!                            └────────────┴────────────┴──────────────┴─────────────┴──→ Err (first)
//! ```
//!
//! | Pipeline | Rules |
//! |----------|-------|
//! | [`ValidationPipeline::default_for`] | exists, authorization, immutable fields, line item constraints, pending change requests, agreement type |
//! | [`ValidationPipeline::finalized_for`] | the default list plus immutable-once-finalized |
//! | [`ValidationPipeline::integrity_for`] | the default list without the actor and pending checks, for applying approved changes |

pub mod context;
pub mod pipeline;
pub mod rules;

pub use context::ValidationContext;
pub use pipeline::{ValidationPipeline, ValidationRule};
pub use rules::{
    AgreementTypeConstraints, Authorization, BudgetLineItemConstraints, ImmutableFields,
    ImmutableOnceFinalized, NoPendingChangeRequest, ResourceExists,
};
