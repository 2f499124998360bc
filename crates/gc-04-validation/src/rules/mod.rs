//! Shipped validation rules, grouped by the stage they run in.

mod access;
mod business;
mod immutability;

pub use access::{Authorization, ResourceExists};
pub use business::{AgreementTypeConstraints, BudgetLineItemConstraints, NoPendingChangeRequest};
pub use immutability::{ImmutableFields, ImmutableOnceFinalized};

use std::collections::BTreeMap;

use shared_types::{CoreError, CoreResult};

/// Field-keyed messages collected by one rule.
#[derive(Debug, Default)]
pub(crate) struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub(crate) fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub(crate) fn into_result(self) -> CoreResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(CoreError::ValidationFailed(self.0))
        }
    }
}
