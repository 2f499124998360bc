use std::collections::BTreeMap;

use shared_types::{
    Agreement, AuditedEntity, BudgetLineItem, BudgetLineItemStatus, CoreResult, EntityRecord,
    Operation,
};

use super::FieldErrors;
use crate::context::ValidationContext;
use crate::pipeline::ValidationRule;

/// Discriminant fields that cannot change after creation.
#[derive(Debug, Clone)]
pub struct ImmutableFields {
    fields: BTreeMap<String, Vec<String>>,
}

impl ImmutableFields {
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, class_name: &str, field: &str) -> Self {
        self.fields
            .entry(class_name.to_string())
            .or_default()
            .push(field.to_string());
        self
    }
}

impl Default for ImmutableFields {
    fn default() -> Self {
        Self::new()
            .field(Agreement::CLASS_NAME, "agreement_type")
            .field(BudgetLineItem::CLASS_NAME, "agreement_id")
    }
}

impl ValidationRule for ImmutableFields {
    fn name(&self) -> &'static str {
        "immutable-fields"
    }

    fn validate(
        &self,
        target: Option<&EntityRecord>,
        ctx: &mut ValidationContext<'_>,
    ) -> CoreResult<()> {
        let (Some(target), Some(fields)) = (target, self.fields.get(&ctx.class_name)) else {
            return Ok(());
        };
        if ctx.operation != Operation::Update {
            return Ok(());
        }

        let mut errors = FieldErrors::default();
        for field in fields {
            let Some(proposed) = ctx.proposed.get(field) else {
                continue;
            };
            let unchanged = target
                .get(field)
                .is_some_and(|current| current.same_value(proposed));
            if !unchanged {
                errors.add(field, "cannot be changed after creation");
            }
        }
        errors.into_result()
    }
}

/// Rejects every edit and deletion once a record reaches a final status.
#[derive(Debug, Clone)]
pub struct ImmutableOnceFinalized {
    class_name: String,
    field: String,
    finalized: Vec<String>,
}

impl ImmutableOnceFinalized {
    pub fn new(class_name: &str, field: &str, finalized: &[&str]) -> Self {
        Self {
            class_name: class_name.to_string(),
            field: field.to_string(),
            finalized: finalized.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for ImmutableOnceFinalized {
    fn default() -> Self {
        Self::new(
            BudgetLineItem::CLASS_NAME,
            "status",
            &[BudgetLineItemStatus::Obligated.as_str()],
        )
    }
}

impl ValidationRule for ImmutableOnceFinalized {
    fn name(&self) -> &'static str {
        "immutable-once-finalized"
    }

    fn validate(
        &self,
        target: Option<&EntityRecord>,
        ctx: &mut ValidationContext<'_>,
    ) -> CoreResult<()> {
        if ctx.class_name != self.class_name || ctx.operation == Operation::Create {
            return Ok(());
        }
        let Some(status) = target
            .and_then(|t| t.get(&self.field))
            .and_then(|v| v.as_text())
        else {
            return Ok(());
        };

        let mut errors = FieldErrors::default();
        if self.finalized.iter().any(|f| f == status) {
            errors.add(
                &self.field,
                format!("{} records in {status} status cannot be modified", self.class_name),
            );
        }
        errors.into_result()
    }
}
