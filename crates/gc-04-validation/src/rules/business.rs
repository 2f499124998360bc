use gc_01_audit_trail::diff_partial;
use serde_json::json;
use shared_types::{
    Agreement, AgreementType, AuditedEntity, BudgetLineItem, BudgetLineItemStatus,
    ChangeRequestQuery, CoreResult, EntityRecord, FieldValue, Operation,
};

use super::FieldErrors;
use crate::context::ValidationContext;
use crate::pipeline::ValidationRule;

const REQUIRED_PAST_DRAFT: [&str; 3] = ["can_id", "amount", "date_needed"];

fn is_unset(value: Option<&FieldValue>) -> bool {
    value.is_none_or(FieldValue::is_null)
}

/// Amount sign and the fields a line item needs once it leaves DRAFT.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetLineItemConstraints;

impl ValidationRule for BudgetLineItemConstraints {
    fn name(&self) -> &'static str {
        "budget-line-item-constraints"
    }

    fn validate(
        &self,
        target: Option<&EntityRecord>,
        ctx: &mut ValidationContext<'_>,
    ) -> CoreResult<()> {
        if ctx.class_name != BudgetLineItem::CLASS_NAME || ctx.operation == Operation::Delete {
            return Ok(());
        }

        let mut errors = FieldErrors::default();
        if let Some(amount) = ctx.effective(target, "amount").filter(|v| !v.is_null()) {
            match amount.as_decimal() {
                Some(amount) if amount.is_sign_negative() && !amount.is_zero() => {
                    errors.add("amount", "must not be negative");
                }
                Some(_) => {}
                None => errors.add("amount", "must be a number"),
            }
        }

        let status = match ctx.effective(target, "status").and_then(FieldValue::as_text) {
            Some(text) => match text.parse::<BudgetLineItemStatus>() {
                Ok(status) => Some(status),
                Err(_) => {
                    errors.add("status", format!("unknown status {text}"));
                    None
                }
            },
            None => None,
        };
        if let Some(status) = status.filter(|s| *s != BudgetLineItemStatus::Draft) {
            for field in REQUIRED_PAST_DRAFT {
                if is_unset(ctx.effective(target, field)) {
                    errors.add(field, format!("is required when status is {}", status.label()));
                }
            }
        }
        errors.into_result()
    }
}

/// A field already held by an IN_REVIEW change request cannot be changed
/// again until that request is resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPendingChangeRequest;

impl ValidationRule for NoPendingChangeRequest {
    fn name(&self) -> &'static str {
        "no-pending-change-request"
    }

    fn validate(
        &self,
        target: Option<&EntityRecord>,
        ctx: &mut ValidationContext<'_>,
    ) -> CoreResult<()> {
        let Some(target) = target else {
            return Ok(());
        };
        if ctx.operation != Operation::Update {
            return Ok(());
        }

        let pending = ctx
            .uow
            .change_requests(&ChangeRequestQuery::in_review_for(target.key.clone()))?;
        if pending.is_empty() {
            return Ok(());
        }

        let changes = diff_partial(&target.fields, &ctx.proposed);
        let mut errors = FieldErrors::default();
        for field in changes.fields() {
            if let Some(request) = pending
                .iter()
                .find(|r| r.requested_change_diff.contains(field))
            {
                errors.add(
                    field,
                    format!("has a pending change request {}", request.id),
                );
            }
        }

        let ids: Vec<String> = pending.iter().map(|r| r.id.to_string()).collect();
        ctx.set_metadata("pending_change_requests", json!(ids));
        errors.into_result()
    }
}

/// Only contracts and IAAs carry a contract number.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgreementTypeConstraints;

impl ValidationRule for AgreementTypeConstraints {
    fn name(&self) -> &'static str {
        "agreement-type-constraints"
    }

    fn validate(
        &self,
        target: Option<&EntityRecord>,
        ctx: &mut ValidationContext<'_>,
    ) -> CoreResult<()> {
        if ctx.class_name != Agreement::CLASS_NAME || ctx.operation == Operation::Delete {
            return Ok(());
        }
        let Some(agreement_type) = ctx
            .effective(target, "agreement_type")
            .and_then(FieldValue::as_text)
            .and_then(|t| t.parse::<AgreementType>().ok())
        else {
            return Ok(());
        };

        let mut errors = FieldErrors::default();
        let has_contract_number = ctx
            .effective(target, "contract_number")
            .and_then(FieldValue::as_text)
            .is_some_and(|n| !n.trim().is_empty());
        if has_contract_number
            && matches!(agreement_type, AgreementType::Grant | AgreementType::DirectAllocation)
        {
            errors.add(
                "contract_number",
                format!("is not allowed on {} agreements", agreement_type.as_str()),
            );
        }
        errors.into_result()
    }
}
