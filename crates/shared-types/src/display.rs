//! Human-readable formatting shared by history titles and notifications.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::entities::{BudgetLineItemStatus, FieldValue};
use crate::records::{ChangeRequestTarget, ChangeSet};
use crate::security::ActorId;

/// Fields whose values are money.
const CURRENCY_FIELDS: &[&str] = &["amount", "funding", "budget"];

/// `$1,234.56`, with a leading minus for negative amounts.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{cents}")
}

pub fn format_fiscal_year(fiscal_year: i64) -> String {
    format!("FY {fiscal_year}")
}

pub fn display_name(full_name: Option<&str>, id: ActorId) -> String {
    match full_name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("User #{id}"),
    }
}

/// `amount` → `Amount`, `date_needed` → `Date Needed`.
pub fn field_label(field: &str) -> String {
    field
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a field value the way users read it: money as currency, statuses by
/// label, absent values as `none`.
pub fn describe_value(field: &str, value: Option<&FieldValue>) -> String {
    let Some(value) = value else {
        return "none".to_string();
    };
    if CURRENCY_FIELDS.contains(&field) {
        if let Some(amount) = value.as_decimal() {
            return format_currency(amount);
        }
    }
    if field == "status" {
        if let Some(status) = value
            .as_text()
            .and_then(|s| s.parse::<BudgetLineItemStatus>().ok())
        {
            return status.label().to_string();
        }
    }
    value.to_string()
}

/// `Amount from $100.00 to $500.00; Status from Draft to Planned`.
pub fn describe_changes(changes: &ChangeSet) -> String {
    changes
        .iter()
        .map(|(field, change)| {
            format!(
                "{} from {} to {}",
                field_label(field),
                describe_value(field, change.old.as_ref()),
                describe_value(field, change.new.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// `budget line 15`, `agreement 3`.
pub fn describe_target(target: &ChangeRequestTarget) -> String {
    match target {
        ChangeRequestTarget::BudgetLineItem {
            budget_line_item_id,
            ..
        } => format!("budget line {budget_line_item_id}"),
        ChangeRequestTarget::Agreement { agreement_id } => format!("agreement {agreement_id}"),
        ChangeRequestTarget::Generic { key } => key.to_string(),
    }
}
