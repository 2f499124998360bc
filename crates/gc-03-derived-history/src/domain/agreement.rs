//! Agreement timeline: the agreement, its budget lines and their change
//! requests.

use std::collections::BTreeMap;

use shared_types::display::{describe_changes, describe_target, describe_value};
use shared_types::{
    Agreement, BudgetLineItem, ChangeRequest, ChangeRequestStatus, CoreResult, EventType,
    FieldValue, HistoryType, SubjectRef,
};

use super::HistoryDraft;
use crate::facts::EventFacts;

pub const EVENT_TYPES: [EventType; 8] = [
    EventType::CreateAgreement,
    EventType::UpdateAgreement,
    EventType::DeleteAgreement,
    EventType::CreateBli,
    EventType::UpdateBli,
    EventType::DeleteBli,
    EventType::CreateChangeRequest,
    EventType::UpdateChangeRequest,
];

pub fn drafts(event_type: EventType, facts: &EventFacts) -> CoreResult<Vec<HistoryDraft>> {
    let user = &facts.user;
    let drafts = match event_type {
        EventType::CreateAgreement => {
            let agreement: Agreement = facts.require_created()?.to_entity()?;
            vec![HistoryDraft::new(
                SubjectRef::agreement(agreement.id),
                HistoryType::AgreementCreated,
                "Agreement Created",
                format!("{user} created agreement {}", agreement.name),
            )]
        }
        EventType::UpdateAgreement if !facts.changes.is_empty() => {
            let agreement: Agreement = facts.require_updated()?.to_entity()?;
            vec![HistoryDraft::new(
                SubjectRef::agreement(agreement.id),
                HistoryType::AgreementUpdated,
                "Agreement Updated",
                format!(
                    "{user} edited the agreement: {}",
                    describe_changes(&facts.changes)
                ),
            )]
        }
        EventType::DeleteAgreement => {
            let agreement: Agreement = facts.require_deleted()?.to_entity()?;
            vec![HistoryDraft::new(
                SubjectRef::agreement(agreement.id),
                HistoryType::AgreementDeleted,
                "Agreement Deleted",
                format!("{user} deleted agreement {}", agreement.name),
            )]
        }
        EventType::CreateBli => {
            let line: BudgetLineItem = facts.require_created()?.to_entity()?;
            vec![HistoryDraft::new(
                SubjectRef::agreement(line.agreement_id),
                HistoryType::BudgetLineItemCreated,
                "Budget Line Added",
                format!(
                    "{user} added budget line {} for {}",
                    line.id,
                    describe_value("amount", line.amount.map(FieldValue::from).as_ref())
                ),
            )]
        }
        EventType::UpdateBli if !facts.changes.is_empty() => {
            let line: BudgetLineItem = facts.require_updated()?.to_entity()?;
            let title = if facts.changes.contains("status") {
                "Budget Line Status Changed"
            } else {
                "Budget Line Updated"
            };
            vec![HistoryDraft::new(
                SubjectRef::agreement(line.agreement_id),
                HistoryType::BudgetLineItemUpdated,
                title,
                format!(
                    "{user} edited budget line {}: {}",
                    line.id,
                    describe_changes(&facts.changes)
                ),
            )]
        }
        EventType::DeleteBli => {
            let line: BudgetLineItem = facts.require_deleted()?.to_entity()?;
            vec![HistoryDraft::new(
                SubjectRef::agreement(line.agreement_id),
                HistoryType::BudgetLineItemDeleted,
                "Budget Line Deleted",
                format!("{user} deleted budget line {}", line.id),
            )]
        }
        EventType::CreateChangeRequest => submitted(user, &facts.change_requests),
        EventType::UpdateChangeRequest => resolved(user, &facts.change_requests),
        _ => Vec::new(),
    };
    Ok(drafts)
}

/// One entry per agreement, covering every request the event created.
fn submitted(user: &str, requests: &[ChangeRequest]) -> Vec<HistoryDraft> {
    let mut by_agreement: BTreeMap<u64, Vec<String>> = BTreeMap::new();
    for request in requests {
        if let Some(agreement_id) = request.target.agreement_id() {
            by_agreement.entry(agreement_id).or_default().push(format!(
                "{}: {}",
                describe_target(&request.target),
                describe_changes(&request.requested_change_diff)
            ));
        }
    }
    by_agreement
        .into_iter()
        .map(|(agreement_id, parts)| {
            HistoryDraft::new(
                SubjectRef::agreement(agreement_id),
                HistoryType::ChangeRequestCreated,
                "Change Request Submitted",
                format!(
                    "{user} requested a change for approval on {}",
                    parts.join("; ")
                ),
            )
        })
        .collect()
}

fn resolved(user: &str, requests: &[ChangeRequest]) -> Vec<HistoryDraft> {
    requests
        .iter()
        .filter_map(|request| {
            let agreement_id = request.target.agreement_id()?;
            let (history_type, title, verb) = match request.status {
                ChangeRequestStatus::Approved => {
                    (HistoryType::ChangeRequestApproved, "Change Request Approved", "approved")
                }
                ChangeRequestStatus::Rejected => {
                    (HistoryType::ChangeRequestRejected, "Change Request Rejected", "declined")
                }
                ChangeRequestStatus::InReview => return None,
            };
            Some(HistoryDraft::new(
                SubjectRef::agreement(agreement_id),
                history_type,
                title,
                format!(
                    "{user} {verb} the change to {}: {}",
                    describe_target(&request.target),
                    describe_changes(&request.requested_change_diff)
                ),
            ))
        })
        .collect()
}
