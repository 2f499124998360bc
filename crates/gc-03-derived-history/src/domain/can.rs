//! CAN timeline: the fund itself plus its budgets and funding received.

use shared_types::display::{describe_value, format_currency, format_fiscal_year};
use shared_types::{
    Can, CanFundingBudget, CanFundingReceived, CoreResult, EventType, HistoryType, SubjectRef,
};

use super::HistoryDraft;
use crate::facts::EventFacts;

pub const EVENT_TYPES: [EventType; 8] = [
    EventType::CreateCan,
    EventType::UpdateCan,
    EventType::CreateCanFundingBudget,
    EventType::UpdateCanFundingBudget,
    EventType::DeleteCanFundingBudget,
    EventType::CreateCanFundingReceived,
    EventType::UpdateCanFundingReceived,
    EventType::DeleteCanFundingReceived,
];

pub fn drafts(event_type: EventType, facts: &EventFacts) -> CoreResult<Vec<HistoryDraft>> {
    let user = &facts.user;
    let drafts = match event_type {
        EventType::CreateCan => {
            let can: Can = facts.require_created()?.to_entity()?;
            vec![HistoryDraft::new(
                SubjectRef::can(can.id),
                HistoryType::CanCreated,
                "CAN Created",
                format!("{user} created CAN {}", can.number),
            )]
        }
        EventType::UpdateCan => {
            let can: Can = facts.require_updated()?.to_entity()?;
            let subject = SubjectRef::can(can.id);
            let mut drafts = Vec::new();
            if let Some(change) = facts.changes.get("nickname") {
                drafts.push(HistoryDraft::new(
                    subject,
                    HistoryType::CanNicknameEdited,
                    "Nickname Edited",
                    format!(
                        "{user} edited the nickname from {} to {}",
                        describe_value("nickname", change.old.as_ref()),
                        describe_value("nickname", change.new.as_ref())
                    ),
                ));
            }
            if facts.changes.contains("description") {
                drafts.push(HistoryDraft::new(
                    subject,
                    HistoryType::CanDescriptionEdited,
                    "Description Edited",
                    format!("{user} edited the description"),
                ));
            }
            drafts
        }
        EventType::CreateCanFundingBudget => {
            let budget: CanFundingBudget = facts.require_created()?.to_entity()?;
            let fy = format_fiscal_year(budget.fiscal_year);
            vec![HistoryDraft::new(
                SubjectRef::can(budget.can_id),
                HistoryType::CanFundingCreated,
                format!("{fy} Budget Entered"),
                format!(
                    "{user} entered a {fy} budget of {}",
                    format_currency(budget.budget)
                ),
            )]
        }
        EventType::UpdateCanFundingBudget => {
            let budget: CanFundingBudget = facts.require_updated()?.to_entity()?;
            let fy = format_fiscal_year(budget.fiscal_year);
            match facts.changes.get("budget") {
                Some(change) => vec![HistoryDraft::new(
                    SubjectRef::can(budget.can_id),
                    HistoryType::CanFundingEdited,
                    format!("{fy} Budget Edited"),
                    format!(
                        "{user} edited the {fy} budget from {} to {}",
                        describe_value("budget", change.old.as_ref()),
                        describe_value("budget", change.new.as_ref())
                    ),
                )],
                None => Vec::new(),
            }
        }
        EventType::DeleteCanFundingBudget => {
            let budget: CanFundingBudget = facts.require_deleted()?.to_entity()?;
            let fy = format_fiscal_year(budget.fiscal_year);
            vec![HistoryDraft::new(
                SubjectRef::can(budget.can_id),
                HistoryType::CanFundingDeleted,
                format!("{fy} Budget Deleted"),
                format!(
                    "{user} deleted the {fy} budget of {}",
                    format_currency(budget.budget)
                ),
            )]
        }
        EventType::CreateCanFundingReceived => {
            let received: CanFundingReceived = facts.require_created()?.to_entity()?;
            vec![HistoryDraft::new(
                SubjectRef::can(received.can_id),
                HistoryType::CanReceivedCreated,
                "Funding Received Added",
                format!(
                    "{user} added funding received to funding ID {} in the amount of {}",
                    received.id,
                    format_currency(received.funding)
                ),
            )]
        }
        EventType::UpdateCanFundingReceived => {
            let received: CanFundingReceived = facts.require_updated()?.to_entity()?;
            match facts.changes.get("funding") {
                Some(change) => vec![HistoryDraft::new(
                    SubjectRef::can(received.can_id),
                    HistoryType::CanReceivedEdited,
                    "Funding Received Edited",
                    format!(
                        "{user} edited funding received for funding ID {} from {} to {}",
                        received.id,
                        describe_value("funding", change.old.as_ref()),
                        describe_value("funding", change.new.as_ref())
                    ),
                )],
                None => Vec::new(),
            }
        }
        EventType::DeleteCanFundingReceived => {
            let received: CanFundingReceived = facts.require_deleted()?.to_entity()?;
            vec![HistoryDraft::new(
                SubjectRef::can(received.can_id),
                HistoryType::CanReceivedDeleted,
                "Funding Received Deleted",
                format!(
                    "{user} deleted funding received for funding ID {} in the amount of {}",
                    received.id,
                    format_currency(received.funding)
                ),
            )]
        }
        _ => Vec::new(),
    };
    Ok(drafts)
}
