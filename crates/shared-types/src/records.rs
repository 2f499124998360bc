//! # Records
//!
//! Rows the core writes through the persistence mapper:
//!
//! - [`AuditRecord`]: one per (entity, mutation), immutable.
//! - [`DomainEvent`]: one per logical operation.
//! - [`DerivedHistoryEntry`]: one per (subject, event), append-only.
//! - [`ChangeRequest`]: a pending or resolved approval.
//! - [`Notification`]: a message for one recipient.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{EntityKey, FieldMap, FieldValue, RowKey};
use crate::errors::{CoreError, CoreResult};
use crate::security::ActorId;

// =============================================================================
// CHANGE SETS
// =============================================================================

/// Before/after pair for a single field. `None` means the field was unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Option<FieldValue>,
    pub new: Option<FieldValue>,
}

impl FieldChange {
    pub fn new(old: Option<FieldValue>, new: Option<FieldValue>) -> Self {
        Self { old, new }
    }
}

/// Ordered mapping of field name to [`FieldChange`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, FieldChange>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, change: FieldChange) {
        self.0.insert(field.into(), change);
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Subset of this change set limited to `fields`.
    pub fn restricted_to<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> ChangeSet {
        let mut subset = ChangeSet::new();
        for field in fields {
            if let Some(change) = self.0.get(field) {
                subset.insert(field, change.clone());
            }
        }
        subset
    }

    /// New values of every changed field, as a partial update.
    pub fn new_values(&self) -> FieldMap {
        self.0
            .iter()
            .map(|(field, change)| {
                (
                    field.clone(),
                    change.new.clone().unwrap_or(FieldValue::Null),
                )
            })
            .collect()
    }
}

impl FromIterator<(String, FieldChange)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (String, FieldChange)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// AUDIT RECORDS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOperation {
    New,
    Updated,
    Deleted,
}

/// Field-level record of one entity mutation. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub class_name: String,
    pub row_key: RowKey,
    pub operation: AuditOperation,
    pub changes: ChangeSet,
    pub created_by: ActorId,
    pub created_on: DateTime<Utc>,
    /// Domain event of the operation that caused this mutation.
    pub linked_event_id: Option<Uuid>,
}

impl AuditRecord {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.class_name.clone(), self.row_key)
    }
}

// =============================================================================
// DOMAIN EVENTS
// =============================================================================

/// Closed set of logical operations that emit a [`DomainEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    CreateAgreement,
    UpdateAgreement,
    DeleteAgreement,
    CreateBli,
    UpdateBli,
    DeleteBli,
    CreateCan,
    UpdateCan,
    DeleteCan,
    CreateCanFundingReceived,
    UpdateCanFundingReceived,
    DeleteCanFundingReceived,
    CreateCanFundingBudget,
    UpdateCanFundingBudget,
    DeleteCanFundingBudget,
    CreateChangeRequest,
    UpdateChangeRequest,
}

impl EventType {
    pub const ALL: [EventType; 17] = [
        Self::CreateAgreement,
        Self::UpdateAgreement,
        Self::DeleteAgreement,
        Self::CreateBli,
        Self::UpdateBli,
        Self::DeleteBli,
        Self::CreateCan,
        Self::UpdateCan,
        Self::DeleteCan,
        Self::CreateCanFundingReceived,
        Self::UpdateCanFundingReceived,
        Self::DeleteCanFundingReceived,
        Self::CreateCanFundingBudget,
        Self::UpdateCanFundingBudget,
        Self::DeleteCanFundingBudget,
        Self::CreateChangeRequest,
        Self::UpdateChangeRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateAgreement => "CREATE_AGREEMENT",
            Self::UpdateAgreement => "UPDATE_AGREEMENT",
            Self::DeleteAgreement => "DELETE_AGREEMENT",
            Self::CreateBli => "CREATE_BLI",
            Self::UpdateBli => "UPDATE_BLI",
            Self::DeleteBli => "DELETE_BLI",
            Self::CreateCan => "CREATE_CAN",
            Self::UpdateCan => "UPDATE_CAN",
            Self::DeleteCan => "DELETE_CAN",
            Self::CreateCanFundingReceived => "CREATE_CAN_FUNDING_RECEIVED",
            Self::UpdateCanFundingReceived => "UPDATE_CAN_FUNDING_RECEIVED",
            Self::DeleteCanFundingReceived => "DELETE_CAN_FUNDING_RECEIVED",
            Self::CreateCanFundingBudget => "CREATE_CAN_FUNDING_BUDGET",
            Self::UpdateCanFundingBudget => "UPDATE_CAN_FUNDING_BUDGET",
            Self::DeleteCanFundingBudget => "DELETE_CAN_FUNDING_BUDGET",
            Self::CreateChangeRequest => "CREATE_CHANGE_REQUEST",
            Self::UpdateChangeRequest => "UPDATE_CHANGE_REQUEST",
        }
    }

    /// Entity class the event's operation mutates, if any.
    pub fn class_name(&self) -> Option<&'static str> {
        match self {
            Self::CreateAgreement | Self::UpdateAgreement | Self::DeleteAgreement => {
                Some("Agreement")
            }
            Self::CreateBli | Self::UpdateBli | Self::DeleteBli => Some("BudgetLineItem"),
            Self::CreateCan | Self::UpdateCan | Self::DeleteCan => Some("CAN"),
            Self::CreateCanFundingReceived
            | Self::UpdateCanFundingReceived
            | Self::DeleteCanFundingReceived => Some("CANFundingReceived"),
            Self::CreateCanFundingBudget
            | Self::UpdateCanFundingBudget
            | Self::DeleteCanFundingBudget => Some("CANFundingBudget"),
            Self::CreateChangeRequest | Self::UpdateChangeRequest => None,
        }
    }

    /// Event emitted when an entity of `class_name` undergoes `operation`.
    pub fn for_mutation(class_name: &str, operation: AuditOperation) -> Option<EventType> {
        use AuditOperation::{Deleted, New, Updated};
        let event_type = match (class_name, operation) {
            ("Agreement", New) => Self::CreateAgreement,
            ("Agreement", Updated) => Self::UpdateAgreement,
            ("Agreement", Deleted) => Self::DeleteAgreement,
            ("BudgetLineItem", New) => Self::CreateBli,
            ("BudgetLineItem", Updated) => Self::UpdateBli,
            ("BudgetLineItem", Deleted) => Self::DeleteBli,
            ("CAN", New) => Self::CreateCan,
            ("CAN", Updated) => Self::UpdateCan,
            ("CAN", Deleted) => Self::DeleteCan,
            ("CANFundingReceived", New) => Self::CreateCanFundingReceived,
            ("CANFundingReceived", Updated) => Self::UpdateCanFundingReceived,
            ("CANFundingReceived", Deleted) => Self::DeleteCanFundingReceived,
            ("CANFundingBudget", New) => Self::CreateCanFundingBudget,
            ("CANFundingBudget", Updated) => Self::UpdateCanFundingBudget,
            ("CANFundingBudget", Deleted) => Self::DeleteCanFundingBudget,
            _ => return None,
        };
        Some(event_type)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Success,
    Failed,
    Unknown,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Well-known keys inside [`EventDetails`].
pub mod detail_keys {
    pub const USER: &str = "user";
    pub const REQUEST: &str = "request";
    pub const ERROR_TYPE: &str = "error_type";
    pub const ERROR_MESSAGE: &str = "error_message";
    /// Snapshot of the entity an operation created.
    pub const NEW: &str = "new";
    /// Snapshot of the entity an operation deleted.
    pub const DELETED: &str = "deleted";
    /// Snapshot of the entity after an update.
    pub const UPDATED: &str = "updated";
    /// [`ChangeSet`](super::ChangeSet) an update applied.
    pub const CHANGES: &str = "changes";
    /// Change requests created or resolved by the operation.
    pub const CHANGE_REQUESTS: &str = "change_requests";
}

/// Free-form structured payload attached to a [`DomainEvent`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventDetails(serde_json::Map<String, serde_json::Value>);

impl EventDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_value(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> CoreResult<()> {
        let value =
            serde_json::to_value(value).map_err(|e| CoreError::Serialization(e.to_string()))?;
        self.0.insert(key.into(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Decode a required entry.
    pub fn decode<T: DeserializeOwned>(&self, key: &str) -> CoreResult<T> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| CoreError::Serialization(format!("event details lack `{key}`")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Serialization(format!("event details `{key}`: {e}")))
    }

    /// Decode an optional entry; a present but malformed entry is an error.
    pub fn decode_opt<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        if self.0.contains_key(key) {
            self.decode(key).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Display name of the actor captured by the event tracker.
    pub fn user_name(&self) -> Option<&str> {
        self.0
            .get(detail_keys::USER)
            .and_then(|user| user.get("full_name"))
            .and_then(serde_json::Value::as_str)
    }
}

/// Persisted outcome of one logical operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub event_type: EventType,
    pub event_status: EventStatus,
    pub created_by: ActorId,
    pub created_on: DateTime<Utc>,
    pub details: EventDetails,
}

// =============================================================================
// DERIVED HISTORY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectKind {
    Agreement,
    Can,
}

/// Aggregate a history entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub id: u64,
}

impl SubjectRef {
    pub fn agreement(id: u64) -> Self {
        Self {
            kind: SubjectKind::Agreement,
            id,
        }
    }

    pub fn can(id: u64) -> Self {
        Self {
            kind: SubjectKind::Can,
            id,
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryType {
    AgreementCreated,
    AgreementUpdated,
    AgreementDeleted,
    BudgetLineItemCreated,
    BudgetLineItemUpdated,
    BudgetLineItemDeleted,
    ChangeRequestCreated,
    ChangeRequestApproved,
    ChangeRequestRejected,
    CanCreated,
    CanNicknameEdited,
    CanDescriptionEdited,
    CanFundingCreated,
    CanFundingEdited,
    CanFundingDeleted,
    CanReceivedCreated,
    CanReceivedEdited,
    CanReceivedDeleted,
}

/// Aggregate-scoped, human-readable timeline row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedHistoryEntry {
    pub id: Uuid,
    pub subject: SubjectRef,
    pub event_id: Uuid,
    pub history_type: HistoryType,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// CHANGE REQUESTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeRequestStatus {
    InReview,
    Approved,
    Rejected,
}

impl ChangeRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InReview => "IN_REVIEW",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InReview)
    }

    /// Apply a review decision. Only `IN_REVIEW` may move, and only once.
    pub fn apply(self, decision: ReviewDecision) -> CoreResult<ChangeRequestStatus> {
        let target = decision.status();
        match self {
            Self::InReview => Ok(target),
            terminal => Err(CoreError::IllegalStateTransition {
                from: terminal.as_str().to_string(),
                to: target.as_str().to_string(),
            }),
        }
    }
}

impl fmt::Display for ChangeRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub fn status(&self) -> ChangeRequestStatus {
        match self {
            Self::Approved => ChangeRequestStatus::Approved,
            Self::Rejected => ChangeRequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeRequestKind {
    Generic,
    Agreement,
    BudgetLineItem,
}

/// Entity a change request would mutate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeRequestTarget {
    Generic { key: EntityKey },
    Agreement { agreement_id: u64 },
    BudgetLineItem { budget_line_item_id: u64, agreement_id: u64 },
}

impl ChangeRequestTarget {
    pub fn kind(&self) -> ChangeRequestKind {
        match self {
            Self::Generic { .. } => ChangeRequestKind::Generic,
            Self::Agreement { .. } => ChangeRequestKind::Agreement,
            Self::BudgetLineItem { .. } => ChangeRequestKind::BudgetLineItem,
        }
    }

    pub fn entity_key(&self) -> EntityKey {
        match self {
            Self::Generic { key } => key.clone(),
            Self::Agreement { agreement_id } => EntityKey::new("Agreement", *agreement_id),
            Self::BudgetLineItem {
                budget_line_item_id,
                ..
            } => EntityKey::new("BudgetLineItem", *budget_line_item_id),
        }
    }

    /// Agreement whose timeline records this change request.
    pub fn agreement_id(&self) -> Option<u64> {
        match self {
            Self::Generic { .. } => None,
            Self::Agreement { agreement_id } | Self::BudgetLineItem { agreement_id, .. } => {
                Some(*agreement_id)
            }
        }
    }
}

/// A pending or resolved approval for a gated mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: Uuid,
    pub kind: ChangeRequestKind,
    pub status: ChangeRequestStatus,
    pub target: ChangeRequestTarget,
    /// Name of the gate rule that held the change.
    pub gate: String,
    pub requested_change_data: FieldMap,
    pub requested_change_diff: ChangeSet,
    pub requestor_notes: Option<String>,
    pub created_by: ActorId,
    pub created_on: DateTime<Utc>,
    pub reviewed_by: Option<ActorId>,
    pub reviewed_on: Option<DateTime<Utc>>,
    pub reviewer_notes: Option<String>,
}

impl ChangeRequest {
    /// New `IN_REVIEW` request. Refuses an empty diff.
    pub fn in_review(
        target: ChangeRequestTarget,
        gate: impl Into<String>,
        diff: ChangeSet,
        requestor_notes: Option<String>,
        created_by: ActorId,
        created_on: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if diff.is_empty() {
            return Err(CoreError::invalid(
                "requested_change_diff",
                "a change request needs at least one changed field",
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            kind: target.kind(),
            status: ChangeRequestStatus::InReview,
            target,
            gate: gate.into(),
            requested_change_data: diff.new_values(),
            requested_change_diff: diff,
            requestor_notes,
            created_by,
            created_on,
            reviewed_by: None,
            reviewed_on: None,
            reviewer_notes: None,
        })
    }

    pub fn is_in_review(&self) -> bool {
        self.status == ChangeRequestStatus::InReview
    }
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: ActorId,
    pub title: String,
    pub message: String,
    pub created_on: DateTime<Utc>,
    pub is_read: bool,
    pub change_request_id: Option<Uuid>,
}

// =============================================================================
// QUERIES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// "History for subject X, paginated, ordered by timestamp."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub subject: SubjectRef,
    pub offset: usize,
    pub limit: usize,
    pub order: SortOrder,
}

impl HistoryQuery {
    pub const DEFAULT_LIMIT: usize = 10;

    pub fn for_subject(subject: SubjectRef) -> Self {
        Self {
            subject,
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
            order: SortOrder::Descending,
        }
    }

    #[must_use]
    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }
}

/// "Change requests by status/target."
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequestQuery {
    pub status: Option<ChangeRequestStatus>,
    pub target: Option<EntityKey>,
}

impl ChangeRequestQuery {
    pub fn in_review_for(target: EntityKey) -> Self {
        Self {
            status: Some(ChangeRequestStatus::InReview),
            target: Some(target),
        }
    }

    pub fn matches(&self, request: &ChangeRequest) -> bool {
        self.status.is_none_or(|s| s == request.status)
            && self
                .target
                .as_ref()
                .is_none_or(|t| *t == request.target.entity_key())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    pub key: Option<EntityKey>,
    pub linked_event_id: Option<Uuid>,
}

impl AuditQuery {
    pub fn for_entity(key: EntityKey) -> Self {
        Self {
            key: Some(key),
            linked_event_id: None,
        }
    }

    pub fn for_event(event_id: Uuid) -> Self {
        Self {
            key: None,
            linked_event_id: Some(event_id),
        }
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.key
            .as_ref()
            .is_none_or(|k| k.class_name == record.class_name && k.row_key == record.row_key)
            && self
                .linked_event_id
                .is_none_or(|id| record.linked_event_id == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_map;

    fn amount_diff() -> ChangeSet {
        let mut diff = ChangeSet::new();
        diff.insert(
            "amount",
            FieldChange::new(Some(FieldValue::Int(100)), Some(FieldValue::Int(500))),
        );
        diff
    }

    #[test]
    fn test_status_moves_out_of_review_once() {
        let approved = ChangeRequestStatus::InReview
            .apply(ReviewDecision::Approved)
            .unwrap();
        assert_eq!(approved, ChangeRequestStatus::Approved);

        let again = approved.apply(ReviewDecision::Rejected);
        assert!(matches!(again, Err(CoreError::IllegalStateTransition { .. })));
    }

    #[test]
    fn test_change_request_requires_delta() {
        let target = ChangeRequestTarget::BudgetLineItem {
            budget_line_item_id: 15,
            agreement_id: 1,
        };
        let created = ChangeRequest::in_review(
            target.clone(),
            "bli-budget-fields",
            ChangeSet::new(),
            None,
            ActorId(2),
            Utc::now(),
        );
        assert!(matches!(created, Err(CoreError::ValidationFailed(_))));

        let created = ChangeRequest::in_review(
            target,
            "bli-budget-fields",
            amount_diff(),
            None,
            ActorId(2),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(created.kind, ChangeRequestKind::BudgetLineItem);
        assert_eq!(created.requested_change_data, field_map! { "amount" => 500_i64 });
        assert!(created.is_in_review());
    }

    #[test]
    fn test_target_key_and_agreement() {
        let target = ChangeRequestTarget::BudgetLineItem {
            budget_line_item_id: 15,
            agreement_id: 3,
        };
        assert_eq!(target.entity_key(), EntityKey::new("BudgetLineItem", 15));
        assert_eq!(target.agreement_id(), Some(3));
        let generic = ChangeRequestTarget::Generic {
            key: EntityKey::new("CAN", 1),
        };
        assert_eq!(generic.agreement_id(), None);
    }

    #[test]
    fn test_event_details_decode() {
        let mut details = EventDetails::new();
        details.insert(detail_keys::CHANGES, &amount_diff()).unwrap();
        let decoded: ChangeSet = details.decode(detail_keys::CHANGES).unwrap();
        assert_eq!(decoded, amount_diff());
        assert!(details.decode::<ChangeSet>("missing").is_err());
        assert_eq!(details.decode_opt::<ChangeSet>("missing").unwrap(), None);
    }

    #[test]
    fn test_event_types_have_unique_names() {
        let mut names: Vec<&str> = EventType::ALL.iter().map(EventType::as_str).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventType::ALL.len());
        let json = serde_json::to_value(EventType::DeleteCanFundingReceived).unwrap();
        assert_eq!(json, serde_json::json!("DELETE_CAN_FUNDING_RECEIVED"));
    }

    #[test]
    fn test_event_type_for_mutation() {
        assert_eq!(
            EventType::for_mutation("CANFundingReceived", AuditOperation::Deleted),
            Some(EventType::DeleteCanFundingReceived)
        );
        assert_eq!(
            EventType::for_mutation("BudgetLineItem", AuditOperation::Updated),
            Some(EventType::UpdateBli)
        );
        assert_eq!(EventType::for_mutation("Notification", AuditOperation::New), None);
        for event_type in EventType::ALL {
            if let Some(class_name) = event_type.class_name() {
                assert!(EventType::for_mutation(class_name, AuditOperation::Updated).is_some());
            }
        }
        assert_eq!(EventType::CreateChangeRequest.class_name(), None);
    }
}
