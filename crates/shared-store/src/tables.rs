//! Record tables shared by committed state and session buffers.

use std::cmp::Reverse;

use shared_types::{
    ActorId, AuditQuery, AuditRecord, ChangeRequest, ChangeRequestQuery, DerivedHistoryEntry,
    DomainEvent, HistoryQuery, HistoryType, Notification, SortOrder, SubjectRef,
};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub(crate) struct RecordTables {
    pub audit: Vec<AuditRecord>,
    pub events: Vec<DomainEvent>,
    pub history: Vec<DerivedHistoryEntry>,
    pub change_requests: Vec<ChangeRequest>,
    pub notifications: Vec<Notification>,
}

impl RecordTables {
    pub fn is_empty(&self) -> bool {
        self.audit.is_empty()
            && self.events.is_empty()
            && self.history.is_empty()
            && self.change_requests.is_empty()
            && self.notifications.is_empty()
    }

    /// Append `other`, replacing change requests by id.
    pub fn absorb(&mut self, other: RecordTables) {
        self.audit.extend(other.audit);
        self.events.extend(other.events);
        self.history.extend(other.history);
        self.notifications.extend(other.notifications);
        for request in other.change_requests {
            self.upsert_change_request(request);
        }
    }

    pub fn upsert_change_request(&mut self, request: ChangeRequest) {
        match self.change_requests.iter_mut().find(|r| r.id == request.id) {
            Some(existing) => *existing = request,
            None => self.change_requests.push(request),
        }
    }

    pub fn change_request(&self, id: Uuid) -> Option<&ChangeRequest> {
        self.change_requests.iter().find(|r| r.id == id)
    }

    pub fn audit_matching<'a>(
        &'a self,
        query: &'a AuditQuery,
    ) -> impl Iterator<Item = &'a AuditRecord> + 'a {
        self.audit.iter().filter(move |r| query.matches(r))
    }

    pub fn history_exists(
        &self,
        event_id: Uuid,
        subject: SubjectRef,
        history_type: HistoryType,
    ) -> bool {
        self.history.iter().any(|h| {
            h.event_id == event_id && h.subject == subject && h.history_type == history_type
        })
    }

    pub fn notifications_for(&self, recipient: ActorId) -> impl Iterator<Item = &Notification> {
        self.notifications
            .iter()
            .filter(move |n| n.recipient_id == recipient)
    }
}

/// Order, then page, the history rows of one subject.
///
/// `entries` must be in creation order; ties on timestamp keep it (ascending)
/// or reverse it (descending).
pub(crate) fn page_history<'a>(
    entries: impl Iterator<Item = &'a DerivedHistoryEntry>,
    query: &HistoryQuery,
) -> Vec<DerivedHistoryEntry> {
    let mut rows: Vec<(usize, &DerivedHistoryEntry)> = entries
        .filter(|h| h.subject == query.subject)
        .enumerate()
        .collect();
    match query.order {
        SortOrder::Ascending => rows.sort_by_key(|(seq, h)| (h.timestamp, *seq)),
        SortOrder::Descending => rows.sort_by_key(|(seq, h)| Reverse((h.timestamp, *seq))),
    }
    rows.into_iter()
        .skip(query.offset)
        .take(query.limit)
        .map(|(_, h)| h.clone())
        .collect()
}

/// Change requests matching `query`, with later versions replacing earlier
/// ones by id.
pub(crate) fn merge_change_requests<'a>(
    committed: &'a [ChangeRequest],
    session: &'a [ChangeRequest],
    query: &ChangeRequestQuery,
) -> Vec<ChangeRequest> {
    let mut merged: Vec<ChangeRequest> = committed
        .iter()
        .map(|r| session.iter().find(|s| s.id == r.id).unwrap_or(r).clone())
        .collect();
    merged.extend(
        session
            .iter()
            .filter(|s| !committed.iter().any(|r| r.id == s.id))
            .cloned(),
    );
    merged.retain(|r| query.matches(r));
    merged
}
