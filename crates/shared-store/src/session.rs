use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared_types::{
    Actor, ActorId, AuditOperation, AuditQuery, AuditRecord, ChangeRequest, ChangeRequestQuery,
    ChangeRequestStatus, CoreError, CoreResult, CurrentActor, DerivedHistoryEntry, DomainEvent,
    EntityKey, EntityRecord, EventStatus, FieldMap, FieldValue, FlushedMutation, HistoryQuery,
    HistoryType, Notification, PendingMutation, RecordStore, Savepoint, SessionListener,
    SubjectRef, UnitOfWork,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::InMemoryDatabase;
use crate::tables::{merge_change_requests, page_history, RecordTables};

/// A staged entity mutation awaiting flush.
#[derive(Debug, Clone)]
enum Staged {
    New(FieldMap),
    Dirty(FieldMap),
    Deleted,
}

/// Uncommitted state captured by a savepoint.
#[derive(Debug, Clone)]
struct Snapshot {
    staged: BTreeMap<EntityKey, Staged>,
    buffer: BTreeMap<EntityKey, Option<FieldMap>>,
    touched: BTreeMap<EntityKey, AuditOperation>,
    records: RecordTables,
    expected_statuses: BTreeMap<Uuid, ChangeRequestStatus>,
}

/// One transaction against an [`InMemoryDatabase`].
pub struct Session {
    db: InMemoryDatabase,
    listeners: Vec<Arc<dyn SessionListener>>,
    actor: Option<Actor>,
    staged: BTreeMap<EntityKey, Staged>,
    /// Flushed, uncommitted entity state; `None` marks a deletion.
    buffer: BTreeMap<EntityKey, Option<FieldMap>>,
    /// Operation each flushed entity has undergone in this transaction.
    touched: BTreeMap<EntityKey, AuditOperation>,
    records: RecordTables,
    /// Status each updated change request must still have at commit.
    expected_statuses: BTreeMap<Uuid, ChangeRequestStatus>,
    savepoints: Vec<Snapshot>,
    event_context: Option<Uuid>,
}

impl Session {
    pub(crate) fn new(
        db: InMemoryDatabase,
        listeners: Vec<Arc<dyn SessionListener>>,
        actor: Option<Actor>,
    ) -> Self {
        Self {
            db,
            listeners,
            actor,
            staged: BTreeMap::new(),
            buffer: BTreeMap::new(),
            touched: BTreeMap::new(),
            records: RecordTables::default(),
            expected_statuses: BTreeMap::new(),
            savepoints: Vec::new(),
            event_context: None,
        }
    }

    /// Whether the transaction holds anything to commit.
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.buffer.is_empty() && self.records.is_empty()
    }

    /// Entity state ignoring staged mutations.
    fn flushed_view(&self, key: &EntityKey) -> Option<FieldMap> {
        match self.buffer.get(key) {
            Some(state) => state.clone(),
            None => self.db.committed.lock().entities.get(key).cloned(),
        }
    }

    fn view(&self, key: &EntityKey) -> Option<FieldMap> {
        match self.staged.get(key) {
            Some(Staged::New(fields) | Staged::Dirty(fields)) => Some(fields.clone()),
            Some(Staged::Deleted) => None,
            None => self.flushed_view(key),
        }
    }

    fn reset(&mut self) {
        self.staged.clear();
        self.buffer.clear();
        self.touched.clear();
        self.records = RecordTables::default();
        self.expected_statuses.clear();
        self.savepoints.clear();
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            staged: self.staged.clone(),
            buffer: self.buffer.clone(),
            touched: self.touched.clone(),
            records: self.records.clone(),
            expected_statuses: self.expected_statuses.clone(),
        }
    }

    fn apply_commit(&mut self) -> CoreResult<()> {
        let mut committed = self.db.committed.lock();

        for (id, expected) in &self.expected_statuses {
            if let Some(current) = committed.records.change_request(*id) {
                if current.status != *expected {
                    return Err(CoreError::Conflict(format!(
                        "change request {id} is {} but this transaction expected {}",
                        current.status, expected
                    )));
                }
            }
        }

        for (key, state) in std::mem::take(&mut self.buffer) {
            match state {
                Some(fields) => {
                    committed.entities.insert(key, fields);
                }
                None => {
                    committed.entities.remove(&key);
                }
            }
        }
        committed
            .records
            .absorb(std::mem::take(&mut self.records));
        Ok(())
    }
}

impl CurrentActor for Session {
    fn current_actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }
}

impl UnitOfWork for Session {
    fn get(&self, key: &EntityKey) -> CoreResult<Option<EntityRecord>> {
        Ok(self
            .view(key)
            .map(|fields| EntityRecord::new(key.clone(), fields)))
    }

    fn find(
        &self,
        class_name: &str,
        filter: &dyn Fn(&EntityRecord) -> bool,
    ) -> CoreResult<Vec<EntityRecord>> {
        let mut keys: Vec<EntityKey> = self
            .db
            .committed
            .lock()
            .entities
            .keys()
            .filter(|k| k.class_name == class_name)
            .cloned()
            .collect();
        keys.extend(
            self.buffer
                .keys()
                .chain(self.staged.keys())
                .filter(|k| k.class_name == class_name)
                .cloned(),
        );
        keys.sort();
        keys.dedup();

        Ok(keys
            .into_iter()
            .filter_map(|key| self.view(&key).map(|fields| EntityRecord::new(key, fields)))
            .filter(|record| filter(record))
            .collect())
    }

    fn add(&mut self, class_name: &str, fields: FieldMap) -> CoreResult<EntityKey> {
        let row_key = self.db.committed.lock().allocate_row_key(class_name);
        let key = EntityKey::new(class_name, row_key);
        self.staged.insert(key.clone(), Staged::New(fields));
        Ok(key)
    }

    fn update(&mut self, key: &EntityKey, changes: FieldMap) -> CoreResult<EntityRecord> {
        let mut fields = self
            .view(key)
            .ok_or_else(|| CoreError::not_found(key.class_name.clone(), key.row_key))?;
        fields.extend(changes);

        let staged = match self.staged.get(key) {
            Some(Staged::New(_)) => Staged::New(fields.clone()),
            _ => Staged::Dirty(fields.clone()),
        };
        self.staged.insert(key.clone(), staged);
        Ok(EntityRecord::new(key.clone(), fields))
    }

    fn delete(&mut self, key: &EntityKey) -> CoreResult<EntityRecord> {
        let fields = self
            .view(key)
            .ok_or_else(|| CoreError::not_found(key.class_name.clone(), key.row_key))?;

        if matches!(self.staged.get(key), Some(Staged::New(_))) && self.flushed_view(key).is_none()
        {
            // Never flushed: the creation simply disappears.
            self.staged.remove(key);
        } else {
            self.staged.insert(key.clone(), Staged::Deleted);
        }
        Ok(EntityRecord::new(key.clone(), fields))
    }

    fn pending(&self) -> Vec<PendingMutation> {
        let mut operations = self.touched.clone();
        for (key, staged) in &self.staged {
            let operation = match (staged, operations.get(key)) {
                (Staged::Deleted, _) => AuditOperation::Deleted,
                (Staged::New(_), _) | (Staged::Dirty(_), Some(AuditOperation::New)) => {
                    AuditOperation::New
                }
                (Staged::Dirty(_), _) => AuditOperation::Updated,
            };
            operations.insert(key.clone(), operation);
        }
        operations
            .into_iter()
            .map(|(key, operation)| PendingMutation { key, operation })
            .collect()
    }

    fn stamp_pending(
        &mut self,
        key: &EntityKey,
        field: &str,
        value: FieldValue,
    ) -> CoreResult<()> {
        if let Some(Staged::New(fields) | Staged::Dirty(fields)) = self.staged.get_mut(key) {
            fields.insert(field.to_string(), value.clone());
        }
        match self.buffer.get_mut(key) {
            Some(Some(fields)) => {
                fields.insert(field.to_string(), value);
                Ok(())
            }
            Some(None) => Ok(()),
            None if self.staged.contains_key(key) => Ok(()),
            None => Err(CoreError::not_found(key.class_name.clone(), key.row_key)),
        }
    }

    fn flush(&mut self) -> CoreResult<()> {
        if self.staged.is_empty() {
            return Ok(());
        }

        let staged = std::mem::take(&mut self.staged);
        let mut flushed = Vec::with_capacity(staged.len());
        for (key, mutation) in staged {
            let before = self.flushed_view(&key);
            let prior = self.touched.get(&key).copied();
            let (operation, after) = match mutation {
                Staged::New(fields) => (AuditOperation::New, Some(fields)),
                Staged::Dirty(fields) => (AuditOperation::Updated, Some(fields)),
                Staged::Deleted => (AuditOperation::Deleted, None),
            };

            let overall = match (prior, operation) {
                (Some(AuditOperation::New), AuditOperation::Updated) => AuditOperation::New,
                (_, op) => op,
            };
            self.touched.insert(key.clone(), overall);
            self.buffer.insert(key.clone(), after.clone());

            flushed.push(FlushedMutation {
                key,
                operation,
                before: if operation == AuditOperation::New {
                    None
                } else {
                    before
                },
                after,
            });
        }

        debug!(mutations = flushed.len(), "Session flushed");
        let listeners = self.listeners.clone();
        for listener in &listeners {
            listener.on_after_flush(self, &flushed);
        }
        Ok(())
    }

    fn commit(&mut self) -> CoreResult<()> {
        let listeners = self.listeners.clone();
        for listener in &listeners {
            if let Err(e) = listener.on_before_commit(self) {
                warn!(listener = listener.name(), error = %e, "Before-commit hook failed");
                self.rollback();
                return Err(e);
            }
        }

        if let Err(e) = self.flush() {
            self.rollback();
            return Err(e);
        }

        let result = self.apply_commit();
        match &result {
            Ok(()) => debug!(actor = %self.current_actor_id(), "Session committed"),
            Err(e) => warn!(error = %e, "Commit refused"),
        }
        self.reset();
        result
    }

    fn rollback(&mut self) {
        if !self.is_clean() {
            debug!(
                staged = self.staged.len(),
                flushed = self.buffer.len(),
                "Session rolled back"
            );
        }
        self.reset();
    }

    fn savepoint(&mut self) -> Savepoint {
        let savepoint = Savepoint::new(self.savepoints.len());
        self.savepoints.push(self.snapshot());
        savepoint
    }

    fn rollback_to(&mut self, savepoint: Savepoint) {
        if savepoint.depth() >= self.savepoints.len() {
            warn!(depth = savepoint.depth(), "Rollback to a savepoint no longer open");
            return;
        }
        self.savepoints.truncate(savepoint.depth() + 1);
        let Some(snapshot) = self.savepoints.pop() else {
            return;
        };

        let failed: Vec<DomainEvent> = self
            .records
            .events
            .iter()
            .skip(snapshot.records.events.len())
            .filter(|event| event.event_status == EventStatus::Failed)
            .cloned()
            .collect();
        debug!(
            depth = savepoint.depth(),
            staged = self.staged.len(),
            kept_failed_events = failed.len(),
            "Session rolled back to savepoint"
        );

        self.staged = snapshot.staged;
        self.buffer = snapshot.buffer;
        self.touched = snapshot.touched;
        self.records = snapshot.records;
        self.expected_statuses = snapshot.expected_statuses;
        self.records.events.extend(failed);
    }

    fn release(&mut self, savepoint: Savepoint) {
        self.savepoints.truncate(savepoint.depth());
    }

    fn now(&self) -> DateTime<Utc> {
        self.db.clock.now()
    }

    fn event_context(&self) -> Option<Uuid> {
        self.event_context
    }

    fn set_event_context(&mut self, event_id: Option<Uuid>) -> Option<Uuid> {
        std::mem::replace(&mut self.event_context, event_id)
    }
}

impl RecordStore for Session {
    fn insert_audit_record(&mut self, record: AuditRecord) -> CoreResult<()> {
        if self.db.faults.audit_fails(&record.class_name) {
            return Err(CoreError::Storage(format!(
                "audit table rejected {}",
                record.key()
            )));
        }
        self.records.audit.push(record);
        Ok(())
    }

    fn audit_records(&self, query: &AuditQuery) -> CoreResult<Vec<AuditRecord>> {
        let mut found: Vec<AuditRecord> = self
            .db
            .committed
            .lock()
            .records
            .audit_matching(query)
            .cloned()
            .collect();
        found.extend(self.records.audit_matching(query).cloned());
        Ok(found)
    }

    fn insert_event(&mut self, event: DomainEvent) -> CoreResult<()> {
        if self.db.faults.events_fail() {
            return Err(CoreError::Storage(format!(
                "event table rejected {}",
                event.id
            )));
        }
        self.records.events.push(event);
        Ok(())
    }

    fn event(&self, id: Uuid) -> CoreResult<Option<DomainEvent>> {
        if let Some(event) = self.records.events.iter().find(|e| e.id == id) {
            return Ok(Some(event.clone()));
        }
        Ok(self.db.event(id))
    }

    fn events(&self) -> CoreResult<Vec<DomainEvent>> {
        let mut events = self.db.events();
        events.extend(self.records.events.iter().cloned());
        Ok(events)
    }

    fn insert_history(&mut self, entry: DerivedHistoryEntry) -> CoreResult<()> {
        if self.db.faults.history_fails() {
            return Err(CoreError::Storage(format!(
                "history table rejected entry for {}",
                entry.subject
            )));
        }
        self.records.history.push(entry);
        Ok(())
    }

    fn history(&self, query: &HistoryQuery) -> CoreResult<Vec<DerivedHistoryEntry>> {
        let committed = self.db.committed.lock();
        Ok(page_history(
            committed
                .records
                .history
                .iter()
                .chain(self.records.history.iter()),
            query,
        ))
    }

    fn history_exists(
        &self,
        event_id: Uuid,
        subject: SubjectRef,
        history_type: HistoryType,
    ) -> CoreResult<bool> {
        Ok(self.records.history_exists(event_id, subject, history_type)
            || self
                .db
                .committed
                .lock()
                .records
                .history_exists(event_id, subject, history_type))
    }

    fn insert_change_request(&mut self, request: ChangeRequest) -> CoreResult<()> {
        if self.change_request(request.id)?.is_some() {
            return Err(CoreError::Conflict(format!(
                "change request {} already exists",
                request.id
            )));
        }
        self.records.change_requests.push(request);
        Ok(())
    }

    fn change_request(&self, id: Uuid) -> CoreResult<Option<ChangeRequest>> {
        if let Some(request) = self.records.change_request(id) {
            return Ok(Some(request.clone()));
        }
        Ok(self.db.change_request(id))
    }

    fn change_requests(&self, query: &ChangeRequestQuery) -> CoreResult<Vec<ChangeRequest>> {
        let committed = self.db.committed.lock();
        Ok(merge_change_requests(
            &committed.records.change_requests,
            &self.records.change_requests,
            query,
        ))
    }

    fn transition_change_request(
        &mut self,
        updated: ChangeRequest,
        expected: ChangeRequestStatus,
    ) -> CoreResult<()> {
        let current = self
            .change_request(updated.id)?
            .ok_or_else(|| CoreError::not_found("ChangeRequest", updated.id))?;
        if current.status != expected {
            return Err(CoreError::IllegalStateTransition {
                from: current.status.to_string(),
                to: updated.status.to_string(),
            });
        }
        self.expected_statuses.entry(updated.id).or_insert(expected);
        self.records.upsert_change_request(updated);
        Ok(())
    }

    fn insert_notification(&mut self, notification: Notification) -> CoreResult<()> {
        self.records.notifications.push(notification);
        Ok(())
    }

    fn notifications_for(&self, recipient: ActorId) -> CoreResult<Vec<Notification>> {
        let mut found = self.db.notifications_for(recipient);
        found.extend(self.records.notifications_for(recipient).cloned());
        Ok(found)
    }
}
