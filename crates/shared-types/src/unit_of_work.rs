//! # Unit of Work Ports
//!
//! The transactional boundary the core runs inside. A storage backend
//! implements [`UnitOfWork`] (entity mutations, flush/commit/rollback and the
//! event context) together with [`RecordStore`] (the persistence mapper for
//! core records) and [`CurrentActor`].
//!
//! Backends invoke registered [`SessionListener`]s at two points:
//!
//! - after every flush, with the mutations that flush applied;
//! - before commit, before the final flush.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{AuditedEntity, EntityKey, EntityRecord, FieldMap, FieldValue, RowKey};
use crate::errors::{CoreError, CoreResult};
use crate::records::{
    AuditOperation, AuditQuery, AuditRecord, ChangeRequest, ChangeRequestQuery,
    ChangeRequestStatus, DerivedHistoryEntry, DomainEvent, HistoryQuery, HistoryType,
    Notification, SubjectRef,
};
use crate::security::{Actor, ActorId};

/// An entity touched by the current transaction and not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub key: EntityKey,
    pub operation: AuditOperation,
}

/// A mutation made durable within the transaction by a flush.
///
/// `before` is `None` for creations and `after` is `None` for deletions.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushedMutation {
    pub key: EntityKey,
    pub operation: AuditOperation,
    pub before: Option<FieldMap>,
    pub after: Option<FieldMap>,
}

/// Position in a session's uncommitted work, taken by [`UnitOfWork::savepoint`].
///
/// Savepoints nest. Restoring or releasing one invalidates every savepoint
/// taken after it; a commit or full rollback invalidates all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Savepoint(usize);

impl Savepoint {
    pub fn new(depth: usize) -> Self {
        Self(depth)
    }

    /// Number of savepoints that were open when this one was taken.
    pub fn depth(self) -> usize {
        self.0
    }
}

/// Lifecycle callbacks a backend invokes for every session.
pub trait SessionListener: Send + Sync {
    fn name(&self) -> &str;

    fn on_before_commit(&self, _uow: &mut dyn UnitOfWork) -> CoreResult<()> {
        Ok(())
    }

    fn on_after_flush(&self, _uow: &mut dyn UnitOfWork, _flushed: &[FlushedMutation]) {}
}

/// Persistence mapper for the records the core writes.
///
/// Reads observe the current transaction's own writes.
pub trait RecordStore {
    fn insert_audit_record(&mut self, record: AuditRecord) -> CoreResult<()>;
    fn audit_records(&self, query: &AuditQuery) -> CoreResult<Vec<AuditRecord>>;

    fn insert_event(&mut self, event: DomainEvent) -> CoreResult<()>;
    fn event(&self, id: Uuid) -> CoreResult<Option<DomainEvent>>;
    fn events(&self) -> CoreResult<Vec<DomainEvent>>;

    fn insert_history(&mut self, entry: DerivedHistoryEntry) -> CoreResult<()>;
    /// Paginated history of one subject, ordered by timestamp.
    fn history(&self, query: &HistoryQuery) -> CoreResult<Vec<DerivedHistoryEntry>>;
    fn history_exists(
        &self,
        event_id: Uuid,
        subject: SubjectRef,
        history_type: HistoryType,
    ) -> CoreResult<bool>;

    fn insert_change_request(&mut self, request: ChangeRequest) -> CoreResult<()>;
    fn change_request(&self, id: Uuid) -> CoreResult<Option<ChangeRequest>>;
    fn change_requests(&self, query: &ChangeRequestQuery) -> CoreResult<Vec<ChangeRequest>>;
    /// Store `updated` if the request is still in `expected` status.
    ///
    /// Backends re-verify the expectation against committed state at commit,
    /// so at most one concurrent transition of a request succeeds.
    fn transition_change_request(
        &mut self,
        updated: ChangeRequest,
        expected: ChangeRequestStatus,
    ) -> CoreResult<()>;

    fn insert_notification(&mut self, notification: Notification) -> CoreResult<()>;
    fn notifications_for(&self, recipient: ActorId) -> CoreResult<Vec<Notification>>;
}

/// Resolves the authenticated actor of the current session.
pub trait CurrentActor {
    fn current_actor(&self) -> Option<&Actor>;

    /// Actor id recorded on audit rows and events; the system id when anonymous.
    fn current_actor_id(&self) -> ActorId {
        self.current_actor().map_or(ActorId::SYSTEM, |actor| actor.id)
    }
}

/// A transactional session over entities and core records.
pub trait UnitOfWork: RecordStore + CurrentActor {
    fn get(&self, key: &EntityKey) -> CoreResult<Option<EntityRecord>>;

    fn find(
        &self,
        class_name: &str,
        filter: &dyn Fn(&EntityRecord) -> bool,
    ) -> CoreResult<Vec<EntityRecord>>;

    /// Stage a new entity; the backend allocates its row key.
    fn add(&mut self, class_name: &str, fields: FieldMap) -> CoreResult<EntityKey>;

    /// Stage a partial update. Fields absent from `changes` keep their value.
    fn update(&mut self, key: &EntityKey, changes: FieldMap) -> CoreResult<EntityRecord>;

    /// Stage a deletion and return the entity as it was.
    fn delete(&mut self, key: &EntityKey) -> CoreResult<EntityRecord>;

    /// Entities created, modified or deleted by this transaction.
    fn pending(&self) -> Vec<PendingMutation>;

    /// Set a bookkeeping field on an uncommitted entity without producing a
    /// flush.
    fn stamp_pending(&mut self, key: &EntityKey, field: &str, value: FieldValue)
        -> CoreResult<()>;

    fn flush(&mut self) -> CoreResult<()>;

    fn commit(&mut self) -> CoreResult<()>;

    /// Discard every uncommitted mutation and record. The session stays usable.
    fn rollback(&mut self);

    /// Mark the current uncommitted state so later work can be undone alone.
    fn savepoint(&mut self) -> Savepoint;

    /// Discard mutations and records made since `savepoint`, flushed or not.
    ///
    /// FAILED domain events recorded since are kept: they describe work that
    /// was undone, not work that happened.
    fn rollback_to(&mut self, savepoint: Savepoint);

    /// Keep the work done since `savepoint` and forget the mark.
    fn release(&mut self, savepoint: Savepoint);

    fn now(&self) -> DateTime<Utc>;

    /// Id of the domain event the innermost running scope will emit.
    fn event_context(&self) -> Option<Uuid>;

    /// Replace the event context, returning the previous one.
    fn set_event_context(&mut self, event_id: Option<Uuid>) -> Option<Uuid>;
}

/// Typed helpers over any [`UnitOfWork`].
pub trait UnitOfWorkExt: UnitOfWork {
    /// Load an entity or fail with `ResourceNotFound`.
    fn require(&self, key: &EntityKey) -> CoreResult<EntityRecord> {
        self.get(key)?
            .ok_or_else(|| CoreError::not_found(key.class_name.clone(), key.row_key))
    }

    fn load<T: AuditedEntity>(&self, row_key: RowKey) -> CoreResult<T> {
        self.require(&EntityKey::new(T::CLASS_NAME, row_key))?
            .to_entity()
    }

    fn find_entities<T: AuditedEntity>(
        &self,
        filter: &dyn Fn(&T) -> bool,
    ) -> CoreResult<Vec<T>> {
        let mut found = Vec::new();
        for record in self.find(T::CLASS_NAME, &|_| true)? {
            let entity: T = record.to_entity()?;
            if filter(&entity) {
                found.push(entity);
            }
        }
        Ok(found)
    }

    /// Stage a typed entity, ignoring its `row_key`.
    fn add_entity<T: AuditedEntity>(&mut self, entity: &T) -> CoreResult<EntityKey> {
        self.add(T::CLASS_NAME, entity.to_fields())
    }
}

impl<U: UnitOfWork + ?Sized> UnitOfWorkExt for U {}

/// Source of transaction timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type SharedClock = Arc<dyn Clock>;
