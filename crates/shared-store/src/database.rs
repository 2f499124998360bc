use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use shared_types::{
    Actor, ActorId, AuditQuery, AuditRecord, AuditedEntity, ChangeRequest, ChangeRequestQuery,
    Clock, DerivedHistoryEntry, DomainEvent, EntityKey, EntityRecord, FieldMap, HistoryQuery,
    Notification, RowKey, SessionListener, SharedClock, SystemClock,
};
use tracing::debug;
use uuid::Uuid;

use crate::faults::Faults;
use crate::session::Session;
use crate::tables::{merge_change_requests, page_history, RecordTables};

/// Durable state: entities and record tables as of the last commit.
#[derive(Debug, Default)]
pub(crate) struct Committed {
    pub entities: BTreeMap<EntityKey, FieldMap>,
    pub next_row_key: HashMap<String, RowKey>,
    pub records: RecordTables,
}

impl Committed {
    pub fn allocate_row_key(&mut self, class_name: &str) -> RowKey {
        let next = self.next_row_key.entry(class_name.to_string()).or_insert(1);
        let row_key = *next;
        *next += 1;
        row_key
    }

    fn reserve_row_key(&mut self, key: &EntityKey) {
        let next = self.next_row_key.entry(key.class_name.clone()).or_insert(1);
        if *next <= key.row_key {
            *next = key.row_key + 1;
        }
    }
}

/// Shared handle to an in-memory transactional store.
///
/// Cloning shares the same committed state, listeners, clock and faults.
#[derive(Clone)]
pub struct InMemoryDatabase {
    pub(crate) committed: Arc<Mutex<Committed>>,
    pub(crate) listeners: Arc<RwLock<Vec<Arc<dyn SessionListener>>>>,
    pub(crate) clock: SharedClock,
    pub(crate) faults: Faults,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            committed: Arc::new(Mutex::new(Committed::default())),
            listeners: Arc::new(RwLock::new(Vec::new())),
            clock,
            faults: Faults::default(),
        }
    }

    /// Register a listener invoked for every session begun afterwards.
    /// Intended for process wiring only.
    pub fn register_listener(&self, listener: Arc<dyn SessionListener>) {
        debug!(listener = listener.name(), "Session listener registered");
        self.listeners.write().push(listener);
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Open a transaction on behalf of `actor` (`None` for system work).
    pub fn begin(&self, actor: Option<Actor>) -> Session {
        let listeners = self.listeners.read().clone();
        Session::new(self.clone(), listeners, actor)
    }

    /// Write an entity straight into committed state, bypassing sessions and
    /// listeners. For fixtures and imports.
    pub fn seed(&self, record: EntityRecord) -> EntityKey {
        let mut committed = self.committed.lock();
        committed.reserve_row_key(&record.key);
        committed.entities.insert(record.key.clone(), record.fields);
        record.key
    }

    pub fn seed_entity<T: AuditedEntity>(&self, entity: &T) -> EntityKey {
        self.seed(entity.to_record())
    }

    // -------------------------------------------------------------------------
    // Committed-state queries
    // -------------------------------------------------------------------------

    pub fn entity(&self, key: &EntityKey) -> Option<EntityRecord> {
        self.committed
            .lock()
            .entities
            .get(key)
            .map(|fields| EntityRecord::new(key.clone(), fields.clone()))
    }

    pub fn audit_records(&self, query: &AuditQuery) -> Vec<AuditRecord> {
        self.committed
            .lock()
            .records
            .audit_matching(query)
            .cloned()
            .collect()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.committed.lock().records.events.clone()
    }

    pub fn event(&self, id: Uuid) -> Option<DomainEvent> {
        self.committed
            .lock()
            .records
            .events
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn history(&self, query: &HistoryQuery) -> Vec<DerivedHistoryEntry> {
        page_history(self.committed.lock().records.history.iter(), query)
    }

    pub fn change_request(&self, id: Uuid) -> Option<ChangeRequest> {
        self.committed.lock().records.change_request(id).cloned()
    }

    pub fn change_requests(&self, query: &ChangeRequestQuery) -> Vec<ChangeRequest> {
        let committed = self.committed.lock();
        merge_change_requests(&committed.records.change_requests, &[], query)
    }

    pub fn notifications_for(&self, recipient: ActorId) -> Vec<Notification> {
        self.committed
            .lock()
            .records
            .notifications_for(recipient)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let committed = self.committed.lock();
        f.debug_struct("InMemoryDatabase")
            .field("entities", &committed.entities.len())
            .field("audit_records", &committed.records.audit.len())
            .field("events", &committed.records.events.len())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}
