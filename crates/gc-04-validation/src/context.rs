//! Per-request validation state. Never persisted.

use std::collections::BTreeMap;

use shared_types::{Actor, EntityKey, FieldMap, FieldValue, Operation, UnitOfWork};

pub struct ValidationContext<'a> {
    pub actor: Option<&'a Actor>,
    pub operation: Operation,
    pub class_name: String,
    /// `None` when the entity does not exist yet.
    pub target: Option<EntityKey>,
    /// Requested field values; empty for deletions.
    pub proposed: FieldMap,
    pub uow: &'a dyn UnitOfWork,
    metadata: BTreeMap<String, serde_json::Value>,
}

impl<'a> ValidationContext<'a> {
    fn new(
        uow: &'a dyn UnitOfWork,
        operation: Operation,
        class_name: String,
        target: Option<EntityKey>,
        proposed: FieldMap,
    ) -> Self {
        Self {
            actor: uow.current_actor(),
            operation,
            class_name,
            target,
            proposed,
            uow,
            metadata: BTreeMap::new(),
        }
    }

    pub fn create(uow: &'a dyn UnitOfWork, class_name: impl Into<String>, fields: FieldMap) -> Self {
        Self::new(uow, Operation::Create, class_name.into(), None, fields)
    }

    pub fn update(uow: &'a dyn UnitOfWork, target: EntityKey, proposed: FieldMap) -> Self {
        let class_name = target.class_name.clone();
        Self::new(uow, Operation::Update, class_name, Some(target), proposed)
    }

    pub fn delete(uow: &'a dyn UnitOfWork, target: EntityKey) -> Self {
        let class_name = target.class_name.clone();
        Self::new(uow, Operation::Delete, class_name, Some(target), FieldMap::new())
    }

    /// Validate on behalf of `actor` instead of the session's actor.
    #[must_use]
    pub fn with_actor(mut self, actor: &'a Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Value the field will hold if the mutation goes through.
    pub fn effective<'t>(
        &'t self,
        target: Option<&'t shared_types::EntityRecord>,
        field: &str,
    ) -> Option<&'t FieldValue> {
        self.proposed
            .get(field)
            .or_else(|| target.and_then(|record| record.get(field)))
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    pub fn metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}

impl std::fmt::Debug for ValidationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationContext")
            .field("actor", &self.actor.map(|a| a.id))
            .field("operation", &self.operation)
            .field("class_name", &self.class_name)
            .field("target", &self.target)
            .field("proposed", &self.proposed)
            .field("metadata", &self.metadata)
            .finish()
    }
}
