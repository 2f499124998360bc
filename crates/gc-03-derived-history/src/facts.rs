//! What a domain event says happened, gathered from its details with the
//! linked audit records as fallback.

use shared_types::{
    detail_keys, display, AuditOperation, AuditQuery, AuditRecord, ChangeRequest, ChangeSet,
    CoreError, CoreResult, DomainEvent, EntityKey, EntityRecord, FieldChange, FieldMap,
    FieldValue, UnitOfWork,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFacts {
    /// Display name of the acting user.
    pub user: String,
    pub created: Option<EntityRecord>,
    pub updated: Option<EntityRecord>,
    pub deleted: Option<EntityRecord>,
    pub changes: ChangeSet,
    pub change_requests: Vec<ChangeRequest>,
}

impl EventFacts {
    pub fn gather(event: &DomainEvent, uow: &dyn UnitOfWork) -> CoreResult<Self> {
        let details = &event.details;
        let mut facts = Self {
            user: details
                .user_name()
                .map_or_else(|| display::display_name(None, event.created_by), str::to_string),
            created: details.decode_opt(detail_keys::NEW)?,
            updated: details.decode_opt(detail_keys::UPDATED)?,
            deleted: details.decode_opt(detail_keys::DELETED)?,
            changes: details.decode_opt(detail_keys::CHANGES)?.unwrap_or_default(),
            change_requests: details
                .decode_opt(detail_keys::CHANGE_REQUESTS)?
                .unwrap_or_default(),
        };

        if let Some(class_name) = event.event_type.class_name() {
            if facts.created.is_none() && facts.updated.is_none() && facts.deleted.is_none() {
                facts.fill_from_audit(event, uow, class_name)?;
            }
        }
        Ok(facts)
    }

    fn fill_from_audit(
        &mut self,
        event: &DomainEvent,
        store: &dyn UnitOfWork,
        class_name: &str,
    ) -> CoreResult<()> {
        let records: Vec<AuditRecord> = store
            .audit_records(&AuditQuery::for_event(event.id))?
            .into_iter()
            .filter(|r| r.class_name == class_name)
            .collect();

        for record in records {
            match record.operation {
                AuditOperation::New if self.created.is_none() => {
                    self.created = Some(snapshot(&record, |c| c.new.clone()));
                }
                AuditOperation::Deleted if self.deleted.is_none() => {
                    self.deleted = Some(snapshot(&record, |c| c.old.clone()));
                }
                AuditOperation::Updated if self.updated.is_none() => {
                    self.updated = store.get(&record.key())?;
                    self.changes = record.changes.clone();
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn require_created(&self) -> CoreResult<&EntityRecord> {
        self.created.as_ref().ok_or_else(|| missing(detail_keys::NEW))
    }

    pub fn require_updated(&self) -> CoreResult<&EntityRecord> {
        self.updated.as_ref().ok_or_else(|| missing(detail_keys::UPDATED))
    }

    pub fn require_deleted(&self) -> CoreResult<&EntityRecord> {
        self.deleted.as_ref().ok_or_else(|| missing(detail_keys::DELETED))
    }
}

fn snapshot(
    record: &AuditRecord,
    side: impl Fn(&FieldChange) -> Option<FieldValue>,
) -> EntityRecord {
    let fields: FieldMap = record
        .changes
        .iter()
        .filter_map(|(name, change)| side(change).map(|v| (name.to_string(), v)))
        .collect();
    EntityRecord::new(EntityKey::new(record.class_name.clone(), record.row_key), fields)
}

fn missing(key: &str) -> CoreError {
    CoreError::Serialization(format!("event carries no `{key}` snapshot or audit record"))
}
