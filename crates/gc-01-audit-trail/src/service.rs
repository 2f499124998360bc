//! # Audit Recorder
//!
//! Session listener turning flushed mutations into audit records.

use std::sync::Arc;

use shared_types::{
    AuditOperation, AuditRecord, CoreResult, FailureObserver, FieldValue, FlushedMutation,
    NoopObserver, SessionListener, UnitOfWork,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::{AuditConfig, CREATED_BY, UPDATED_BY};
use crate::domain::diff::{diff, without_fields};

pub struct AuditRecorder {
    config: AuditConfig,
    observer: Arc<dyn FailureObserver>,
}

impl AuditRecorder {
    pub fn new(config: AuditConfig) -> Self {
        Self {
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn FailureObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Audit record for one flushed mutation, or `None` when nothing
    /// audited changed.
    pub fn record_for(
        &self,
        mutation: &FlushedMutation,
        uow: &dyn UnitOfWork,
    ) -> Option<AuditRecord> {
        if !self.config.is_audited(&mutation.key.class_name) {
            return None;
        }
        let changes = without_fields(
            &diff(mutation.before.as_ref(), mutation.after.as_ref()),
            &self.config.ignored_fields,
        );
        if changes.is_empty() {
            return None;
        }
        Some(AuditRecord {
            id: Uuid::new_v4(),
            class_name: mutation.key.class_name.clone(),
            row_key: mutation.key.row_key,
            operation: mutation.operation,
            changes,
            created_by: uow.current_actor_id(),
            created_on: uow.now(),
            linked_event_id: uow.event_context(),
        })
    }
}

impl Default for AuditRecorder {
    fn default() -> Self {
        Self::new(AuditConfig::default())
    }
}

impl SessionListener for AuditRecorder {
    fn name(&self) -> &str {
        "audit-recorder"
    }

    fn on_before_commit(&self, uow: &mut dyn UnitOfWork) -> CoreResult<()> {
        if !self.config.stamp_actor {
            return Ok(());
        }
        let Some(actor_id) = uow.current_actor().map(|actor| actor.id) else {
            return Ok(());
        };

        for pending in uow.pending() {
            if !self.config.is_audited(&pending.key.class_name) {
                continue;
            }
            let fields: &[&str] = match pending.operation {
                AuditOperation::New => &[CREATED_BY, UPDATED_BY],
                AuditOperation::Updated => &[UPDATED_BY],
                AuditOperation::Deleted => &[],
            };
            for field in fields.iter().copied() {
                if let Err(e) = uow.stamp_pending(&pending.key, field, FieldValue::from(actor_id.0))
                {
                    warn!(
                        class_name = %pending.key.class_name,
                        row_key = pending.key.row_key,
                        field,
                        error = %e,
                        "Failed to stamp actor"
                    );
                }
            }
        }
        Ok(())
    }

    fn on_after_flush(&self, uow: &mut dyn UnitOfWork, flushed: &[FlushedMutation]) {
        for mutation in flushed {
            let Some(record) = self.record_for(mutation, &*uow) else {
                debug!(
                    class_name = %mutation.key.class_name,
                    row_key = mutation.key.row_key,
                    "No audited change"
                );
                continue;
            };

            let record_id = record.id;
            match uow.insert_audit_record(record) {
                Ok(()) => debug!(
                    audit_id = %record_id,
                    class_name = %mutation.key.class_name,
                    row_key = mutation.key.row_key,
                    operation = ?mutation.operation,
                    "Audit record written"
                ),
                Err(e) => {
                    error!(
                        class_name = %mutation.key.class_name,
                        row_key = mutation.key.row_key,
                        operation = ?mutation.operation,
                        event_id = ?uow.event_context(),
                        error = %e,
                        "Audit record write failed; continuing"
                    );
                    self.observer.audit_write_failed(&mutation.key.class_name);
                }
            }
        }
    }
}
