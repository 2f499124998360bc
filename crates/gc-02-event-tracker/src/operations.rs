//! Entity mutations that record their snapshots in event details.
//!
//! Meant to run inside an [`EventScope`](crate::EventScope) so history
//! builders find `new`, `updated`/`changes` or `deleted` in the event.

use gc_01_audit_trail::diff_partial;
use shared_types::{
    detail_keys, ChangeSet, CoreResult, EntityKey, EntityRecord, EventDetails, FieldMap,
    UnitOfWork, UnitOfWorkExt,
};

/// Stage, flush and snapshot a new entity.
pub fn create_entity(
    uow: &mut dyn UnitOfWork,
    details: &mut EventDetails,
    class_name: &str,
    fields: FieldMap,
) -> CoreResult<EntityRecord> {
    let key = uow.add(class_name, fields)?;
    uow.flush()?;
    let record = uow.require(&key)?;
    details.insert(detail_keys::NEW, &record)?;
    Ok(record)
}

/// Apply the fields of `requested` that differ from the stored entity.
///
/// Returns the entity after the update and the applied change set, which is
/// empty when nothing differed.
pub fn update_entity(
    uow: &mut dyn UnitOfWork,
    details: &mut EventDetails,
    key: &EntityKey,
    requested: &FieldMap,
) -> CoreResult<(EntityRecord, ChangeSet)> {
    let current = uow.require(key)?;
    let changes = diff_partial(&current.fields, requested);
    let record = if changes.is_empty() {
        current
    } else {
        let updated = uow.update(key, changes.new_values())?;
        uow.flush()?;
        updated
    };
    details.insert(detail_keys::UPDATED, &record)?;
    details.insert(detail_keys::CHANGES, &changes)?;
    Ok((record, changes))
}

/// Delete an entity, snapshotting its last state.
pub fn delete_entity(
    uow: &mut dyn UnitOfWork,
    details: &mut EventDetails,
    key: &EntityKey,
) -> CoreResult<EntityRecord> {
    let record = uow.delete(key)?;
    uow.flush()?;
    details.insert(detail_keys::DELETED, &record)?;
    Ok(record)
}
