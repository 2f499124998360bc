use serde_json::json;
use shared_types::{CoreError, CoreResult, EntityRecord, Operation, Resource};

use crate::context::ValidationContext;
use crate::pipeline::ValidationRule;

/// Updates and deletions need an existing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceExists;

impl ValidationRule for ResourceExists {
    fn name(&self) -> &'static str {
        "resource-exists"
    }

    fn validate(
        &self,
        target: Option<&EntityRecord>,
        ctx: &mut ValidationContext<'_>,
    ) -> CoreResult<()> {
        if ctx.operation == Operation::Create || target.is_some() {
            return Ok(());
        }
        let row_key = ctx
            .target
            .as_ref()
            .map_or_else(|| "unknown".to_string(), |key| key.row_key.to_string());
        Err(CoreError::not_found(ctx.class_name.clone(), row_key))
    }
}

/// The actor must hold the operation's permission on the target's resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorization;

impl ValidationRule for Authorization {
    fn name(&self) -> &'static str {
        "authorization"
    }

    fn validate(
        &self,
        _target: Option<&EntityRecord>,
        ctx: &mut ValidationContext<'_>,
    ) -> CoreResult<()> {
        let Some(actor) = ctx.actor else {
            return Err(CoreError::denied("anonymous", "no authenticated actor"));
        };
        let resource = Resource::for_class(&ctx.class_name).ok_or_else(|| {
            CoreError::denied(actor.id, format!("no permissions cover {}", ctx.class_name))
        })?;
        if !actor.can(ctx.operation, resource) {
            return Err(CoreError::denied(
                actor.id,
                format!("missing {:?} permission on {:?}", ctx.operation, resource),
            ));
        }
        ctx.set_metadata("resource", json!(format!("{resource:?}")));
        Ok(())
    }
}
