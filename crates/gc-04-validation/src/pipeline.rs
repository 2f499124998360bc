//! # Pipeline

use shared_types::{Agreement, AuditedEntity, BudgetLineItem, CoreResult, EntityRecord};
use tracing::debug;

use crate::context::ValidationContext;
use crate::rules::{
    AgreementTypeConstraints, Authorization, BudgetLineItemConstraints, ImmutableFields,
    ImmutableOnceFinalized, NoPendingChangeRequest, ResourceExists,
};

/// A single validation step. Returns normally on success.
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(
        &self,
        target: Option<&EntityRecord>,
        ctx: &mut ValidationContext<'_>,
    ) -> CoreResult<()>;
}

#[derive(Default)]
pub struct ValidationPipeline {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rule(mut self, rule: impl ValidationRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Standard ordering: existence, authorization, immutability, business
    /// constraints, type-specific constraints.
    pub fn default_for(class_name: &str) -> Self {
        let pipeline = Self::new()
            .with_rule(ResourceExists)
            .with_rule(Authorization)
            .with_rule(ImmutableFields::default());
        Self::with_class_rules(pipeline, class_name, true)
    }

    /// Default rules plus immutable-once-finalized.
    pub fn finalized_for(class_name: &str) -> Self {
        Self::default_for(class_name).with_rule(ImmutableOnceFinalized::default())
    }

    /// Entity integrity only; used when applying an already reviewed change.
    pub fn integrity_for(class_name: &str) -> Self {
        let pipeline = Self::new()
            .with_rule(ResourceExists)
            .with_rule(ImmutableFields::default());
        Self::with_class_rules(pipeline, class_name, false)
    }

    fn with_class_rules(pipeline: Self, class_name: &str, check_pending: bool) -> Self {
        let pipeline = if class_name == BudgetLineItem::CLASS_NAME {
            pipeline.with_rule(BudgetLineItemConstraints)
        } else {
            pipeline
        };
        let pipeline = if check_pending {
            pipeline.with_rule(NoPendingChangeRequest)
        } else {
            pipeline
        };
        if class_name == Agreement::CLASS_NAME {
            pipeline.with_rule(AgreementTypeConstraints)
        } else {
            pipeline
        }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Load the target and run every rule in order, stopping at the first
    /// failure.
    pub fn validate(&self, ctx: &mut ValidationContext<'_>) -> CoreResult<()> {
        let target = match &ctx.target {
            Some(key) => ctx.uow.get(key)?,
            None => None,
        };

        for rule in &self.rules {
            if let Err(e) = rule.validate(target.as_ref(), ctx) {
                debug!(
                    rule = rule.name(),
                    class_name = %ctx.class_name,
                    error = %e,
                    "Validation rejected request"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("rules", &self.rule_names())
            .finish()
    }
}
