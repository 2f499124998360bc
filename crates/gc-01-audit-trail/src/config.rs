use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Bookkeeping fields stamped on every audited entity.
pub const CREATED_BY: &str = "created_by";
pub const UPDATED_BY: &str = "updated_by";
pub const CREATED_ON: &str = "created_on";
pub const UPDATED_ON: &str = "updated_on";

/// What the audit recorder captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Fields never diffed.
    pub ignored_fields: BTreeSet<String>,
    /// Entity classes never audited.
    pub excluded_classes: BTreeSet<String>,
    /// Stamp `created_by`/`updated_by` before commit.
    pub stamp_actor: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            ignored_fields: [CREATED_ON, UPDATED_ON, CREATED_BY, UPDATED_BY]
                .into_iter()
                .map(String::from)
                .collect(),
            excluded_classes: BTreeSet::new(),
            stamp_actor: true,
        }
    }
}

impl AuditConfig {
    pub fn is_audited(&self, class_name: &str) -> bool {
        !self.excluded_classes.contains(class_name)
    }

    #[must_use]
    pub fn exclude_class(mut self, class_name: impl Into<String>) -> Self {
        self.excluded_classes.insert(class_name.into());
        self
    }
}
