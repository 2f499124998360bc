use std::collections::BTreeMap;

use parking_lot::RwLock;
use shared_types::{ActorId, ChangeRequestKind, ChangeRequestTarget, CoreResult, UnitOfWork};

use crate::ports::ReviewerDirectory;

/// Reviewers per change-request kind, with optional per-agreement overrides.
#[derive(Debug, Default)]
pub struct StaticReviewerDirectory {
    by_kind: RwLock<BTreeMap<ChangeRequestKind, Vec<ActorId>>>,
    by_agreement: RwLock<BTreeMap<u64, Vec<ActorId>>>,
}

impl StaticReviewerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, kind: ChangeRequestKind, reviewer: ActorId) {
        let mut by_kind = self.by_kind.write();
        let reviewers = by_kind.entry(kind).or_default();
        if !reviewers.contains(&reviewer) {
            reviewers.push(reviewer);
        }
    }

    /// Reviewers for one agreement's requests, replacing the kind defaults.
    pub fn assign_agreement(&self, agreement_id: u64, reviewers: Vec<ActorId>) {
        self.by_agreement.write().insert(agreement_id, reviewers);
    }
}

impl ReviewerDirectory for StaticReviewerDirectory {
    fn reviewers_for(
        &self,
        target: &ChangeRequestTarget,
        _uow: &dyn UnitOfWork,
    ) -> CoreResult<Vec<ActorId>> {
        if let Some(reviewers) = target
            .agreement_id()
            .and_then(|id| self.by_agreement.read().get(&id).cloned())
        {
            return Ok(reviewers);
        }
        Ok(self
            .by_kind
            .read()
            .get(&target.kind())
            .cloned()
            .unwrap_or_default())
    }
}
