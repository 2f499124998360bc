//! Outbound (driven) ports of the change-request engine.

use shared_types::{ActorId, ChangeRequestTarget, CoreResult, UnitOfWork};
use uuid::Uuid;

/// Who reviews change requests for a scope.
pub trait ReviewerDirectory: Send + Sync {
    fn reviewers_for(
        &self,
        target: &ChangeRequestTarget,
        uow: &dyn UnitOfWork,
    ) -> CoreResult<Vec<ActorId>>;
}

/// Accepts a recipient, title and message. Delivery is the sink's concern.
///
/// Runs inside the caller's transaction, so a failed delivery fails the
/// operation that triggered it.
pub trait NotificationSink: Send + Sync {
    fn notify(
        &self,
        uow: &mut dyn UnitOfWork,
        recipient: ActorId,
        title: &str,
        message: &str,
        change_request_id: Option<Uuid>,
    ) -> CoreResult<()>;
}
