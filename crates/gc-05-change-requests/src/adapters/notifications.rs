use shared_types::{ActorId, CoreResult, Notification, UnitOfWork};
use tracing::debug;
use uuid::Uuid;

/// Writes in-app notifications through the persistence mapper.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreNotificationSink;

impl crate::ports::NotificationSink for StoreNotificationSink {
    fn notify(
        &self,
        uow: &mut dyn UnitOfWork,
        recipient: ActorId,
        title: &str,
        message: &str,
        change_request_id: Option<Uuid>,
    ) -> CoreResult<()> {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: recipient,
            title: title.to_string(),
            message: message.to_string(),
            created_on: uow.now(),
            is_read: false,
            change_request_id,
        };
        debug!(recipient = %recipient, title, "Notification queued");
        uow.insert_notification(notification)
    }
}
