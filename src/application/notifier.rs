use crate::domain::notification::Notification;
use crate::domain::ports::NotificationSinkRef;
use crate::domain::user::UserId;
use crate::error::Result;
use tracing::warn;
use uuid::Uuid;

/// Hands notification records to the sink after a posting is final.
///
/// A failing sink never undoes the posting that produced the record; the
/// failure is logged and the next record is attempted.
#[derive(Clone)]
pub struct Notifier {
    sink: NotificationSinkRef,
}

impl Notifier {
    pub fn new(sink: NotificationSinkRef) -> Self {
        Self { sink }
    }

    pub async fn publish(&self, notifications: impl IntoIterator<Item = Notification>) {
        for notification in notifications {
            let user_id = notification.user_id;
            let kind = notification.kind;
            if let Err(e) = self.sink.emit(notification).await {
                warn!(%user_id, ?kind, error = %e, "failed to emit notification");
            }
        }
    }

    pub async fn list(&self, user_id: UserId) -> Result<Vec<Notification>> {
        self.sink.notifications_for(user_id).await
    }

    pub async fn mark_read(&self, user_id: UserId, notification_id: Uuid) -> Result<bool> {
        self.sink.mark_read(user_id, notification_id).await
    }
}
