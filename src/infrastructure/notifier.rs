use async_trait::async_trait;

use crate::domain::{NotificationKind, Notifier};

/// Writes notifications to the tracing log. Stands in for a real delivery
/// channel (mail, push) which lives outside this service.
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: i32, message: String, kind: NotificationKind) {
        tracing::info!(user_id, kind = kind.as_str(), "🔔 {}", message);
    }
}
