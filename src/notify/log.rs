use super::{DispatchError, Notifier};
use async_trait::async_trait;
use tracing::info;

/// Writes notifications to the log instead of the desktop
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn dispatch(&self, title: &str, body: &str) -> Result<(), DispatchError> {
        info!(title, body, "Notification");
        Ok(())
    }
}
