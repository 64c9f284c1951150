use super::models::Notification;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Receives notifications from the orchestrator. Must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Renders every notification as a log event.
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::Started { job_id, .. } => {
                info!("[job {}] {}", job_id, notification.body())
            }
            Notification::Busy { .. } | Notification::Cancelled { .. } => {
                info!("{}: {}", notification.title(), notification.body())
            }
            Notification::Succeeded { listing, .. } => {
                info!("{}: {}", notification.title(), notification.body());
                debug!("Stored parameters:\n{}", listing);
            }
            Notification::Failed { .. } => {
                error!("{}: {}", notification.title(), notification.body())
            }
            Notification::DependencyMissing { .. } => {
                warn!("{}: {}", notification.title(), notification.body())
            }
        }
    }
}

/// Forwards notifications to a receiver owned by the interactive layer.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("Notification receiver dropped");
        }
    }
}
