//! User-facing notifications emitted by the orchestrator.

mod models;
mod sink;

pub use models::{Notification, NotificationType};
pub use sink::{ChannelNotifier, NotificationSink, TracingNotifier};
