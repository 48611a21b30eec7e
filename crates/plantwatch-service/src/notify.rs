//! Notification delivery seam.
//!
//! The threshold monitor emits notifications through the [`Notifier`]
//! trait. The default [`LogNotifier`] writes them to the log; with the
//! `notifications` feature a [`DesktopNotifier`] delivers them to the
//! desktop notification daemon.

use plantwatch_types::AlertKind;
use tracing::warn;

/// Sink for user-facing alert notifications.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    fn notify(&self, kind: AlertKind, title: &str, body: &str);
}

/// Notifier that writes alerts to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: AlertKind, title: &str, body: &str) {
        warn!(kind = %kind, "{}: {}", title, body);
    }
}

/// Notifier backed by the desktop notification daemon.
#[cfg(feature = "notifications")]
#[derive(Debug, Default)]
pub struct DesktopNotifier;

#[cfg(feature = "notifications")]
impl Notifier for DesktopNotifier {
    fn notify(&self, kind: AlertKind, title: &str, body: &str) {
        if let Err(e) = notify_rust::Notification::new()
            .summary(title)
            .body(body)
            .appname("plantwatch")
            .show()
        {
            warn!(kind = %kind, "Failed to show desktop notification: {}", e);
        }
    }
}
