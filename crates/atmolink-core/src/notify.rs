// ── User-visible notifications ──
//
// Failures the operator should see (rejected credentials, failed fetches)
// go through a `Notifier`. The host decides where they end up; the
// default just logs them.

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{error, info, warn};

/// Category attached to every notification this crate raises.
pub const NOTIFICATION_CATEGORY: &str = "module";

/// Source attached to every notification this crate raises.
pub const NOTIFICATION_SOURCE: &str = "atmolink";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    pub category: String,
    pub source: String,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            category: NOTIFICATION_CATEGORY.into(),
            source: NOTIFICATION_SOURCE.into(),
        }
    }
}

/// Sink for user-visible notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Logs notifications through `tracing` at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Info => info!(category = %n.category, source = %n.source, "{}", n.message),
            Severity::Warning => warn!(category = %n.category, source = %n.source, "{}", n.message),
            Severity::Error => error!(category = %n.category, source = %n.source, "{}", n.message),
        }
    }
}
