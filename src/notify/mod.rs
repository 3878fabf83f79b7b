//! User-facing failure notifications.
//!
//! Reporting is fire-and-forget: a notifier must never fail the operation
//! that triggered it.

use std::fmt;

use tokio::sync::mpsc;

use crate::observability::metrics;

/// User-visible notice shown when a mutation changed nothing.
pub const NOT_MODIFIED_MESSAGE: &str = "Content not modified!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Generic mutation failure.
    ServerError,
    /// Mutation answered with a 304-equivalent.
    NotModified,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServerError => "server_error",
            Self::NotModified => "not_modified",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

pub trait Notifier: Send + Sync {
    fn report(&self, kind: NotificationKind, message: &str);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn report(&self, kind: NotificationKind, message: &str) {
        metrics::record_notification(kind.as_str());
        match kind {
            NotificationKind::ServerError => tracing::error!(kind = %kind, "{}", message),
            NotificationKind::NotModified => tracing::warn!(kind = %kind, "{}", message),
        }
    }
}

/// Forwards notifications to a receiver, typically a UI task.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn report(&self, kind: NotificationKind, message: &str) {
        metrics::record_notification(kind.as_str());
        // A closed receiver just means nobody is listening anymore.
        let _ = self.tx.send(Notification {
            kind,
            message: message.to_string(),
        });
    }
}
