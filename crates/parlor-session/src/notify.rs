//! Transient user notifications derived from inbound envelopes.
//!
//! Any envelope carrying a non-empty `message` surfaces a [`Notice`],
//! independently of whether its `type` is recognized. The engine never
//! renders notices itself; it hands them to a [`Notifier`] supplied by the
//! embedding application. The default [`TracingNotifier`] just logs them.

use std::time::Duration;

use parlor_protocol::Envelope;

/// How long a notice should stay visible when the sink renders it.
pub const DEFAULT_NOTICE_DURATION: Duration = Duration::from_secs(3);

/// Visual weight of a notice, inferred from the envelope's event tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    Success,
    Error,
    Warning,
    #[default]
    Info,
}

impl Severity {
    /// Infers a severity from an envelope's `type` string. Anything not
    /// obviously good or bad is informational.
    pub fn from_hint(kind: &str) -> Self {
        match kind {
            "error" => Severity::Error,
            "opponent_left" | "game_rejected" => Severity::Warning,
            "room_created" | "joined_room" | "room_joined"
            | "game_accepted" | "game_started" | "match_found" => {
                Severity::Success
            }
            _ => Severity::Info,
        }
    }
}

/// A transient user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
    pub duration: Duration,
}

impl Notice {
    /// Extracts a notice from an envelope, if it carries display text.
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        envelope.notice_text().map(|message| Notice {
            message: message.to_string(),
            severity: Severity::from_hint(&envelope.kind),
            duration: DEFAULT_NOTICE_DURATION,
        })
    }
}

/// Sink for transient notifications.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notice: Notice);
}

/// Default [`Notifier`] that logs notices through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Error => {
                tracing::error!(message = %notice.message, "server notice");
            }
            Severity::Warning => {
                tracing::warn!(message = %notice.message, "server notice");
            }
            _ => {
                tracing::info!(message = %notice.message, "server notice");
            }
        }
    }
}
