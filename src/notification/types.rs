//! Notification data model (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of a notification, used by transports to pick an icon/color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum NotificationType {
    /// Informational, no action implied.
    Info,
    /// A prior action completed successfully.
    Success,
    /// Attention advised; not yet an error.
    Warning,
    /// Something failed.
    Error,
}

/// Ordinal priority: `Low < Normal < High < Urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Priority {
    /// Lowest ordinal value.
    Low,
    /// Default priority.
    Normal,
    /// Above normal.
    High,
    /// Highest ordinal value.
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// A single call-to-action attached to a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Button/link label.
    pub label: String,
    /// Target URL.
    pub url: String,
    /// Presentation hint, e.g. `"primary"` / `"destructive"`.
    pub style: String,
}

/// A single user-addressed notification (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Globally unique identifier.
    pub id: String,
    /// Recipient's user identifier.
    pub recipient_id: String,
    /// Category.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Ordinal priority.
    pub priority: Priority,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Optional structured payload for rich clients.
    pub data: Option<serde_json::Value>,
    /// Optional call-to-action list.
    pub actions: Option<Vec<Action>>,
    /// Whether the recipient has read this notification.
    pub read: bool,
    /// When it was marked read, if ever.
    pub read_at: Option<DateTime<Utc>>,
    /// When it was created.
    pub created_at: DateTime<Utc>,
    /// Optional expiry; an expired notification is filtered at the store
    /// boundary (§4.2).
    pub expires_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// A new, unread notification for `recipient_id`. `id` and `created_at`
    /// are assigned automatically; override with [`Notification::with_id`]
    /// / by setting the field directly if the caller supplies its own.
    pub fn new(
        recipient_id: impl Into<String>,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            recipient_id: recipient_id.into(),
            kind,
            priority: Priority::default(),
            title: title.into(),
            message: message.into(),
            data: None,
            actions: None,
            read: false,
            read_at: None,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// True iff an expiry is set and has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// Mark read in place, stamping `read_at` if not already read.
    pub fn mark_read(&mut self) {
        if !self.read {
            self.read = true;
            self.read_at = Some(Utc::now());
        }
    }
}
