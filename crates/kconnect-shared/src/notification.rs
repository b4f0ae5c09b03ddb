//! Notification records owned by the notification center.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{NotificationId, ThreadId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Message,
    Mention,
    Reaction,
    Join,
    Pin,
    Call,
    Event,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Who and where a notification is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_user: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadId>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub payload: NotificationPayload,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub priority: Priority,
    /// Deep link to the originating page, e.g. `/channels/general`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_ref: Option<String>,
}

impl Notification {
    /// Unread notification stamped now.
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        payload: NotificationPayload,
        priority: Priority,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            kind,
            title: title.into(),
            payload,
            created_at: Utc::now(),
            is_read: false,
            priority,
            action_ref: None,
        }
    }

    pub fn with_action(mut self, action_ref: impl Into<String>) -> Self {
        self.action_ref = Some(action_ref.into());
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Deep link for a thread as used by the navigation surface.
pub fn thread_link(thread: &ThreadId, direct: bool) -> String {
    if direct {
        format!("/messages/{thread}")
    } else {
        format!("/channels/{thread}")
    }
}
