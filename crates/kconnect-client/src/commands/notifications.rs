use kconnect_shared::notification::{Notification, NotificationKind, Priority};
use kconnect_shared::{NotificationId, UserId};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::notifications::UnreadCount;
use crate::state::{lock, SharedState};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub summary: String,
    pub source_user: Option<UserId>,
    pub source_name: Option<String>,
    pub is_read: bool,
    pub priority: Priority,
    pub action_ref: Option<String>,
    pub created_at: String,
}

impl From<&Notification> for NotificationDto {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            title: n.title.clone(),
            summary: n.payload.summary.clone(),
            source_user: n.payload.source_user.clone(),
            source_name: n.payload.source_name.clone(),
            is_read: n.is_read,
            priority: n.priority,
            action_ref: n.action_ref.clone(),
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

/// Everything the notification panel renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPanel {
    /// Newest first.
    pub items: Vec<NotificationDto>,
    pub unread: UnreadCount,
    /// `None` hides the badge; caps at "99+".
    pub badge: Option<String>,
}

fn parse_id(id: &str) -> Result<NotificationId> {
    Uuid::parse_str(id)
        .map(NotificationId)
        .map_err(|e| ClientError::Validation(format!("Invalid notification id: {e}")))
}

pub fn list_notifications(state: &SharedState) -> Result<NotificationPanel> {
    let guard = lock(state)?;
    guard.current_user()?;
    let center = &guard.notifications;
    Ok(NotificationPanel {
        items: center.list().into_iter().map(NotificationDto::from).collect(),
        unread: center.unread_count(),
        badge: center.badge_label(),
    })
}

pub fn unread_count(state: &SharedState) -> Result<UnreadCount> {
    let guard = lock(state)?;
    guard.current_user()?;
    Ok(guard.notifications.unread_count())
}

pub fn mark_notification_read(state: &SharedState, id: &str) -> Result<UnreadCount> {
    let id = parse_id(id)?;
    let mut guard = lock(state)?;
    guard.current_user()?;
    if guard.notifications.mark_read(id)? {
        guard.notifications_changed(false);
    }
    Ok(guard.notifications.unread_count())
}

pub fn mark_all_read(state: &SharedState) -> Result<UnreadCount> {
    let mut guard = lock(state)?;
    guard.current_user()?;
    if guard.notifications.mark_all_read() > 0 {
        guard.notifications_changed(false);
    }
    Ok(guard.notifications.unread_count())
}

/// Remove a notification, read or unread.
pub fn dismiss_notification(state: &SharedState, id: &str) -> Result<UnreadCount> {
    let id = parse_id(id)?;
    let mut guard = lock(state)?;
    guard.current_user()?;
    guard
        .notifications
        .dismiss(id)
        .ok_or(ClientError::NotificationNotFound(id))?;
    guard.notifications_changed(false);
    Ok(guard.notifications.unread_count())
}
