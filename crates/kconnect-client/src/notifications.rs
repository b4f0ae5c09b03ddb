//! Notification center.
//!
//! Holds the notification log with read/unread bookkeeping. Display order is
//! newest first by `created_at`; insertion order only breaks ties, so the
//! order survives dismissals and restores from storage.
//!
//! A notification is `Unread`, then optionally `Read`, until it is dismissed
//! and leaves the log. Nothing moves it back to unread.

use kconnect_shared::constants::MAX_BADGE_COUNT;
use kconnect_shared::events::ConversationEvent;
use kconnect_shared::notification::{
    thread_link, Notification, NotificationKind, NotificationPayload, Priority,
};
use kconnect_shared::{NotificationId, User};
use kconnect_store::NotificationSettings;
use serde::Serialize;
use tracing::debug;

use crate::directory::Directory;
use crate::error::{ClientError, Result};

/// Unread totals used to pick a neutral or urgent badge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub total: usize,
    pub high_priority: usize,
}

impl UnreadCount {
    pub fn is_urgent(&self) -> bool {
        self.high_priority > 0
    }
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    notification: Notification,
}

#[derive(Debug, Default)]
pub struct NotificationCenter {
    entries: Vec<Entry>,
    next_seq: u64,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the center from a persisted chronological snapshot.
    pub fn restore(items: Vec<Notification>) -> Self {
        let mut center = Self::new();
        for notification in items {
            center.push(notification);
        }
        center
    }

    fn push(&mut self, notification: Notification) {
        self.next_seq += 1;
        self.entries.push(Entry {
            seq: self.next_seq,
            notification,
        });
    }

    fn find_mut(&mut self, id: NotificationId) -> Option<&mut Notification> {
        self.entries
            .iter_mut()
            .map(|e| &mut e.notification)
            .find(|n| n.id == id)
    }

    /// Add a notification as unread. An id already in the log is ignored so a
    /// redelivered push cannot inflate the unread count.
    pub fn enqueue(&mut self, mut notification: Notification) -> bool {
        if self.entries.iter().any(|e| e.notification.id == notification.id) {
            debug!(id = %notification.id, "duplicate notification ignored");
            return false;
        }

        notification.is_read = false;
        debug!(
            id = %notification.id,
            kind = ?notification.kind,
            priority = ?notification.priority,
            "notification enqueued"
        );
        self.push(notification);
        true
    }

    /// Mark one notification read. Returns whether it was unread before.
    pub fn mark_read(&mut self, id: NotificationId) -> Result<bool> {
        let notification = self
            .find_mut(id)
            .ok_or(ClientError::NotificationNotFound(id))?;
        let changed = !notification.is_read;
        notification.is_read = true;
        Ok(changed)
    }

    /// Mark everything read. Returns how many changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for entry in &mut self.entries {
            if !entry.notification.is_read {
                entry.notification.is_read = true;
                changed += 1;
            }
        }
        changed
    }

    /// Remove a notification permanently, read or not.
    pub fn dismiss(&mut self, id: NotificationId) -> Option<Notification> {
        let pos = self.entries.iter().position(|e| e.notification.id == id)?;
        Some(self.entries.remove(pos).notification)
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.entries
            .iter()
            .map(|e| &e.notification)
            .find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unread_count(&self) -> UnreadCount {
        self.entries
            .iter()
            .filter(|e| !e.notification.is_read)
            .fold(UnreadCount::default(), |mut acc, e| {
                acc.total += 1;
                if e.notification.priority == Priority::High {
                    acc.high_priority += 1;
                }
                acc
            })
    }

    /// Text for the bell badge; `None` when nothing is unread.
    pub fn badge_label(&self) -> Option<String> {
        match self.unread_count().total {
            0 => None,
            n if n > MAX_BADGE_COUNT => Some(format!("{MAX_BADGE_COUNT}+")),
            n => Some(n.to_string()),
        }
    }

    fn sorted(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.entries.iter().collect();
        entries.sort_by(|a, b| {
            a.notification
                .created_at
                .cmp(&b.notification.created_at)
                .then(a.seq.cmp(&b.seq))
        });
        entries
    }

    /// Display listing, newest first.
    pub fn list(&self) -> Vec<&Notification> {
        self.sorted()
            .into_iter()
            .rev()
            .map(|e| &e.notification)
            .collect()
    }

    /// Oldest-first copy for persistence.
    pub fn chronological(&self) -> Vec<Notification> {
        self.sorted()
            .into_iter()
            .map(|e| e.notification.clone())
            .collect()
    }

    /// Turn a conversation event into a notification for `local_user`, if it
    /// concerns them and the preferences allow it. Returns the id of the
    /// enqueued notification.
    pub fn mirror(
        &mut self,
        event: &ConversationEvent,
        local_user: &User,
        directory: &Directory,
        prefs: &NotificationSettings,
    ) -> Option<NotificationId> {
        if !prefs.push_enabled {
            return None;
        }

        let notification = match event {
            ConversationEvent::MessagePosted { message, direct } => {
                if message.author_id == local_user.id {
                    return None;
                }
                let author = directory.name_of(&message.author_id);
                let link = thread_link(&message.thread_id, *direct);
                let payload = |summary: String| NotificationPayload {
                    source_user: Some(message.author_id.clone()),
                    source_name: Some(author.clone()),
                    thread: Some(message.thread_id.clone()),
                    summary,
                };

                if local_user.is_mentioned_in(&message.body.text) {
                    Notification::new(
                        NotificationKind::Mention,
                        "You were mentioned",
                        payload(format!("mentioned you: {}", message.body.text)),
                        Priority::High,
                    )
                    .with_action(link)
                } else if *direct && !prefs.mention_only {
                    Notification::new(
                        NotificationKind::Message,
                        "New message",
                        payload("sent you a message".into()),
                        Priority::Medium,
                    )
                    .with_action(link)
                } else {
                    return None;
                }
            }

            ConversationEvent::ReactionToggled {
                thread_id,
                message_author,
                emoji,
                user_id,
                added: true,
                direct,
                ..
            } if *message_author == local_user.id
                && *user_id != local_user.id
                && !prefs.mention_only =>
            {
                Notification::new(
                    NotificationKind::Reaction,
                    "New reaction",
                    NotificationPayload {
                        source_user: Some(user_id.clone()),
                        source_name: Some(directory.name_of(user_id)),
                        thread: Some(thread_id.clone()),
                        summary: format!("reacted {emoji} to your message"),
                    },
                    Priority::Medium,
                )
                .with_action(thread_link(thread_id, *direct))
            }

            ConversationEvent::PinToggled {
                thread_id,
                message_author,
                pinned: true,
                direct,
                ..
            } if *message_author == local_user.id && !prefs.mention_only => Notification::new(
                NotificationKind::Pin,
                "Message pinned",
                NotificationPayload {
                    thread: Some(thread_id.clone()),
                    summary: "Your message was pinned".into(),
                    ..Default::default()
                },
                Priority::Low,
            )
            .with_action(thread_link(thread_id, *direct)),

            _ => return None,
        };

        let id = notification.id;
        self.enqueue(notification).then_some(id)
    }
}
