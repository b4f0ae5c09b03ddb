//! Message and thread records owned by the conversation store.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Gender, MessageId, ThreadId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    UserMessage,
    SystemNotice,
    CallRecord,
    VoiceNote,
}

/// Receipt state of a direct message. Ordered so that `Sent < Delivered < Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

/// Text plus optional image references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl MessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    /// Whitespace-only text is blank whatever images ride along.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Users who reacted with one emoji. `count()` is always `users.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    users: BTreeSet<UserId>,
}

impl Reaction {
    pub fn count(&self) -> usize {
        self.users.len()
    }

    pub fn users(&self) -> impl Iterator<Item = &UserId> {
        self.users.iter()
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.users.contains(user)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub body: MessageBody,
    pub kind: MessageKind,
    pub delivery_status: DeliveryStatus,
    pub pinned: bool,
    #[serde(default)]
    pub reactions: BTreeMap<String, Reaction>,
}

impl Message {
    /// Flip `user`'s reaction for `emoji`. Returns `true` when the reaction
    /// was added, `false` when it was removed. Empty entries are dropped.
    pub fn toggle_reaction(&mut self, emoji: &str, user: &UserId) -> bool {
        let entry = self.reactions.entry(emoji.to_string()).or_default();
        let added = if entry.users.remove(user) {
            false
        } else {
            entry.users.insert(user.clone());
            true
        };
        if entry.users.is_empty() {
            self.reactions.remove(emoji);
        }
        added
    }

    pub fn reaction_count(&self, emoji: &str) -> usize {
        self.reactions.get(emoji).map_or(0, Reaction::count)
    }

    /// Move the receipt forward to `target`. Never moves backwards; returns
    /// whether the status changed.
    pub fn advance_delivery(&mut self, target: DeliveryStatus) -> bool {
        if target > self.delivery_status {
            self.delivery_status = target;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ThreadKind {
    Channel(ChannelInfo),
    Direct { participants: [UserId; 2] },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub member_count: usize,
    pub allow_cross_gender: bool,
    /// Intended audience; `None` for mixed channels.
    #[serde(default)]
    pub audience: Option<Gender>,
    #[serde(default)]
    pub moderators: Vec<UserId>,
}

impl ChannelInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            member_count: 0,
            allow_cross_gender: false,
            audience: None,
            moderators: Vec::new(),
        }
    }
}

impl ThreadKind {
    pub fn is_direct(&self) -> bool {
        matches!(self, ThreadKind::Direct { .. })
    }

    /// For a direct thread, the participant that is not `me`.
    pub fn peer_of(&self, me: &UserId) -> Option<&UserId> {
        match self {
            ThreadKind::Direct { participants } => participants.iter().find(|p| *p != me),
            ThreadKind::Channel(_) => None,
        }
    }
}
