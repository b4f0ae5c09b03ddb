//! Conversation store: threads and their ordered message logs.
//!
//! Messages are appended in creation order and never reordered or hard
//! deleted. Every mutation records a [`ConversationEvent`] in an outbox that
//! the application state drains and forwards to the notification center, so
//! the two stores never share collections.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use kconnect_shared::constants::{MAX_MESSAGE_CHARS, MAX_SEARCH_RESULTS};
use kconnect_shared::events::ConversationEvent;
use kconnect_shared::message::{
    ChannelInfo, DeliveryStatus, Message, MessageBody, MessageKind, ThreadKind,
};
use kconnect_shared::permissions::{self, SendTarget};
use kconnect_shared::{MessageId, ThreadId, User, UserId};
use tracing::{debug, info};

use crate::directory::Directory;
use crate::error::{ClientError, Result};

/// A channel or direct thread with its message log.
#[derive(Debug, Clone)]
pub struct Thread {
    pub id: ThreadId,
    pub kind: ThreadKind,
    pub created_at: DateTime<Utc>,
    messages: Vec<Message>,
}

impl Thread {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_direct(&self) -> bool {
        self.kind.is_direct()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        // Ids are allocated in creation order, so the log is sorted by id.
        self.messages.binary_search_by_key(&id, |m| m.id).ok()
    }

    fn moderators(&self) -> &[UserId] {
        match &self.kind {
            ThreadKind::Channel(info) => &info.moderators,
            ThreadKind::Direct { .. } => &[],
        }
    }
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    threads: BTreeMap<ThreadId, Thread>,
    /// Owning thread of every message, for operations addressed by id only.
    index: HashMap<MessageId, ThreadId>,
    next_id: u64,
    outbox: Vec<ConversationEvent>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Threads
    // ------------------------------------------------------------------

    pub fn create_channel(&mut self, id: ThreadId, info: ChannelInfo) -> Result<&Thread> {
        if self.threads.contains_key(&id) {
            return Err(ClientError::Validation(format!("thread {id} already exists")));
        }
        if info.name.trim().is_empty() {
            return Err(ClientError::Validation("channel name is required".into()));
        }

        info!(thread = %id, name = %info.name, "channel created");
        let thread = Thread {
            id: id.clone(),
            kind: ThreadKind::Channel(info),
            created_at: Utc::now(),
            messages: Vec::new(),
        };
        Ok(self.threads.entry(id).or_insert(thread))
    }

    /// The direct thread between `a` and `b`, created on first use.
    pub fn open_direct(&mut self, a: &UserId, b: &UserId) -> Result<ThreadId> {
        if a == b {
            return Err(ClientError::Validation(
                "cannot open a direct thread with yourself".into(),
            ));
        }

        let id = ThreadId::direct(a, b);
        self.threads.entry(id.clone()).or_insert_with(|| {
            debug!(thread = %id, "direct thread opened");
            Thread {
                id: id.clone(),
                kind: ThreadKind::Direct {
                    participants: [a.clone(), b.clone()],
                },
                created_at: Utc::now(),
                messages: Vec::new(),
            }
        });
        Ok(id)
    }

    /// Drop a thread and its messages from the local view. Pending receipt
    /// timers for its messages become no-ops.
    pub fn remove_thread(&mut self, id: &ThreadId) -> bool {
        match self.threads.remove(id) {
            Some(thread) => {
                for message in &thread.messages {
                    self.index.remove(&message.id);
                }
                true
            }
            None => false,
        }
    }

    pub fn thread(&self, id: &ThreadId) -> Option<&Thread> {
        self.threads.get(id)
    }

    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.threads.values()
    }

    pub fn messages(&self, id: &ThreadId) -> Result<&[Message]> {
        self.threads
            .get(id)
            .map(Thread::messages)
            .ok_or_else(|| ClientError::ThreadNotFound(id.clone()))
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        let thread = self.threads.get(self.index.get(&id)?)?;
        thread.position(id).map(|pos| &thread.messages[pos])
    }

    pub fn contains_message(&self, id: MessageId) -> bool {
        self.message(id).is_some()
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Append a message written by `author`.
    ///
    /// The body is checked before the permission policy so a blank draft
    /// reports `EmptyBody` rather than a policy veto. Nothing is appended on
    /// failure.
    pub fn send(
        &mut self,
        thread_id: &ThreadId,
        author: &User,
        body: MessageBody,
        directory: &Directory,
    ) -> Result<Message> {
        let thread = self
            .threads
            .get(thread_id)
            .ok_or_else(|| ClientError::ThreadNotFound(thread_id.clone()))?;

        if body.is_blank() {
            return Err(ClientError::EmptyBody);
        }
        if body.text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ClientError::Validation(format!(
                "message is longer than {MAX_MESSAGE_CHARS} characters"
            )));
        }

        let target = match &thread.kind {
            ThreadKind::Channel(info) => SendTarget::Channel {
                allow_cross_gender: info.allow_cross_gender,
                audience: info.audience,
            },
            ThreadKind::Direct { participants } => {
                if !participants.contains(&author.id) {
                    return Err(ClientError::PermissionDenied(format!(
                        "{} is not a participant of {thread_id}",
                        author.id
                    )));
                }
                let peer_id = thread
                    .kind
                    .peer_of(&author.id)
                    .ok_or_else(|| ClientError::ThreadNotFound(thread_id.clone()))?;
                let peer = directory
                    .get(peer_id)
                    .ok_or_else(|| ClientError::UserNotFound(peer_id.clone()))?;
                SendTarget::Direct(peer)
            }
        };

        if !permissions::can_send(author, target).is_allowed() {
            return Err(ClientError::PermissionDenied(format!(
                "messages from {} to {thread_id} require approval",
                author.id
            )));
        }

        let message = self.append(thread_id, &author.id, body, MessageKind::UserMessage);
        info!(msg_id = %message.id, thread = %thread_id, "message sent");
        Ok(message)
    }

    /// Append a message authored elsewhere (another member, or a call/voice
    /// record). No permission check: the author's client already applied it.
    pub fn receive(
        &mut self,
        thread_id: &ThreadId,
        author_id: &UserId,
        body: MessageBody,
        kind: MessageKind,
    ) -> Result<Message> {
        if !self.threads.contains_key(thread_id) {
            return Err(ClientError::ThreadNotFound(thread_id.clone()));
        }
        if body.is_blank() {
            return Err(ClientError::EmptyBody);
        }

        let message = self.append(thread_id, author_id, body, kind);
        debug!(msg_id = %message.id, thread = %thread_id, author = %author_id, "message received");
        Ok(message)
    }

    /// Post a system notice such as "X has been blocked from the group".
    /// Only guru, admin or a channel moderator may do this.
    pub fn post_system_notice(
        &mut self,
        thread_id: &ThreadId,
        actor: &User,
        text: &str,
    ) -> Result<Message> {
        let thread = self
            .threads
            .get(thread_id)
            .ok_or_else(|| ClientError::ThreadNotFound(thread_id.clone()))?;

        if !permissions::can_manage_thread(actor, thread.moderators()) {
            return Err(ClientError::PermissionDenied(format!(
                "{} cannot moderate {thread_id}",
                actor.id
            )));
        }
        if text.trim().is_empty() {
            return Err(ClientError::EmptyBody);
        }

        Ok(self.append(
            thread_id,
            &actor.id,
            MessageBody::text(text),
            MessageKind::SystemNotice,
        ))
    }

    fn append(
        &mut self,
        thread_id: &ThreadId,
        author_id: &UserId,
        body: MessageBody,
        kind: MessageKind,
    ) -> Message {
        self.next_id += 1;
        let message = Message {
            id: MessageId(self.next_id),
            thread_id: thread_id.clone(),
            author_id: author_id.clone(),
            created_at: Utc::now(),
            body,
            kind,
            delivery_status: DeliveryStatus::Sent,
            pinned: false,
            reactions: BTreeMap::new(),
        };

        let direct = match self.threads.get_mut(thread_id) {
            Some(thread) => {
                thread.messages.push(message.clone());
                thread.is_direct()
            }
            None => false,
        };
        self.index.insert(message.id, thread_id.clone());
        self.outbox.push(ConversationEvent::MessagePosted {
            message: message.clone(),
            direct,
        });
        message
    }

    // ------------------------------------------------------------------
    // Mutations on existing messages
    // ------------------------------------------------------------------

    fn locate(&self, id: MessageId) -> Result<(ThreadId, usize)> {
        let thread_id = self
            .index
            .get(&id)
            .ok_or(ClientError::MessageNotFound(id))?;
        let thread = self
            .threads
            .get(thread_id)
            .ok_or(ClientError::MessageNotFound(id))?;
        let pos = thread.position(id).ok_or(ClientError::MessageNotFound(id))?;
        Ok((thread_id.clone(), pos))
    }

    /// Toggle `user_id`'s `emoji` reaction. Returns `true` if the reaction is
    /// now present.
    pub fn toggle_reaction(
        &mut self,
        message_id: MessageId,
        emoji: &str,
        user_id: &UserId,
    ) -> Result<bool> {
        if emoji.trim().is_empty() {
            return Err(ClientError::Validation("emoji is required".into()));
        }

        let (thread_id, pos) = self.locate(message_id)?;
        let thread = self
            .threads
            .get_mut(&thread_id)
            .ok_or(ClientError::MessageNotFound(message_id))?;
        let direct = thread.is_direct();
        let message = &mut thread.messages[pos];

        let added = message.toggle_reaction(emoji, user_id);
        let message_author = message.author_id.clone();
        debug!(msg_id = %message_id, emoji, user = %user_id, added, "reaction toggled");

        self.outbox.push(ConversationEvent::ReactionToggled {
            thread_id,
            message_id,
            message_author,
            emoji: emoji.to_string(),
            user_id: user_id.clone(),
            added,
            direct,
        });
        Ok(added)
    }

    /// Flip the pinned flag. Returns the new value.
    ///
    /// Moderation rights are not checked here; callers that expose pinning
    /// gate it with [`permissions::can_manage_thread`].
    pub fn toggle_pin(&mut self, message_id: MessageId) -> Result<bool> {
        let (thread_id, pos) = self.locate(message_id)?;
        let thread = self
            .threads
            .get_mut(&thread_id)
            .ok_or(ClientError::MessageNotFound(message_id))?;
        let direct = thread.is_direct();
        let message = &mut thread.messages[pos];

        message.pinned = !message.pinned;
        let pinned = message.pinned;
        let message_author = message.author_id.clone();
        info!(msg_id = %message_id, pinned, "pin toggled");

        self.outbox.push(ConversationEvent::PinToggled {
            thread_id,
            message_id,
            message_author,
            pinned,
            direct,
            at: Utc::now(),
        });
        Ok(pinned)
    }

    /// Pinned messages of a thread in creation order.
    pub fn list_pinned(&self, thread_id: &ThreadId) -> Result<Vec<Message>> {
        Ok(self
            .messages(thread_id)?
            .iter()
            .filter(|m| m.pinned)
            .cloned()
            .collect())
    }

    /// Move a direct message's receipt forward. Returns `false` without
    /// touching anything when the message (or its thread) is gone, belongs to
    /// a channel, or is already at or past `target`.
    pub fn advance_delivery(&mut self, message_id: MessageId, target: DeliveryStatus) -> bool {
        let Ok((thread_id, pos)) = self.locate(message_id) else {
            debug!(msg_id = %message_id, "receipt for a removed message ignored");
            return false;
        };
        let Some(thread) = self.threads.get_mut(&thread_id) else {
            return false;
        };
        if !thread.is_direct() {
            return false;
        }

        let message = &mut thread.messages[pos];
        if !message.advance_delivery(target) {
            return false;
        }

        debug!(msg_id = %message_id, status = ?target, "delivery advanced");
        self.outbox.push(ConversationEvent::DeliveryAdvanced {
            thread_id,
            message_id,
            status: target,
        });
        true
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Case-insensitive text search, newest first, optionally limited to one
    /// thread.
    pub fn search(&self, query: &str, thread_id: Option<&ThreadId>) -> Vec<&Message> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<&Message> = self
            .threads
            .values()
            .filter(|t| thread_id.map_or(true, |id| &t.id == id))
            .flat_map(|t| t.messages.iter())
            .filter(|m| m.body.text.to_lowercase().contains(&needle))
            .collect();

        hits.sort_by(|a, b| b.id.cmp(&a.id));
        hits.truncate(MAX_SEARCH_RESULTS);
        hits
    }

    /// Take the events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<ConversationEvent> {
        std::mem::take(&mut self.outbox)
    }
}
