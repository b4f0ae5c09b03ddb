use kconnect_shared::message::{DeliveryStatus, Message, MessageBody, MessageKind, ThreadKind};
use kconnect_shared::permissions::{self, SendPermission, SendTarget};
use kconnect_shared::{MessageId, ThreadId, User, UserId};
use serde::Serialize;
use tracing::info;

use crate::conversation::Thread;
use crate::delivery::{schedule_receipts, DeliveryTiming};
use crate::directory::Directory;
use crate::error::{ClientError, Result};
use crate::state::{lock, AppState, SharedState};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionDto {
    pub emoji: String,
    pub count: usize,
    pub reacted_by_me: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub author_id: UserId,
    pub author_name: String,
    pub is_mine: bool,
    pub text: String,
    pub images: Vec<String>,
    pub kind: MessageKind,
    pub delivery_status: DeliveryStatus,
    pub pinned: bool,
    pub reactions: Vec<ReactionDto>,
    pub created_at: String,
}

impl MessageDto {
    pub fn new(m: &Message, me: &UserId, directory: &Directory) -> Self {
        Self {
            id: m.id,
            thread_id: m.thread_id.clone(),
            author_id: m.author_id.clone(),
            author_name: directory.name_of(&m.author_id),
            is_mine: &m.author_id == me,
            text: m.body.text.clone(),
            images: m.body.images.clone(),
            kind: m.kind,
            delivery_status: m.delivery_status,
            pinned: m.pinned,
            reactions: m
                .reactions
                .iter()
                .map(|(emoji, r)| ReactionDto {
                    emoji: emoji.clone(),
                    count: r.count(),
                    reacted_by_me: r.contains(me),
                })
                .collect(),
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadDto {
    pub id: ThreadId,
    pub is_direct: bool,
    pub name: String,
    pub description: String,
    pub member_count: usize,
    pub allow_cross_gender: bool,
    /// For direct threads, the other participant.
    pub peer_id: Option<UserId>,
    /// Whether the signed-in user gets a compose box or an approval request.
    pub permission: SendPermission,
    pub last_message: Option<String>,
    pub message_count: usize,
}

impl ThreadDto {
    pub fn new(thread: &Thread, me: &User, directory: &Directory) -> Self {
        let last_message = thread.last_message().map(|m| m.body.text.clone());
        let message_count = thread.messages().len();

        match &thread.kind {
            ThreadKind::Channel(info) => Self {
                id: thread.id.clone(),
                is_direct: false,
                name: info.name.clone(),
                description: info.description.clone(),
                member_count: info.member_count,
                allow_cross_gender: info.allow_cross_gender,
                peer_id: None,
                permission: permissions::can_send(
                    me,
                    SendTarget::Channel {
                        allow_cross_gender: info.allow_cross_gender,
                        audience: info.audience,
                    },
                ),
                last_message,
                message_count,
            },
            ThreadKind::Direct { .. } => {
                let peer_id = thread.kind.peer_of(&me.id).cloned();
                let permission = peer_id
                    .as_ref()
                    .and_then(|id| directory.get(id))
                    .map_or(SendPermission::RequiresApproval, |peer| {
                        permissions::can_send(me, SendTarget::Direct(peer))
                    });
                Self {
                    id: thread.id.clone(),
                    is_direct: true,
                    name: peer_id
                        .as_ref()
                        .map(|id| directory.name_of(id))
                        .unwrap_or_default(),
                    description: String::new(),
                    member_count: 2,
                    allow_cross_gender: false,
                    peer_id,
                    permission,
                    last_message,
                    message_count,
                }
            }
        }
    }
}

fn thread_dto(state: &AppState, thread_id: &ThreadId, me: &User) -> Result<ThreadDto> {
    let thread = state
        .conversations
        .thread(thread_id)
        .ok_or_else(|| ClientError::ThreadNotFound(thread_id.clone()))?;
    Ok(ThreadDto::new(thread, me, &state.directory))
}

fn message_dto(state: &AppState, id: MessageId, me: &UserId) -> Result<MessageDto> {
    let message = state
        .conversations
        .message(id)
        .ok_or(ClientError::MessageNotFound(id))?;
    Ok(MessageDto::new(message, me, &state.directory))
}

/// Send a message as the signed-in user. Direct messages get simulated
/// receipts; channel messages stay `sent`.
///
/// Must be called from within a tokio runtime.
pub async fn send_message(
    state: &SharedState,
    thread_id: &str,
    text: &str,
    images: Vec<String>,
) -> Result<MessageDto> {
    let thread_id = ThreadId::new(thread_id);

    let (dto, receipts) = {
        let mut guard = lock(state)?;
        let me = guard.current_user()?;
        let app = &mut *guard;

        let body = MessageBody::text(text).with_images(images);
        let message = app.conversations.send(&thread_id, &me, body, &app.directory)?;
        let direct = app
            .conversations
            .thread(&thread_id)
            .map_or(false, Thread::is_direct);
        app.flush_events();

        let receipts = direct.then(|| DeliveryTiming::from_config(&app.config));
        (MessageDto::new(&message, &me.id, &app.directory), receipts)
    };

    if let Some(timing) = receipts {
        schedule_receipts(state.clone(), dto.id, timing);
    }

    info!(msg_id = %dto.id, thread = %thread_id, "message sent");
    Ok(dto)
}

/// Append a message that arrived from another member.
pub fn receive_message(
    state: &SharedState,
    thread_id: &str,
    author_id: &str,
    text: &str,
    kind: MessageKind,
) -> Result<MessageDto> {
    let mut guard = lock(state)?;
    let me = guard.current_user()?;
    let thread_id = ThreadId::new(thread_id);
    let author_id = UserId::new(author_id);

    let direct = guard
        .conversations
        .thread(&thread_id)
        .map_or(false, Thread::is_direct);
    if direct && author_id != me.id && !guard.settings.privacy.allow_direct_messages {
        return Err(ClientError::PermissionDenied(format!(
            "{} does not accept direct messages",
            me.id
        )));
    }

    let message = guard
        .conversations
        .receive(&thread_id, &author_id, MessageBody::text(text), kind)?;
    guard.flush_events();
    Ok(MessageDto::new(&message, &me.id, &guard.directory))
}

pub fn get_messages(state: &SharedState, thread_id: &str) -> Result<Vec<MessageDto>> {
    let guard = lock(state)?;
    let me = guard.current_user()?;

    let messages = guard.conversations.messages(&ThreadId::new(thread_id))?;
    Ok(messages
        .iter()
        .map(|m| MessageDto::new(m, &me.id, &guard.directory))
        .collect())
}

pub fn list_threads(state: &SharedState) -> Result<Vec<ThreadDto>> {
    let guard = lock(state)?;
    let me = guard.current_user()?;

    Ok(guard
        .conversations
        .threads()
        .filter(|t| match &t.kind {
            ThreadKind::Direct { participants } => participants.contains(&me.id),
            ThreadKind::Channel(_) => true,
        })
        .map(|t| ThreadDto::new(t, &me, &guard.directory))
        .collect())
}

/// Open (or reuse) the direct thread with `peer_id`.
pub fn open_direct(state: &SharedState, peer_id: &str) -> Result<ThreadDto> {
    let mut guard = lock(state)?;
    let me = guard.current_user()?;
    let peer_id = UserId::new(peer_id);

    if guard.directory.get(&peer_id).is_none() {
        return Err(ClientError::UserNotFound(peer_id));
    }
    let thread_id = guard.conversations.open_direct(&me.id, &peer_id)?;
    thread_dto(&guard, &thread_id, &me)
}

pub fn toggle_reaction(state: &SharedState, message_id: u64, emoji: &str) -> Result<MessageDto> {
    if emoji.trim().is_empty() {
        return Err(ClientError::Validation("emoji is empty".into()));
    }

    let mut guard = lock(state)?;
    let me = guard.current_user()?;
    let id = MessageId(message_id);

    guard.conversations.toggle_reaction(id, emoji, &me.id)?;
    guard.flush_events();
    message_dto(&guard, id, &me.id)
}

/// Pin or unpin a message. In channels this takes moderation rights; in a
/// direct thread either participant may pin.
pub fn toggle_pin(state: &SharedState, message_id: u64) -> Result<MessageDto> {
    let mut guard = lock(state)?;
    let me = guard.current_user()?;
    let id = MessageId(message_id);

    let thread = guard
        .conversations
        .message(id)
        .and_then(|m| guard.conversations.thread(&m.thread_id))
        .ok_or(ClientError::MessageNotFound(id))?;
    let allowed = match &thread.kind {
        ThreadKind::Channel(info) => permissions::can_manage_thread(&me, &info.moderators),
        ThreadKind::Direct { participants } => participants.contains(&me.id),
    };
    if !allowed {
        return Err(ClientError::PermissionDenied(format!(
            "{} cannot pin messages in {}",
            me.id, thread.id
        )));
    }

    guard.conversations.toggle_pin(id)?;
    guard.flush_events();
    message_dto(&guard, id, &me.id)
}

pub fn list_pinned(state: &SharedState, thread_id: &str) -> Result<Vec<MessageDto>> {
    let guard = lock(state)?;
    let me = guard.current_user()?;

    let pinned = guard.conversations.list_pinned(&ThreadId::new(thread_id))?;
    Ok(pinned
        .iter()
        .map(|m| MessageDto::new(m, &me.id, &guard.directory))
        .collect())
}

/// Search messages across all threads (or a specific one), newest first.
pub fn search_messages(
    state: &SharedState,
    query: &str,
    thread_id: Option<&str>,
) -> Result<Vec<MessageDto>> {
    let guard = lock(state)?;
    let me = guard.current_user()?;
    let scope = thread_id.map(ThreadId::new);

    if let Some(id) = &scope {
        if guard.conversations.thread(id).is_none() {
            return Err(ClientError::ThreadNotFound(id.clone()));
        }
    }

    Ok(guard
        .conversations
        .search(query, scope.as_ref())
        .into_iter()
        .map(|m| MessageDto::new(m, &me.id, &guard.directory))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::commands::testing::{community, GOVINDA, MADAN, RADHA, VRINDAVAN};
    use crate::events::UiEvent;

    #[tokio::test]
    async fn test_blank_send_leaves_thread_untouched() {
        let state = community(MADAN);

        let err = send_message(&state, "general", "   ", Vec::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::EmptyBody));

        let err = send_message(&state, "general", "   ", vec!["/a.png".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::EmptyBody));
        assert!(get_messages(&state, "general").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cross_gender_dm_requires_approval() {
        let state = community(MADAN);
        let thread = open_direct(&state, RADHA).unwrap();
        assert_eq!(thread.permission, SendPermission::RequiresApproval);

        let err = send_message(&state, thread.id.as_str(), "Hare Krishna", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::PermissionDenied(_)));
        assert!(get_messages(&state, thread.id.as_str()).unwrap().is_empty());

        // Same target, admin sender: allowed.
        let admin = community(GOVINDA);
        let thread = open_direct(&admin, RADHA).unwrap();
        assert_eq!(thread.permission, SendPermission::Allowed);
        send_message(&admin, thread.id.as_str(), "Hare Krishna", Vec::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_channel_audience_gate() {
        let state = community(MADAN);
        let threads = list_threads(&state).unwrap();
        let matajis = threads.iter().find(|t| t.id.as_str() == "matajis").unwrap();
        assert_eq!(matajis.permission, SendPermission::RequiresApproval);

        assert!(send_message(&state, "matajis", "Dandavats", Vec::new()).await.is_err());
        send_message(&state, "brahmacari", "Dandavats", Vec::new())
            .await
            .unwrap();
        send_message(&state, "general", "Dandavats", Vec::new())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_send_gets_receipts() {
        let state = community(MADAN);
        let thread = open_direct(&state, VRINDAVAN).unwrap();

        let sent = send_message(&state, thread.id.as_str(), "Hare Krishna", Vec::new())
            .await
            .unwrap();
        assert_eq!(sent.delivery_status, DeliveryStatus::Sent);
        assert!(sent.is_mine);

        tokio::time::sleep(Duration::from_millis(3_100)).await;
        let messages = get_messages(&state, thread.id.as_str()).unwrap();
        assert_eq!(messages[0].delivery_status, DeliveryStatus::Read);

        // Channel messages never get receipts.
        let channel = send_message(&state, "general", "Jaya", Vec::new()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let messages = get_messages(&state, "general").unwrap();
        assert_eq!(messages[0].id, channel.id);
        assert_eq!(messages[0].delivery_status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn test_reaction_toggle_twice_restores() {
        let state = community(MADAN);
        let sent = send_message(&state, "general", "Jaya Radhe", Vec::new())
            .await
            .unwrap();

        let once = toggle_reaction(&state, sent.id.0, "🙏").unwrap();
        assert_eq!(
            once.reactions,
            vec![ReactionDto {
                emoji: "🙏".into(),
                count: 1,
                reacted_by_me: true
            }]
        );

        let twice = toggle_reaction(&state, sent.id.0, "🙏").unwrap();
        assert!(twice.reactions.is_empty());

        assert!(matches!(
            toggle_reaction(&state, 999, "🙏"),
            Err(ClientError::MessageNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pin_and_list() {
        let state = community(GOVINDA);
        let first = send_message(&state, "general", "Kirtan at 7", Vec::new())
            .await
            .unwrap();
        let second = send_message(&state, "general", "Prasadam after", Vec::new())
            .await
            .unwrap();

        assert!(toggle_pin(&state, second.id.0).unwrap().pinned);
        assert!(toggle_pin(&state, first.id.0).unwrap().pinned);

        let pinned: Vec<MessageId> = list_pinned(&state, "general")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(pinned, vec![first.id, second.id]);

        assert!(!toggle_pin(&state, first.id.0).unwrap().pinned);
        assert_eq!(list_pinned(&state, "general").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_members_cannot_pin_in_channels() {
        let state = community(MADAN);
        let sent = send_message(&state, "general", "Kirtan at 7", Vec::new())
            .await
            .unwrap();
        assert!(matches!(
            toggle_pin(&state, sent.id.0),
            Err(ClientError::PermissionDenied(_))
        ));

        let dm = open_direct(&state, VRINDAVAN).unwrap();
        let sent = send_message(&state, dm.id.as_str(), "Address for the feast", Vec::new())
            .await
            .unwrap();
        assert!(toggle_pin(&state, sent.id.0).unwrap().pinned);
    }

    #[test]
    fn test_inbound_mention_notifies() {
        let state = community(MADAN);
        let mut rx = lock(&state).unwrap().subscribe();

        receive_message(
            &state,
            "general",
            VRINDAVAN,
            "@MadanMohan can you lead kirtan?",
            MessageKind::UserMessage,
        )
        .unwrap();

        let guard = lock(&state).unwrap();
        let unread = guard.notifications.unread_count();
        assert_eq!(unread.total, 1);
        assert!(unread.is_urgent());
        drop(guard);

        let names: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e: UiEvent| e.name())
            .collect();
        assert_eq!(names, vec!["new-message", "notifications-changed"]);
    }

    #[tokio::test]
    async fn test_search_scoped_and_unknown_thread() {
        let state = community(GOVINDA);
        send_message(&state, "general", "Gita class tonight", Vec::new())
            .await
            .unwrap();
        send_message(&state, "brahmacari", "gita recitation", Vec::new())
            .await
            .unwrap();

        assert_eq!(search_messages(&state, "GITA", None).unwrap().len(), 2);
        let scoped = search_messages(&state, "gita", Some("brahmacari")).unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].text, "gita recitation");

        assert!(matches!(
            search_messages(&state, "gita", Some("nowhere")),
            Err(ClientError::ThreadNotFound(_))
        ));
    }

    #[test]
    fn test_signed_out_fails_closed() {
        let state = community("nobody");
        assert!(matches!(
            list_threads(&state),
            Err(ClientError::Unauthenticated)
        ));
    }

    #[test]
    fn test_direct_messages_turned_off_are_refused() {
        let state = community(MADAN);
        let dm = open_direct(&state, VRINDAVAN).unwrap();
        lock(&state).unwrap().settings.privacy.allow_direct_messages = false;

        assert!(matches!(
            receive_message(&state, dm.id.as_str(), VRINDAVAN, "Haribol", MessageKind::UserMessage),
            Err(ClientError::PermissionDenied(_))
        ));
        assert!(get_messages(&state, dm.id.as_str()).unwrap().is_empty());
        assert!(lock(&state).unwrap().notifications.is_empty());

        // Channels are unaffected.
        receive_message(&state, "general", VRINDAVAN, "Haribol", MessageKind::UserMessage).unwrap();
    }
}
