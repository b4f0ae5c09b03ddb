//! Channel management: creation, approval requests, moderator notices.
//!
//! Approval requests are not stored on this side: the request is returned to
//! the caller and the requester gets a system notification confirming it.

use chrono::{DateTime, Utc};
use kconnect_shared::message::ChannelInfo;
use kconnect_shared::notification::{Notification, NotificationKind, NotificationPayload, Priority};
use kconnect_shared::permissions::{self, SendPermission};
use kconnect_shared::{Gender, ThreadId, UserId};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::commands::messaging::{MessageDto, ThreadDto};
use crate::error::{ClientError, Result};
use crate::state::{lock, SharedState};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChannel {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub allow_cross_gender: bool,
    #[serde(default)]
    pub audience: Option<Gender>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum ChannelOutcome {
    /// Guru and admin create channels directly.
    Created { thread: ThreadDto },
    /// Everyone else submits a request.
    Requested { request: ApprovalRequest },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ApprovalSubject {
    /// A channel the requester wants created.
    Channel { name: String },
    /// Permission to write to a thread the policy gates.
    Messaging { thread_id: ThreadId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub requested_by: UserId,
    pub subject: ApprovalSubject,
    pub created_at: DateTime<Utc>,
}

/// Lowercase, dash-separated id derived from a channel name.
fn slug(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Confirm `request` to the requester and hand it back.
fn submit(state: &SharedState, request: ApprovalRequest) -> Result<ApprovalRequest> {
    let mut guard = lock(state)?;
    let summary = match &request.subject {
        ApprovalSubject::Channel { name } => format!("Channel request for \"{name}\" submitted"),
        ApprovalSubject::Messaging { thread_id } => {
            format!("Approval request to message in {thread_id} submitted")
        }
    };

    let notification = Notification::new(
        NotificationKind::System,
        "Approval request sent",
        NotificationPayload {
            summary,
            ..NotificationPayload::default()
        },
        Priority::Low,
    );
    if guard.notifications.enqueue(notification) {
        guard.notifications_changed(false);
    }

    info!(request = %request.id, by = %request.requested_by, "approval request submitted");
    Ok(request)
}

pub fn create_channel(state: &SharedState, channel: NewChannel) -> Result<ChannelOutcome> {
    let name = channel.name.trim().to_string();
    let id = slug(&name);
    if id.is_empty() {
        return Err(ClientError::Validation("channel name is empty".into()));
    }

    let me = lock(state)?.current_user()?;

    if !permissions::can_create_channel_directly(&me) {
        let request = submit(
            state,
            ApprovalRequest {
                id: Uuid::new_v4(),
                requested_by: me.id.clone(),
                subject: ApprovalSubject::Channel { name },
                created_at: Utc::now(),
            },
        )?;
        return Ok(ChannelOutcome::Requested { request });
    }

    let mut guard = lock(state)?;
    let mut info = ChannelInfo::new(name);
    info.description = channel.description;
    info.allow_cross_gender = channel.allow_cross_gender;
    info.audience = channel.audience;
    info.member_count = 1;
    info.moderators.push(me.id.clone());

    let app = &mut *guard;
    let thread = app.conversations.create_channel(ThreadId::new(id), info)?;
    Ok(ChannelOutcome::Created {
        thread: ThreadDto::new(thread, &me, &app.directory),
    })
}

/// Ask for permission to write where the policy requires approval. Asking
/// for a thread that is already open to the user is a validation error.
pub fn request_approval(state: &SharedState, thread_id: &str) -> Result<ApprovalRequest> {
    let thread_id = ThreadId::new(thread_id);
    let me = {
        let guard = lock(state)?;
        let me = guard.current_user()?;
        let thread = guard
            .conversations
            .thread(&thread_id)
            .ok_or_else(|| ClientError::ThreadNotFound(thread_id.clone()))?;
        if ThreadDto::new(thread, &me, &guard.directory).permission == SendPermission::Allowed {
            return Err(ClientError::Validation(format!(
                "no approval needed to message in {thread_id}"
            )));
        }
        me
    };

    submit(
        state,
        ApprovalRequest {
            id: Uuid::new_v4(),
            requested_by: me.id,
            subject: ApprovalSubject::Messaging { thread_id },
            created_at: Utc::now(),
        },
    )
}

/// Post a moderator notice such as "X has been blocked from the group".
pub fn post_system_notice(state: &SharedState, thread_id: &str, text: &str) -> Result<MessageDto> {
    let mut guard = lock(state)?;
    let me = guard.current_user()?;

    let message = guard
        .conversations
        .post_system_notice(&ThreadId::new(thread_id), &me, text)?;
    guard.flush_events();
    Ok(MessageDto::new(&message, &me.id, &guard.directory))
}

/// Drop a thread from the local view. Pending receipts for its messages
/// become no-ops.
pub fn leave_thread(state: &SharedState, thread_id: &str) -> Result<()> {
    let mut guard = lock(state)?;
    guard.current_user()?;

    let thread_id = ThreadId::new(thread_id);
    if !guard.conversations.remove_thread(&thread_id) {
        return Err(ClientError::ThreadNotFound(thread_id));
    }
    info!(thread = %thread_id, "thread left");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kconnect_shared::message::MessageKind;
    use crate::commands::messaging::{get_messages, open_direct};
    use crate::commands::testing::{community, GOVINDA, MADAN, RADHA};

    #[test]
    fn test_slug() {
        assert_eq!(slug("  Bhakti Yoga & Kirtan "), "bhakti-yoga-kirtan");
        assert_eq!(slug("!!"), "");
    }

    #[test]
    fn test_admin_creates_channel_directly() {
        let state = community(GOVINDA);
        let outcome = create_channel(
            &state,
            NewChannel {
                name: "Book Distribution".into(),
                ..NewChannel::default()
            },
        )
        .unwrap();

        let ChannelOutcome::Created { thread } = outcome else {
            panic!("expected a created channel");
        };
        assert_eq!(thread.id.as_str(), "book-distribution");
        assert_eq!(thread.permission, SendPermission::Allowed);
        assert!(get_messages(&state, "book-distribution").unwrap().is_empty());
    }

    #[test]
    fn test_member_channel_creation_becomes_request() {
        let state = community(MADAN);
        let outcome = create_channel(
            &state,
            NewChannel {
                name: "Sunday Feast".into(),
                ..NewChannel::default()
            },
        )
        .unwrap();

        assert!(matches!(outcome, ChannelOutcome::Requested { .. }));
        assert!(get_messages(&state, "sunday-feast").is_err());

        let guard = lock(&state).unwrap();
        let listed = guard.notifications.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].kind, NotificationKind::System);
    }

    #[test]
    fn test_approval_only_for_gated_threads() {
        let state = community(MADAN);
        let request = request_approval(&state, "matajis").unwrap();
        assert_eq!(
            request.subject,
            ApprovalSubject::Messaging {
                thread_id: ThreadId::new("matajis")
            }
        );

        assert!(matches!(
            request_approval(&state, "general"),
            Err(ClientError::Validation(_))
        ));

        let dm = open_direct(&state, RADHA).unwrap();
        assert!(request_approval(&state, dm.id.as_str()).is_ok());
    }

    #[test]
    fn test_system_notice_requires_moderation_rights() {
        let member = community(MADAN);
        assert!(matches!(
            post_system_notice(&member, "matajis", "Welcome"),
            Err(ClientError::PermissionDenied(_))
        ));

        let moderator = community(RADHA);
        let notice = post_system_notice(
            &moderator,
            "matajis",
            "Vrindavan Das has been blocked from the group",
        )
        .unwrap();
        assert_eq!(notice.kind, MessageKind::SystemNotice);
    }

    #[test]
    fn test_leave_thread() {
        let state = community(MADAN);
        leave_thread(&state, "general").unwrap();
        assert!(matches!(
            leave_thread(&state, "general"),
            Err(ClientError::ThreadNotFound(_))
        ));
    }
}
