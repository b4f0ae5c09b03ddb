use kconnect_shared::events::ConversationEvent;
use kconnect_shared::message::DeliveryStatus;
use kconnect_shared::{MessageId, ThreadId};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::notifications::UnreadCount;

pub const EVENT_NEW_MESSAGE: &str = "new-message";
pub const EVENT_MESSAGE_STATUS: &str = "message-status-changed";
pub const EVENT_REACTIONS_CHANGED: &str = "reactions-changed";
pub const EVENT_PIN_CHANGED: &str = "pin-changed";
pub const EVENT_NOTIFICATIONS_CHANGED: &str = "notifications-changed";
pub const EVENT_SESSION_CHANGED: &str = "session-changed";

/// Capacity of the UI event channel; slow subscribers skip ahead.
pub const UI_EVENT_CAPACITY: usize = 256;

/// Change notifications for the view layer. Payloads carry ids only; views
/// re-read the stores through the commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum UiEvent {
    #[serde(rename = "new-message")]
    NewMessage {
        thread_id: ThreadId,
        message_id: MessageId,
    },
    #[serde(rename = "message-status-changed")]
    MessageStatus {
        thread_id: ThreadId,
        message_id: MessageId,
        status: DeliveryStatus,
    },
    #[serde(rename = "reactions-changed")]
    ReactionsChanged {
        thread_id: ThreadId,
        message_id: MessageId,
    },
    #[serde(rename = "pin-changed")]
    PinChanged {
        thread_id: ThreadId,
        message_id: MessageId,
        pinned: bool,
    },
    #[serde(rename = "notifications-changed")]
    NotificationsChanged {
        unread: UnreadCount,
        /// Whether the client should play the notification sound.
        play_sound: bool,
    },
    #[serde(rename = "session-changed")]
    SessionChanged { signed_in: bool },
}

impl UiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            UiEvent::NewMessage { .. } => EVENT_NEW_MESSAGE,
            UiEvent::MessageStatus { .. } => EVENT_MESSAGE_STATUS,
            UiEvent::ReactionsChanged { .. } => EVENT_REACTIONS_CHANGED,
            UiEvent::PinChanged { .. } => EVENT_PIN_CHANGED,
            UiEvent::NotificationsChanged { .. } => EVENT_NOTIFICATIONS_CHANGED,
            UiEvent::SessionChanged { .. } => EVENT_SESSION_CHANGED,
        }
    }
}

impl From<&ConversationEvent> for UiEvent {
    fn from(event: &ConversationEvent) -> Self {
        match event {
            ConversationEvent::MessagePosted { message, .. } => UiEvent::NewMessage {
                thread_id: message.thread_id.clone(),
                message_id: message.id,
            },
            ConversationEvent::ReactionToggled {
                thread_id,
                message_id,
                ..
            } => UiEvent::ReactionsChanged {
                thread_id: thread_id.clone(),
                message_id: *message_id,
            },
            ConversationEvent::PinToggled {
                thread_id,
                message_id,
                pinned,
                ..
            } => UiEvent::PinChanged {
                thread_id: thread_id.clone(),
                message_id: *message_id,
                pinned: *pinned,
            },
            ConversationEvent::DeliveryAdvanced {
                thread_id,
                message_id,
                status,
            } => UiEvent::MessageStatus {
                thread_id: thread_id.clone(),
                message_id: *message_id,
                status: *status,
            },
        }
    }
}

pub fn emit_event(tx: &broadcast::Sender<UiEvent>, event: UiEvent) {
    let name = event.name();
    // A send error only means no view is subscribed right now.
    if tx.send(event).is_err() {
        tracing::trace!(event = name, "no UI subscribers");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_match_wire_tags() {
        let event = UiEvent::PinChanged {
            thread_id: ThreadId::new("general"),
            message_id: MessageId(2),
            pinned: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.name());
        assert_eq!(json["threadId"], "general");
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        emit_event(&tx, UiEvent::SessionChanged { signed_in: false });
    }
}
