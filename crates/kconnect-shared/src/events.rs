use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{DeliveryStatus, Message};
use crate::types::{MessageId, ThreadId, UserId};

/// Mutations reported by the conversation store. The notification center
/// consumes these instead of reading the store's collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ConversationEvent {
    /// A message was appended to a thread (local send or inbound).
    MessagePosted {
        message: Message,
        direct: bool,
    },

    /// A reaction was added (`added = true`) or withdrawn.
    ReactionToggled {
        thread_id: ThreadId,
        message_id: MessageId,
        message_author: UserId,
        emoji: String,
        user_id: UserId,
        added: bool,
        direct: bool,
    },

    /// A message was pinned or unpinned.
    PinToggled {
        thread_id: ThreadId,
        message_id: MessageId,
        message_author: UserId,
        pinned: bool,
        direct: bool,
        at: DateTime<Utc>,
    },

    /// A receipt moved forward.
    DeliveryAdvanced {
        thread_id: ThreadId,
        message_id: MessageId,
        status: DeliveryStatus,
    },
}

impl ConversationEvent {
    pub fn thread_id(&self) -> &ThreadId {
        match self {
            ConversationEvent::MessagePosted { message, .. } => &message.thread_id,
            ConversationEvent::ReactionToggled { thread_id, .. }
            | ConversationEvent::PinToggled { thread_id, .. }
            | ConversationEvent::DeliveryAdvanced { thread_id, .. } => thread_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let event = ConversationEvent::DeliveryAdvanced {
            thread_id: ThreadId::new("dm:1:2"),
            message_id: MessageId(7),
            status: DeliveryStatus::Delivered,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "deliveryAdvanced");
        assert_eq!(json["status"], "delivered");
        assert_eq!(event.thread_id().as_str(), "dm:1:2");
    }
}
