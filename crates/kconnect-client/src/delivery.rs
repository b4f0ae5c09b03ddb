//! Simulated delivery receipts for direct messages.
//!
//! One task per sent message walks the receipt forward: `delivered` after
//! `delivered_after`, then `read` after `read_after` (both measured from the
//! send). A single task per message keeps delivered strictly before read.

use std::time::Duration;

use kconnect_shared::message::DeliveryStatus;
use kconnect_shared::MessageId;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::state::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryTiming {
    pub delivered_after: Duration,
    pub read_after: Duration,
}

impl DeliveryTiming {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            delivered_after: config.delivered_after,
            read_after: config.read_after.max(config.delivered_after),
        }
    }
}

impl Default for DeliveryTiming {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Spawn the receipt task for `message_id`.
///
/// The task stops early when the message disappears (its thread was
/// removed); a receipt never resurrects or moves a status backwards.
pub fn schedule_receipts(
    state: SharedState,
    message_id: MessageId,
    timing: DeliveryTiming,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(timing.delivered_after).await;
        if !advance(&state, message_id, DeliveryStatus::Delivered) {
            return;
        }

        sleep(timing.read_after.saturating_sub(timing.delivered_after)).await;
        advance(&state, message_id, DeliveryStatus::Read);
    })
}

/// Apply one receipt. Returns whether the message still exists.
fn advance(state: &SharedState, message_id: MessageId, status: DeliveryStatus) -> bool {
    let Ok(mut guard) = state.lock() else {
        warn!(msg_id = %message_id, "state lock poisoned, dropping receipt");
        return false;
    };

    if !guard.conversations.contains_message(message_id) {
        debug!(msg_id = %message_id, "message gone, receipt task stopping");
        return false;
    }

    guard.conversations.advance_delivery(message_id, status);
    guard.flush_events();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use kconnect_shared::message::MessageBody;
    use kconnect_shared::{Gender, Role, ThreadId, User, UserId};

    use crate::events::UiEvent;
    use crate::state::{lock, AppState};

    struct Fixture {
        state: SharedState,
        thread: ThreadId,
        message: MessageId,
    }

    fn sent_direct_message() -> Fixture {
        let me = User::new(UserId::new("1"), "Madan Mohan", Role::User, Gender::Male);
        let peer = User::new(UserId::new("3"), "Vrindavan Das", Role::User, Gender::Male);

        let mut state = AppState::in_memory(ClientConfig::default());
        state.directory.upsert(me.clone());
        state.directory.upsert(peer.clone());
        state.identity.sign_in(me.clone()).unwrap();

        let thread = state.conversations.open_direct(&me.id, &peer.id).unwrap();
        let message = state
            .conversations
            .send(&thread, &me, MessageBody::text("Hare Krishna"), &state.directory)
            .unwrap()
            .id;
        state.flush_events();

        Fixture {
            state: state.into_shared(),
            thread,
            message,
        }
    }

    fn status_of(fixture: &Fixture) -> Option<DeliveryStatus> {
        lock(&fixture.state)
            .unwrap()
            .conversations
            .message(fixture.message)
            .map(|m| m.delivery_status)
    }

    #[tokio::test(start_paused = true)]
    async fn test_receipts_follow_schedule() {
        let fixture = sent_direct_message();
        let handle = schedule_receipts(
            fixture.state.clone(),
            fixture.message,
            DeliveryTiming::default(),
        );

        assert_eq!(status_of(&fixture), Some(DeliveryStatus::Sent));

        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(status_of(&fixture), Some(DeliveryStatus::Delivered));

        sleep(Duration::from_millis(2_000)).await;
        assert_eq!(status_of(&fixture), Some(DeliveryStatus::Read));

        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_receipts_never_move_backwards() {
        let fixture = sent_direct_message();
        let mut rx = lock(&fixture.state).unwrap().subscribe();

        // Read arrives out of band before the delivered timer fires.
        {
            let mut guard = lock(&fixture.state).unwrap();
            assert!(guard
                .conversations
                .advance_delivery(fixture.message, DeliveryStatus::Read));
            guard.flush_events();
        }

        schedule_receipts(fixture.state.clone(), fixture.message, DeliveryTiming::default())
            .await
            .unwrap();

        assert_eq!(status_of(&fixture), Some(DeliveryStatus::Read));

        let mut statuses = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let UiEvent::MessageStatus { status, .. } = event {
                statuses.push(status);
            }
        }
        assert_eq!(statuses, vec![DeliveryStatus::Read]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_thread_cancels_receipts() {
        let fixture = sent_direct_message();
        let handle = schedule_receipts(
            fixture.state.clone(),
            fixture.message,
            DeliveryTiming::default(),
        );

        assert!(lock(&fixture.state)
            .unwrap()
            .conversations
            .remove_thread(&fixture.thread));

        sleep(Duration::from_secs(5)).await;
        handle.await.unwrap();
        assert_eq!(status_of(&fixture), None);
    }

    #[test]
    fn test_timing_from_config() {
        let config = ClientConfig {
            delivered_after: Duration::from_millis(10),
            read_after: Duration::from_millis(30),
            ..ClientConfig::default()
        };
        let timing = DeliveryTiming::from_config(&config);
        assert_eq!(timing.read_after, Duration::from_millis(30));
        assert_eq!(DeliveryTiming::default().delivered_after, Duration::from_secs(1));
    }
}
