//! Push sources feeding the notification center.
//!
//! [`SimulatedPush`] stands in for a real transport: on every poll it draws
//! once and produces a "new message" notification with a fixed probability.
//! [`ChannelPush`] is the production seam; whatever receives pushes from the
//! network forwards them into its sender. [`spawn_push_listener`] drains any
//! source into the shared state.

use std::time::Duration;

use futures::future::BoxFuture;
use kconnect_shared::notification::{
    thread_link, Notification, NotificationKind, NotificationPayload, Priority,
};
use kconnect_shared::{ThreadId, UserId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::state::SharedState;

/// A stream of incoming notifications. `None` means the source is closed.
pub trait PushSource: Send {
    fn next(&mut self) -> BoxFuture<'_, Option<Notification>>;
}

// ---------------------------------------------------------------------------
// Simulated arrivals
// ---------------------------------------------------------------------------

pub struct SimulatedPush {
    state: SharedState,
    ticks: Interval,
    probability: f64,
    rng: StdRng,
}

/// Sender of every simulated arrival.
const SIMULATED_SENDER: (&str, &str) = ("3", "Vrindavan Das");

impl SimulatedPush {
    /// Arrivals are addressed to whoever is signed in to `state` at the time
    /// of the draw.
    pub fn new(state: SharedState, period: Duration, probability: f64) -> Self {
        Self::with_rng(state, period, probability, StdRng::from_entropy())
    }

    /// Deterministic draws, for tests.
    pub fn seeded(state: SharedState, period: Duration, probability: f64, seed: u64) -> Self {
        Self::with_rng(state, period, probability, StdRng::seed_from_u64(seed))
    }

    pub fn from_config(state: SharedState, config: &ClientConfig) -> Self {
        Self::new(state, config.push_poll, config.push_probability)
    }

    fn with_rng(state: SharedState, period: Duration, probability: f64, rng: StdRng) -> Self {
        // The first poll happens one period after start, not immediately.
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let probability = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            warn!(probability, "non-finite push probability, arrivals disabled");
            0.0
        };
        Self {
            state,
            ticks,
            probability,
            rng,
        }
    }

    /// The local user, or `None` when nobody is signed in or the state is
    /// poisoned.
    fn recipient(&self) -> Option<UserId> {
        let guard = self.state.lock().ok()?;
        guard.identity.current().ok().map(|user| user.id.clone())
    }
}

impl PushSource for SimulatedPush {
    fn next(&mut self) -> BoxFuture<'_, Option<Notification>> {
        Box::pin(async move {
            loop {
                self.ticks.tick().await;
                if !self.rng.gen_bool(self.probability) {
                    continue;
                }
                match self.recipient() {
                    Some(me) if me.as_str() != SIMULATED_SENDER.0 => {
                        return Some(simulated_message(&me));
                    }
                    _ => debug!("simulated arrival dropped, no recipient"),
                }
            }
        })
    }
}

/// The canned arrival: a direct message from a fellow devotee to `me`.
fn simulated_message(me: &UserId) -> Notification {
    let (id, name) = SIMULATED_SENDER;
    let from = UserId::new(id);
    let thread = ThreadId::direct(me, &from);
    Notification::new(
        NotificationKind::Message,
        "New message",
        NotificationPayload {
            source_user: Some(from),
            source_name: Some(name.into()),
            thread: Some(thread.clone()),
            summary: "sent you a message".into(),
        },
        Priority::Medium,
    )
    .with_action(thread_link(&thread, true))
}

// ---------------------------------------------------------------------------
// Channel-backed source
// ---------------------------------------------------------------------------

pub struct ChannelPush {
    rx: mpsc::Receiver<Notification>,
}

impl ChannelPush {
    /// A source plus the sender that feeds it.
    pub fn new(buffer: usize) -> (mpsc::Sender<Notification>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

impl PushSource for ChannelPush {
    fn next(&mut self) -> BoxFuture<'_, Option<Notification>> {
        Box::pin(self.rx.recv())
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Drain `source` into the notification center until it closes.
pub fn spawn_push_listener<S>(state: SharedState, mut source: S) -> JoinHandle<()>
where
    S: PushSource + 'static,
{
    tokio::spawn(async move {
        info!("push listener started");

        while let Some(notification) = source.next().await {
            let Ok(mut guard) = state.lock() else {
                warn!("state lock poisoned, push listener stopping");
                return;
            };

            if !guard.identity.is_signed_in() {
                debug!(id = %notification.id, "push dropped, nobody signed in");
                continue;
            }
            if !guard.settings.notifications.push_enabled {
                debug!(id = %notification.id, "push muted by settings");
                continue;
            }

            if guard.notifications.enqueue(notification) {
                let sound = guard.settings.notifications.sound_enabled;
                guard.notifications_changed(sound);
            }
        }

        info!("push source closed");
    })
}
