//! Application state shared across all commands and background tasks.
//!
//! [`AppState`] is wrapped in `Arc<Mutex<>>` ([`SharedState`]). The mutex is
//! a std mutex and is never held across an `.await`; timers and the push
//! listener lock it only for the synchronous mutation they perform.

use std::sync::{Arc, Mutex, MutexGuard};

use kconnect_shared::User;
use kconnect_store::{AppSettings, Database, MemorySession, SessionRepository};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::conversation::ConversationStore;
use crate::directory::Directory;
use crate::error::{ClientError, Result};
use crate::events::{emit_event, UiEvent, UI_EVENT_CAPACITY};
use crate::identity::IdentityContext;
use crate::notifications::NotificationCenter;

pub type SharedState = Arc<Mutex<AppState>>;

/// Central application state.
///
/// Each component is a separate field; effects that cross components (a new
/// message producing a notification, a receipt producing a UI refresh) go
/// through [`AppState::flush_events`].
pub struct AppState {
    pub config: ClientConfig,

    /// Who is signed in, backed by the session slot.
    pub identity: IdentityContext,

    /// Known community members.
    pub directory: Directory,

    pub conversations: ConversationStore,

    pub notifications: NotificationCenter,

    /// User-facing preferences, mirrored from the database.
    pub settings: AppSettings,

    /// Notification log and settings storage. `None` keeps everything in
    /// memory.
    pub database: Option<Database>,

    ui_tx: broadcast::Sender<UiEvent>,
}

impl AppState {
    /// State backed by the given session slot and optional database. Stored
    /// notifications and settings are loaded from the database.
    pub fn new(
        config: ClientConfig,
        session: Box<dyn SessionRepository>,
        database: Option<Database>,
    ) -> Result<Self> {
        let (ui_tx, _) = broadcast::channel(UI_EVENT_CAPACITY);

        let (notifications, settings) = match &database {
            Some(db) => (
                NotificationCenter::restore(db.load_notifications()?),
                db.get_settings()?,
            ),
            None => (NotificationCenter::new(), AppSettings::default()),
        };

        Ok(Self {
            config,
            identity: IdentityContext::new(session),
            directory: Directory::new(),
            conversations: ConversationStore::new(),
            notifications,
            settings,
            database,
            ui_tx,
        })
    }

    /// Open the on-disk database named by the config (or the platform
    /// default) and load the session from it.
    pub fn open(config: ClientConfig) -> Result<Self> {
        // The session slot and the log each get their own connection to
        // the same file.
        let (session, database) = match &config.db_path {
            Some(path) => (Database::open_at(path)?, Database::open_at(path)?),
            None => (Database::new()?, Database::new()?),
        };

        let mut state = Self::new(config, Box::new(session), Some(database))?;
        if state.identity.load().is_err() {
            debug!("no stored session");
        }
        Ok(state)
    }

    /// Fully in-memory state, for tests and previews.
    pub fn in_memory(config: ClientConfig) -> Self {
        let (ui_tx, _) = broadcast::channel(UI_EVENT_CAPACITY);
        Self {
            config,
            identity: IdentityContext::new(Box::new(MemorySession::new())),
            directory: Directory::new(),
            conversations: ConversationStore::new(),
            notifications: NotificationCenter::new(),
            settings: AppSettings::default(),
            database: None,
            ui_tx,
        }
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    /// Subscribe to UI change events.
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.ui_tx.subscribe()
    }

    pub fn emit(&self, event: UiEvent) {
        emit_event(&self.ui_tx, event);
    }

    /// Clone of the signed-in user.
    pub fn current_user(&self) -> Result<User> {
        self.identity.current().cloned()
    }

    /// Drain the conversation store's events: forward each one to the UI
    /// and mirror it into the notification center for the signed-in user.
    pub fn flush_events(&mut self) {
        let events = self.conversations.drain_events();
        if events.is_empty() {
            return;
        }

        let local_user = self.identity.current().ok().cloned();
        let mut mirrored = false;

        for event in &events {
            self.emit(UiEvent::from(event));

            if let Some(user) = &local_user {
                mirrored |= self
                    .notifications
                    .mirror(event, user, &self.directory, &self.settings.notifications)
                    .is_some();
            }
        }

        if mirrored {
            self.notifications_changed(self.settings.notifications.sound_enabled);
        }
    }

    /// Persist the notification log and tell the UI the badge changed.
    pub fn notifications_changed(&self, play_sound: bool) {
        if let Err(e) = self.persist_notifications() {
            warn!(error = %e, "failed to persist notifications");
        }
        self.emit(UiEvent::NotificationsChanged {
            unread: self.notifications.unread_count(),
            play_sound,
        });
    }

    /// Write the chronological notification snapshot to the database.
    pub fn persist_notifications(&self) -> Result<()> {
        if let Some(db) = &self.database {
            db.replace_notifications(&self.notifications.chronological())?;
        }
        Ok(())
    }
}

/// Lock the shared state, mapping poisoning to a client error.
pub fn lock(state: &SharedState) -> Result<MutexGuard<'_, AppState>> {
    state.lock().map_err(|_| ClientError::LockPoisoned)
}
