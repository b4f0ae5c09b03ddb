use kconnect_store::AppSettings;
use tracing::info;

use crate::error::Result;
use crate::state::{lock, SharedState};

pub fn get_settings(state: &SharedState) -> Result<AppSettings> {
    let guard = lock(state)?;
    guard.current_user()?;
    Ok(guard.settings.clone())
}

/// Persist new settings, then apply them to the live state. Notification
/// preferences take effect for the next mirrored event.
pub fn update_settings(state: &SharedState, settings: AppSettings) -> Result<AppSettings> {
    let mut guard = lock(state)?;
    guard.current_user()?;

    if let Some(db) = &guard.database {
        db.save_settings(&settings)?;
    }
    guard.settings = settings;

    info!(
        push = guard.settings.notifications.push_enabled,
        mention_only = guard.settings.notifications.mention_only,
        "settings updated"
    );
    Ok(guard.settings.clone())
}

#[cfg(test)]
mod tests {
    use kconnect_shared::message::MessageKind;
    use kconnect_store::Database;

    use super::*;
    use crate::commands::messaging::{open_direct, receive_message};
    use crate::commands::testing::{community, member, MADAN, VRINDAVAN};
    use crate::config::ClientConfig;
    use crate::error::ClientError;
    use crate::state::AppState;
    use kconnect_shared::{Gender, Role};
    use kconnect_store::MemorySession;

    #[test]
    fn test_mention_only_suppresses_plain_messages() {
        let state = community(MADAN);
        let mut settings = get_settings(&state).unwrap();
        settings.notifications.mention_only = true;
        update_settings(&state, settings).unwrap();

        let dm = open_direct(&state, VRINDAVAN).unwrap();
        receive_message(&state, dm.id.as_str(), VRINDAVAN, "Hare Krishna", MessageKind::UserMessage)
            .unwrap();
        assert!(lock(&state).unwrap().notifications.is_empty());

        receive_message(
            &state,
            dm.id.as_str(),
            VRINDAVAN,
            "@Madan are you coming?",
            MessageKind::UserMessage,
        )
        .unwrap();
        assert_eq!(lock(&state).unwrap().notifications.len(), 1);
    }

    #[test]
    fn test_settings_persist_to_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kc.db");

        let mut state = AppState::new(
            ClientConfig::default(),
            Box::new(MemorySession::new()),
            Some(Database::open_at(&path).unwrap()),
        )
        .unwrap();
        state
            .identity
            .sign_in(member(MADAN, "Madan Mohan", Role::User, Gender::Male))
            .unwrap();
        let state = state.into_shared();

        let mut settings = get_settings(&state).unwrap();
        settings.appearance.compact_mode = true;
        update_settings(&state, settings.clone()).unwrap();

        let reopened = Database::open_at(&path).unwrap();
        assert_eq!(reopened.get_settings().unwrap(), settings);
    }

    #[test]
    fn test_signed_out_fails_closed() {
        let state = community("nobody");
        assert!(matches!(get_settings(&state), Err(ClientError::Unauthenticated)));
        assert!(matches!(
            update_settings(&state, AppSettings::default()),
            Err(ClientError::Unauthenticated)
        ));
    }
}
