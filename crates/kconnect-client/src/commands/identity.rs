use kconnect_shared::ProfilePatch;
use tracing::info;

use crate::auth::{ProfileRecord, ProfileStore};
use crate::commands::directory::UserDto;
use crate::error::Result;
use crate::events::UiEvent;
use crate::state::{lock, SharedState};

/// The signed-in user, or `Unauthenticated` so the view can redirect to
/// login.
pub fn current_user(state: &SharedState) -> Result<UserDto> {
    let guard = lock(state)?;
    Ok(UserDto::from(guard.identity.current()?))
}

/// Re-read the session slot.
pub fn load_session(state: &SharedState) -> Result<UserDto> {
    let mut guard = lock(state)?;
    let user = guard.identity.load()?.clone();
    guard.directory.upsert(user.clone());
    Ok(UserDto::from(&user))
}

/// Apply a profile edit locally and persist it to the session slot.
pub fn update_profile(state: &SharedState, patch: ProfilePatch) -> Result<UserDto> {
    let mut guard = lock(state)?;
    let user = guard.identity.update(patch)?;
    guard.directory.upsert(user.clone());
    info!(user = %user.id, "profile updated");
    Ok(UserDto::from(&user))
}

/// Push the signed-in user's profile to the external profile store.
pub async fn sync_profile(state: &SharedState, store: &dyn ProfileStore) -> Result<()> {
    let record = {
        let guard = lock(state)?;
        ProfileRecord::from_user(guard.identity.current()?)
    };
    store.save_profile(&record).await?;
    info!(user = %record.id, "profile synced");
    Ok(())
}

pub fn sign_out(state: &SharedState) -> Result<()> {
    let mut guard = lock(state)?;
    guard.identity.sign_out()?;
    guard.emit(UiEvent::SessionChanged { signed_in: false });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::fake::FakeAuth;
    use crate::commands::testing::{community, MADAN};
    use crate::error::ClientError;
    use kconnect_shared::PresenceStatus;

    #[test]
    fn test_update_profile_reaches_directory() {
        let state = community(MADAN);
        let updated = update_profile(
            &state,
            ProfilePatch {
                spiritual_name: Some("Madan Mohan Das".into()),
                status: Some(PresenceStatus::Away),
                ..ProfilePatch::default()
            },
        )
        .unwrap();
        assert_eq!(updated.status, PresenceStatus::Away);

        let guard = lock(&state).unwrap();
        assert_eq!(guard.directory.name_of(&updated.id), "Madan Mohan Das");
    }

    #[test]
    fn test_sign_out_fails_closed() {
        let state = community(MADAN);
        sign_out(&state).unwrap();
        assert!(matches!(current_user(&state), Err(ClientError::Unauthenticated)));
        assert!(matches!(load_session(&state), Err(ClientError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_sync_profile() {
        let state = community(MADAN);
        let store = FakeAuth::default();
        sync_profile(&state, &store).await.unwrap();

        let saved = store.profiles.lock().unwrap().get(MADAN).cloned().unwrap();
        assert_eq!(saved.name, "Madan Mohan");
        assert_eq!(saved.role, "user");

        sign_out(&state).unwrap();
        assert!(sync_profile(&state, &store).await.is_err());
    }
}
