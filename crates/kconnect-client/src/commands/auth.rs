use crate::auth::{self, AuthBackend, SignUpForm};
use crate::commands::directory::UserDto;
use crate::error::Result;
use crate::events::UiEvent;
use crate::state::{lock, SharedState};

/// Check credentials against the backend and start a session.
pub async fn sign_in(
    state: &SharedState,
    backend: &dyn AuthBackend,
    email: &str,
    password: &str,
) -> Result<UserDto> {
    let user = auth::sign_in(backend, email, password).await?;

    let mut guard = lock(state)?;
    guard.directory.upsert(user.clone());
    let user = guard.identity.sign_in(user)?.clone();
    guard.emit(UiEvent::SessionChanged { signed_in: true });
    Ok(UserDto::from(&user))
}

/// Create an account. The new member still signs in afterwards, once their
/// email is verified.
pub async fn sign_up(backend: &dyn AuthBackend, form: SignUpForm) -> Result<UserDto> {
    let user = auth::sign_up(backend, &form).await?;
    Ok(UserDto::from(&user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::fake::FakeAuth;
    use crate::commands::identity::current_user;
    use crate::config::ClientConfig;
    use crate::error::ClientError;
    use crate::state::AppState;
    use kconnect_shared::{Gender, Role};

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let backend = FakeAuth::default();
        let state = AppState::in_memory(ClientConfig::default()).into_shared();
        let mut rx = lock(&state).unwrap().subscribe();

        let created = sign_up(
            &backend,
            SignUpForm {
                name: "Govinda Das".into(),
                email: "govinda@example.org".into(),
                password: "jaya".into(),
                confirm_password: "jaya".into(),
                gender: Some(Gender::Male),
                spiritual_name: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(created.role, Role::User);
        assert!(current_user(&state).is_err());

        let user = sign_in(&state, &backend, "govinda@example.org", "jaya")
            .await
            .unwrap();
        assert_eq!(user.id, created.id);
        assert_eq!(current_user(&state).unwrap().id, created.id);
        assert_eq!(rx.try_recv().unwrap(), UiEvent::SessionChanged { signed_in: true });
    }

    #[tokio::test]
    async fn test_failed_sign_in_keeps_session_empty() {
        let backend = FakeAuth::default();
        let state = AppState::in_memory(ClientConfig::default()).into_shared();

        let err = sign_in(&state, &backend, "nobody@example.org", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ExternalService(_)));
        assert!(matches!(current_user(&state), Err(ClientError::Unauthenticated)));
    }
}
