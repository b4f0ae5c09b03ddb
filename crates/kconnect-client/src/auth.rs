//! Auth and profile collaborator used by the login and sign-up flows.
//!
//! [`AuthBackend`] and [`ProfileStore`] are the seams; [`RestAuthBackend`]
//! speaks the hosted backend's REST API. Failures come back as
//! `ClientError::ExternalService` carrying the service's message and are
//! never retried here.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use kconnect_shared::{Gender, PresenceStatus, Role, User, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// A signed-in account as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthAccount {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Row of the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub name: String,
    #[serde(default)]
    pub spiritual_name: Option<String>,
    pub gender: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ProfileRecord {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            name: user.display_name.clone(),
            spiritual_name: user.spiritual_name.clone(),
            gender: match user.gender {
                Gender::Male => "male",
                Gender::Female => "female",
            }
            .into(),
            role: user.role.as_str().into(),
            avatar: (!user.avatar_ref.is_empty()).then(|| user.avatar_ref.clone()),
            bio: user.bio.clone(),
            location: user.location.clone(),
            created_at: Some(user.joined_at),
        }
    }

    /// Parse into a domain user. Unknown role or gender strings are
    /// rejected rather than defaulted.
    pub fn into_user(self) -> Result<User> {
        let role: Role = self.role.parse()?;
        let gender: Gender = self.gender.parse()?;

        let mut user = User::new(UserId::new(self.id), self.name, role, gender);
        user.spiritual_name = self.spiritual_name.filter(|s| !s.trim().is_empty());
        user.email = self.email;
        user.avatar_ref = self.avatar.unwrap_or_default();
        user.bio = self.bio;
        user.location = self.location;
        user.status = PresenceStatus::Online;
        if let Some(joined) = self.created_at {
            user.joined_at = joined;
        }
        Ok(user)
    }
}

/// Credential and profile operations of the hosted backend.
pub trait AuthBackend: Send + Sync {
    fn sign_in<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<AuthAccount>>;

    fn sign_up<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<AuthAccount>>;

    fn fetch_profile<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<ProfileRecord>>>;

    fn insert_profile<'a>(&'a self, profile: &'a ProfileRecord) -> BoxFuture<'a, Result<()>>;
}

/// Where profile edits are written back.
pub trait ProfileStore: Send + Sync {
    fn save_profile<'a>(&'a self, profile: &'a ProfileRecord) -> BoxFuture<'a, Result<()>>;
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

/// Fields of the sign-up form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    /// Empty until the user picks one.
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub spiritual_name: Option<String>,
}

impl SignUpForm {
    /// Local checks run before any request is made. Returns the chosen
    /// gender.
    pub fn validate(&self) -> Result<Gender> {
        if self.password != self.confirm_password {
            return Err(ClientError::Validation("Passwords do not match".into()));
        }
        let gender = self
            .gender
            .ok_or_else(|| ClientError::Validation("Please select your gender".into()))?;
        if self.name.trim().is_empty() {
            return Err(ClientError::Validation("Please enter your name".into()));
        }
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(ClientError::Validation("Please enter valid credentials".into()));
        }
        Ok(gender)
    }
}

/// Create an account and its profile row. New members always get the
/// `user` role.
pub async fn sign_up(backend: &dyn AuthBackend, form: &SignUpForm) -> Result<User> {
    let gender = form.validate()?;
    let email = form.email.trim();

    let account = backend.sign_up(email, &form.password).await?;
    info!(user = %account.id, "account created");

    let mut user = User::new(UserId::new(account.id), form.name.trim(), Role::User, gender);
    user.email = Some(email.to_string());
    user.spiritual_name = form
        .spiritual_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    backend.insert_profile(&ProfileRecord::from_user(&user)).await?;
    info!(user = %user.id, "profile created");
    Ok(user)
}

/// Check credentials and load the matching profile.
pub async fn sign_in(backend: &dyn AuthBackend, email: &str, password: &str) -> Result<User> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ClientError::Validation("Please enter valid credentials".into()));
    }

    let account = backend.sign_in(email, password).await?;
    let profile = backend
        .fetch_profile(&account.id)
        .await?
        .ok_or_else(|| ClientError::UserNotFound(UserId::new(account.id.clone())))?;

    let user = profile.into_user()?;
    info!(user = %user.id, role = %user.role, "signed in");
    Ok(user)
}

// ---------------------------------------------------------------------------
// REST backend
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthAccount,
}

/// Sign-up answers with either a bare user or a session wrapping one,
/// depending on whether email confirmation is required.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<AuthAccount>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default, alias = "msg", alias = "error_description")]
    message: Option<String>,
}

pub struct RestAuthBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Mutex<Option<String>>,
}

impl RestAuthBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: Mutex::new(None),
        }
    }

    /// Backend from `KC_AUTH_URL` / `KC_AUTH_ANON_KEY`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let url = config
            .auth_url
            .as_deref()
            .ok_or_else(|| ClientError::ExternalService("auth service is not configured".into()))?;
        Ok(Self::new(url, config.auth_anon_key.clone().unwrap_or_default()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> String {
        let token = self
            .access_token
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .unwrap_or_else(|| self.api_key.clone());
        format!("Bearer {token}")
    }

    fn remember_token(&self, token: Option<String>) {
        if let (Some(token), Ok(mut slot)) = (token, self.access_token.lock()) {
            *slot = Some(token);
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("apikey", &self.api_key)
            .header("Authorization", self.bearer())
    }

    async fn write_profile(&self, method: reqwest::Method, path: &str, profile: &ProfileRecord) -> Result<()> {
        let resp = self
            .request(method, path)
            .header("Prefer", "return=minimal")
            .json(profile)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

/// Turn a non-success response into the service's error message.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = resp
        .json::<ServiceError>()
        .await
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("service responded {status}"));
    debug!(%status, %message, "auth service error");
    Err(ClientError::ExternalService(message))
}

impl AuthBackend for RestAuthBackend {
    fn sign_in<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<AuthAccount>> {
        Box::pin(async move {
            let resp = self
                .request(reqwest::Method::POST, "/auth/v1/token?grant_type=password")
                .json(&serde_json::json!({ "email": email, "password": password }))
                .send()
                .await?;
            let token: TokenResponse = check(resp).await?.json().await?;
            self.remember_token(Some(token.access_token));
            Ok(token.user)
        })
    }

    fn sign_up<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<AuthAccount>> {
        Box::pin(async move {
            let resp = self
                .request(reqwest::Method::POST, "/auth/v1/signup")
                .json(&serde_json::json!({ "email": email, "password": password }))
                .send()
                .await?;
            let body: SignUpResponse = check(resp).await?.json().await?;
            self.remember_token(body.access_token);

            match (body.user, body.id) {
                (Some(user), _) => Ok(user),
                (None, Some(id)) => Ok(AuthAccount { id, email: body.email }),
                (None, None) => Err(ClientError::ExternalService(
                    "sign-up response carried no user".into(),
                )),
            }
        })
    }

    fn fetch_profile<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<ProfileRecord>>> {
        Box::pin(async move {
            let resp = self
                .request(reqwest::Method::GET, "/rest/v1/profiles")
                .query(&[("id", format!("eq.{id}")), ("select", "*".to_string())])
                .send()
                .await?;
            let rows: Vec<ProfileRecord> = check(resp).await?.json().await?;
            Ok(rows.into_iter().next())
        })
    }

    fn insert_profile<'a>(&'a self, profile: &'a ProfileRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.write_profile(reqwest::Method::POST, "/rest/v1/profiles", profile))
    }
}

impl ProfileStore for RestAuthBackend {
    fn save_profile<'a>(&'a self, profile: &'a ProfileRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let path = format!("/rest/v1/profiles?id=eq.{}", profile.id);
            self.write_profile(reqwest::Method::PATCH, &path, profile).await
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeAuth;
    use super::*;

    fn form() -> SignUpForm {
        SignUpForm {
            name: "Radha Rani".into(),
            email: "radha.devi@example.org".into(),
            password: "hare-krishna".into(),
            confirm_password: "hare-krishna".into(),
            gender: Some(Gender::Female),
            spiritual_name: Some("  ".into()),
        }
    }

    #[test]
    fn test_validation_messages() {
        let mut mismatch = form();
        mismatch.confirm_password = "other".into();
        assert_eq!(
            mismatch.validate().unwrap_err().to_string(),
            "Invalid input: Passwords do not match"
        );

        let mut no_gender = form();
        no_gender.gender = None;
        assert_eq!(
            no_gender.validate().unwrap_err().to_string(),
            "Invalid input: Please select your gender"
        );

        assert_eq!(form().validate().unwrap(), Gender::Female);
    }

    #[tokio::test]
    async fn test_sign_up_creates_user_profile() {
        let backend = FakeAuth::default();
        let user = sign_up(&backend, &form()).await.unwrap();

        assert_eq!(user.role, Role::User);
        assert_eq!(user.title(), "Mataji");
        assert!(user.spiritual_name.is_none());

        let stored = backend.profiles.lock().unwrap().get(user.id.as_str()).cloned().unwrap();
        assert_eq!(stored.role, "user");
        assert_eq!(stored.gender, "female");

        // Same email again is refused by the service.
        let err = sign_up(&backend, &form()).await.unwrap_err();
        assert!(matches!(err, ClientError::ExternalService(m) if m == "User already registered"));
    }

    #[tokio::test]
    async fn test_sign_in_loads_profile() {
        let profile = ProfileRecord {
            id: "7".into(),
            email: Some("gurudev@example.org".into()),
            name: "His Divine Grace".into(),
            spiritual_name: None,
            gender: "male".into(),
            role: "gurudev".into(),
            avatar: None,
            bio: None,
            location: None,
            created_at: None,
        };
        let backend = FakeAuth::with_profile("gurudev@example.org", "secret", profile);

        let user = sign_in(&backend, " gurudev@example.org ", "secret").await.unwrap();
        assert_eq!(user.role, Role::Guru);

        assert!(matches!(
            sign_in(&backend, "gurudev@example.org", "wrong").await,
            Err(ClientError::ExternalService(_))
        ));
        assert!(matches!(
            sign_in(&backend, "", "secret").await,
            Err(ClientError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_role_is_rejected() {
        let profile = ProfileRecord {
            id: "8".into(),
            email: None,
            name: "Stranger".into(),
            spiritual_name: None,
            gender: "male".into(),
            role: "overlord".into(),
            avatar: None,
            bio: None,
            location: None,
            created_at: None,
        };
        let backend = FakeAuth::with_profile("s@example.org", "pw", profile);
        assert!(matches!(
            sign_in(&backend, "s@example.org", "pw").await,
            Err(ClientError::InvalidProfile(_))
        ));
    }

    #[test]
    fn test_rest_backend_requires_url() {
        assert!(RestAuthBackend::from_config(&ClientConfig::default()).is_err());
        let config = ClientConfig {
            auth_url: Some("https://auth.example.org".into()),
            ..ClientConfig::default()
        };
        let backend = RestAuthBackend::from_config(&config).unwrap();
        assert_eq!(backend.url("/auth/v1/signup"), "https://auth.example.org/auth/v1/signup");
    }
}
