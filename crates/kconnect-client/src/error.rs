use kconnect_shared::{MessageId, NotificationId, ParseError, ThreadId, UserId};
use kconnect_store::StoreError;
use thiserror::Error;

/// Everything a client operation can fail with.
///
/// Validation and permission errors are resolved locally and shown inline.
/// `ExternalService` is the only variant that crosses a network boundary; it
/// is surfaced as a form-level message and never retried automatically.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No valid session; the UI must redirect to login.
    #[error("Not signed in")]
    Unauthenticated,

    /// The permission policy vetoed the action; the UI offers an approval
    /// request instead of a compose box.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(ThreadId),

    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("Notification not found: {0}")]
    NotificationNotFound(NotificationId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Message body is empty")]
    EmptyBody,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid profile record: {0}")]
    InvalidProfile(#[from] ParseError),

    #[error("Service error: {0}")]
    ExternalService(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Application state lock poisoned")]
    LockPoisoned,
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::ExternalService(e.to_string())
    }
}

/// Commands hand errors to the view layer as their display string.
impl serde::Serialize for ClientError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
