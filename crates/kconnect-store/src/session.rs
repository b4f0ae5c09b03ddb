//! The session slot: a single persisted `User` record.
//!
//! Every screen reads it on mount to decide between rendering and
//! redirecting to login, so it sits behind a small repository trait that the
//! client can swap for an in-memory slot in tests.

use chrono::Utc;
use kconnect_shared::User;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;

/// Load/save access to the persisted session.
pub trait SessionRepository: Send {
    /// The stored user, or `None` when nobody is signed in.
    fn load(&self) -> Result<Option<User>>;

    /// Replace the stored user.
    fn save(&mut self, user: &User) -> Result<()>;

    /// Forget the stored user.
    fn clear(&mut self) -> Result<()>;
}

impl SessionRepository for Database {
    fn load(&self) -> Result<Option<User>> {
        let json: Option<String> = self
            .conn()
            .query_row("SELECT user_json FROM session WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, user: &User) -> Result<()> {
        let json = serde_json::to_string(user)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO session (id, user_json, saved_at) VALUES (1, ?1, ?2)",
            params![json, Utc::now().to_rfc3339()],
        )?;
        tracing::debug!(user = %user.id, "session saved");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.conn().execute("DELETE FROM session", [])?;
        tracing::debug!("session cleared");
        Ok(())
    }
}

/// Session slot kept in memory as serialized JSON, so it round-trips the
/// same way the database slot does.
#[derive(Debug, Default, Clone)]
pub struct MemorySession {
    slot: Option<String>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: &User) -> Result<Self> {
        Ok(Self {
            slot: Some(serde_json::to_string(user)?),
        })
    }
}

impl SessionRepository for MemorySession {
    fn load(&self) -> Result<Option<User>> {
        self.slot
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(Into::into)
    }

    fn save(&mut self, user: &User) -> Result<()> {
        self.slot = Some(serde_json::to_string(user)?);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use kconnect_shared::{Gender, Role, UserId};

    fn radha() -> User {
        User::new(UserId::new("1"), "Radha Devi Dasi", Role::Coordinator, Gender::Female)
    }

    #[test]
    fn database_session_round_trip() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(db.load().unwrap(), None);

        let user = radha();
        db.save(&user).unwrap();
        assert_eq!(db.load().unwrap(), Some(user.clone()));

        let mut edited = user;
        edited.location = Some("Vrindavan Temple".into());
        db.save(&edited).unwrap();
        assert_eq!(db.load().unwrap(), Some(edited));

        db.clear().unwrap();
        assert_eq!(db.load().unwrap(), None);
    }

    #[test]
    fn corrupt_session_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO session (id, user_json, saved_at) VALUES (1, 'not json', 'now')",
                [],
            )
            .unwrap();
        assert!(matches!(db.load(), Err(StoreError::Json(_))));
    }

    #[test]
    fn memory_session_round_trip() {
        let mut slot = MemorySession::new();
        assert_eq!(slot.load().unwrap(), None);
        slot.save(&radha()).unwrap();
        assert_eq!(slot.load().unwrap().map(|u| u.id), Some(UserId::new("1")));
        slot.clear().unwrap();
        assert_eq!(slot.load().unwrap(), None);
    }
}
