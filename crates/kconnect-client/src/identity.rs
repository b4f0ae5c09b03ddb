//! Identity context: who is signed in.
//!
//! Backed by a [`SessionRepository`]. Loading fails closed: a missing or
//! unreadable session is `Unauthenticated`, never a default identity.

use kconnect_shared::{ProfilePatch, User};
use kconnect_store::SessionRepository;
use tracing::{info, warn};

use crate::error::{ClientError, Result};

pub struct IdentityContext {
    session: Box<dyn SessionRepository>,
    current: Option<User>,
}

impl IdentityContext {
    pub fn new(session: Box<dyn SessionRepository>) -> Self {
        Self {
            session,
            current: None,
        }
    }

    /// Read the persisted session into memory.
    pub fn load(&mut self) -> Result<&User> {
        match self.session.load() {
            Ok(Some(user)) => {
                info!(user = %user.id, role = %user.role, "session loaded");
                Ok(self.current.insert(user))
            }
            Ok(None) => {
                self.current = None;
                Err(ClientError::Unauthenticated)
            }
            Err(e) => {
                warn!(error = %e, "unreadable session, treating as signed out");
                self.current = None;
                Err(ClientError::Unauthenticated)
            }
        }
    }

    /// The signed-in user.
    pub fn current(&self) -> Result<&User> {
        self.current.as_ref().ok_or(ClientError::Unauthenticated)
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.is_some()
    }

    /// Persist `user` as the new session and make it current.
    pub fn sign_in(&mut self, user: User) -> Result<&User> {
        self.session.save(&user)?;
        info!(user = %user.id, "signed in");
        Ok(self.current.insert(user))
    }

    pub fn sign_out(&mut self) -> Result<()> {
        self.session.clear()?;
        if let Some(user) = self.current.take() {
            info!(user = %user.id, "signed out");
        }
        Ok(())
    }

    /// Apply a profile edit and persist it. The in-memory user only changes
    /// once the session slot accepted the write.
    pub fn update(&mut self, patch: ProfilePatch) -> Result<User> {
        let mut updated = self.current()?.clone();
        updated.apply(patch);
        self.session.save(&updated)?;
        self.current = Some(updated.clone());
        Ok(updated)
    }
}
