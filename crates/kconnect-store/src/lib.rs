//! # kconnect-store
//!
//! Local persistence for the Krishna Connect client, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for the three things the
//! client keeps across restarts: the session slot holding the signed-in
//! user, the notification log and the user-facing settings.

pub mod database;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod session;
pub mod settings;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
pub use session::{MemorySession, SessionRepository};
