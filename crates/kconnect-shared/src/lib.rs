//! # kconnect-shared
//!
//! Domain types shared by the Krishna Connect store and client crates:
//! users, threads, messages, notifications, conversation events and the
//! messaging permission policy.

pub mod constants;
pub mod error;
pub mod events;
pub mod identity;
pub mod message;
pub mod notification;
pub mod permissions;
pub mod types;

pub use error::ParseError;
pub use identity::{ProfilePatch, User};
pub use types::*;
