use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Gender, PresenceStatus, Role, UserId};

/// Shortest `@handle` prefix that counts as a mention.
const MIN_MENTION_CHARS: usize = 3;

/// A community member as seen by the client.
///
/// This is also the record persisted in the session slot, so field names
/// follow the camelCase layout of the stored JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    #[serde(alias = "name")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spiritual_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub gender: Gender,
    #[serde(default, alias = "avatar")]
    pub avatar_ref: String,
    #[serde(default)]
    pub status: PresenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default = "Utc::now")]
    pub joined_at: DateTime<Utc>,
}

impl User {
    /// Minimal user with the defaults a freshly signed-up member gets.
    pub fn new(id: UserId, display_name: impl Into<String>, role: Role, gender: Gender) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            spiritual_name: None,
            email: None,
            role,
            gender,
            avatar_ref: String::new(),
            status: PresenceStatus::Online,
            bio: None,
            location: None,
            joined_at: Utc::now(),
        }
    }

    /// Title derived from gender; never stored.
    pub fn title(&self) -> &'static str {
        self.gender.title()
    }

    /// Spiritual name when set, otherwise the display name.
    pub fn preferred_name(&self) -> &str {
        self.spiritual_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.display_name)
    }

    /// Whether `text` contains an `@mention` of this user, matched against
    /// either name with whitespace removed (`@MadanMohan`), case-insensitive.
    pub fn is_mentioned_in(&self, text: &str) -> bool {
        let handles: Vec<String> = [Some(self.display_name.as_str()), self.spiritual_name.as_deref()]
            .into_iter()
            .flatten()
            .map(|name| name.split_whitespace().collect::<String>().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();

        text.split_whitespace()
            .filter_map(|word| word.strip_prefix('@'))
            .map(|w| {
                w.trim_end_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|mention| mention.chars().count() >= MIN_MENTION_CHARS)
            .any(|mention| handles.iter().any(|h| h.starts_with(&mention)))
    }

    /// Apply a partial profile edit.
    pub fn apply(&mut self, patch: ProfilePatch) {
        if let Some(name) = patch.display_name {
            self.display_name = name;
        }
        if let Some(spiritual) = patch.spiritual_name {
            self.spiritual_name = (!spiritual.trim().is_empty()).then_some(spiritual);
        }
        if let Some(bio) = patch.bio {
            self.bio = (!bio.trim().is_empty()).then_some(bio);
        }
        if let Some(location) = patch.location {
            self.location = (!location.trim().is_empty()).then_some(location);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(avatar) = patch.avatar_ref {
            self.avatar_ref = avatar;
        }
    }
}

/// Fields a profile-edit form may change. Role and gender are not editable
/// from the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub spiritual_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub status: Option<PresenceStatus>,
    pub avatar_ref: Option<String>,
}
