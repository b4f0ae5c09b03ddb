//! Devotee directory: the known users, their presence labels and the
//! search/filter used by the directory page.

use std::collections::BTreeMap;

use kconnect_shared::{Gender, PresenceStatus, Role, User, UserId};
use serde::Deserialize;

/// Filters from the directory page. `None` means "all".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryQuery {
    #[serde(default)]
    pub text: String,
    pub role: Option<Role>,
    pub gender: Option<Gender>,
    pub status: Option<PresenceStatus>,
}

impl DirectoryQuery {
    fn matches(&self, user: &User) -> bool {
        let needle = self.text.trim().to_lowercase();
        let text_ok = needle.is_empty()
            || [
                Some(user.display_name.as_str()),
                user.spiritual_name.as_deref(),
                user.location.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle));

        text_ok
            && self.role.map_or(true, |r| r == user.role)
            && self.gender.map_or(true, |g| g == user.gender)
            && self.status.map_or(true, |s| s == user.status)
    }
}

#[derive(Debug, Default)]
pub struct Directory {
    users: BTreeMap<UserId, User>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user record.
    pub fn upsert(&mut self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn get(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Display name for an id, falling back to the raw id.
    pub fn name_of(&self, id: &UserId) -> String {
        self.users
            .get(id)
            .map(|u| u.preferred_name().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// Presence label; unknown users read as offline.
    pub fn presence(&self, id: &UserId) -> PresenceStatus {
        self.users
            .get(id)
            .map_or(PresenceStatus::Offline, |u| u.status)
    }

    pub fn set_presence(&mut self, id: &UserId, status: PresenceStatus) -> bool {
        match self.users.get_mut(id) {
            Some(user) => {
                user.status = status;
                true
            }
            None => false,
        }
    }

    /// Users matching `query`, sorted by preferred name.
    pub fn search(&self, query: &DirectoryQuery) -> Vec<&User> {
        let mut hits: Vec<&User> = self.users.values().filter(|u| query.matches(u)).collect();
        hits.sort_by_key(|u| u.preferred_name().to_lowercase());
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Directory {
        let mut dir = Directory::new();

        let mut radha = User::new(UserId::new("1"), "Radha Devi Dasi", Role::Coordinator, Gender::Female);
        radha.location = Some("Vrindavan Temple".into());
        dir.upsert(radha);

        let mut govinda = User::new(UserId::new("2"), "Govinda Das", Role::Admin, Gender::Male);
        govinda.status = PresenceStatus::Away;
        govinda.location = Some("Mayapur Temple".into());
        dir.upsert(govinda);

        let mut krishna = User::new(UserId::new("3"), "Krishna Das", Role::User, Gender::Male);
        krishna.status = PresenceStatus::Offline;
        dir.upsert(krishna);

        dir
    }

    fn ids(users: Vec<&User>) -> Vec<&str> {
        users.into_iter().map(|u| u.id.as_str()).collect()
    }

    #[test]
    fn test_text_search_covers_location() {
        let dir = directory();
        let query = DirectoryQuery {
            text: "temple".into(),
            ..Default::default()
        };
        assert_eq!(ids(dir.search(&query)), ["2", "1"]);
    }

    #[test]
    fn test_filters_combine() {
        let dir = directory();
        let query = DirectoryQuery {
            gender: Some(Gender::Male),
            status: Some(PresenceStatus::Offline),
            ..Default::default()
        };
        assert_eq!(ids(dir.search(&query)), ["3"]);

        let admins = DirectoryQuery {
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert_eq!(ids(dir.search(&admins)), ["2"]);
    }

    #[test]
    fn test_presence_defaults_to_offline() {
        let mut dir = directory();
        assert_eq!(dir.presence(&UserId::new("2")), PresenceStatus::Away);
        assert_eq!(dir.presence(&UserId::new("99")), PresenceStatus::Offline);

        assert!(dir.set_presence(&UserId::new("3"), PresenceStatus::Online));
        assert!(!dir.set_presence(&UserId::new("99"), PresenceStatus::Online));
        assert_eq!(dir.presence(&UserId::new("3")), PresenceStatus::Online);
    }
}
