//! Command handlers for the view layer.
//!
//! Each sub-module groups related commands by page. Handlers take the
//! [`SharedState`](crate::state::SharedState), lock it only for synchronous
//! work, and return serde DTOs in camelCase. Errors serialize to their
//! display string.

pub mod auth;
pub mod channels;
pub mod directory;
pub mod identity;
pub mod messaging;
pub mod notifications;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing {
    use kconnect_shared::message::ChannelInfo;
    use kconnect_shared::{Gender, Role, ThreadId, User, UserId};

    use crate::config::ClientConfig;
    use crate::state::{AppState, SharedState};

    pub const MADAN: &str = "1";
    pub const GOVINDA: &str = "2";
    pub const VRINDAVAN: &str = "3";
    pub const RADHA: &str = "4";

    pub fn member(id: &str, name: &str, role: Role, gender: Gender) -> User {
        User::new(UserId::new(id), name, role, gender)
    }

    /// A small community with three channels, signed in as `signed_in`.
    pub fn community(signed_in: &str) -> SharedState {
        let mut state = AppState::in_memory(ClientConfig::default());

        for user in [
            member(MADAN, "Madan Mohan", Role::User, Gender::Male),
            member(GOVINDA, "Govinda Das", Role::Admin, Gender::Male),
            member(VRINDAVAN, "Vrindavan Das", Role::User, Gender::Male),
            member(RADHA, "Radha Devi Dasi", Role::Coordinator, Gender::Female),
        ] {
            state.directory.upsert(user);
        }

        let mut general = ChannelInfo::new("General Discussion");
        general.allow_cross_gender = true;
        let mut brahmacari = ChannelInfo::new("Brahmacari Ashram");
        brahmacari.audience = Some(Gender::Male);
        let mut matajis = ChannelInfo::new("Matajis Sanga");
        matajis.audience = Some(Gender::Female);
        matajis.moderators.push(UserId::new(RADHA));

        for (id, info) in [
            ("general", general),
            ("brahmacari", brahmacari),
            ("matajis", matajis),
        ] {
            state
                .conversations
                .create_channel(ThreadId::new(id), info)
                .map(|_| ())
                .unwrap();
        }

        if let Some(user) = state.directory.get(&UserId::new(signed_in)).cloned() {
            state.identity.sign_in(user).unwrap();
        }
        state.into_shared()
    }
}
