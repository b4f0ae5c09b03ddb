use kconnect_shared::permissions::{self, SendPermission, SendTarget};
use kconnect_shared::{Gender, PresenceStatus, Role, User, UserId};
use serde::Serialize;

use crate::directory::DirectoryQuery;
use crate::error::{ClientError, Result};
use crate::state::{lock, SharedState};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: UserId,
    pub display_name: String,
    pub spiritual_name: Option<String>,
    pub title: &'static str,
    pub role: Role,
    pub gender: Gender,
    pub avatar_ref: String,
    pub status: PresenceStatus,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub joined_at: String,
}

impl From<&User> for UserDto {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            display_name: u.display_name.clone(),
            spiritual_name: u.spiritual_name.clone(),
            title: u.title(),
            role: u.role,
            gender: u.gender,
            avatar_ref: u.avatar_ref.clone(),
            status: u.status,
            bio: u.bio.clone(),
            location: u.location.clone(),
            joined_at: u.joined_at.to_rfc3339(),
        }
    }
}

/// A directory card: the member plus what the signed-in user may do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub user: UserDto,
    pub presence: PresenceStatus,
    /// Whether a direct message would go through or need approval.
    pub permission: SendPermission,
}

pub fn search_directory(state: &SharedState, query: DirectoryQuery) -> Result<Vec<MemberDto>> {
    let guard = lock(state)?;
    let me = guard.current_user()?;

    Ok(guard
        .directory
        .search(&query)
        .into_iter()
        .filter(|u| u.id != me.id)
        .map(|u| MemberDto {
            user: UserDto::from(u),
            presence: u.status,
            permission: permissions::can_send(&me, SendTarget::Direct(u)),
        })
        .collect())
}

/// Permission and presence for one member, evaluated now.
pub fn get_member(state: &SharedState, user_id: &str) -> Result<MemberDto> {
    let guard = lock(state)?;
    let me = guard.current_user()?;
    let id = UserId::new(user_id);

    let user = guard
        .directory
        .get(&id)
        .ok_or_else(|| ClientError::UserNotFound(id.clone()))?;
    let presence = if id == me.id && !guard.settings.privacy.show_online_status {
        PresenceStatus::Offline
    } else {
        guard.directory.presence(&id)
    };
    Ok(MemberDto {
        user: UserDto::from(user),
        presence,
        permission: permissions::can_send(&me, SendTarget::Direct(user)),
    })
}
