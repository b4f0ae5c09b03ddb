//! Messaging permission policy.
//!
//! Every screen that decides whether to show a compose box or a
//! "request approval" affordance goes through [`can_send`]. The result is
//! never cached: roles may change between two attempts.
//!
//! Resolution order:
//! 1. Guru and admin may always send
//! 2. Channels that allow cross-gender interaction accept everyone
//! 3. Same gender as the DM recipient, or as the channel audience
//! 4. Anything else requires approval

use serde::{Deserialize, Serialize};

use crate::identity::User;
use crate::types::{Gender, UserId};

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SendPermission {
    Allowed,
    RequiresApproval,
}

impl SendPermission {
    pub fn is_allowed(self) -> bool {
        matches!(self, SendPermission::Allowed)
    }
}

/// What the sender is trying to write to.
#[derive(Debug, Clone, Copy)]
pub enum SendTarget<'a> {
    /// A one-to-one thread with this recipient.
    Direct(&'a User),
    /// A multi-party channel.
    Channel {
        allow_cross_gender: bool,
        /// Gender the channel is intended for; `None` means a mixed audience.
        audience: Option<Gender>,
    },
}

pub fn can_send(sender: &User, target: SendTarget<'_>) -> SendPermission {
    if sender.role.is_elevated() {
        return SendPermission::Allowed;
    }

    let same_audience = match target {
        SendTarget::Channel {
            allow_cross_gender: true,
            ..
        } => true,
        SendTarget::Channel { audience, .. } => audience.map_or(true, |g| g == sender.gender),
        SendTarget::Direct(recipient) => recipient.gender == sender.gender,
    };

    if same_audience {
        SendPermission::Allowed
    } else {
        SendPermission::RequiresApproval
    }
}

/// Whether `user` may pin, post notices or otherwise moderate a thread with
/// the given moderator list.
pub fn can_manage_thread(user: &User, moderators: &[UserId]) -> bool {
    user.role.is_elevated() || moderators.contains(&user.id)
}

/// Channel creation by anyone below admin goes through an approval request.
pub fn can_create_channel_directly(user: &User) -> bool {
    user.role.is_elevated()
}
