//! Caller identity.

use cartwheel_core::{Role, UserId};
use serde::{Deserialize, Serialize};

/// The authenticated caller, as established by the auth collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub role: Role,
}

impl CurrentUser {
    /// Whether the caller may use admin-only operations.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
