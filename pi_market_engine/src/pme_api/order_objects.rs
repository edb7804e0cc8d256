use serde::{Deserialize, Serialize};

use crate::db_types::{Role, Roles};

/// The authenticated identity on whose behalf an API call runs. Built from validated JWT claims
/// by the server layer and passed into each handler explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub roles: Roles,
}

impl Actor {
    pub fn new(user_id: i64, roles: Roles) -> Self {
        Self { user_id, roles }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role) || self.roles.contains(Role::Admin)
    }
}
