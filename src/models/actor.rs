//! Calling user, as forwarded by the upstream gateway

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Logistics,
    /// Sees only the deliveries it created
    Sales,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "logistics" => Ok(Role::Logistics),
            "sales" => Ok(Role::Sales),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i32,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i32, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Author filter applied to listings, if any
    pub fn visibility_scope(&self) -> Option<i32> {
        match self.role {
            Role::Sales => Some(self.user_id),
            Role::Admin | Role::Logistics => None,
        }
    }
}
