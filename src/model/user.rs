use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Roles known to the workflow. Anything else in a token is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Superadmin,
    Admin,
    Supervisor,
    Freelancer,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::Supervisor => "supervisor",
            Role::Freelancer => "freelancer",
            Role::Customer => "customer",
        }
    }

    /// Superadmins and admins see every estimate.
    pub fn is_back_office(&self) -> bool {
        matches!(self, Role::Superadmin | Role::Admin)
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Superadmin | Role::Admin | Role::Supervisor)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "superadmin" | "super_admin" => Ok(Role::Superadmin),
            "admin" => Ok(Role::Admin),
            "supervisor" => Ok(Role::Supervisor),
            "freelancer" => Ok(Role::Freelancer),
            "customer" | "user" => Ok(Role::Customer),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The authenticated caller of an operation, resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: ObjectId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: ObjectId, role: Role) -> Self {
        Actor { id, role }
    }
}

/// A user as seen through the identity directory. The directory is owned by
/// the account service; this crate only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_role_aliases() {
        assert_eq!("super_admin".parse::<Role>().unwrap(), Role::Superadmin);
        assert_eq!("Freelancer".parse::<Role>().unwrap(), Role::Freelancer);
        assert_eq!("user".parse::<Role>().unwrap(), Role::Customer);
        assert!("mentor".parse::<Role>().is_err());
    }

    #[test]
    fn supervisors_are_staff_but_not_back_office() {
        assert!(Role::Supervisor.is_staff());
        assert!(!Role::Supervisor.is_back_office());
        assert!(!Role::Freelancer.is_staff());
    }
}
