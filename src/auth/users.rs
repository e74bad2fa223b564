use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{internal, AuthError, AuthResult};

/// User role controlling access to protected resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Engineer,
    User,
}

impl Role {
    /// Network statistics are restricted to operations staff
    pub fn can_view_network_stats(&self) -> bool {
        matches!(self, Role::Admin | Role::Engineer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Engineer => write!(f, "engineer"),
            Role::User => write!(f, "user"),
        }
    }
}

/// A directory entry. The password hash never leaves this struct;
/// [`User::public`] produces the representation safe for responses.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

impl User {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// User representation exposed by API responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// Static in-memory user directory, immutable at runtime
#[derive(Debug, Clone)]
pub struct UserDirectory {
    users: Vec<User>,
}

impl UserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }

    /// Build the demo directory. Passwords are bcrypt-hashed at seed time.
    pub fn seeded() -> AuthResult<Self> {
        let entries = [
            ("telecom_admin", "admin@telecom.example", Role::Admin),
            ("network_engineer", "engineer@telecom.example", Role::Engineer),
            ("support_user", "support@telecom.example", Role::User),
        ];

        let mut users = Vec::with_capacity(entries.len());
        for (username, email, role) in entries {
            let password_hash =
                bcrypt::hash("password123", bcrypt::DEFAULT_COST).map_err(internal)?;
            users.push(User {
                id: Uuid::new_v4(),
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                role,
            });
        }

        Ok(Self::new(users))
    }

    /// Look up a user by username or email
    pub fn find(&self, login: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|user| user.username == login || user.email == login)
    }

    pub fn by_id(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    /// Verify credentials against the directory.
    ///
    /// Both an unknown login and a wrong password yield `InvalidCredentials`;
    /// the caller cannot tell which applied.
    pub fn authenticate(&self, login: &str, password: &str) -> AuthResult<&User> {
        let user = self.find(login).ok_or(AuthError::InvalidCredentials)?;

        let matches = bcrypt::verify(password, &user.password_hash).map_err(internal)?;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
