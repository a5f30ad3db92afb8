use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roles the identity provider hands out
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Coach,
    Athlete,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Coach => "coach",
            UserRole::Athlete => "athlete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "coach" => Some(UserRole::Coach),
            "athlete" => Some(UserRole::Athlete),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,    // Subject (user ID)
    pub role: UserRole, // User role
    pub exp: usize,     // Expiration time
    pub iat: usize,     // Issued at
}

/// The authenticated caller, threaded explicitly into every service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Principal {
    pub fn coach(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: UserRole::Coach,
        }
    }

    pub fn athlete(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: UserRole::Athlete,
        }
    }

    pub fn from_claims(claims: &Claims) -> Result<Self, uuid::Error> {
        Ok(Self {
            user_id: Uuid::parse_str(&claims.sub)?,
            role: claims.role,
        })
    }

    pub fn is_coach(&self) -> bool {
        self.role == UserRole::Coach
    }

    pub fn is_athlete(&self) -> bool {
        self.role == UserRole::Athlete
    }
}
