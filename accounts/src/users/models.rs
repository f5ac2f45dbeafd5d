//! Account and session documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User-settable key/value preferences.
pub type Preferences = Map<String, Value>;

/// Collection holding registered accounts.
pub const USERS_COLLECTION: &str = "users";
/// Collection holding authentication sessions.
pub const SESSIONS_COLLECTION: &str = "sessions";

/// Field names used in stored documents.
pub mod fields {
    pub const EMAIL: &str = "email";
    pub const PREFERENCES: &str = "preferences";
    pub const USER_ID: &str = "userId";
    pub const JWT: &str = "jwt";

    /// User fields that a pass-through attribute may not shadow.
    pub const USER_RESERVED: [&str; 2] = [EMAIL, PREFERENCES];
}

/// A registered account.
///
/// Only `email` and `preferences` are interpreted here; every other field
/// (name, password hash, flags) is carried in `attributes` and stored as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique account key.
    pub email: String,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            preferences: Preferences::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Adds a pass-through field such as `name` or `hashedpw`.
    ///
    /// `email` and `preferences` are not attributes; a user carrying either
    /// key here is refused when stored.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// The first attribute key that collides with a modeled field.
    pub fn reserved_attribute(&self) -> Option<&'static str> {
        fields::USER_RESERVED
            .into_iter()
            .find(|key| self.attributes.contains_key(*key))
    }
}

/// The current authentication session of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Identity of the owning user (their email).
    #[serde(rename = "userId")]
    pub user_id: String,
    pub jwt: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, jwt: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            jwt: jwt.into(),
        }
    }
}
