use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub experience_level: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub last_activity_at: Option<NaiveDateTime>,
}

/// The authenticated caller, threaded explicitly into every service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub is_admin: bool,
}

impl Principal {
    pub fn owns(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// Ordered access tiers: green < blue < orange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExperienceLevel {
    Green,
    Blue,
    Orange,
}

impl ExperienceLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "green" => Some(ExperienceLevel::Green),
            "blue" => Some(ExperienceLevel::Blue),
            "orange" => Some(ExperienceLevel::Orange),
            _ => None,
        }
    }

    /// A walker may take any dog at or below their own tier. Unknown tiers never pass.
    pub fn can_walk(user_level: &str, dog_category: &str) -> bool {
        match (Self::parse(user_level), Self::parse(dog_category)) {
            (Some(user), Some(dog)) => user >= dog,
            _ => false,
        }
    }
}
