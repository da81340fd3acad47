use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dog {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub is_available: bool,
}
