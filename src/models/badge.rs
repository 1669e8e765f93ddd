use serde::{Deserialize, Serialize};

use super::Difficulty;

// Unlock criteria are opaque to the store; the awarding service interprets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub badge_id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub difficulty: Difficulty,
    pub points: i64,
    pub achievement_category: Option<String>,
    pub unlock_criteria: Option<serde_json::Value>,
    pub rarity: String,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewBadge {
    pub badge_id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub difficulty: Difficulty,
    pub points: i64,
    pub achievement_category: Option<String>,
    pub unlock_criteria: Option<serde_json::Value>,
    pub rarity: String,
}

impl NewBadge {
    pub fn new(badge_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            badge_id: badge_id.into(),
            name: name.into(),
            description: None,
            icon: None,
            category: None,
            difficulty: Difficulty::Easy,
            points: 10,
            achievement_category: None,
            unlock_criteria: None,
            rarity: "common".to_string(),
        }
    }

    pub fn with_points(mut self, points: i64) -> Self {
        self.points = points;
        self
    }

    pub fn with_criteria(mut self, criteria: serde_json::Value) -> Self {
        self.unlock_criteria = Some(criteria);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBadge {
    pub id: i64,
    pub user_id: String,
    pub badge_id: String,
    pub awarded_at: String,
}
