use serde::{Deserialize, Serialize};

// Row shapes of the derived views. They are read-only and recomputed per query.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPerformanceSummary {
    pub uid: String,
    pub email: String,
    pub display_name_en: Option<String>,
    pub total_points: i64,
    pub reviews_completed: i64,
    pub consecutive_days: i64,
    pub practice_sessions: i64,
    pub completed_practices: i64,
    pub avg_accuracy: Option<f64>,
    pub badges_earned: i64,
    pub paths_completed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub activity_date: String,
    pub active_users: i64,
    pub activities: i64,
    pub points_awarded: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeProgressSummary {
    pub badge_id: String,
    pub name: String,
    pub rarity: String,
    pub times_awarded: i64,
    pub award_rate: f64,
}
