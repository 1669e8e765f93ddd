use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "info" => Some(AlertSeverity::Info),
            "warning" => Some(AlertSeverity::Warning),
            "critical" => Some(AlertSeverity::Critical),
            _ => None,
        }
    }
}

/// Point-in-time health figures computed from the telemetry tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub collected_at: String,
    pub active_sessions: i64,
    pub total_interactions: i64,
    pub error_rate: f64,
    pub avg_response_time_secs: f64,
    pub workflow_completion_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub metric_value: Option<f64>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub metric_value: Option<f64>,
    pub threshold: Option<f64>,
    pub resolved: bool,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeProgressEntry {
    pub id: i64,
    pub user_id: String,
    pub badge_id: String,
    pub current_value: i64,
    pub target_value: i64,
    pub progress_percentage: f64,
    pub logged_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningAchievement {
    pub id: i64,
    pub user_id: String,
    pub achievement_type: String,
    pub title_en: String,
    pub title_zh: Option<String>,
    pub details: Option<serde_json::Value>,
    pub points: i64,
    pub achieved_at: String,
}

#[derive(Debug, Clone)]
pub struct NewAchievement {
    pub user_id: String,
    pub achievement_type: String,
    pub title_en: String,
    pub title_zh: Option<String>,
    pub details: Option<serde_json::Value>,
    pub points: i64,
}

impl NewAchievement {
    pub fn new(
        user_id: impl Into<String>,
        achievement_type: impl Into<String>,
        title_en: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            achievement_type: achievement_type.into(),
            title_en: title_en.into(),
            title_zh: None,
            details: None,
            points: 0,
        }
    }

    pub fn with_zh(mut self, title: impl Into<String>) -> Self {
        self.title_zh = Some(title.into());
        self
    }

    pub fn with_points(mut self, points: i64) -> Self {
        self.points = points;
        self
    }
}
