use serde::{Deserialize, Serialize};

// An account with its denormalized progress counters. The counters are a
// cache over activity_log; only Database::record_activity writes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
    pub display_name_en: Option<String>,
    pub display_name_zh: Option<String>,
    pub level_name_en: String,
    pub level_name_zh: String,
    pub created_at: String,
    pub reviews_completed: i64,
    pub score: i64,
    pub total_points: i64,
    pub consecutive_days: i64,
    pub last_activity: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.display_name_en
            .as_deref()
            .or(self.display_name_zh.as_deref())
            .unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    /// Left empty to have a v4 uuid generated.
    pub uid: Option<String>,
    pub email: String,
    pub display_name_en: Option<String>,
    pub display_name_zh: Option<String>,
    /// Opaque credential owned by the auth component.
    pub password_hash: String,
}

impl NewUser {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_names(mut self, en: impl Into<String>, zh: impl Into<String>) -> Self {
        self.display_name_en = Some(en.into());
        self.display_name_zh = Some(zh.into());
        self
    }
}

// What kind of event an activity_log row records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    ReviewCompleted,
    PracticeCompleted,
    BadgeEarned,
    PathStepCompleted,
    PathCompleted,
    DailyLogin,
    Other(String),
}

impl ActivityKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityKind::ReviewCompleted => "review_completed",
            ActivityKind::PracticeCompleted => "practice_completed",
            ActivityKind::BadgeEarned => "badge_earned",
            ActivityKind::PathStepCompleted => "path_step_completed",
            ActivityKind::PathCompleted => "path_completed",
            ActivityKind::DailyLogin => "daily_login",
            ActivityKind::Other(s) => s,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "review_completed" => ActivityKind::ReviewCompleted,
            "practice_completed" => ActivityKind::PracticeCompleted,
            "badge_earned" => ActivityKind::BadgeEarned,
            "path_step_completed" => ActivityKind::PathStepCompleted,
            "path_completed" => ActivityKind::PathCompleted,
            "daily_login" => ActivityKind::DailyLogin,
            other => ActivityKind::Other(other.to_string()),
        }
    }

    /// Whether this activity counts towards users.reviews_completed.
    pub fn counts_as_review(&self) -> bool {
        matches!(self, ActivityKind::ReviewCompleted)
    }
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub points: i64,
    pub score_delta: i64,
    pub details_en: Option<String>,
    pub details_zh: Option<String>,
}

impl NewActivity {
    pub fn new(kind: ActivityKind, points: i64) -> Self {
        Self {
            kind,
            points,
            score_delta: 0,
            details_en: None,
            details_zh: None,
        }
    }

    pub fn with_score(mut self, delta: i64) -> Self {
        self.score_delta = delta;
        self
    }

    pub fn with_details(mut self, en: impl Into<String>, zh: impl Into<String>) -> Self {
        self.details_en = Some(en.into());
        self.details_zh = Some(zh.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: String,
    pub activity_type: ActivityKind,
    pub points: i64,
    pub details_en: Option<String>,
    pub details_zh: Option<String>,
    pub created_at: String,
}

// Per-user, per-category identification counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    pub user_id: String,
    pub category: String,
    pub encountered: i64,
    pub identified: i64,
    pub mastery_level: f64,
    pub last_updated: String,
}

impl CategoryStats {
    pub fn mastery_label(&self) -> &'static str {
        match self.mastery_level {
            m if m >= 0.9 => "Mastered",
            m if m >= 0.7 => "Proficient",
            m if m >= 0.4 => "Familiar",
            m if m > 0.0 => "Learning",
            _ => "New",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user(en: Option<&str>, zh: Option<&str>) -> User {
        User {
            uid: "u1".to_string(),
            email: "a@example.com".to_string(),
            display_name_en: en.map(String::from),
            display_name_zh: zh.map(String::from),
            level_name_en: "Basic".to_string(),
            level_name_zh: "基礎".to_string(),
            created_at: String::new(),
            reviews_completed: 0,
            score: 0,
            total_points: 0,
            consecutive_days: 0,
            last_activity: None,
        }
    }

    #[test]
    fn display_name_prefers_english_then_chinese_then_email() {
        assert_eq!(make_user(Some("Ann"), Some("安")).display_name(), "Ann");
        assert_eq!(make_user(None, Some("安")).display_name(), "安");
        assert_eq!(make_user(None, None).display_name(), "a@example.com");
    }

    #[test]
    fn activity_kind_round_trips_known_and_custom() {
        for kind in [
            ActivityKind::ReviewCompleted,
            ActivityKind::BadgeEarned,
            ActivityKind::PathCompleted,
        ] {
            assert_eq!(ActivityKind::from_str(kind.as_str()), kind);
        }
        let custom = ActivityKind::from_str("streak_bonus");
        assert_eq!(custom, ActivityKind::Other("streak_bonus".to_string()));
        assert_eq!(custom.as_str(), "streak_bonus");
    }

    #[test]
    fn only_reviews_count_as_reviews() {
        assert!(ActivityKind::ReviewCompleted.counts_as_review());
        assert!(!ActivityKind::PracticeCompleted.counts_as_review());
        assert!(!ActivityKind::BadgeEarned.counts_as_review());
    }

    #[test]
    fn mastery_labels_follow_thresholds() {
        let mut stats = CategoryStats {
            user_id: "u".into(),
            category: "logical".into(),
            encountered: 0,
            identified: 0,
            mastery_level: 0.0,
            last_updated: String::new(),
        };
        assert_eq!(stats.mastery_label(), "New");
        stats.mastery_level = 0.2;
        assert_eq!(stats.mastery_label(), "Learning");
        stats.mastery_level = 0.5;
        assert_eq!(stats.mastery_label(), "Familiar");
        stats.mastery_level = 0.75;
        assert_eq!(stats.mastery_label(), "Proficient");
        stats.mastery_level = 1.0;
        assert_eq!(stats.mastery_label(), "Mastered");
    }
}
