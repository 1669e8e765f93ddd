use serde::{Deserialize, Serialize};

/// XP needed to reach each level, starting at level 1.
pub const LEVEL_THRESHOLDS: [i64; 11] = [
    0, 100, 250, 500, 1000, 1750, 2750, 4000, 5500, 7500, 10000,
];

/// Weight of the newest accuracy when blending it into mastery.
pub const MASTERY_RECENT_WEIGHT: f64 = 0.3;

pub const MAX_HINT_LEVEL: i64 = 3;

/// Level reached with `xp` experience points.
pub fn level_for_xp(xp: i64) -> i64 {
    LEVEL_THRESHOLDS.iter().filter(|&&t| xp >= t).count().max(1) as i64
}

/// Blend a new accuracy into the running mastery, rounded to one decimal.
pub fn blend_mastery(current: f64, accuracy: f64) -> f64 {
    let blended = current * (1.0 - MASTERY_RECENT_WEIGHT) + accuracy * MASTERY_RECENT_WEIGHT;
    (blended * 10.0).round() / 10.0
}

/// Base XP and mastery threshold for a skill category. Unknown categories
/// get the defaults.
pub fn skill_profile(category: &str) -> (i64, f64) {
    match category.to_ascii_lowercase().as_str() {
        "logical" => (15, 85.0),
        "syntax" => (10, 90.0),
        "code_quality" => (20, 75.0),
        "standard_violation" => (12, 80.0),
        "java_specific" => (25, 70.0),
        _ => (15, 80.0),
    }
}

/// Outcome of one practice round, fed into the per-skill ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillPractice {
    pub errors_encountered: i64,
    pub errors_identified: i64,
    pub minutes_spent: i64,
}

impl SkillPractice {
    pub fn new(encountered: i64, identified: i64, minutes: i64) -> Self {
        Self {
            errors_encountered: encountered.max(0),
            errors_identified: identified.clamp(0, encountered.max(0)),
            minutes_spent: minutes.max(0),
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.errors_encountered == 0 {
            return 0.0;
        }
        self.errors_identified as f64 / self.errors_encountered as f64 * 100.0
    }

    /// Base XP for the category, up to 10 for accuracy and up to 10 for time.
    pub fn xp_earned(&self, base_xp: i64) -> i64 {
        let accuracy_bonus = (self.accuracy() / 10.0) as i64;
        let time_bonus = (self.minutes_spent / 5).min(10);
        base_xp + accuracy_bonus + time_bonus
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillProgress {
    pub user_id: String,
    pub skill_category: String,
    pub current_level: i64,
    pub experience_points: i64,
    pub mastery_percentage: f64,
    pub practice_streak: i64,
    pub total_practice_minutes: i64,
    pub last_practiced: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillUpdate {
    pub progress: SkillProgress,
    pub xp_earned: i64,
    pub level_up: bool,
    pub mastery_achieved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSession {
    pub id: i64,
    pub user_id: String,
    pub session_type: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_minutes: i64,
    pub activities_completed: i64,
    pub performance_score: f64,
    pub session_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintLevelUsage {
    pub hint_level: i64,
    pub usage_count: i64,
    /// Share of rated uses marked helpful, `None` until someone rates one
    pub helpfulness: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintAnalytics {
    pub error_type: String,
    pub total_usage: i64,
    pub levels: Vec<HintLevelUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_thresholds() {
        assert_eq!(level_for_xp(-5), 1);
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(999), 4);
        assert_eq!(level_for_xp(10000), 11);
        assert_eq!(level_for_xp(i64::MAX), 11);
    }

    #[test]
    fn mastery_weights_recent_accuracy() {
        assert_eq!(blend_mastery(50.0, 100.0), 65.0);
        assert_eq!(blend_mastery(100.0, 0.0), 70.0);
        assert_eq!(blend_mastery(33.3, 66.7), 43.3);
    }

    #[test]
    fn xp_bonuses_are_capped() {
        let perfect = SkillPractice::new(4, 4, 120);
        assert_eq!(perfect.xp_earned(15), 15 + 10 + 10);
        let half = SkillPractice::new(4, 2, 7);
        assert_eq!(half.xp_earned(10), 10 + 5 + 1);
        let none = SkillPractice::new(0, 3, 0);
        assert_eq!(none.errors_identified, 0);
        assert_eq!(none.xp_earned(12), 12);
    }

    #[test]
    fn profiles_are_case_insensitive() {
        assert_eq!(skill_profile("JAVA_SPECIFIC"), (25, 70.0));
        assert_eq!(skill_profile("unknown"), (15, 80.0));
    }
}
