mod badge;
mod catalog;
mod learning;
mod monitoring;
mod path;
mod practice;
mod summary;
mod telemetry;
mod user;

pub use badge::{Badge, NewBadge, UserBadge};
pub use catalog::{
    Difficulty, ErrorCategory, ErrorDetail, ErrorStatistics, JavaError, Lang, NewErrorCategory,
    NewErrorDetail, NewJavaError,
};
pub use learning::{
    blend_mastery, level_for_xp, skill_profile, HintAnalytics, HintLevelUsage, LearningSession,
    SkillPractice, SkillProgress, SkillUpdate, MAX_HINT_LEVEL,
};
pub use monitoring::{
    Alert, AlertSeverity, BadgeProgressEntry, LearningAchievement, MetricsSnapshot,
    NewAchievement, NewAlert,
};
pub use path::{
    EnrolledPath, Enrollment, EnrollmentStatus, LearningPath, NewLearningPath, NewPathStep,
    PathStep, StepContent,
};
pub use practice::{
    Identification, NewIdentification, PracticeResult, PracticeSession, PracticeStatus,
    UsageAction, Workflow, WorkflowStatus, WorkflowStep,
};
pub use summary::{BadgeProgressSummary, DailyActivity, UserPerformanceSummary};
pub use telemetry::{
    CleanupReport, Interaction, InteractionCategory, InteractionType, NewInteraction,
    TabNavigation, UserSession,
};
pub use user::{ActivityEntry, ActivityKind, CategoryStats, NewActivity, NewUser, User};

use serde::Serialize;

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod json_output_tests {
        use super::*;

        #[test]
        fn ok_with_number() {
            let output = JsonOutput::ok(42);
            assert!(output.success);
            assert_eq!(output.data, Some(42));
            assert!(output.error.is_none());
        }

        #[test]
        fn err_with_owned_string() {
            let output = JsonOutput::<()>::err(String::from("error message"));
            assert!(!output.success);
            assert!(output.data.is_none());
            assert_eq!(output.error, Some("error message".to_string()));
        }

        #[test]
        fn serializes_ok_correctly() {
            let output = JsonOutput::ok("test");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":true"));
            assert!(json.contains("\"data\":\"test\""));
            assert!(json.contains("\"error\":null"));
        }

        #[test]
        fn serializes_err_correctly() {
            let output = JsonOutput::<()>::err("error");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":false"));
            assert!(json.contains("\"data\":null"));
            assert!(json.contains("\"error\":\"error\""));
        }
    }
}
