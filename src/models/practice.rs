use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PracticeStatus {
    Setup,
    CodeReady,
    ReviewComplete,
    Abandoned,
}

impl PracticeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeStatus::Setup => "setup",
            PracticeStatus::CodeReady => "code_ready",
            PracticeStatus::ReviewComplete => "review_complete",
            PracticeStatus::Abandoned => "abandoned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "setup" => Some(PracticeStatus::Setup),
            "code_ready" => Some(PracticeStatus::CodeReady),
            "review_complete" => Some(PracticeStatus::ReviewComplete),
            "abandoned" => Some(PracticeStatus::Abandoned),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PracticeStatus::ReviewComplete | PracticeStatus::Abandoned
        )
    }

    /// setup -> code_ready -> review_complete; any live state may be abandoned.
    pub fn can_transition_to(&self, next: PracticeStatus) -> bool {
        use PracticeStatus::*;
        match (self, next) {
            (Setup, CodeReady) | (CodeReady, ReviewComplete) => true,
            (from, Abandoned) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeSession {
    pub id: i64,
    pub user_id: String,
    pub error_code: String,
    pub user_session_id: Option<String>,
    pub status: PracticeStatus,
    pub generated_code: Option<String>,
    pub errors_expected: i64,
    pub errors_identified: i64,
    pub accuracy_percentage: Option<f64>,
    pub time_spent_seconds: Option<i64>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// Outcome reported by the reviewer when a practice round ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PracticeResult {
    pub errors_expected: i64,
    pub errors_identified: i64,
    pub time_spent_seconds: i64,
}

impl PracticeResult {
    pub fn new(expected: i64, identified: i64, seconds: i64) -> Self {
        Self {
            errors_expected: expected.max(0),
            errors_identified: identified.clamp(0, expected.max(0)),
            time_spent_seconds: seconds.max(0),
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.errors_expected <= 0 {
            return 0.0;
        }
        (self.errors_identified as f64 / self.errors_expected as f64 * 100.0).clamp(0.0, 100.0)
    }
}

// Action recorded in error_usage_stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageAction {
    Viewed,
    Practiced,
    Mastered,
    Failed,
}

impl UsageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageAction::Viewed => "viewed",
            UsageAction::Practiced => "practiced",
            UsageAction::Mastered => "mastered",
            UsageAction::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "viewed" => Some(UsageAction::Viewed),
            "practiced" => Some(UsageAction::Practiced),
            "mastered" => Some(UsageAction::Mastered),
            "failed" => Some(UsageAction::Failed),
            _ => None,
        }
    }

    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 90.0 {
            UsageAction::Mastered
        } else if accuracy >= 70.0 {
            UsageAction::Practiced
        } else {
            UsageAction::Failed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::InProgress => "in_progress",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Abandoned => "abandoned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(WorkflowStatus::InProgress),
            "completed" => Some(WorkflowStatus::Completed),
            "abandoned" => Some(WorkflowStatus::Abandoned),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        *self == WorkflowStatus::InProgress && next != WorkflowStatus::InProgress
    }
}

// Stage of the main review flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkflowStep {
    CategorySelection,
    CodeGeneration,
    Review,
    Feedback,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::CategorySelection => "category_selection",
            WorkflowStep::CodeGeneration => "code_generation",
            WorkflowStep::Review => "review",
            WorkflowStep::Feedback => "feedback",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "category_selection" => Some(WorkflowStep::CategorySelection),
            "code_generation" => Some(WorkflowStep::CodeGeneration),
            "review" => Some(WorkflowStep::Review),
            "feedback" => Some(WorkflowStep::Feedback),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: i64,
    pub user_id: String,
    pub user_session_id: Option<String>,
    pub status: WorkflowStatus,
    pub current_step: WorkflowStep,
    pub categories: Vec<String>,
    pub errors_expected: Option<i64>,
    pub errors_identified: Option<i64>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identification {
    pub id: i64,
    pub user_id: String,
    pub practice_session_id: Option<i64>,
    pub error_code: String,
    pub category: String,
    pub identified: bool,
    pub time_to_identify_seconds: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewIdentification {
    pub user_id: String,
    pub practice_session_id: Option<i64>,
    pub error_code: String,
    pub identified: bool,
    pub time_to_identify_seconds: Option<i64>,
}

impl NewIdentification {
    pub fn new(
        user_id: impl Into<String>,
        error_code: impl Into<String>,
        identified: bool,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            practice_session_id: None,
            error_code: error_code.into(),
            identified,
            time_to_identify_seconds: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod practice_status_tests {
        use super::*;

        #[test]
        fn forward_path_is_allowed() {
            assert!(PracticeStatus::Setup.can_transition_to(PracticeStatus::CodeReady));
            assert!(PracticeStatus::CodeReady.can_transition_to(PracticeStatus::ReviewComplete));
        }

        #[test]
        fn skipping_and_going_back_are_rejected() {
            assert!(!PracticeStatus::Setup.can_transition_to(PracticeStatus::ReviewComplete));
            assert!(!PracticeStatus::CodeReady.can_transition_to(PracticeStatus::Setup));
            assert!(!PracticeStatus::Setup.can_transition_to(PracticeStatus::Setup));
        }

        #[test]
        fn abandon_only_from_live_states() {
            assert!(PracticeStatus::Setup.can_transition_to(PracticeStatus::Abandoned));
            assert!(PracticeStatus::CodeReady.can_transition_to(PracticeStatus::Abandoned));
            assert!(!PracticeStatus::ReviewComplete.can_transition_to(PracticeStatus::Abandoned));
            assert!(!PracticeStatus::Abandoned.can_transition_to(PracticeStatus::Abandoned));
        }

        #[test]
        fn terminal_states_go_nowhere() {
            for next in [
                PracticeStatus::Setup,
                PracticeStatus::CodeReady,
                PracticeStatus::ReviewComplete,
                PracticeStatus::Abandoned,
            ] {
                assert!(!PracticeStatus::ReviewComplete.can_transition_to(next));
                assert!(!PracticeStatus::Abandoned.can_transition_to(next));
            }
        }
    }

    mod workflow_status_tests {
        use super::*;

        #[test]
        fn only_in_progress_moves() {
            assert!(WorkflowStatus::InProgress.can_transition_to(WorkflowStatus::Completed));
            assert!(WorkflowStatus::InProgress.can_transition_to(WorkflowStatus::Abandoned));
            assert!(!WorkflowStatus::InProgress.can_transition_to(WorkflowStatus::InProgress));
            assert!(!WorkflowStatus::Completed.can_transition_to(WorkflowStatus::Abandoned));
            assert!(!WorkflowStatus::Abandoned.can_transition_to(WorkflowStatus::Completed));
        }

        #[test]
        fn steps_are_ordered() {
            assert!(WorkflowStep::CategorySelection < WorkflowStep::CodeGeneration);
            assert!(WorkflowStep::Review < WorkflowStep::Feedback);
            assert_eq!(
                WorkflowStep::from_str("code_generation"),
                Some(WorkflowStep::CodeGeneration)
            );
        }
    }

    mod practice_result_tests {
        use super::*;

        #[test]
        fn accuracy_is_percentage() {
            assert_eq!(PracticeResult::new(4, 3, 60).accuracy(), 75.0);
            assert_eq!(PracticeResult::new(0, 0, 10).accuracy(), 0.0);
        }

        #[test]
        fn identified_is_clamped_to_expected() {
            let r = PracticeResult::new(2, 5, -3);
            assert_eq!(r.errors_identified, 2);
            assert_eq!(r.time_spent_seconds, 0);
        }

        #[test]
        fn usage_action_thresholds() {
            assert_eq!(UsageAction::from_accuracy(95.0), UsageAction::Mastered);
            assert_eq!(UsageAction::from_accuracy(90.0), UsageAction::Mastered);
            assert_eq!(UsageAction::from_accuracy(70.0), UsageAction::Practiced);
            assert_eq!(UsageAction::from_accuracy(69.9), UsageAction::Failed);
        }
    }
}
