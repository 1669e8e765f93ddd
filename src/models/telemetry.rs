use serde::{Deserialize, Serialize};

/// Open classification of user interactions. Known keys get a variant,
/// anything else is carried as `Custom` and registered on first use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionType {
    Click,
    PageView,
    FormSubmit,
    TabSwitch,
    CodeGeneration,
    ReviewSubmit,
    HintRequest,
    Error,
    Custom(String),
}

impl InteractionType {
    /// Keys of the closed enumeration used by the first schema generation.
    pub const BUILTIN: [&'static str; 8] = [
        "click",
        "page_view",
        "form_submit",
        "tab_switch",
        "code_generation",
        "review_submit",
        "hint_request",
        "error",
    ];

    pub fn as_str(&self) -> &str {
        match self {
            InteractionType::Click => "click",
            InteractionType::PageView => "page_view",
            InteractionType::FormSubmit => "form_submit",
            InteractionType::TabSwitch => "tab_switch",
            InteractionType::CodeGeneration => "code_generation",
            InteractionType::ReviewSubmit => "review_submit",
            InteractionType::HintRequest => "hint_request",
            InteractionType::Error => "error",
            InteractionType::Custom(key) => key,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "click" => InteractionType::Click,
            "page_view" => InteractionType::PageView,
            "form_submit" => InteractionType::FormSubmit,
            "tab_switch" => InteractionType::TabSwitch,
            "code_generation" => InteractionType::CodeGeneration,
            "review_submit" => InteractionType::ReviewSubmit,
            "hint_request" => InteractionType::HintRequest,
            "error" => InteractionType::Error,
            other => InteractionType::Custom(other.to_lowercase()),
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, InteractionType::Custom(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionCategory {
    Navigation,
    Practice,
    Review,
    Learning,
    System,
}

impl InteractionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionCategory::Navigation => "navigation",
            InteractionCategory::Practice => "practice",
            InteractionCategory::Review => "review",
            InteractionCategory::Learning => "learning",
            InteractionCategory::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "navigation" => Some(InteractionCategory::Navigation),
            "practice" => Some(InteractionCategory::Practice),
            "review" => Some(InteractionCategory::Review),
            "learning" => Some(InteractionCategory::Learning),
            "system" => Some(InteractionCategory::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    pub session_id: String,
    pub user_id: String,
    pub language: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_seconds: Option<i64>,
    pub interaction_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub user_id: String,
    pub session_id: Option<String>,
    pub interaction_type: InteractionType,
    pub category: InteractionCategory,
    pub action: String,
    pub details: Option<serde_json::Value>,
    pub time_spent_seconds: Option<f64>,
    pub success: bool,
}

impl NewInteraction {
    pub fn new(
        user_id: impl Into<String>,
        interaction_type: InteractionType,
        category: InteractionCategory,
        action: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: None,
            interaction_type,
            category,
            action: action.into(),
            details: None,
            time_spent_seconds: None,
            success: true,
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_time(mut self, seconds: f64) -> Self {
        self.time_spent_seconds = Some(seconds);
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: i64,
    pub user_id: String,
    pub session_id: Option<String>,
    pub interaction_type: InteractionType,
    pub category: Option<InteractionCategory>,
    pub action: String,
    pub details: Option<serde_json::Value>,
    pub time_spent_seconds: Option<f64>,
    pub success: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabNavigation {
    pub id: i64,
    pub user_id: String,
    pub session_id: Option<String>,
    pub from_tab: Option<String>,
    pub to_tab: String,
    pub time_on_previous_tab_seconds: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub interactions_deleted: usize,
    pub navigations_deleted: usize,
    pub cutoff: String,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.interactions_deleted + self.navigations_deleted
    }
}
