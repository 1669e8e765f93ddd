use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: i64,
    pub path_name: String,
    pub description_en: Option<String>,
    pub description_zh: Option<String>,
    pub difficulty_level: String,
    pub estimated_hours: i64,
    pub prerequisites: Vec<String>,
    pub skills_learned: Vec<String>,
    pub path_order: i64,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewLearningPath {
    /// Fixed id for seed rows; None lets the store assign one.
    pub id: Option<i64>,
    pub path_name: String,
    pub description_en: Option<String>,
    pub description_zh: Option<String>,
    pub difficulty_level: String,
    pub estimated_hours: i64,
    pub prerequisites: Vec<String>,
    pub skills_learned: Vec<String>,
    pub path_order: i64,
}

impl NewLearningPath {
    pub fn new(name: impl Into<String>, difficulty: impl Into<String>, hours: i64) -> Self {
        Self {
            id: None,
            path_name: name.into(),
            description_en: None,
            description_zh: None,
            difficulty_level: difficulty.into(),
            estimated_hours: hours,
            prerequisites: vec![],
            skills_learned: vec![],
            path_order: 0,
        }
    }

    pub fn with_descriptions(mut self, en: impl Into<String>, zh: impl Into<String>) -> Self {
        self.description_en = Some(en.into());
        self.description_zh = Some(zh.into());
        self
    }
}

/// What a learning path step points at. Stored as the
/// `(step_type, content_reference)` column pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepContent {
    Tutorial { topic: String },
    ErrorExplanation { error_code: String },
    Practice { error_code: String },
    CategoryReview { category_code: String },
    Quiz { quiz_id: String },
}

impl StepContent {
    pub fn step_type(&self) -> &'static str {
        match self {
            StepContent::Tutorial { .. } => "tutorial",
            StepContent::ErrorExplanation { .. } => "error_explanation",
            StepContent::Practice { .. } => "practice",
            StepContent::CategoryReview { .. } => "category_review",
            StepContent::Quiz { .. } => "quiz",
        }
    }

    pub fn reference(&self) -> &str {
        match self {
            StepContent::Tutorial { topic } => topic.as_str(),
            StepContent::ErrorExplanation { error_code } | StepContent::Practice { error_code } => {
                error_code.as_str()
            }
            StepContent::CategoryReview { category_code } => category_code.as_str(),
            StepContent::Quiz { quiz_id } => quiz_id.as_str(),
        }
    }

    /// The catalog error this step teaches, if any.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            StepContent::ErrorExplanation { error_code } | StepContent::Practice { error_code } => {
                Some(error_code.as_str())
            }
            _ => None,
        }
    }

    pub fn from_parts(step_type: &str, reference: Option<&str>) -> Result<Self> {
        let reference = reference
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                Error::InvalidData(format!("{} step has no content reference", step_type))
            })?
            .to_string();

        match step_type {
            "tutorial" => Ok(StepContent::Tutorial { topic: reference }),
            "error_explanation" => Ok(StepContent::ErrorExplanation {
                error_code: reference,
            }),
            "practice" => Ok(StepContent::Practice {
                error_code: reference,
            }),
            "category_review" => Ok(StepContent::CategoryReview {
                category_code: reference,
            }),
            "quiz" => Ok(StepContent::Quiz { quiz_id: reference }),
            other => Err(Error::InvalidData(format!("unknown step type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathStep {
    pub id: i64,
    pub path_id: i64,
    pub step_order: i64,
    pub title: String,
    pub description_md: Option<String>,
    pub content: StepContent,
    pub estimated_time_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct NewPathStep {
    pub path_id: i64,
    pub step_order: i64,
    pub title: String,
    pub description_md: Option<String>,
    pub content: StepContent,
    pub estimated_time_minutes: i64,
}

impl NewPathStep {
    pub fn new(
        path_id: i64,
        step_order: i64,
        title: impl Into<String>,
        content: StepContent,
    ) -> Self {
        Self {
            path_id,
            step_order,
            title: title.into(),
            description_md: None,
            content,
            estimated_time_minutes: 15,
        }
    }

    pub fn with_description(mut self, md: impl Into<String>) -> Self {
        self.description_md = Some(md.into());
        self
    }

    pub fn with_minutes(mut self, minutes: i64) -> Self {
        self.estimated_time_minutes = minutes;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::NotStarted => "not_started",
            EnrollmentStatus::InProgress => "in_progress",
            EnrollmentStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(EnrollmentStatus::NotStarted),
            "in_progress" => Some(EnrollmentStatus::InProgress),
            "completed" => Some(EnrollmentStatus::Completed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EnrollmentStatus::NotStarted => "Not started",
            EnrollmentStatus::InProgress => "In progress",
            EnrollmentStatus::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: String,
    pub path_id: i64,
    pub status: EnrollmentStatus,
    pub current_step_id: Option<i64>,
    pub total_steps: i64,
    pub progress_percentage: f64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub last_accessed: Option<String>,
}

impl Enrollment {
    pub fn is_complete(&self) -> bool {
        self.status == EnrollmentStatus::Completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolledPath {
    pub path: LearningPath,
    pub enrollment: Enrollment,
}
