use serde::{Deserialize, Serialize};

// Content language for bilingual fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lang {
    En,
    Zh,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Zh => "zh",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Some(Lang::En),
            "zh" | "chinese" | "zh-tw" | "zh_tw" => Some(Lang::Zh),
            _ => None,
        }
    }

    fn pick<'a>(&self, en: &'a str, zh: &'a str) -> &'a str {
        match self {
            Lang::En => en,
            Lang::Zh => zh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" | "e" => Some(Difficulty::Easy),
            "medium" | "m" => Some(Difficulty::Medium),
            "hard" | "h" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorCategory {
    pub id: i64,
    pub category_code: String,
    pub name_en: String,
    pub name_zh: String,
    pub description_en: Option<String>,
    pub description_zh: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
}

impl ErrorCategory {
    pub fn name(&self, lang: Lang) -> &str {
        lang.pick(&self.name_en, &self.name_zh)
    }
}

#[derive(Debug, Clone)]
pub struct NewErrorCategory {
    pub category_code: String,
    pub name_en: String,
    pub name_zh: String,
    pub description_en: Option<String>,
    pub description_zh: Option<String>,
    pub sort_order: i64,
}

impl NewErrorCategory {
    pub fn new(
        code: impl Into<String>,
        name_en: impl Into<String>,
        name_zh: impl Into<String>,
        sort_order: i64,
    ) -> Self {
        Self {
            category_code: code.into(),
            name_en: name_en.into(),
            name_zh: name_zh.into(),
            description_en: None,
            description_zh: None,
            sort_order,
        }
    }
}

// A catalog error type, identified across the system by error_code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaError {
    pub id: i64,
    pub error_code: String,
    pub category_code: String,
    pub error_name_en: String,
    pub description_en: String,
    pub implementation_guide_en: Option<String>,
    pub error_name_zh: String,
    pub description_zh: String,
    pub implementation_guide_zh: Option<String>,
    pub difficulty: Difficulty,
    pub frequency_weight: i64,
    pub tags: Vec<String>,
    pub examples: Vec<String>,
    pub is_active: bool,
    pub usage_count: i64,
}

impl JavaError {
    pub fn name(&self, lang: Lang) -> &str {
        lang.pick(&self.error_name_en, &self.error_name_zh)
    }

    pub fn description(&self, lang: Lang) -> &str {
        lang.pick(&self.description_en, &self.description_zh)
    }
}

#[derive(Debug, Clone)]
pub struct NewJavaError {
    pub error_code: String,
    pub category_code: String,
    pub error_name_en: String,
    pub description_en: String,
    pub implementation_guide_en: Option<String>,
    pub error_name_zh: String,
    pub description_zh: String,
    pub implementation_guide_zh: Option<String>,
    pub difficulty: Difficulty,
    pub frequency_weight: i64,
    pub tags: Vec<String>,
    pub examples: Vec<String>,
}

impl NewJavaError {
    pub fn new(
        error_code: impl Into<String>,
        category_code: impl Into<String>,
        name_en: impl Into<String>,
        name_zh: impl Into<String>,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            category_code: category_code.into(),
            error_name_en: name_en.into(),
            description_en: String::new(),
            implementation_guide_en: None,
            error_name_zh: name_zh.into(),
            description_zh: String::new(),
            implementation_guide_zh: None,
            difficulty: Difficulty::Medium,
            frequency_weight: 1,
            tags: vec![],
            examples: vec![],
        }
    }

    pub fn with_descriptions(mut self, en: impl Into<String>, zh: impl Into<String>) -> Self {
        self.description_en = en.into();
        self.description_zh = zh.into();
        self
    }

    pub fn with_guides(mut self, en: impl Into<String>, zh: impl Into<String>) -> Self {
        self.implementation_guide_en = Some(en.into());
        self.implementation_guide_zh = Some(zh.into());
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_weight(mut self, weight: i64) -> Self {
        self.frequency_weight = weight;
        self
    }
}

// Long-form markdown teaching material for one error code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub id: i64,
    pub error_code: String,
    pub language: String,
    pub title: String,
    pub category: String,
    pub content_language: String,
    pub detailed_description_md: Option<String>,
    pub implementation_guide_md: Option<String>,
    pub suggestion_fix_md: Option<String>,
    pub example_good_code_md: Option<String>,
    pub example_bad_code_md: Option<String>,
    pub before_after_comparison_md: Option<String>,
    pub common_misconceptions_md: Option<String>,
    pub importance_explanation_md: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewErrorDetail {
    pub error_code: String,
    pub language: String,
    pub title: String,
    pub category: String,
    pub content_language: String,
    pub detailed_description_md: Option<String>,
    pub implementation_guide_md: Option<String>,
    pub suggestion_fix_md: Option<String>,
    pub example_good_code_md: Option<String>,
    pub example_bad_code_md: Option<String>,
    pub before_after_comparison_md: Option<String>,
    pub common_misconceptions_md: Option<String>,
    pub importance_explanation_md: Option<String>,
}

impl NewErrorDetail {
    pub fn new(
        error_code: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            language: "Java".to_string(),
            title: title.into(),
            category: category.into(),
            content_language: Lang::En.as_str().to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorStatistics {
    pub active_categories: i64,
    pub active_errors: i64,
    pub errors_per_category: Vec<(String, i64)>,
    pub most_used: Vec<(String, i64)>,
}
