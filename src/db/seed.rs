use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::Database;
use crate::error::Result;
use crate::models::StepContent;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub categories: usize,
    pub java_errors: usize,
    pub badges: usize,
    pub error_details: usize,
    pub learning_paths: usize,
    pub path_steps: usize,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.categories
            + self.java_errors
            + self.badges
            + self.error_details
            + self.learning_paths
            + self.path_steps
    }
}

// (code, name_en, name_zh, description_en, description_zh)
const CATEGORIES: &[(&str, &str, &str, &str, &str)] = &[
    (
        "logical",
        "Logical Errors",
        "邏輯錯誤",
        "Code that compiles but does the wrong thing",
        "可以編譯但行為錯誤的程式碼",
    ),
    (
        "syntax",
        "Syntax Errors",
        "語法錯誤",
        "Code the Java compiler rejects",
        "Java 編譯器拒絕的程式碼",
    ),
    (
        "code_quality",
        "Code Quality",
        "程式碼品質",
        "Working code that is hard to read or maintain",
        "可運作但難以閱讀或維護的程式碼",
    ),
    (
        "standard_violation",
        "Standard Violations",
        "標準違規",
        "Departures from Java naming and style conventions",
        "違反 Java 命名與風格慣例",
    ),
    (
        "java_specific",
        "Java Specific",
        "Java 特有錯誤",
        "Pitfalls peculiar to the Java language and its libraries",
        "Java 語言及其函式庫特有的陷阱",
    ),
];

struct SeedError {
    code: &'static str,
    category: &'static str,
    name_en: &'static str,
    name_zh: &'static str,
    description_en: &'static str,
    description_zh: &'static str,
    difficulty: &'static str,
    weight: i64,
    tags: &'static [&'static str],
}

const JAVA_ERRORS: &[SeedError] = &[
    SeedError {
        code: "NULL_POINTER",
        category: "logical",
        name_en: "Null Pointer Dereference",
        name_zh: "空指標解參考",
        description_en: "Calling a method or reading a field on a reference that may be null",
        description_zh: "在可能為 null 的參考上呼叫方法或讀取欄位",
        difficulty: "medium",
        weight: 5,
        tags: &["null", "runtime"],
    },
    SeedError {
        code: "STRING_COMPARISON",
        category: "logical",
        name_en: "String Comparison with ==",
        name_zh: "使用 == 比較字串",
        description_en: "Comparing String contents with == instead of equals()",
        description_zh: "使用 == 而非 equals() 比較字串內容",
        difficulty: "easy",
        weight: 5,
        tags: &["string", "equality"],
    },
    SeedError {
        code: "MISSING_SEMICOLON",
        category: "syntax",
        name_en: "Missing Semicolon",
        name_zh: "缺少分號",
        description_en: "A statement is not terminated with a semicolon",
        description_zh: "陳述式結尾缺少分號",
        difficulty: "easy",
        weight: 3,
        tags: &["syntax"],
    },
    SeedError {
        code: "MAGIC_NUMBERS",
        category: "code_quality",
        name_en: "Magic Numbers",
        name_zh: "魔術數字",
        description_en: "Unexplained numeric literals instead of named constants",
        description_zh: "使用未說明的數字常值而非具名常數",
        difficulty: "easy",
        weight: 2,
        tags: &["readability"],
    },
    SeedError {
        code: "RAW_TYPES",
        category: "java_specific",
        name_en: "Raw Generic Types",
        name_zh: "原始泛型型別",
        description_en: "Using a generic class without type arguments",
        description_zh: "使用泛型類別時未提供型別參數",
        difficulty: "medium",
        weight: 2,
        tags: &["generics"],
    },
    SeedError {
        code: "STRING_CONCAT_IN_LOOP",
        category: "java_specific",
        name_en: "String Concatenation in Loop",
        name_zh: "迴圈中串接字串",
        description_en: "Building a String with + inside a loop instead of a StringBuilder",
        description_zh: "在迴圈中使用 + 串接字串而非 StringBuilder",
        difficulty: "hard",
        weight: 1,
        tags: &["performance", "string"],
    },
];

// (path_id, step_order, title, content, minutes)
fn path_steps() -> Vec<(i64, i64, &'static str, StepContent, i64)> {
    vec![
        (
            1,
            1,
            "Reading Java Error Messages",
            StepContent::Tutorial {
                topic: "java_error_basics".into(),
            },
            10,
        ),
        (
            1,
            2,
            "Understanding Null Pointer Exceptions",
            StepContent::ErrorExplanation {
                error_code: "NULL_POINTER".into(),
            },
            15,
        ),
        (
            1,
            3,
            "Practice: Find the Null Dereference",
            StepContent::Practice {
                error_code: "NULL_POINTER".into(),
            },
            20,
        ),
        (
            1,
            4,
            "Fundamentals Quiz",
            StepContent::Quiz {
                quiz_id: "fundamentals_quiz".into(),
            },
            15,
        ),
        (
            2,
            1,
            "Why == Fails for Strings",
            StepContent::ErrorExplanation {
                error_code: "STRING_COMPARISON".into(),
            },
            20,
        ),
        (
            2,
            2,
            "Practice: Fix the String Comparisons",
            StepContent::Practice {
                error_code: "STRING_COMPARISON".into(),
            },
            25,
        ),
        (
            2,
            3,
            "Review: Logical Errors",
            StepContent::CategoryReview {
                category_code: "logical".into(),
            },
            15,
        ),
    ]
}

impl Database {
    /// Load the default catalog, badges and learning paths. Rows that already
    /// exist are left untouched, so this can run any number of times.
    pub fn seed_defaults(&self) -> Result<SeedReport> {
        let tx = self.write_tx()?;
        let report = SeedReport {
            categories: seed_categories(&tx)?,
            java_errors: seed_java_errors(&tx)?,
            badges: seed_badges(&tx)?,
            error_details: seed_error_details(&tx)?,
            learning_paths: seed_learning_paths(&tx)?,
            path_steps: seed_path_steps(&tx)?,
        };
        tx.commit()?;
        info!(inserted = report.total(), "seeded defaults");
        Ok(report)
    }
}

fn seed_categories(conn: &Connection) -> Result<usize> {
    let mut inserted = 0;
    for (order, (code, name_en, name_zh, desc_en, desc_zh)) in CATEGORIES.iter().enumerate() {
        inserted += conn.execute(
            r#"
            INSERT OR IGNORE INTO error_categories
                (category_code, name_en, name_zh, description_en, description_zh, sort_order)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![code, name_en, name_zh, desc_en, desc_zh, order as i64 + 1],
        )?;
    }
    Ok(inserted)
}

fn seed_java_errors(conn: &Connection) -> Result<usize> {
    let mut inserted = 0;
    for e in JAVA_ERRORS {
        let tags = serde_json::to_string(e.tags)?;
        inserted += conn.execute(
            r#"
            INSERT OR IGNORE INTO java_errors
                (error_code, category_id, error_name_en, description_en, error_name_zh,
                 description_zh, difficulty_level, frequency_weight, tags, examples)
            SELECT ?1, id, ?3, ?4, ?5, ?6, ?7, ?8, ?9, '[]'
            FROM error_categories WHERE category_code = ?2
            "#,
            params![
                e.code,
                e.category,
                e.name_en,
                e.description_en,
                e.name_zh,
                e.description_zh,
                e.difficulty,
                e.weight,
                tags
            ],
        )?;
    }
    Ok(inserted)
}

fn seed_badges(conn: &Connection) -> Result<usize> {
    let badges = [
        (
            "badge_first_review",
            "First Review",
            "Complete your first code review",
            "🎯",
            "milestone",
            "easy",
            10,
            json!({ "reviews_completed": 1 }),
        ),
        (
            "badge_syntax_master",
            "Syntax Master",
            "Find 10 syntax errors",
            "📝",
            "expertise",
            "medium",
            25,
            json!({ "syntax_errors_found": 10 }),
        ),
        (
            "badge_logic_detective",
            "Logic Detective",
            "Find 5 logical errors",
            "🔍",
            "expertise",
            "medium",
            30,
            json!({ "logical_errors_found": 5 }),
        ),
    ];

    let mut inserted = 0;
    for (id, name, description, icon, category, difficulty, points, criteria) in badges {
        inserted += conn.execute(
            r#"
            INSERT OR IGNORE INTO badges
                (badge_id, name, description, icon, category, difficulty, points, unlock_criteria)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                id,
                name,
                description,
                icon,
                category,
                difficulty,
                points,
                criteria.to_string()
            ],
        )?;
    }
    Ok(inserted)
}

fn seed_error_details(conn: &Connection) -> Result<usize> {
    let details = [
        (
            "NULL_POINTER",
            "Null Pointer Exception",
            "Logical",
            "A `NullPointerException` is thrown when code uses a reference that points to no object.",
            "Check for `null` before dereferencing, or use `Optional` for values that may be absent.",
            "```java\nif (user != null) {\n    System.out.println(user.getName());\n}\n```",
            "```java\nUser user = findUser(id);\nSystem.out.println(user.getName());\n```",
        ),
        (
            "STRING_COMPARISON",
            "String Comparison Using ==",
            "Logical",
            "`==` compares object identity, not content. Two equal strings may be different objects.",
            "Compare strings with `equals()` or `equalsIgnoreCase()`.",
            "```java\nif (input.equals(\"yes\")) {\n    confirm();\n}\n```",
            "```java\nif (input == \"yes\") {\n    confirm();\n}\n```",
        ),
    ];

    let mut inserted = 0;
    for (code, title, category, description, fix, good, bad) in details {
        inserted += conn.execute(
            r#"
            INSERT OR IGNORE INTO error_details
                (error_code, title, category, detailed_description_md, suggestion_fix_md,
                 example_good_code_md, example_bad_code_md)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![code, title, category, description, fix, good, bad],
        )?;
    }
    Ok(inserted)
}

fn seed_learning_paths(conn: &Connection) -> Result<usize> {
    let paths = [
        (
            1,
            "Java Error Fundamentals",
            "Learn to recognise and fix the most common Java errors.",
            "學習辨識並修正最常見的 Java 錯誤。",
            json!(["NULL_POINTER", "error messages"]),
        ),
        (
            2,
            "Java String Handling Essentials",
            "Master string comparison and avoid the classic == pitfall.",
            "掌握字串比較並避免典型的 == 陷阱。",
            json!(["STRING_COMPARISON", "equals()"]),
        ),
    ];

    let mut inserted = 0;
    for (id, name, desc_en, desc_zh, skills) in paths {
        inserted += conn.execute(
            r#"
            INSERT OR IGNORE INTO learning_paths
                (id, path_name, description_en, description_zh, difficulty_level,
                 estimated_hours, prerequisites, skills_learned, path_order)
            VALUES (?1, ?2, ?3, ?4, 'Beginner', 1, '[]', ?5, ?1)
            "#,
            params![id, name, desc_en, desc_zh, skills.to_string()],
        )?;
    }
    Ok(inserted)
}

fn seed_path_steps(conn: &Connection) -> Result<usize> {
    let mut inserted = 0;
    for (path_id, order, title, content, minutes) in path_steps() {
        inserted += conn.execute(
            r#"
            INSERT OR IGNORE INTO learning_path_steps
                (path_id, step_order, title, step_type, content_reference, estimated_time_minutes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                path_id,
                order,
                title,
                content.step_type(),
                content.reference(),
                minutes
            ],
        )?;
    }
    Ok(inserted)
}
