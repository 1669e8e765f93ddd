use rand::Rng;
use rusqlite::{params, Row};
use tracing::debug;

use super::{json_list, now_timestamp, Database};
use crate::error::{translate, Error, Result};
use crate::models::{
    Difficulty, ErrorCategory, ErrorDetail, ErrorStatistics, JavaError, NewErrorCategory,
    NewErrorDetail, NewJavaError,
};

const JAVA_ERROR_SELECT: &str = r#"
    SELECT j.id, j.error_code, c.category_code, j.error_name_en, j.description_en,
           j.implementation_guide_en, j.error_name_zh, j.description_zh,
           j.implementation_guide_zh, j.difficulty_level, j.frequency_weight,
           j.tags, j.examples, j.is_active, j.usage_count
    FROM java_errors j
    JOIN error_categories c ON c.id = j.category_id
"#;

fn map_java_error(row: &Row) -> rusqlite::Result<JavaError> {
    let difficulty: String = row.get(9)?;
    Ok(JavaError {
        id: row.get(0)?,
        error_code: row.get(1)?,
        category_code: row.get(2)?,
        error_name_en: row.get(3)?,
        description_en: row.get(4)?,
        implementation_guide_en: row.get(5)?,
        error_name_zh: row.get(6)?,
        description_zh: row.get(7)?,
        implementation_guide_zh: row.get(8)?,
        difficulty: Difficulty::from_str(&difficulty).unwrap_or(Difficulty::Medium),
        frequency_weight: row.get(10)?,
        tags: json_list(row.get(11)?),
        examples: json_list(row.get(12)?),
        is_active: row.get(13)?,
        usage_count: row.get(14)?,
    })
}

fn map_category(row: &Row) -> rusqlite::Result<ErrorCategory> {
    Ok(ErrorCategory {
        id: row.get(0)?,
        category_code: row.get(1)?,
        name_en: row.get(2)?,
        name_zh: row.get(3)?,
        description_en: row.get(4)?,
        description_zh: row.get(5)?,
        sort_order: row.get(6)?,
        is_active: row.get(7)?,
    })
}

impl Database {
    // Category operations
    pub fn add_category(&self, new: &NewErrorCategory) -> Result<i64> {
        self.conn
            .execute(
                r#"
                INSERT INTO error_categories
                    (category_code, name_en, name_zh, description_en, description_zh, sort_order)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    new.category_code,
                    new.name_en,
                    new.name_zh,
                    new.description_en,
                    new.description_zh,
                    new.sort_order
                ],
            )
            .map_err(|e| translate(e, &format!("error category {}", new.category_code)))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_category(&self, code: &str) -> Result<Option<ErrorCategory>> {
        let result = self.conn.query_row(
            r#"
            SELECT id, category_code, name_en, name_zh, description_en, description_zh,
                   sort_order, is_active
            FROM error_categories WHERE category_code = ?1
            "#,
            params![code],
            map_category,
        );
        match result {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_categories(&self, active_only: bool) -> Result<Vec<ErrorCategory>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, category_code, name_en, name_zh, description_en, description_zh,
                   sort_order, is_active
            FROM error_categories
            WHERE (?1 = 0 OR is_active = 1)
            ORDER BY sort_order, category_code
            "#,
        )?;
        let categories = stmt
            .query_map(params![active_only], map_category)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    // Java error operations
    pub fn add_java_error(&self, new: &NewJavaError) -> Result<i64> {
        let category_id: i64 = match self.conn.query_row(
            "SELECT id FROM error_categories WHERE category_code = ?1",
            params![new.category_code],
            |row| row.get(0),
        ) {
            Ok(id) => id,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(Error::MissingReference(format!(
                    "error category {}",
                    new.category_code
                )))
            }
            Err(e) => return Err(e.into()),
        };

        self.conn
            .execute(
                r#"
                INSERT INTO java_errors
                    (error_code, category_id, error_name_en, description_en, implementation_guide_en,
                     error_name_zh, description_zh, implementation_guide_zh, difficulty_level,
                     frequency_weight, tags, examples, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    new.error_code,
                    category_id,
                    new.error_name_en,
                    new.description_en,
                    new.implementation_guide_en,
                    new.error_name_zh,
                    new.description_zh,
                    new.implementation_guide_zh,
                    new.difficulty.as_str(),
                    new.frequency_weight,
                    serde_json::to_string(&new.tags)?,
                    serde_json::to_string(&new.examples)?,
                    now_timestamp()
                ],
            )
            .map_err(|e| translate(e, &format!("java error {}", new.error_code)))?;

        debug!(code = %new.error_code, "added java error");
        Ok(self.conn.last_insert_rowid())
    }

    /// Lookup by business key, ignoring case.
    pub fn get_java_error(&self, code: &str) -> Result<Option<JavaError>> {
        let sql = format!("{} WHERE j.error_code = ?1", JAVA_ERROR_SELECT);
        match self.conn.query_row(&sql, params![code], map_java_error) {
            Ok(e) => Ok(Some(e)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_java_errors(&self, category_code: Option<&str>) -> Result<Vec<JavaError>> {
        let sql = format!(
            "{} WHERE (?1 IS NULL OR c.category_code = ?1) ORDER BY c.sort_order, j.error_code",
            JAVA_ERROR_SELECT
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let errors = stmt
            .query_map(params![category_code], map_java_error)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(errors)
    }

    /// Surrogate id for an error code. Only for joins inside the store;
    /// every cross-table reference uses the code itself.
    pub fn resolve_error_id(&self, code: &str) -> Result<i64> {
        match self.conn.query_row(
            "SELECT id FROM java_errors WHERE error_code = ?1",
            params![code],
            |row| row.get(0),
        ) {
            Ok(id) => Ok(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::not_found("java error", code)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_error_active(&self, code: &str, active: bool) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE java_errors SET is_active = ?1 WHERE error_code = ?2",
            params![active, code],
        )?;
        Ok(rows > 0)
    }

    /// Pick up to `count` distinct active errors, each draw weighted by
    /// frequency_weight. An empty category list means every category.
    pub fn pick_random_errors(
        &self,
        category_codes: &[String],
        count: usize,
    ) -> Result<Vec<JavaError>> {
        let mut pool: Vec<JavaError> = self
            .list_java_errors(None)?
            .into_iter()
            .filter(|e| e.is_active)
            .filter(|e| {
                category_codes.is_empty()
                    || category_codes
                        .iter()
                        .any(|c| c.eq_ignore_ascii_case(&e.category_code))
            })
            .collect();

        let mut rng = rand::thread_rng();
        let mut picked = Vec::with_capacity(count.min(pool.len()));

        while picked.len() < count && !pool.is_empty() {
            let weights: Vec<f64> = pool
                .iter()
                .map(|e| e.frequency_weight.max(0) as f64)
                .collect();
            let total: f64 = weights.iter().sum();

            let index = if total <= 0.0 {
                rng.gen_range(0..pool.len())
            } else {
                let mut point = rng.gen::<f64>() * total;
                let mut chosen = pool.len() - 1;
                for (i, weight) in weights.iter().enumerate() {
                    point -= weight;
                    if point <= 0.0 && *weight > 0.0 {
                        chosen = i;
                        break;
                    }
                }
                chosen
            };
            picked.push(pool.swap_remove(index));
        }

        Ok(picked)
    }

    // Error detail operations
    pub fn add_error_detail(&self, new: &NewErrorDetail) -> Result<i64> {
        self.conn
            .execute(
                r#"
                INSERT INTO error_details
                    (error_code, language, title, category, content_language,
                     detailed_description_md, implementation_guide_md, suggestion_fix_md,
                     example_good_code_md, example_bad_code_md, before_after_comparison_md,
                     common_misconceptions_md, importance_explanation_md)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    new.error_code,
                    new.language,
                    new.title,
                    new.category,
                    new.content_language,
                    new.detailed_description_md,
                    new.implementation_guide_md,
                    new.suggestion_fix_md,
                    new.example_good_code_md,
                    new.example_bad_code_md,
                    new.before_after_comparison_md,
                    new.common_misconceptions_md,
                    new.importance_explanation_md
                ],
            )
            .map_err(|e| translate(e, &format!("error detail {}", new.error_code)))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_error_detail(&self, code: &str) -> Result<Option<ErrorDetail>> {
        let result = self.conn.query_row(
            r#"
            SELECT id, error_code, language, title, category, content_language,
                   detailed_description_md, implementation_guide_md, suggestion_fix_md,
                   example_good_code_md, example_bad_code_md, before_after_comparison_md,
                   common_misconceptions_md, importance_explanation_md
            FROM error_details WHERE error_code = ?1
            "#,
            params![code],
            |row| {
                Ok(ErrorDetail {
                    id: row.get(0)?,
                    error_code: row.get(1)?,
                    language: row.get(2)?,
                    title: row.get(3)?,
                    category: row.get(4)?,
                    content_language: row.get(5)?,
                    detailed_description_md: row.get(6)?,
                    implementation_guide_md: row.get(7)?,
                    suggestion_fix_md: row.get(8)?,
                    example_good_code_md: row.get(9)?,
                    example_bad_code_md: row.get(10)?,
                    before_after_comparison_md: row.get(11)?,
                    common_misconceptions_md: row.get(12)?,
                    importance_explanation_md: row.get(13)?,
                })
            },
        );
        match result {
            Ok(d) => Ok(Some(d)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn error_statistics(&self) -> Result<ErrorStatistics> {
        let active_categories: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM error_categories WHERE is_active = 1",
            [],
            |row| row.get(0),
        )?;
        let active_errors: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM java_errors WHERE is_active = 1",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.category_code, COUNT(j.id)
            FROM error_categories c
            LEFT JOIN java_errors j ON j.category_id = c.id AND j.is_active = 1
            WHERE c.is_active = 1
            GROUP BY c.id
            ORDER BY c.sort_order
            "#,
        )?;
        let errors_per_category = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT error_code, usage_count FROM java_errors
            WHERE usage_count > 0
            ORDER BY usage_count DESC, error_code
            LIMIT 5
            "#,
        )?;
        let most_used = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ErrorStatistics {
            active_categories,
            active_errors,
            errors_per_category,
            most_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    mod category_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn add_and_get_category() {
            let db = setup_db();
            let id = db
                .add_category(&NewErrorCategory::new("logical", "Logical", "邏輯", 1))
                .unwrap();
            assert!(id > 0);
            let cat = db.get_category("LOGICAL").unwrap().unwrap();
            assert_eq!(cat.category_code, "logical");
            assert_eq!(cat.name_zh, "邏輯");
        }

        #[test]
        fn duplicate_category_code_rejected() {
            let db = setup_db();
            db.add_category(&NewErrorCategory::new("syntax", "Syntax", "語法", 1))
                .unwrap();
            let result = db.add_category(&NewErrorCategory::new("Syntax", "Syntax", "語法", 2));
            assert!(matches!(result, Err(Error::Duplicate(_))));
        }

        #[test]
        fn list_is_sorted() {
            let db = seeded_db();
            let codes: Vec<String> = db
                .list_categories(true)
                .unwrap()
                .into_iter()
                .map(|c| c.category_code)
                .collect();
            assert_eq!(
                codes,
                vec![
                    "logical",
                    "syntax",
                    "code_quality",
                    "standard_violation",
                    "java_specific"
                ]
            );
        }
    }

    mod java_error_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn add_and_fetch_with_tags() {
            let db = seeded_db();
            let mut new = NewJavaError::new("UNCLOSED_STREAM", "code_quality", "Unclosed Stream", "未關閉的串流")
                .with_difficulty(Difficulty::Hard)
                .with_weight(3);
            new.tags = vec!["io".into(), "resources".into()];
            db.add_java_error(&new).unwrap();

            let e = db.get_java_error("unclosed_stream").unwrap().unwrap();
            assert_eq!(e.category_code, "code_quality");
            assert_eq!(e.difficulty, Difficulty::Hard);
            assert_eq!(e.tags, vec!["io", "resources"]);
            assert!(e.is_active);
        }

        #[test]
        fn error_code_is_unique_ignoring_case() {
            let db = seeded_db();
            let result = db.add_java_error(&NewJavaError::new(
                "null_pointer",
                "logical",
                "Again",
                "再次",
            ));
            assert!(matches!(result, Err(Error::Duplicate(_))));
        }

        #[test]
        fn unknown_category_is_missing_reference() {
            let db = setup_db();
            let result = db.add_java_error(&NewJavaError::new("X", "nope", "X", "X"));
            assert!(matches!(result, Err(Error::MissingReference(_))));
        }

        #[test]
        fn cjk_descriptions_round_trip() {
            let db = seeded_db();
            let zh = "字串比較：請使用 equals() 方法 ✅ 𠜎";
            db.add_java_error(
                &NewJavaError::new("CJK_TEST", "logical", "CJK", "中文")
                    .with_descriptions("English text", zh),
            )
            .unwrap();
            let e = db.get_java_error("CJK_TEST").unwrap().unwrap();
            assert_eq!(e.description_zh, zh);
            assert_eq!(e.description_en, "English text");
        }

        #[test]
        fn filter_by_category() {
            let db = seeded_db();
            let logical = db.list_java_errors(Some("logical")).unwrap();
            assert_eq!(logical.len(), 2);
            assert!(logical.iter().all(|e| e.category_code == "logical"));
            assert_eq!(db.list_java_errors(None).unwrap().len(), 6);
        }

        #[test]
        fn resolve_surrogate_id() {
            let db = seeded_db();
            let id = db.resolve_error_id("RAW_TYPES").unwrap();
            assert_eq!(db.get_java_error("RAW_TYPES").unwrap().unwrap().id, id);
            assert!(matches!(
                db.resolve_error_id("NOPE"),
                Err(Error::NotFound { .. })
            ));
        }
    }

    mod pick_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn picks_distinct_errors() {
            let db = seeded_db();
            let picked = db.pick_random_errors(&[], 4).unwrap();
            assert_eq!(picked.len(), 4);
            let mut codes: Vec<&str> = picked.iter().map(|e| e.error_code.as_str()).collect();
            codes.sort();
            codes.dedup();
            assert_eq!(codes.len(), 4);
        }

        #[test]
        fn count_larger_than_pool_returns_pool() {
            let db = seeded_db();
            let picked = db.pick_random_errors(&["java_specific".to_string()], 10).unwrap();
            assert_eq!(picked.len(), 2);
        }

        #[test]
        fn inactive_errors_are_never_picked() {
            let db = seeded_db();
            db.set_error_active("NULL_POINTER", false).unwrap();
            for _ in 0..20 {
                let picked = db.pick_random_errors(&["logical".to_string()], 2).unwrap();
                assert_eq!(picked.len(), 1);
                assert_eq!(picked[0].error_code, "STRING_COMPARISON");
            }
        }

        #[test]
        fn zero_weight_loses_to_positive_weight() {
            let db = seeded_db();
            db.add_java_error(
                &NewJavaError::new("NEVER", "standard_violation", "Never", "從不").with_weight(0),
            )
            .unwrap();
            db.add_java_error(
                &NewJavaError::new("ALWAYS", "standard_violation", "Always", "總是").with_weight(5),
            )
            .unwrap();
            for _ in 0..20 {
                let picked = db
                    .pick_random_errors(&["standard_violation".to_string()], 1)
                    .unwrap();
                assert_eq!(picked[0].error_code, "ALWAYS");
            }
        }
    }

    mod detail_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn duplicate_null_pointer_detail_is_rejected() {
            let db = setup_db();
            db.add_error_detail(&NewErrorDetail::new("NULL_POINTER", "Null Pointer", "Logical"))
                .unwrap();
            let result =
                db.add_error_detail(&NewErrorDetail::new("NULL_POINTER", "Again", "Logical"));
            assert!(matches!(result, Err(Error::Duplicate(_))));
        }

        #[test]
        fn seeded_detail_has_markdown() {
            let db = seeded_db();
            let detail = db.get_error_detail("STRING_COMPARISON").unwrap().unwrap();
            assert_eq!(detail.language, "Java");
            assert!(detail.example_bad_code_md.unwrap().contains("=="));
            assert!(db.get_error_detail("RAW_TYPES").unwrap().is_none());
        }
    }

    mod statistics_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn counts_active_catalog() {
            let db = seeded_db();
            db.set_error_active("MAGIC_NUMBERS", false).unwrap();
            let stats = db.error_statistics().unwrap();
            assert_eq!(stats.active_categories, 5);
            assert_eq!(stats.active_errors, 5);
            assert!(stats
                .errors_per_category
                .contains(&("code_quality".to_string(), 0)));
            assert!(stats.most_used.is_empty());
        }
    }
}
