use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{json_value, now_timestamp, parse_sql_timestamp, sql_timestamp, Database};
use crate::error::{translate, Error, Result};
use crate::models::{
    CleanupReport, Interaction, InteractionCategory, InteractionType, NewInteraction,
    TabNavigation, UsageAction, UserSession,
};

fn map_session(row: &Row) -> rusqlite::Result<UserSession> {
    Ok(UserSession {
        session_id: row.get(0)?,
        user_id: row.get(1)?,
        language: row.get(2)?,
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        duration_seconds: row.get(5)?,
        interaction_count: row.get(6)?,
    })
}

fn map_interaction(row: &Row) -> rusqlite::Result<Interaction> {
    let kind: String = row.get(3)?;
    let category: Option<String> = row.get(4)?;
    Ok(Interaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        interaction_type: InteractionType::from_str(&kind),
        category: category.as_deref().and_then(InteractionCategory::from_str),
        action: row.get(5)?,
        details: json_value(row.get(6)?),
        time_spent_seconds: row.get(7)?,
        success: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl Database {
    // Interaction type registry
    /// Register a new interaction kind. Returns false if it already exists.
    pub fn register_interaction_type(&self, key: &str, description: Option<&str>) -> Result<bool> {
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return Err(Error::InvalidData("interaction type cannot be empty".to_string()));
        }
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO interaction_types (type_key, description) VALUES (?1, ?2)",
            params![key, description],
        )?;
        if inserted > 0 {
            info!(key = %key, "registered interaction type");
        }
        Ok(inserted > 0)
    }

    pub fn interaction_types(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT type_key FROM interaction_types ORDER BY builtin DESC, type_key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    // Sessions
    pub fn start_user_session(&self, uid: &str, language: &str) -> Result<String> {
        let session_id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                r#"
                INSERT INTO user_sessions (session_id, user_id, language, started_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![session_id, uid, language, now_timestamp()],
            )
            .map_err(|e| translate(e, &format!("session for user {}", uid)))?;
        debug!(session = %session_id, uid, "started session");
        Ok(session_id)
    }

    /// Close a session and compute its duration. Ending a closed session
    /// leaves it untouched.
    pub fn end_user_session(&self, session_id: &str) -> Result<UserSession> {
        let tx = self.write_tx()?;
        let session = tx
            .query_row(
                r#"
                SELECT session_id, user_id, language, started_at, ended_at,
                       duration_seconds, interaction_count
                FROM user_sessions WHERE session_id = ?1
                "#,
                params![session_id],
                map_session,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("session", session_id))?;

        if session.ended_at.is_none() {
            let now = Utc::now();
            let duration = parse_sql_timestamp(&session.started_at)
                .map(|started| (now - started).num_seconds().max(0));
            tx.execute(
                "UPDATE user_sessions SET ended_at = ?1, duration_seconds = ?2 WHERE session_id = ?3",
                params![sql_timestamp(now), duration, session_id],
            )?;
        }
        tx.commit()?;

        self.get_user_session(session_id)?
            .ok_or_else(|| Error::not_found("session", session_id))
    }

    pub fn get_user_session(&self, session_id: &str) -> Result<Option<UserSession>> {
        let session = self
            .conn
            .query_row(
                r#"
                SELECT session_id, user_id, language, started_at, ended_at,
                       duration_seconds, interaction_count
                FROM user_sessions WHERE session_id = ?1
                "#,
                params![session_id],
                map_session,
            )
            .optional()?;
        Ok(session)
    }

    // Interactions
    /// Append an interaction. Unknown kinds are added to the registry first.
    pub fn log_interaction(&self, new: &NewInteraction) -> Result<i64> {
        let kind = new.interaction_type.as_str().to_lowercase();
        let details = match &new.details {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };

        let tx = self.write_tx()?;
        tx.execute(
            "INSERT OR IGNORE INTO interaction_types (type_key) VALUES (?1)",
            params![kind],
        )?;
        tx.execute(
            r#"
            INSERT INTO user_interactions
                (user_id, session_id, interaction_type, interaction_category, action,
                 details, time_spent_seconds, success, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                new.user_id,
                new.session_id,
                kind,
                new.category.as_str(),
                new.action,
                details,
                new.time_spent_seconds,
                new.success,
                now_timestamp()
            ],
        )
        .map_err(|e| translate(e, &format!("interaction for user {}", new.user_id)))?;
        let id = tx.last_insert_rowid();

        if let Some(session_id) = &new.session_id {
            tx.execute(
                "UPDATE user_sessions SET interaction_count = interaction_count + 1 WHERE session_id = ?1",
                params![session_id],
            )?;
        }
        tx.commit()?;
        Ok(id)
    }

    /// Log an interaction without letting a failure reach the caller.
    pub fn track_interaction(&self, new: &NewInteraction) -> Option<i64> {
        match self.log_interaction(new) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, action = %new.action, "dropped interaction");
                None
            }
        }
    }

    pub fn user_interactions(&self, uid: &str, limit: usize) -> Result<Vec<Interaction>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, session_id, interaction_type, interaction_category, action,
                   details, time_spent_seconds, success, created_at
            FROM user_interactions
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt
            .query_map(params![uid, limit as i64], map_interaction)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn log_tab_navigation(
        &self,
        uid: &str,
        session_id: Option<&str>,
        from_tab: Option<&str>,
        to_tab: &str,
        seconds_on_previous: Option<f64>,
    ) -> Result<i64> {
        self.conn
            .execute(
                r#"
                INSERT INTO tab_navigation
                    (user_id, session_id, from_tab, to_tab, time_on_previous_tab_seconds, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![uid, session_id, from_tab, to_tab, seconds_on_previous, now_timestamp()],
            )
            .map_err(|e| translate(e, &format!("tab navigation for user {}", uid)))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent tab changes first.
    pub fn tab_navigations(&self, uid: &str, limit: usize) -> Result<Vec<TabNavigation>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, session_id, from_tab, to_tab, time_on_previous_tab_seconds,
                   created_at
            FROM tab_navigation
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt
            .query_map(params![uid, limit as i64], |row| {
                Ok(TabNavigation {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    session_id: row.get(2)?,
                    from_tab: row.get(3)?,
                    to_tab: row.get(4)?,
                    time_on_previous_tab_seconds: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Record a catalog error being used and bump its usage counter.
    pub fn record_error_usage(
        &self,
        error_code: &str,
        uid: Option<&str>,
        session_id: Option<&str>,
        action: UsageAction,
        context: Option<&serde_json::Value>,
    ) -> Result<i64> {
        let context = match context {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };

        let tx = self.write_tx()?;
        let updated = tx.execute(
            "UPDATE java_errors SET usage_count = usage_count + 1 WHERE error_code = ?1",
            params![error_code],
        )?;
        if updated == 0 {
            return Err(Error::not_found("java error", error_code));
        }
        tx.execute(
            r#"
            INSERT INTO error_usage_stats (error_code, user_id, session_id, action_type, context, created_at)
            SELECT error_code, ?2, ?3, ?4, ?5, ?6 FROM java_errors WHERE error_code = ?1
            "#,
            params![
                error_code,
                uid,
                session_id,
                action.as_str(),
                context,
                now_timestamp()
            ],
        )
        .map_err(|e| translate(e, &format!("usage of {}", error_code)))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    // Retention
    pub fn cleanup_telemetry(&self, older_than_days: i64) -> Result<CleanupReport> {
        self.cleanup_telemetry_at(Utc::now(), older_than_days)
    }

    /// Delete interactions and tab navigation older than the cutoff.
    pub fn cleanup_telemetry_at(
        &self,
        now: DateTime<Utc>,
        older_than_days: i64,
    ) -> Result<CleanupReport> {
        if older_than_days < 0 {
            return Err(Error::InvalidData(format!(
                "retention must be non-negative, got {} days",
                older_than_days
            )));
        }
        let cutoff = TimeDelta::try_days(older_than_days)
            .and_then(|span| now.checked_sub_signed(span))
            .map(sql_timestamp)
            .ok_or_else(|| {
                Error::InvalidData(format!("retention of {} days is out of range", older_than_days))
            })?;

        let tx = self.write_tx()?;
        let interactions_deleted = tx.execute(
            "DELETE FROM user_interactions WHERE created_at < ?1",
            params![cutoff],
        )?;
        let navigations_deleted = tx.execute(
            "DELETE FROM tab_navigation WHERE created_at < ?1",
            params![cutoff],
        )?;
        tx.commit()?;

        let report = CleanupReport {
            interactions_deleted,
            navigations_deleted,
            cutoff,
        };
        info!(
            interactions = report.interactions_deleted,
            navigations = report.navigations_deleted,
            cutoff = %report.cutoff,
            "cleaned up telemetry"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::super::schema::USER_OWNED_TABLES;
    use super::super::test_support::*;
    use super::*;
    use serde_json::json;

    fn click(uid: &str) -> NewInteraction {
        NewInteraction::new(
            uid,
            InteractionType::Click,
            InteractionCategory::Navigation,
            "open_menu",
        )
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn builtins_are_registered() {
            let db = setup_db();
            let types = db.interaction_types().unwrap();
            for key in InteractionType::BUILTIN {
                assert!(types.contains(&key.to_string()), "missing {}", key);
            }
        }

        #[test]
        fn registering_is_case_insensitive() {
            let db = setup_db();
            assert!(db.register_interaction_type("Badge_View", Some("Badge page")).unwrap());
            assert!(!db.register_interaction_type("badge_view", None).unwrap());
            assert!(!db.register_interaction_type("CLICK", None).unwrap());
            assert!(db.interaction_types().unwrap().contains(&"badge_view".to_string()));
        }

        #[test]
        fn empty_key_is_rejected() {
            let db = setup_db();
            assert!(matches!(
                db.register_interaction_type("  ", None),
                Err(Error::InvalidData(_))
            ));
        }
    }

    mod session_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn interactions_bump_session_counter() {
            let db = setup_db();
            let uid = add_user(&db, "s@example.com");
            let sid = db.start_user_session(&uid, "zh").unwrap();
            db.log_interaction(&click(&uid).in_session(&sid)).unwrap();
            db.log_interaction(&click(&uid).in_session(&sid)).unwrap();
            db.log_interaction(&click(&uid)).unwrap();

            let session = db.get_user_session(&sid).unwrap().unwrap();
            assert_eq!(session.interaction_count, 2);
            assert_eq!(session.language, "zh");
        }

        #[test]
        fn ending_sets_duration_once() {
            let db = setup_db();
            let uid = add_user(&db, "s@example.com");
            let sid = db.start_user_session(&uid, "en").unwrap();
            let ended = db.end_user_session(&sid).unwrap();
            assert!(ended.ended_at.is_some());
            assert!(ended.duration_seconds.unwrap() >= 0);

            let again = db.end_user_session(&sid).unwrap();
            assert_eq!(again.ended_at, ended.ended_at);
        }

        #[test]
        fn unknown_session_is_not_found() {
            let db = setup_db();
            assert!(db.get_user_session("nope").unwrap().is_none());
            assert!(matches!(
                db.end_user_session("nope"),
                Err(Error::NotFound { .. })
            ));
        }

        #[test]
        fn session_for_unknown_user_is_missing_reference() {
            let db = setup_db();
            assert!(matches!(
                db.start_user_session("ghost", "en"),
                Err(Error::MissingReference(_))
            ));
        }
    }

    mod interaction_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn custom_types_register_on_first_use() {
            let db = setup_db();
            let uid = add_user(&db, "i@example.com");
            let new = NewInteraction::new(
                &uid,
                InteractionType::from_str("Hint_Dismissed"),
                InteractionCategory::Learning,
                "dismiss",
            )
            .with_details(json!({"hint": 3}))
            .with_time(1.5)
            .failed();
            db.log_interaction(&new).unwrap();

            assert!(db
                .interaction_types()
                .unwrap()
                .contains(&"hint_dismissed".to_string()));
            let logged = db.user_interactions(&uid, 10).unwrap();
            assert_eq!(logged.len(), 1);
            assert_eq!(
                logged[0].interaction_type,
                InteractionType::Custom("hint_dismissed".into())
            );
            assert_eq!(logged[0].category, Some(InteractionCategory::Learning));
            assert_eq!(logged[0].details, Some(json!({"hint": 3})));
            assert_eq!(logged[0].time_spent_seconds, Some(1.5));
            assert!(!logged[0].success);
        }

        #[test]
        fn tracking_swallows_failures() {
            let db = setup_db();
            assert_eq!(db.track_interaction(&click("ghost")), None);
            let uid = add_user(&db, "t@example.com");
            assert!(db.track_interaction(&click(&uid)).is_some());
        }

        #[test]
        fn tab_navigation_is_recorded() {
            let db = setup_db();
            let uid = add_user(&db, "t@example.com");
            db.log_tab_navigation(&uid, None, Some("practice"), "badges", Some(12.0))
                .unwrap();
            let last = db.log_tab_navigation(&uid, None, None, "home", None).unwrap();
            assert_eq!(count(&db, "SELECT COUNT(*) FROM tab_navigation"), 2);

            let recent = db.tab_navigations(&uid, 10).unwrap();
            assert_eq!(recent.len(), 2);
            assert_eq!(recent[0].id, last);
            assert_eq!(recent[0].to_tab, "home");
            assert_eq!(recent[1].from_tab.as_deref(), Some("practice"));
            assert_eq!(recent[1].time_on_previous_tab_seconds, Some(12.0));
            assert_eq!(db.tab_navigations(&uid, 1).unwrap().len(), 1);
            assert!(db.tab_navigations("ghost", 10).unwrap().is_empty());
        }
    }

    mod usage_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn usage_increments_counter() {
            let db = seeded_db();
            let uid = add_user(&db, "u@example.com");
            db.record_error_usage("null_pointer", Some(&uid), None, UsageAction::Viewed, None)
                .unwrap();
            db.record_error_usage(
                "NULL_POINTER",
                None,
                None,
                UsageAction::Mastered,
                Some(&json!({"source": "cli"})),
            )
            .unwrap();

            let error = db.get_java_error("NULL_POINTER").unwrap().unwrap();
            assert_eq!(error.usage_count, 2);
            let codes = strings(&db, "SELECT error_code FROM error_usage_stats ORDER BY id");
            assert_eq!(codes, vec!["NULL_POINTER", "NULL_POINTER"]);
        }

        #[test]
        fn unknown_code_changes_nothing() {
            let db = seeded_db();
            assert!(matches!(
                db.record_error_usage("MISSING", None, None, UsageAction::Viewed, None),
                Err(Error::NotFound { .. })
            ));
            assert_eq!(count(&db, "SELECT COUNT(*) FROM error_usage_stats"), 0);
        }
    }

    mod retention_tests {
        use super::*;
        use pretty_assertions::assert_eq;
        use chrono::TimeZone;

        #[test]
        fn cleanup_removes_only_old_rows() {
            let db = setup_db();
            let uid = add_user(&db, "r@example.com");
            db.log_interaction(&click(&uid)).unwrap();
            db.log_tab_navigation(&uid, None, None, "home", None).unwrap();
            db.conn
                .execute(
                    "INSERT INTO user_interactions (user_id, interaction_type, action, created_at) VALUES (?1, 'click', 'old', '2020-01-01 00:00:00')",
                    params![uid],
                )
                .unwrap();
            db.conn
                .execute(
                    "INSERT INTO tab_navigation (user_id, to_tab, created_at) VALUES (?1, 'old', '2020-01-01 00:00:00')",
                    params![uid],
                )
                .unwrap();

            let report = db.cleanup_telemetry(90).unwrap();
            assert_eq!(report.interactions_deleted, 1);
            assert_eq!(report.navigations_deleted, 1);
            assert_eq!(report.total(), 2);
            assert_eq!(db.user_interactions(&uid, 10).unwrap().len(), 1);
        }

        #[test]
        fn cutoff_is_relative_to_now() {
            let db = setup_db();
            let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
            let report = db.cleanup_telemetry_at(now, 30).unwrap();
            assert_eq!(report.cutoff, "2024-03-01 12:00:00");
            assert!(matches!(
                db.cleanup_telemetry_at(now, -1),
                Err(Error::InvalidData(_))
            ));
        }

        #[test]
        fn huge_retention_is_rejected() {
            let db = setup_db();
            let uid = add_user(&db, "r@example.com");
            db.log_interaction(&click(&uid)).unwrap();
            for days in [1_000_000_000, i64::MAX] {
                assert!(matches!(
                    db.cleanup_telemetry(days),
                    Err(Error::InvalidData(_))
                ));
            }
            assert_eq!(db.user_interactions(&uid, 10).unwrap().len(), 1);
        }
    }

    mod cascade_tests {
        use super::*;
        use pretty_assertions::assert_eq;
        use crate::models::{NewIdentification, PracticeResult};

        #[test]
        fn deleting_a_user_removes_everything_they_own() {
            let db = seeded_db();
            let uid = add_user(&db, "gone@example.com");
            let sid = db.start_user_session(&uid, "en").unwrap();
            db.log_interaction(&click(&uid).in_session(&sid)).unwrap();
            db.log_tab_navigation(&uid, Some(&sid), None, "home", None).unwrap();
            db.log_hint_usage(&uid, &sid, "null_check", 1).unwrap();

            let practice = db.start_practice(&uid, "NULL_POINTER", Some(&sid)).unwrap();
            db.mark_code_ready(practice, "code").unwrap();
            db.complete_practice(practice, PracticeResult::new(2, 2, 10))
                .unwrap();
            db.record_identification(&NewIdentification::new(&uid, "RAW_TYPES", true))
                .unwrap();
            db.start_workflow(&uid, Some(&sid), &[]).unwrap();
            db.award_badge(&uid, "badge_first_review").unwrap();
            db.log_badge_progress(&uid, "badge_syntax_master", 2, 10).unwrap();
            let path = db.list_learning_paths(true).unwrap()[0].id;
            db.enroll_user(&uid, path).unwrap();
            let first = db.path_steps(path).unwrap()[0].id;
            db.complete_step(&uid, path, first).unwrap();
            db.record_learning_achievement(&crate::models::NewAchievement::new(
                &uid, "streak", "Three days",
            ))
            .unwrap();

            for table in USER_OWNED_TABLES {
                let n = count(
                    &db,
                    &format!("SELECT COUNT(*) FROM {} WHERE user_id = '{}'", table, uid),
                );
                assert!(n > 0, "{} has no rows before delete", table);
            }

            assert!(db.delete_user(&uid).unwrap());

            for table in USER_OWNED_TABLES {
                let n = count(
                    &db,
                    &format!("SELECT COUNT(*) FROM {} WHERE user_id = '{}'", table, uid),
                );
                assert_eq!(n, 0, "{} still references the user", table);
            }
            // Usage stats are kept for the catalog, detached from the user
            assert_eq!(
                count(&db, "SELECT COUNT(*) FROM error_usage_stats WHERE user_id IS NULL"),
                1
            );
        }
    }
}
