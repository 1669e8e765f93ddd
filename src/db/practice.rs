use chrono::Utc;
use rusqlite::{params, Connection, Row};
use tracing::{debug, warn};

use super::learning::apply_skill_practice;
use super::users::{apply_activity, bump_category_stats, REVIEW_BASE_POINTS};
use super::{json_list, now_timestamp, parse_sql_timestamp, sql_timestamp, Database};
use crate::error::{translate, Error, Result};
use crate::models::{
    ActivityKind, Identification, NewActivity, NewIdentification, PracticeResult,
    PracticeSession, PracticeStatus, SkillPractice, UsageAction, Workflow, WorkflowStatus,
    WorkflowStep,
};

const PRACTICE_COLUMNS: &str = r#"
    id, user_id, error_code, user_session_id, status, generated_code, errors_expected,
    errors_identified, accuracy_percentage, time_spent_seconds, started_at, completed_at
"#;

const WORKFLOW_COLUMNS: &str = r#"
    id, user_id, user_session_id, status, current_step, categories, errors_expected,
    errors_identified, started_at, completed_at, duration_seconds
"#;

/// Bonus points for each error the reviewer found.
const POINTS_PER_IDENTIFIED: i64 = 5;

fn map_practice(row: &Row) -> rusqlite::Result<PracticeSession> {
    let status: String = row.get(4)?;
    Ok(PracticeSession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        error_code: row.get(2)?,
        user_session_id: row.get(3)?,
        status: PracticeStatus::from_str(&status).unwrap_or(PracticeStatus::Setup),
        generated_code: row.get(5)?,
        errors_expected: row.get(6)?,
        errors_identified: row.get(7)?,
        accuracy_percentage: row.get(8)?,
        time_spent_seconds: row.get(9)?,
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
    })
}

fn map_workflow(row: &Row) -> rusqlite::Result<Workflow> {
    let status: String = row.get(3)?;
    let step: String = row.get(4)?;
    Ok(Workflow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_session_id: row.get(2)?,
        status: WorkflowStatus::from_str(&status).unwrap_or(WorkflowStatus::InProgress),
        current_step: WorkflowStep::from_str(&step).unwrap_or(WorkflowStep::CategorySelection),
        categories: json_list(row.get(5)?),
        errors_expected: row.get(6)?,
        errors_identified: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
        duration_seconds: row.get(10)?,
    })
}

fn load_practice(conn: &Connection, id: i64) -> Result<PracticeSession> {
    let sql = format!("SELECT {} FROM practice_sessions WHERE id = ?1", PRACTICE_COLUMNS);
    match conn.query_row(&sql, params![id], map_practice) {
        Ok(p) => Ok(p),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::not_found("practice session", id)),
        Err(e) => Err(e.into()),
    }
}

fn load_workflow(conn: &Connection, id: i64) -> Result<Workflow> {
    let sql = format!("SELECT {} FROM workflow_tracking WHERE id = ?1", WORKFLOW_COLUMNS);
    match conn.query_row(&sql, params![id], map_workflow) {
        Ok(w) => Ok(w),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::not_found("workflow", id)),
        Err(e) => Err(e.into()),
    }
}

fn check_practice_transition(from: PracticeStatus, to: PracticeStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            entity: "practice session",
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

fn check_workflow_transition(from: WorkflowStatus, to: WorkflowStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            entity: "workflow",
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

// Category code of a catalog error, which also proves the code exists
fn error_category(conn: &Connection, error_code: &str) -> Result<(String, String)> {
    match conn.query_row(
        r#"
        SELECT j.error_code, c.category_code
        FROM java_errors j JOIN error_categories c ON c.id = j.category_id
        WHERE j.error_code = ?1
        "#,
        params![error_code],
        |row| Ok((row.get(0)?, row.get(1)?)),
    ) {
        Ok(pair) => Ok(pair),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            Err(Error::not_found("java error", error_code))
        }
        Err(e) => Err(e.into()),
    }
}

fn insert_identification(
    conn: &Connection,
    new: &NewIdentification,
    error_code: &str,
    category: &str,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO error_identification_analysis
            (user_id, practice_session_id, error_code, category, identified,
             time_to_identify_seconds, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            new.user_id,
            new.practice_session_id,
            error_code,
            category,
            new.identified,
            new.time_to_identify_seconds,
            now_timestamp()
        ],
    )
    .map_err(|e| translate(e, "identification"))?;
    Ok(conn.last_insert_rowid())
}

fn review_points(identified: i64) -> Result<i64> {
    POINTS_PER_IDENTIFIED
        .checked_mul(identified)
        .and_then(|bonus| bonus.checked_add(REVIEW_BASE_POINTS))
        .ok_or_else(|| {
            Error::InvalidData(format!("{} identified errors is out of range", identified))
        })
}

impl Database {
    pub fn start_practice(
        &self,
        uid: &str,
        error_code: &str,
        user_session_id: Option<&str>,
    ) -> Result<i64> {
        let (code, _) = error_category(&self.conn, error_code)?;
        self.conn
            .execute(
                r#"
                INSERT INTO practice_sessions (user_id, error_code, user_session_id, status, started_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    uid,
                    code,
                    user_session_id,
                    PracticeStatus::Setup.as_str(),
                    now_timestamp()
                ],
            )
            .map_err(|e| translate(e, &format!("practice session for user {}", uid)))?;
        let id = self.conn.last_insert_rowid();
        debug!(id, uid, code = %code, "started practice");
        Ok(id)
    }

    pub fn mark_code_ready(&self, id: i64, generated_code: &str) -> Result<()> {
        let tx = self.write_tx()?;
        let session = load_practice(&tx, id)?;
        check_practice_transition(session.status, PracticeStatus::CodeReady)?;
        tx.execute(
            "UPDATE practice_sessions SET status = ?1, generated_code = ?2 WHERE id = ?3",
            params![PracticeStatus::CodeReady.as_str(), generated_code, id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Close a practice round. The session row, the identification record,
    /// category stats and the user's counters change together or not at all.
    pub fn complete_practice(&self, id: i64, result: PracticeResult) -> Result<PracticeSession> {
        let tx = self.write_tx()?;
        let session = load_practice(&tx, id)?;
        check_practice_transition(session.status, PracticeStatus::ReviewComplete)?;

        let points = review_points(result.errors_identified)?;
        let accuracy = result.accuracy();
        tx.execute(
            r#"
            UPDATE practice_sessions
            SET status = ?1, errors_expected = ?2, errors_identified = ?3,
                accuracy_percentage = ?4, time_spent_seconds = ?5, completed_at = ?6
            WHERE id = ?7
            "#,
            params![
                PracticeStatus::ReviewComplete.as_str(),
                result.errors_expected,
                result.errors_identified,
                accuracy,
                result.time_spent_seconds,
                now_timestamp(),
                id
            ],
        )?;

        let (code, category) = error_category(&tx, &session.error_code)?;
        let identification = NewIdentification {
            user_id: session.user_id.clone(),
            practice_session_id: Some(id),
            error_code: code.clone(),
            identified: result.errors_identified > 0,
            time_to_identify_seconds: Some(result.time_spent_seconds),
        };
        insert_identification(&tx, &identification, &code, &category)?;
        bump_category_stats(
            &tx,
            &session.user_id,
            &category,
            result.errors_expected,
            result.errors_identified,
        )?;
        apply_skill_practice(
            &tx,
            &session.user_id,
            &category,
            &SkillPractice::new(
                result.errors_expected,
                result.errors_identified,
                result.time_spent_seconds / 60,
            ),
            Utc::now(),
        )?;

        apply_activity(
            &tx,
            &session.user_id,
            &NewActivity::new(ActivityKind::ReviewCompleted, points)
                .with_score(result.errors_identified)
                .with_details(
                    format!(
                        "Reviewed {}: found {}/{} errors",
                        code, result.errors_identified, result.errors_expected
                    ),
                    format!(
                        "審查 {}：找到 {}/{} 個錯誤",
                        code, result.errors_identified, result.errors_expected
                    ),
                ),
            Utc::now(),
        )?;

        let completed = load_practice(&tx, id)?;
        tx.commit()?;

        // Usage stats are telemetry; losing one must not undo the review
        if let Err(e) = self.record_error_usage(
            &code,
            Some(&session.user_id),
            session.user_session_id.as_deref(),
            UsageAction::from_accuracy(accuracy),
            None,
        ) {
            warn!(error = %e, code = %code, "failed to record error usage");
        }

        debug!(id, accuracy, "completed practice");
        Ok(completed)
    }

    pub fn abandon_practice(&self, id: i64) -> Result<()> {
        let tx = self.write_tx()?;
        let session = load_practice(&tx, id)?;
        check_practice_transition(session.status, PracticeStatus::Abandoned)?;
        tx.execute(
            "UPDATE practice_sessions SET status = ?1, completed_at = ?2 WHERE id = ?3",
            params![PracticeStatus::Abandoned.as_str(), now_timestamp(), id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_practice(&self, id: i64) -> Result<Option<PracticeSession>> {
        match load_practice(&self.conn, id) {
            Ok(p) => Ok(Some(p)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn list_practice(&self, uid: &str) -> Result<Vec<PracticeSession>> {
        let sql = format!(
            "SELECT {} FROM practice_sessions WHERE user_id = ?1 ORDER BY started_at DESC, id DESC",
            PRACTICE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(params![uid], map_practice)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    // Workflow operations
    pub fn start_workflow(
        &self,
        uid: &str,
        user_session_id: Option<&str>,
        categories: &[String],
    ) -> Result<i64> {
        self.conn
            .execute(
                r#"
                INSERT INTO workflow_tracking (user_id, user_session_id, categories, started_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    uid,
                    user_session_id,
                    serde_json::to_string(categories)?,
                    now_timestamp()
                ],
            )
            .map_err(|e| translate(e, &format!("workflow for user {}", uid)))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Move a live workflow forward to `step`. Steps never go backwards.
    pub fn advance_workflow(&self, id: i64, step: WorkflowStep) -> Result<()> {
        let tx = self.write_tx()?;
        let workflow = load_workflow(&tx, id)?;
        if workflow.status != WorkflowStatus::InProgress || step <= workflow.current_step {
            return Err(Error::InvalidTransition {
                entity: "workflow step",
                from: workflow.current_step.as_str().to_string(),
                to: step.as_str().to_string(),
            });
        }
        tx.execute(
            "UPDATE workflow_tracking SET current_step = ?1 WHERE id = ?2",
            params![step.as_str(), id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn complete_workflow(
        &self,
        id: i64,
        errors_expected: i64,
        errors_identified: i64,
    ) -> Result<Workflow> {
        self.finish_workflow(
            id,
            WorkflowStatus::Completed,
            Some((errors_expected, errors_identified)),
        )
    }

    pub fn abandon_workflow(&self, id: i64) -> Result<Workflow> {
        self.finish_workflow(id, WorkflowStatus::Abandoned, None)
    }

    fn finish_workflow(
        &self,
        id: i64,
        status: WorkflowStatus,
        counts: Option<(i64, i64)>,
    ) -> Result<Workflow> {
        let tx = self.write_tx()?;
        let workflow = load_workflow(&tx, id)?;
        check_workflow_transition(workflow.status, status)?;

        let now = Utc::now();
        let duration = parse_sql_timestamp(&workflow.started_at)
            .map(|started| (now - started).num_seconds().max(0));
        let (expected, identified) = match counts {
            Some((e, i)) => (Some(e), Some(i)),
            None => (None, None),
        };

        tx.execute(
            r#"
            UPDATE workflow_tracking
            SET status = ?1, completed_at = ?2, duration_seconds = ?3,
                errors_expected = COALESCE(?4, errors_expected),
                errors_identified = COALESCE(?5, errors_identified),
                current_step = CASE WHEN ?1 = 'completed' THEN 'feedback' ELSE current_step END
            WHERE id = ?6
            "#,
            params![
                status.as_str(),
                sql_timestamp(now),
                duration,
                expected,
                identified,
                id
            ],
        )?;
        let finished = load_workflow(&tx, id)?;
        tx.commit()?;
        Ok(finished)
    }

    pub fn get_workflow(&self, id: i64) -> Result<Option<Workflow>> {
        match load_workflow(&self.conn, id) {
            Ok(w) => Ok(Some(w)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Record a single identification outside a practice round and fold it
    /// into the user's category stats.
    pub fn record_identification(&self, new: &NewIdentification) -> Result<i64> {
        let tx = self.write_tx()?;
        let (code, category) = error_category(&tx, &new.error_code)?;
        let id = insert_identification(&tx, new, &code, &category)?;
        bump_category_stats(&tx, &new.user_id, &category, 1, new.identified as i64)?;
        tx.commit()?;
        Ok(id)
    }

    pub fn identification_history(&self, uid: &str, limit: usize) -> Result<Vec<Identification>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, practice_session_id, error_code, category, identified,
                   time_to_identify_seconds, created_at
            FROM error_identification_analysis
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt
            .query_map(params![uid, limit as i64], |row| {
                Ok(Identification {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    practice_session_id: row.get(2)?,
                    error_code: row.get(3)?,
                    category: row.get(4)?,
                    identified: row.get(5)?,
                    time_to_identify_seconds: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn ready_practice(db: &Database, uid: &str) -> i64 {
        let id = db.start_practice(uid, "NULL_POINTER", None).unwrap();
        db.mark_code_ready(id, "String s = null; s.length();").unwrap();
        id
    }

    mod practice_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn starts_in_setup() {
            let db = seeded_db();
            let uid = add_user(&db, "p@example.com");
            let id = db.start_practice(&uid, "null_pointer", None).unwrap();
            let p = db.get_practice(id).unwrap().unwrap();
            assert_eq!(p.status, PracticeStatus::Setup);
            assert_eq!(p.error_code, "NULL_POINTER");
        }

        #[test]
        fn unknown_error_code_is_not_found() {
            let db = seeded_db();
            let uid = add_user(&db, "p@example.com");
            assert!(matches!(
                db.start_practice(&uid, "NOT_AN_ERROR", None),
                Err(Error::NotFound { entity: "java error", .. })
            ));
        }

        #[test]
        fn completing_from_setup_is_invalid() {
            let db = seeded_db();
            let uid = add_user(&db, "p@example.com");
            let id = db.start_practice(&uid, "NULL_POINTER", None).unwrap();
            let result = db.complete_practice(id, PracticeResult::new(1, 1, 30));
            assert!(matches!(result, Err(Error::InvalidTransition { .. })));
            assert_eq!(db.get_user(&uid).unwrap().unwrap().total_points, 0);
        }

        #[test]
        fn completion_updates_everything_together() {
            let db = seeded_db();
            let uid = add_user(&db, "p@example.com");
            let id = ready_practice(&db, &uid);

            let done = db
                .complete_practice(id, PracticeResult::new(4, 3, 120))
                .unwrap();
            assert_eq!(done.status, PracticeStatus::ReviewComplete);
            assert_eq!(done.accuracy_percentage, Some(75.0));
            assert!(done.completed_at.is_some());

            let user = db.get_user(&uid).unwrap().unwrap();
            assert_eq!(user.reviews_completed, 1);
            assert_eq!(user.score, 3);
            assert_eq!(user.total_points, REVIEW_BASE_POINTS + 3 * POINTS_PER_IDENTIFIED);

            let stats = db.category_stats(&uid).unwrap();
            assert_eq!(stats.len(), 1);
            assert_eq!(stats[0].category, "logical");
            assert_eq!(stats[0].encountered, 4);
            assert_eq!(stats[0].identified, 3);

            let history = db.identification_history(&uid, 10).unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].practice_session_id, Some(id));

            let skill = db.get_skill_progress(&uid, "logical").unwrap().unwrap();
            assert_eq!(skill.experience_points, 15 + 7);
            assert_eq!(skill.mastery_percentage, 75.0);
            assert_eq!(skill.total_practice_minutes, 2);

            let usage = db.get_java_error("NULL_POINTER").unwrap().unwrap();
            assert_eq!(usage.usage_count, 1);
            assert_eq!(
                count(&db, "SELECT COUNT(*) FROM error_usage_stats WHERE action_type = 'practiced'"),
                1
            );
        }

        #[test]
        fn oversized_counts_are_rejected_without_side_effects() {
            let db = seeded_db();
            let uid = add_user(&db, "p@example.com");
            let id = ready_practice(&db, &uid);
            let result =
                db.complete_practice(id, PracticeResult::new(i64::MAX / 2, i64::MAX / 2, 1));
            assert!(matches!(result, Err(Error::InvalidData(_))));

            assert_eq!(
                db.get_practice(id).unwrap().unwrap().status,
                PracticeStatus::CodeReady
            );
            let user = db.get_user(&uid).unwrap().unwrap();
            assert_eq!(user.total_points, 0);
            assert_eq!(user.reviews_completed, 0);
            assert!(db.category_stats(&uid).unwrap().is_empty());
        }

        #[test]
        fn terminal_sessions_cannot_move() {
            let db = seeded_db();
            let uid = add_user(&db, "p@example.com");
            let id = ready_practice(&db, &uid);
            db.complete_practice(id, PracticeResult::new(1, 1, 5))
                .unwrap();
            assert!(matches!(
                db.abandon_practice(id),
                Err(Error::InvalidTransition { .. })
            ));
            assert!(matches!(
                db.complete_practice(id, PracticeResult::new(1, 1, 5)),
                Err(Error::InvalidTransition { .. })
            ));
        }

        #[test]
        fn abandon_from_setup_and_code_ready() {
            let db = seeded_db();
            let uid = add_user(&db, "p@example.com");
            let a = db.start_practice(&uid, "RAW_TYPES", None).unwrap();
            let b = ready_practice(&db, &uid);
            db.abandon_practice(a).unwrap();
            db.abandon_practice(b).unwrap();
            for id in [a, b] {
                assert_eq!(
                    db.get_practice(id).unwrap().unwrap().status,
                    PracticeStatus::Abandoned
                );
            }
            assert_eq!(db.list_practice(&uid).unwrap().len(), 2);
        }

        #[test]
        fn missing_practice_is_none() {
            let db = seeded_db();
            assert!(db.get_practice(404).unwrap().is_none());
            assert!(matches!(
                db.mark_code_ready(404, "x"),
                Err(Error::NotFound { .. })
            ));
        }
    }

    mod workflow_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn advance_then_complete() {
            let db = setup_db();
            let uid = add_user(&db, "w@example.com");
            let id = db
                .start_workflow(&uid, None, &["logical".to_string()])
                .unwrap();
            db.advance_workflow(id, WorkflowStep::CodeGeneration).unwrap();
            db.advance_workflow(id, WorkflowStep::Review).unwrap();

            let done = db.complete_workflow(id, 3, 2).unwrap();
            assert_eq!(done.status, WorkflowStatus::Completed);
            assert_eq!(done.current_step, WorkflowStep::Feedback);
            assert_eq!(done.errors_identified, Some(2));
            assert_eq!(done.categories, vec!["logical"]);
            assert!(done.duration_seconds.unwrap() >= 0);
        }

        #[test]
        fn steps_cannot_go_backwards() {
            let db = setup_db();
            let uid = add_user(&db, "w@example.com");
            let id = db.start_workflow(&uid, None, &[]).unwrap();
            db.advance_workflow(id, WorkflowStep::Review).unwrap();
            assert!(matches!(
                db.advance_workflow(id, WorkflowStep::CodeGeneration),
                Err(Error::InvalidTransition { .. })
            ));
        }

        #[test]
        fn finished_workflows_are_terminal() {
            let db = setup_db();
            let uid = add_user(&db, "w@example.com");
            let id = db.start_workflow(&uid, None, &[]).unwrap();
            let abandoned = db.abandon_workflow(id).unwrap();
            assert_eq!(abandoned.status, WorkflowStatus::Abandoned);
            assert_eq!(abandoned.current_step, WorkflowStep::CategorySelection);
            assert!(matches!(
                db.complete_workflow(id, 1, 1),
                Err(Error::InvalidTransition { .. })
            ));
            assert!(matches!(
                db.advance_workflow(id, WorkflowStep::Feedback),
                Err(Error::InvalidTransition { .. })
            ));
        }
    }

    mod identification_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn standalone_identification_updates_stats() {
            let db = seeded_db();
            let uid = add_user(&db, "i@example.com");
            db.record_identification(&NewIdentification::new(&uid, "MISSING_SEMICOLON", true))
                .unwrap();
            db.record_identification(&NewIdentification::new(&uid, "MISSING_SEMICOLON", false))
                .unwrap();
            let stats = db.category_stats(&uid).unwrap();
            assert_eq!(stats[0].category, "syntax");
            assert_eq!(stats[0].encountered, 2);
            assert_eq!(stats[0].identified, 1);
            assert!((stats[0].mastery_level - 0.5).abs() < 1e-9);
        }

        #[test]
        fn unknown_error_is_not_found() {
            let db = seeded_db();
            let uid = add_user(&db, "i@example.com");
            assert!(db
                .record_identification(&NewIdentification::new(&uid, "NOPE", true))
                .is_err());
        }
    }
}
