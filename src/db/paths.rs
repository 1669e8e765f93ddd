use rusqlite::{params, Connection, Row};
use tracing::{debug, info};

use super::users::{apply_activity, PATH_COMPLETION_POINTS, PATH_STEP_POINTS};
use super::{json_list, now_timestamp, Database};
use crate::error::{constraint_kind, translate, Constraint, Error, Result};
use crate::models::{
    ActivityKind, EnrolledPath, Enrollment, EnrollmentStatus, LearningPath, NewActivity,
    NewLearningPath, NewPathStep, PathStep, StepContent,
};

const PATH_COLUMNS: &str = r#"
    id, path_name, description_en, description_zh, difficulty_level, estimated_hours,
    prerequisites, skills_learned, path_order, is_active, created_at
"#;

const ENROLLMENT_COLUMNS: &str = r#"
    id, user_id, path_id, status, current_step_id, total_steps, progress_percentage,
    started_at, completed_at, last_accessed
"#;

fn map_path(row: &Row) -> rusqlite::Result<LearningPath> {
    Ok(LearningPath {
        id: row.get(0)?,
        path_name: row.get(1)?,
        description_en: row.get(2)?,
        description_zh: row.get(3)?,
        difficulty_level: row.get(4)?,
        estimated_hours: row.get(5)?,
        prerequisites: json_list(row.get(6)?),
        skills_learned: json_list(row.get(7)?),
        path_order: row.get(8)?,
        is_active: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn map_enrollment(row: &Row) -> rusqlite::Result<Enrollment> {
    let status: String = row.get(3)?;
    Ok(Enrollment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        path_id: row.get(2)?,
        status: EnrollmentStatus::from_str(&status).unwrap_or(EnrollmentStatus::NotStarted),
        current_step_id: row.get(4)?,
        total_steps: row.get(5)?,
        progress_percentage: row.get(6)?,
        started_at: row.get(7)?,
        completed_at: row.get(8)?,
        last_accessed: row.get(9)?,
    })
}

fn load_enrollment(conn: &Connection, uid: &str, path_id: i64) -> Result<Option<Enrollment>> {
    let sql = format!(
        "SELECT {} FROM user_learning_paths WHERE user_id = ?1 AND path_id = ?2",
        ENROLLMENT_COLUMNS
    );
    match conn.query_row(&sql, params![uid, path_id], map_enrollment) {
        Ok(e) => Ok(Some(e)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Step ids of a path in curriculum order
fn ordered_step_ids(conn: &Connection, path_id: i64) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT id FROM learning_path_steps WHERE path_id = ?1 ORDER BY step_order")?;
    let ids = stmt
        .query_map(params![path_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

impl Database {
    pub fn add_learning_path(&self, new: &NewLearningPath) -> Result<i64> {
        self.conn
            .execute(
                r#"
                INSERT INTO learning_paths
                    (id, path_name, description_en, description_zh, difficulty_level,
                     estimated_hours, prerequisites, skills_learned, path_order)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    new.id,
                    new.path_name,
                    new.description_en,
                    new.description_zh,
                    new.difficulty_level,
                    new.estimated_hours,
                    serde_json::to_string(&new.prerequisites)?,
                    serde_json::to_string(&new.skills_learned)?,
                    new.path_order
                ],
            )
            .map_err(|e| translate(e, &format!("learning path {}", new.path_name)))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_learning_paths(&self, active_only: bool) -> Result<Vec<LearningPath>> {
        let sql = format!(
            "SELECT {} FROM learning_paths WHERE (?1 = 0 OR is_active = 1) ORDER BY path_order, id",
            PATH_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let paths = stmt
            .query_map(params![active_only], map_path)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(paths)
    }

    pub fn get_learning_path(&self, id: i64) -> Result<Option<LearningPath>> {
        let sql = format!("SELECT {} FROM learning_paths WHERE id = ?1", PATH_COLUMNS);
        match self.conn.query_row(&sql, params![id], map_path) {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn add_path_step(&self, new: &NewPathStep) -> Result<i64> {
        // Same check the read side applies, so a stored step always loads
        let content =
            StepContent::from_parts(new.content.step_type(), Some(new.content.reference()))?;
        self.conn
            .execute(
                r#"
                INSERT INTO learning_path_steps
                    (path_id, step_order, title, description_md, step_type,
                     content_reference, estimated_time_minutes)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    new.path_id,
                    new.step_order,
                    new.title,
                    new.description_md,
                    content.step_type(),
                    content.reference(),
                    new.estimated_time_minutes
                ],
            )
            .map_err(|e| {
                translate(
                    e,
                    &format!("step {} of learning path {}", new.step_order, new.path_id),
                )
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn path_steps(&self, path_id: i64) -> Result<Vec<PathStep>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, path_id, step_order, title, description_md, step_type,
                   content_reference, estimated_time_minutes
            FROM learning_path_steps
            WHERE path_id = ?1
            ORDER BY step_order
            "#,
        )?;
        let rows = stmt
            .query_map(params![path_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(id, path_id, step_order, title, description_md, step_type, reference, minutes)|
                 -> Result<PathStep> {
                    Ok(PathStep {
                        id,
                        path_id,
                        step_order,
                        title,
                        description_md,
                        content: StepContent::from_parts(&step_type, reference.as_deref())?,
                        estimated_time_minutes: minutes,
                    })
                },
            )
            .collect()
    }

    /// Enroll a user in a path, pointing them at its first step. A path with
    /// no steps is complete on enrollment.
    pub fn enroll_user(&self, uid: &str, path_id: i64) -> Result<Enrollment> {
        let tx = self.write_tx()?;

        let path_exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM learning_paths WHERE id = ?1",
            params![path_id],
            |row| row.get(0),
        )?;
        if !path_exists {
            return Err(Error::not_found("learning path", path_id));
        }
        let user_exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE uid = ?1",
            params![uid],
            |row| row.get(0),
        )?;
        if !user_exists {
            return Err(Error::not_found("user", uid));
        }

        let steps = ordered_step_ids(&tx, path_id)?;
        let now = now_timestamp();
        let (status, current, progress, completed_at) = match steps.first() {
            Some(first) => (EnrollmentStatus::InProgress, Some(*first), 0.0, None),
            None => (EnrollmentStatus::Completed, None, 100.0, Some(now.clone())),
        };

        tx.execute(
            r#"
            INSERT INTO user_learning_paths
                (user_id, path_id, status, current_step_id, total_steps, progress_percentage,
                 started_at, completed_at, last_accessed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?7)
            "#,
            params![
                uid,
                path_id,
                status.as_str(),
                current,
                steps.len() as i64,
                progress,
                now,
                completed_at
            ],
        )
        .map_err(|e| match constraint_kind(&e) {
            Some(Constraint::Unique) => Error::AlreadyEnrolled {
                user_id: uid.to_string(),
                path_id,
            },
            _ => translate(e, "enrollment"),
        })?;

        let enrollment = load_enrollment(&tx, uid, path_id)?
            .ok_or_else(|| Error::not_found("enrollment", path_id))?;
        tx.commit()?;
        info!(uid, path_id, "enrolled user in learning path");
        Ok(enrollment)
    }

    pub fn get_enrollment(&self, uid: &str, path_id: i64) -> Result<Option<Enrollment>> {
        load_enrollment(&self.conn, uid, path_id)
    }

    pub fn enrolled_paths(&self, uid: &str) -> Result<Vec<EnrolledPath>> {
        let sql = format!(
            "SELECT {} FROM user_learning_paths WHERE user_id = ?1 ORDER BY started_at, id",
            ENROLLMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let enrollments = stmt
            .query_map(params![uid], map_enrollment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut result = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            if let Some(path) = self.get_learning_path(enrollment.path_id)? {
                result.push(EnrolledPath { path, enrollment });
            }
        }
        Ok(result)
    }

    /// Mark the current step done and move the pointer forward. Only the
    /// current step may be completed; finishing the last one completes the path.
    pub fn complete_step(&self, uid: &str, path_id: i64, step_id: i64) -> Result<Enrollment> {
        let tx = self.write_tx()?;

        let enrollment = load_enrollment(&tx, uid, path_id)?.ok_or_else(|| {
            Error::not_found("enrollment", format!("user {} path {}", uid, path_id))
        })?;
        let steps = ordered_step_ids(&tx, path_id)?;
        let index = steps.iter().position(|id| *id == step_id).ok_or_else(|| {
            Error::InvalidStep(format!(
                "step {} does not belong to path {}",
                step_id, path_id
            ))
        })?;
        let is_last = index + 1 == steps.len();

        if enrollment.is_complete() {
            if is_last {
                return Ok(enrollment);
            }
            return Err(Error::InvalidStep(format!(
                "path {} is already completed",
                path_id
            )));
        }
        if enrollment.current_step_id != Some(step_id) {
            return Err(Error::InvalidStep(format!(
                "step {} is not the current step",
                step_id
            )));
        }

        let now = now_timestamp();
        tx.execute(
            r#"
            INSERT OR IGNORE INTO learning_path_progress (user_id, path_id, step_id, completed_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![uid, path_id, step_id, now],
        )?;

        let progress = (index + 1) as f64 / steps.len() as f64 * 100.0;
        let (status, next_step, completed_at) = if is_last {
            (EnrollmentStatus::Completed, None, Some(now.clone()))
        } else {
            (EnrollmentStatus::InProgress, Some(steps[index + 1]), None)
        };

        tx.execute(
            r#"
            UPDATE user_learning_paths
            SET status = ?1, current_step_id = ?2, progress_percentage = ?3,
                completed_at = COALESCE(?4, completed_at), last_accessed = ?5
            WHERE id = ?6
            "#,
            params![
                status.as_str(),
                next_step,
                progress,
                completed_at,
                now,
                enrollment.id
            ],
        )?;

        apply_activity(
            &tx,
            uid,
            &NewActivity::new(ActivityKind::PathStepCompleted, PATH_STEP_POINTS)
                .with_details(
                    format!("Completed step {} of path {}", index + 1, path_id),
                    format!("完成學習路徑 {} 的第 {} 步", path_id, index + 1),
                ),
            chrono::Utc::now(),
        )?;
        if is_last {
            apply_activity(
                &tx,
                uid,
                &NewActivity::new(ActivityKind::PathCompleted, PATH_COMPLETION_POINTS)
                    .with_details(
                        format!("Completed learning path {}", path_id),
                        format!("完成學習路徑 {}", path_id),
                    ),
                chrono::Utc::now(),
            )?;
        }

        let updated = load_enrollment(&tx, uid, path_id)?
            .ok_or_else(|| Error::not_found("enrollment", path_id))?;
        tx.commit()?;
        debug!(uid, path_id, step_id, progress, "completed path step");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn empty_path(db: &Database) -> i64 {
        db.add_learning_path(&NewLearningPath::new("Empty", "Beginner", 1))
            .unwrap()
    }

    mod path_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn add_and_get_path_with_cjk() {
            let db = setup_db();
            let id = db
                .add_learning_path(
                    &NewLearningPath::new("Generics", "Intermediate", 2)
                        .with_descriptions("Generic types", "泛型型別與萬用字元"),
                )
                .unwrap();
            let path = db.get_learning_path(id).unwrap().unwrap();
            assert_eq!(path.description_zh.as_deref(), Some("泛型型別與萬用字元"));
            assert!(path.is_active);
        }

        #[test]
        fn step_with_unknown_path_violates_foreign_key() {
            let db = setup_db();
            let result = db.add_path_step(&NewPathStep::new(
                99,
                1,
                "Orphan",
                StepContent::Quiz {
                    quiz_id: "q".into(),
                },
            ));
            assert!(matches!(result, Err(Error::MissingReference(_))));
        }

        #[test]
        fn duplicate_step_order_rejected() {
            let db = seeded_db();
            let result = db.add_path_step(&NewPathStep::new(
                1,
                2,
                "Clash",
                StepContent::Tutorial {
                    topic: "x".into(),
                },
            ));
            assert!(matches!(result, Err(Error::Duplicate(_))));
        }

        #[test]
        fn blank_reference_is_rejected_and_path_stays_readable() {
            let db = seeded_db();
            let before = db.path_steps(1).unwrap().len();
            for topic in ["", "   "] {
                let result = db.add_path_step(&NewPathStep::new(
                    1,
                    10,
                    "Empty",
                    StepContent::Tutorial {
                        topic: topic.into(),
                    },
                ));
                assert!(matches!(result, Err(Error::InvalidData(_))));
            }
            assert_eq!(db.path_steps(1).unwrap().len(), before);
        }

        #[test]
        fn reference_is_stored_trimmed() {
            let db = seeded_db();
            db.add_path_step(&NewPathStep::new(
                1,
                10,
                "Padded",
                StepContent::Quiz {
                    quiz_id: "  quiz_generics ".into(),
                },
            ))
            .unwrap();
            let steps = db.path_steps(1).unwrap();
            let last = steps.last().unwrap();
            assert_eq!(
                last.content,
                StepContent::Quiz {
                    quiz_id: "quiz_generics".into()
                }
            );
        }

        #[test]
        fn steps_decode_tagged_content() {
            let db = seeded_db();
            let steps = db.path_steps(1).unwrap();
            assert_eq!(
                steps[2].content,
                StepContent::Practice {
                    error_code: "NULL_POINTER".into()
                }
            );
        }

        #[test]
        fn corrupt_step_type_is_invalid_data() {
            let db = seeded_db();
            db.conn
                .execute(
                    "UPDATE learning_path_steps SET step_type = 'hologram' WHERE path_id = 2 AND step_order = 1",
                    [],
                )
                .unwrap();
            assert!(matches!(db.path_steps(2), Err(Error::InvalidData(_))));
        }
    }

    mod enrollment_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn enroll_points_at_first_step() {
            let db = seeded_db();
            let uid = add_user(&db, "e@example.com");
            let enrollment = db.enroll_user(&uid, 1).unwrap();
            let first = db.path_steps(1).unwrap()[0].id;

            assert_eq!(enrollment.status, EnrollmentStatus::InProgress);
            assert_eq!(enrollment.current_step_id, Some(first));
            assert_eq!(enrollment.total_steps, 4);
            assert_eq!(enrollment.progress_percentage, 0.0);
        }

        #[test]
        fn second_enrollment_is_already_enrolled() {
            let db = seeded_db();
            let uid = add_user(&db, "twice@example.com");
            db.enroll_user(&uid, 1).unwrap();
            let result = db.enroll_user(&uid, 1);
            assert!(matches!(
                result,
                Err(Error::AlreadyEnrolled { path_id: 1, .. })
            ));
            assert_eq!(count(&db, "SELECT COUNT(*) FROM user_learning_paths"), 1);
        }

        #[test]
        fn empty_path_completes_immediately() {
            let db = setup_db();
            let uid = add_user(&db, "empty@example.com");
            let path_id = empty_path(&db);
            let enrollment = db.enroll_user(&uid, path_id).unwrap();
            assert!(enrollment.is_complete());
            assert_eq!(enrollment.progress_percentage, 100.0);
            assert!(enrollment.current_step_id.is_none());
        }

        #[test]
        fn unknown_path_or_user_is_not_found() {
            let db = seeded_db();
            let uid = add_user(&db, "nf@example.com");
            assert!(matches!(
                db.enroll_user(&uid, 42),
                Err(Error::NotFound { entity: "learning path", .. })
            ));
            assert!(matches!(
                db.enroll_user("ghost", 1),
                Err(Error::NotFound { entity: "user", .. })
            ));
        }

        #[test]
        fn enrolled_paths_lists_path_with_enrollment() {
            let db = seeded_db();
            let uid = add_user(&db, "list@example.com");
            db.enroll_user(&uid, 2).unwrap();
            let paths = db.enrolled_paths(&uid).unwrap();
            assert_eq!(paths.len(), 1);
            assert_eq!(paths[0].path.path_name, "Java String Handling Essentials");
            assert_eq!(paths[0].enrollment.total_steps, 3);
        }
    }

    mod progress_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn walking_all_steps_completes_path() {
            let db = seeded_db();
            let uid = add_user(&db, "walk@example.com");
            db.enroll_user(&uid, 2).unwrap();
            let steps = db.path_steps(2).unwrap();

            let after_first = db.complete_step(&uid, 2, steps[0].id).unwrap();
            assert_eq!(after_first.current_step_id, Some(steps[1].id));
            assert!((after_first.progress_percentage - 100.0 / 3.0).abs() < 1e-9);

            db.complete_step(&uid, 2, steps[1].id).unwrap();
            let done = db.complete_step(&uid, 2, steps[2].id).unwrap();
            assert_eq!(done.status, EnrollmentStatus::Completed);
            assert_eq!(done.progress_percentage, 100.0);
            assert!(done.current_step_id.is_none());
            assert!(done.completed_at.is_some());

            let user = db.get_user(&uid).unwrap().unwrap();
            assert_eq!(
                user.total_points,
                3 * PATH_STEP_POINTS + PATH_COMPLETION_POINTS
            );
            assert_eq!(
                count(&db, "SELECT COUNT(*) FROM learning_path_progress"),
                3
            );
        }

        #[test]
        fn only_current_step_can_be_completed() {
            let db = seeded_db();
            let uid = add_user(&db, "skip@example.com");
            db.enroll_user(&uid, 1).unwrap();
            let steps = db.path_steps(1).unwrap();
            let result = db.complete_step(&uid, 1, steps[2].id);
            assert!(matches!(result, Err(Error::InvalidStep(_))));
        }

        #[test]
        fn step_from_another_path_is_rejected() {
            let db = seeded_db();
            let uid = add_user(&db, "other@example.com");
            db.enroll_user(&uid, 1).unwrap();
            let foreign = db.path_steps(2).unwrap()[0].id;
            let result = db.complete_step(&uid, 1, foreign);
            assert!(matches!(result, Err(Error::InvalidStep(_))));
        }

        #[test]
        fn recompleting_final_step_is_a_no_op() {
            let db = seeded_db();
            let uid = add_user(&db, "again@example.com");
            db.enroll_user(&uid, 2).unwrap();
            let steps = db.path_steps(2).unwrap();
            for step in &steps {
                db.complete_step(&uid, 2, step.id).unwrap();
            }
            let points = db.get_user(&uid).unwrap().unwrap().total_points;

            let again = db.complete_step(&uid, 2, steps[2].id).unwrap();
            assert!(again.is_complete());
            assert_eq!(db.get_user(&uid).unwrap().unwrap().total_points, points);
        }

        #[test]
        fn completing_without_enrollment_is_not_found() {
            let db = seeded_db();
            let uid = add_user(&db, "noenroll@example.com");
            let step = db.path_steps(1).unwrap()[0].id;
            assert!(matches!(
                db.complete_step(&uid, 1, step),
                Err(Error::NotFound { .. })
            ));
        }
    }
}
