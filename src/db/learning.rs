use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::json;
use tracing::debug;

use super::{json_value, parse_sql_timestamp, sql_timestamp, Database};
use crate::error::{translate, Error, Result};
use crate::models::{
    blend_mastery, level_for_xp, skill_profile, HintAnalytics, HintLevelUsage, LearningSession,
    SkillPractice, SkillProgress, SkillUpdate, MAX_HINT_LEVEL,
};

const PROGRESS_COLUMNS: &str = r#"
    user_id, skill_category, current_level, experience_points, mastery_percentage,
    practice_streak, total_practice_minutes, last_practiced
"#;

const SESSION_COLUMNS: &str = r#"
    id, user_id, session_type, started_at, ended_at, duration_minutes,
    activities_completed, performance_score, session_data
"#;

fn map_progress(row: &Row) -> rusqlite::Result<SkillProgress> {
    Ok(SkillProgress {
        user_id: row.get(0)?,
        skill_category: row.get(1)?,
        current_level: row.get(2)?,
        experience_points: row.get(3)?,
        mastery_percentage: row.get(4)?,
        practice_streak: row.get(5)?,
        total_practice_minutes: row.get(6)?,
        last_practiced: row.get(7)?,
    })
}

fn map_learning_session(row: &Row) -> rusqlite::Result<LearningSession> {
    Ok(LearningSession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_type: row.get(2)?,
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        duration_minutes: row.get(5)?,
        activities_completed: row.get(6)?,
        performance_score: row.get(7)?,
        session_data: json_value(row.get(8)?),
    })
}

fn load_progress(conn: &Connection, uid: &str, category: &str) -> Result<Option<SkillProgress>> {
    let sql = format!(
        "SELECT {} FROM learning_progress WHERE user_id = ?1 AND skill_category = ?2",
        PROGRESS_COLUMNS
    );
    let progress = conn
        .query_row(&sql, params![uid, category], map_progress)
        .optional()?;
    Ok(progress)
}

fn load_learning_session(conn: &Connection, id: i64) -> Result<LearningSession> {
    let sql = format!("SELECT {} FROM learning_sessions WHERE id = ?1", SESSION_COLUMNS);
    conn.query_row(&sql, params![id], map_learning_session)
        .optional()?
        .ok_or_else(|| Error::not_found("learning session", id))
}

fn check_hint_level(level: i64) -> Result<()> {
    if (1..=MAX_HINT_LEVEL).contains(&level) {
        Ok(())
    } else {
        Err(Error::InvalidData(format!(
            "hint level must be 1-{}, got {}",
            MAX_HINT_LEVEL, level
        )))
    }
}

/// Fold one practice round into the user's ledger for `category` and log it
/// as a finished `skill_practice` learning session. Callers must hold a
/// write transaction.
pub(crate) fn apply_skill_practice(
    conn: &Connection,
    uid: &str,
    category: &str,
    practice: &SkillPractice,
    at: DateTime<Utc>,
) -> Result<SkillUpdate> {
    let category = category.trim().to_ascii_lowercase();
    if category.is_empty() {
        return Err(Error::InvalidData("skill category is empty".into()));
    }
    let (base_xp, mastery_threshold) = skill_profile(&category);
    let accuracy = practice.accuracy();
    let xp_earned = practice.xp_earned(base_xp);
    let now = sql_timestamp(at);

    let previous = load_progress(conn, uid, &category)?;
    let (xp, mastery, streak, minutes, previous_level) = match &previous {
        Some(p) => {
            let last_day = parse_sql_timestamp(&p.last_practiced).map(|t| t.date_naive());
            (
                p.experience_points.saturating_add(xp_earned),
                blend_mastery(p.mastery_percentage, accuracy),
                Database::next_streak(p.practice_streak, last_day, at.date_naive()),
                p.total_practice_minutes.saturating_add(practice.minutes_spent),
                p.current_level,
            )
        }
        None => (xp_earned, blend_mastery(accuracy, accuracy), 1, practice.minutes_spent, 1),
    };
    let level = level_for_xp(xp);

    conn.execute(
        r#"
        INSERT INTO learning_progress
            (user_id, skill_category, current_level, experience_points, mastery_percentage,
             practice_streak, total_practice_minutes, last_practiced)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(user_id, skill_category) DO UPDATE SET
            current_level = excluded.current_level,
            experience_points = excluded.experience_points,
            mastery_percentage = excluded.mastery_percentage,
            practice_streak = excluded.practice_streak,
            total_practice_minutes = excluded.total_practice_minutes,
            last_practiced = excluded.last_practiced
        "#,
        params![uid, category, level, xp, mastery, streak, minutes, now],
    )
    .map_err(|e| translate(e, &format!("skill progress for user {}", uid)))?;

    let details = json!({
        "skill_category": category,
        "errors_encountered": practice.errors_encountered,
        "errors_identified": practice.errors_identified,
        "accuracy": accuracy,
        "xp_earned": xp_earned,
    });
    conn.execute(
        r#"
        INSERT INTO learning_sessions
            (user_id, session_type, started_at, ended_at, duration_minutes,
             activities_completed, performance_score, session_data)
        VALUES (?1, 'skill_practice', ?2, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            uid,
            now,
            practice.minutes_spent,
            practice.errors_encountered,
            accuracy,
            details.to_string()
        ],
    )?;

    let progress = load_progress(conn, uid, &category)?
        .ok_or_else(|| Error::not_found("skill progress", &category))?;
    debug!(uid, category = %category, xp_earned, level, "updated skill progress");
    Ok(SkillUpdate {
        level_up: level > previous_level,
        mastery_achieved: progress.mastery_percentage >= mastery_threshold,
        xp_earned,
        progress,
    })
}

impl Database {
    pub fn update_skill_progress(
        &self,
        uid: &str,
        category: &str,
        practice: &SkillPractice,
    ) -> Result<SkillUpdate> {
        self.update_skill_progress_at(uid, category, practice, Utc::now())
    }

    pub fn update_skill_progress_at(
        &self,
        uid: &str,
        category: &str,
        practice: &SkillPractice,
        at: DateTime<Utc>,
    ) -> Result<SkillUpdate> {
        let tx = self.write_tx()?;
        let update = apply_skill_practice(&tx, uid, category, practice, at)?;
        tx.commit()?;
        Ok(update)
    }

    /// The user's skill ledger, highest XP first.
    pub fn skill_progress(&self, uid: &str) -> Result<Vec<SkillProgress>> {
        let sql = format!(
            r#"
            SELECT {} FROM learning_progress
            WHERE user_id = ?1
            ORDER BY experience_points DESC, skill_category
            "#,
            PROGRESS_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![uid], map_progress)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_skill_progress(&self, uid: &str, category: &str) -> Result<Option<SkillProgress>> {
        load_progress(&self.conn, uid, &category.trim().to_ascii_lowercase())
    }

    // Learning sessions
    pub fn start_learning_session(&self, uid: &str, session_type: &str) -> Result<i64> {
        let session_type = session_type.trim();
        if session_type.is_empty() {
            return Err(Error::InvalidData("learning session type is empty".into()));
        }
        self.conn
            .execute(
                "INSERT INTO learning_sessions (user_id, session_type, started_at) VALUES (?1, ?2, ?3)",
                params![uid, session_type, sql_timestamp(Utc::now())],
            )
            .map_err(|e| translate(e, &format!("learning session for user {}", uid)))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Close a learning session. A session that already ended is returned
    /// unchanged.
    pub fn end_learning_session(
        &self,
        id: i64,
        activities_completed: i64,
        performance_score: f64,
        session_data: Option<&serde_json::Value>,
    ) -> Result<LearningSession> {
        if activities_completed < 0 {
            return Err(Error::InvalidData(format!(
                "activities completed must be non-negative, got {}",
                activities_completed
            )));
        }
        if !(0.0..=100.0).contains(&performance_score) {
            return Err(Error::InvalidData(format!(
                "performance score must be 0-100, got {}",
                performance_score
            )));
        }

        let tx = self.write_tx()?;
        let session = load_learning_session(&tx, id)?;
        if session.ended_at.is_none() {
            let now = Utc::now();
            let minutes = parse_sql_timestamp(&session.started_at)
                .map(|started| (now - started).num_minutes().max(0))
                .unwrap_or(0);
            tx.execute(
                r#"
                UPDATE learning_sessions
                SET ended_at = ?1, duration_minutes = ?2, activities_completed = ?3,
                    performance_score = ?4, session_data = ?5
                WHERE id = ?6
                "#,
                params![
                    sql_timestamp(now),
                    minutes,
                    activities_completed,
                    performance_score,
                    session_data.map(|v| v.to_string()),
                    id
                ],
            )?;
        }
        let ended = load_learning_session(&tx, id)?;
        tx.commit()?;
        Ok(ended)
    }

    pub fn recent_learning_sessions(
        &self,
        uid: &str,
        limit: usize,
    ) -> Result<Vec<LearningSession>> {
        let sql = format!(
            r#"
            SELECT {} FROM learning_sessions
            WHERE user_id = ?1
            ORDER BY started_at DESC, id DESC
            LIMIT ?2
            "#,
            SESSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![uid, limit as i64], map_learning_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // Hints
    pub fn log_hint_usage(
        &self,
        uid: &str,
        session_id: &str,
        error_type: &str,
        hint_level: i64,
    ) -> Result<i64> {
        check_hint_level(hint_level)?;
        self.conn
            .execute(
                r#"
                INSERT INTO hint_usage (user_id, session_id, error_type, hint_level, used_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![uid, session_id, error_type, hint_level, sql_timestamp(Utc::now())],
            )
            .map_err(|e| translate(e, &format!("hint usage for user {}", uid)))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Rate the most recent matching hint. Returns false when no hint was
    /// shown for that session, error type and level.
    pub fn record_hint_feedback(
        &self,
        uid: &str,
        session_id: &str,
        error_type: &str,
        hint_level: i64,
        helpful: bool,
    ) -> Result<bool> {
        check_hint_level(hint_level)?;
        let changed = self.conn.execute(
            r#"
            UPDATE hint_usage SET helpful = ?5
            WHERE id = (
                SELECT id FROM hint_usage
                WHERE user_id = ?1 AND session_id = ?2 AND error_type = ?3 AND hint_level = ?4
                ORDER BY used_at DESC, id DESC
                LIMIT 1
            )
            "#,
            params![uid, session_id, error_type, hint_level, helpful],
        )?;
        Ok(changed > 0)
    }

    /// Hint usage per error type and level, optionally for one error type.
    pub fn hint_analytics(
        &self,
        uid: &str,
        error_type: Option<&str>,
    ) -> Result<Vec<HintAnalytics>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT error_type, hint_level, COUNT(*), AVG(helpful)
            FROM hint_usage
            WHERE user_id = ?1 AND (?2 IS NULL OR error_type = ?2)
            GROUP BY error_type COLLATE NOCASE, hint_level
            ORDER BY error_type COLLATE NOCASE, hint_level
            "#,
        )?;
        let rows = stmt
            .query_map(params![uid, error_type], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    HintLevelUsage {
                        hint_level: row.get(1)?,
                        usage_count: row.get(2)?,
                        helpfulness: row
                            .get::<_, Option<f64>>(3)?
                            .map(|avg| (avg * 100.0).round() / 100.0),
                    },
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut analytics: Vec<HintAnalytics> = Vec::new();
        for (error_type, usage) in rows {
            match analytics.last_mut() {
                Some(last) if last.error_type.eq_ignore_ascii_case(&error_type) => {
                    last.total_usage += usage.usage_count;
                    last.levels.push(usage);
                }
                _ => analytics.push(HintAnalytics {
                    error_type,
                    total_usage: usage.usage_count,
                    levels: vec![usage],
                }),
            }
        }
        Ok(analytics)
    }
}
