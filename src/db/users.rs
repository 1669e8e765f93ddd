use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use tracing::debug;
use uuid::Uuid;

use super::{now_timestamp, sql_timestamp, Database};
use crate::error::{translate, Error, Result};
use crate::models::{ActivityEntry, ActivityKind, CategoryStats, NewActivity, NewUser, User};

/// Points for a completed review before per-error bonuses.
pub const REVIEW_BASE_POINTS: i64 = 10;
pub const PATH_STEP_POINTS: i64 = 5;
pub const PATH_COMPLETION_POINTS: i64 = 50;

const USER_COLUMNS: &str = r#"
    uid, email, display_name_en, display_name_zh, level_name_en, level_name_zh,
    created_at, reviews_completed, score, total_points, consecutive_days, last_activity
"#;

fn map_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        uid: row.get(0)?,
        email: row.get(1)?,
        display_name_en: row.get(2)?,
        display_name_zh: row.get(3)?,
        level_name_en: row.get(4)?,
        level_name_zh: row.get(5)?,
        created_at: row.get(6)?,
        reviews_completed: row.get(7)?,
        score: row.get(8)?,
        total_points: row.get(9)?,
        consecutive_days: row.get(10)?,
        last_activity: row.get(11)?,
    })
}

fn map_category_stats(row: &Row) -> rusqlite::Result<CategoryStats> {
    Ok(CategoryStats {
        user_id: row.get(0)?,
        category: row.get(1)?,
        encountered: row.get(2)?,
        identified: row.get(3)?,
        mastery_level: row.get(4)?,
        last_updated: row.get(5)?,
    })
}

impl Database {
    pub fn create_user(&self, new: &NewUser) -> Result<String> {
        let uid = new
            .uid
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if uid.is_empty() || uid.chars().count() > 36 {
            return Err(Error::InvalidData(format!(
                "user id must be 1-36 characters: {}",
                uid
            )));
        }

        self.conn
            .execute(
                r#"
                INSERT INTO users (uid, email, display_name_en, display_name_zh, password, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    uid,
                    new.email.trim(),
                    new.display_name_en,
                    new.display_name_zh,
                    new.password_hash,
                    now_timestamp()
                ],
            )
            .map_err(|e| translate(e, &format!("user {}", new.email)))?;

        debug!(uid = %uid, "created user");
        Ok(uid)
    }

    pub fn get_user(&self, uid: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE uid = ?1", USER_COLUMNS);
        match self.conn.query_row(&sql, params![uid], map_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Email lookup ignores case.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        match self.conn.query_row(&sql, params![email.trim()], map_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a user and, through cascades, everything they own.
    pub fn delete_user(&self, uid: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM users WHERE uid = ?1", params![uid])?;
        if rows > 0 {
            debug!(uid, "deleted user");
        }
        Ok(rows > 0)
    }

    pub fn leaderboard(&self, limit: usize) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY total_points DESC, reviews_completed DESC, email ASC LIMIT ?1",
            USER_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let users = stmt
            .query_map(params![limit as i64], map_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn record_activity(&self, uid: &str, activity: &NewActivity) -> Result<i64> {
        self.record_activity_at(uid, activity, Utc::now())
    }

    /// Log an activity and fold it into the user's counters under one write
    /// lock. Every counter change goes through here.
    pub fn record_activity_at(
        &self,
        uid: &str,
        activity: &NewActivity,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let tx = self.write_tx()?;
        let id = apply_activity(&tx, uid, activity, at)?;
        tx.commit()?;
        Ok(id)
    }

    pub fn recent_activity(&self, uid: &str, limit: usize) -> Result<Vec<ActivityEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, activity_type, points, details_en, details_zh, created_at
            FROM activity_log
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )?;
        let entries = stmt
            .query_map(params![uid, limit as i64], |row| {
                let kind: String = row.get(2)?;
                Ok(ActivityEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    activity_type: ActivityKind::from_str(&kind),
                    points: row.get(3)?,
                    details_en: row.get(4)?,
                    details_zh: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Add encounters and identifications for one category.
    pub fn update_category_stats(
        &self,
        uid: &str,
        category: &str,
        encountered: i64,
        identified: i64,
    ) -> Result<CategoryStats> {
        let tx = self.write_tx()?;
        bump_category_stats(&tx, uid, category, encountered, identified)?;
        let stats = tx.query_row(
            r#"
            SELECT user_id, category, encountered, identified, mastery_level, last_updated
            FROM error_category_stats WHERE user_id = ?1 AND category = ?2
            "#,
            params![uid, category],
            map_category_stats,
        )?;
        tx.commit()?;
        Ok(stats)
    }

    pub fn category_stats(&self, uid: &str) -> Result<Vec<CategoryStats>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, category, encountered, identified, mastery_level, last_updated
            FROM error_category_stats
            WHERE user_id = ?1
            ORDER BY category
            "#,
        )?;
        let stats = stmt
            .query_map(params![uid], map_category_stats)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats)
    }

    // Streak after activity on `today`, given the previous active day
    pub(crate) fn next_streak(current: i64, last: Option<NaiveDate>, today: NaiveDate) -> i64 {
        match last {
            None => 1,
            Some(day) if day == today => current.max(1),
            Some(day) if day > today => current,
            Some(day) if day.succ_opt() == Some(today) => current + 1,
            Some(_) => 1,
        }
    }
}

/// Insert the activity_log row and apply its effect on the user's counters.
/// Callers must hold a write transaction.
pub(crate) fn apply_activity(
    conn: &Connection,
    uid: &str,
    activity: &NewActivity,
    at: DateTime<Utc>,
) -> Result<i64> {
    let current = conn.query_row(
        "SELECT consecutive_days, last_activity FROM users WHERE uid = ?1",
        params![uid],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
    );
    let (streak, last_activity) = match current {
        Ok(v) => v,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Err(Error::not_found("user", uid)),
        Err(e) => return Err(e.into()),
    };

    let today = at.date_naive();
    let last_day = last_activity
        .as_deref()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
    let new_streak = Database::next_streak(streak, last_day, today);
    // last_activity never moves backwards
    let new_last = match last_day {
        Some(day) if day > today => day,
        _ => today,
    };

    conn.execute(
        r#"
        INSERT INTO activity_log (user_id, activity_type, points, details_en, details_zh, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            uid,
            activity.kind.as_str(),
            activity.points,
            activity.details_en,
            activity.details_zh,
            sql_timestamp(at)
        ],
    )?;
    let id = conn.last_insert_rowid();

    conn.execute(
        r#"
        UPDATE users
        SET reviews_completed = reviews_completed + ?1,
            score = score + ?2,
            total_points = MAX(0, total_points + ?3),
            consecutive_days = ?4,
            last_activity = ?5
        WHERE uid = ?6
        "#,
        params![
            activity.kind.counts_as_review() as i64,
            activity.score_delta,
            activity.points,
            new_streak,
            new_last.format("%Y-%m-%d").to_string(),
            uid
        ],
    )?;

    debug!(uid, kind = activity.kind.as_str(), points = activity.points, "recorded activity");
    Ok(id)
}

/// Upsert per-category counters and recompute mastery as identified/encountered.
pub(crate) fn bump_category_stats(
    conn: &Connection,
    uid: &str,
    category: &str,
    encountered: i64,
    identified: i64,
) -> Result<()> {
    if encountered < 0 || identified < 0 {
        return Err(Error::InvalidData(
            "category counters cannot decrease".to_string(),
        ));
    }
    conn.execute(
        r#"
        INSERT INTO error_category_stats (user_id, category, encountered, identified, mastery_level, last_updated)
        VALUES (?1, ?2, ?3, ?4, 0, ?5)
        ON CONFLICT (user_id, category) DO UPDATE SET
            encountered = encountered + excluded.encountered,
            identified = identified + excluded.identified,
            last_updated = excluded.last_updated
        "#,
        params![uid, category, encountered, identified, now_timestamp()],
    )
    .map_err(|e| translate(e, &format!("category stats for user {}", uid)))?;

    conn.execute(
        r#"
        UPDATE error_category_stats
        SET mastery_level = CASE
            WHEN encountered <= 0 THEN 0.0
            ELSE MIN(1.0, MAX(0.0, CAST(identified AS REAL) / encountered))
        END
        WHERE user_id = ?1 AND category = ?2
        "#,
        params![uid, category],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    mod user_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn create_generates_uuid() {
            let db = setup_db();
            let uid = add_user(&db, "ann@example.com");
            assert_eq!(uid.len(), 36);

            let user = db.get_user(&uid).unwrap().unwrap();
            assert_eq!(user.email, "ann@example.com");
            assert_eq!(user.level_name_en, "Basic");
            assert_eq!(user.level_name_zh, "基礎");
            assert_eq!(user.total_points, 0);
            assert!(user.last_activity.is_none());
        }

        #[test]
        fn create_with_explicit_uid() {
            let db = setup_db();
            let uid = db
                .create_user(&NewUser::new("b@example.com").with_uid("user-1"))
                .unwrap();
            assert_eq!(uid, "user-1");
        }

        #[test]
        fn uid_longer_than_36_is_rejected() {
            let db = setup_db();
            let result = db.create_user(&NewUser::new("c@example.com").with_uid("x".repeat(37)));
            assert!(matches!(result, Err(Error::InvalidData(_))));
        }

        #[test]
        fn duplicate_email_ignores_case() {
            let db = setup_db();
            add_user(&db, "dup@example.com");
            let result = db.create_user(&NewUser::new("DUP@Example.com"));
            assert!(matches!(result, Err(Error::Duplicate(_))));
        }

        #[test]
        fn lookup_by_email_ignores_case() {
            let db = setup_db();
            let uid = add_user(&db, "Case@Example.com");
            let user = db.get_user_by_email("case@example.COM").unwrap().unwrap();
            assert_eq!(user.uid, uid);
        }

        #[test]
        fn cjk_display_names_round_trip() {
            let db = setup_db();
            let uid = db
                .create_user(&NewUser::new("zh@example.com").with_names("Mei", "美玲 🌸"))
                .unwrap();
            let user = db.get_user(&uid).unwrap().unwrap();
            assert_eq!(user.display_name_zh.as_deref(), Some("美玲 🌸"));
        }

        #[test]
        fn get_missing_user_is_none() {
            let db = setup_db();
            assert!(db.get_user("nobody").unwrap().is_none());
            assert!(!db.delete_user("nobody").unwrap());
        }

        #[test]
        fn leaderboard_orders_by_points() {
            let db = setup_db();
            let low = add_user(&db, "low@example.com");
            let high = add_user(&db, "high@example.com");
            db.record_activity(&low, &NewActivity::new(ActivityKind::DailyLogin, 5))
                .unwrap();
            db.record_activity(&high, &NewActivity::new(ActivityKind::DailyLogin, 50))
                .unwrap();

            let board = db.leaderboard(10).unwrap();
            let order: Vec<&str> = board.iter().map(|u| u.uid.as_str()).collect();
            assert_eq!(order, vec![high.as_str(), low.as_str()]);
            assert_eq!(db.leaderboard(1).unwrap().len(), 1);
        }
    }

    mod activity_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn review_updates_all_counters_with_log_row() {
            let db = setup_db();
            let uid = add_user(&db, "r@example.com");
            db.record_activity_at(
                &uid,
                &NewActivity::new(ActivityKind::ReviewCompleted, 20).with_score(2),
                day(2024, 5, 1),
            )
            .unwrap();

            let user = db.get_user(&uid).unwrap().unwrap();
            assert_eq!(user.reviews_completed, 1);
            assert_eq!(user.score, 2);
            assert_eq!(user.total_points, 20);
            assert_eq!(user.consecutive_days, 1);
            assert_eq!(user.last_activity.as_deref(), Some("2024-05-01"));

            let log = db.recent_activity(&uid, 10).unwrap();
            assert_eq!(log.len(), 1);
            assert_eq!(log[0].activity_type, ActivityKind::ReviewCompleted);
            assert_eq!(log[0].points, 20);
        }

        #[test]
        fn counters_match_log_after_many_activities() {
            let db = setup_db();
            let uid = add_user(&db, "sum@example.com");
            for points in [5, 10, 15] {
                db.record_activity(&uid, &NewActivity::new(ActivityKind::ReviewCompleted, points))
                    .unwrap();
            }
            let logged = count(
                &db,
                &format!(
                    "SELECT SUM(points) FROM activity_log WHERE user_id = '{}'",
                    uid
                ),
            );
            let user = db.get_user(&uid).unwrap().unwrap();
            assert_eq!(user.total_points, logged);
            assert_eq!(user.reviews_completed, 3);
        }

        #[test]
        fn non_review_activity_does_not_count_as_review() {
            let db = setup_db();
            let uid = add_user(&db, "nr@example.com");
            db.record_activity(&uid, &NewActivity::new(ActivityKind::BadgeEarned, 10))
                .unwrap();
            let user = db.get_user(&uid).unwrap().unwrap();
            assert_eq!(user.reviews_completed, 0);
            assert_eq!(user.total_points, 10);
        }

        #[test]
        fn total_points_never_go_negative() {
            let db = setup_db();
            let uid = add_user(&db, "neg@example.com");
            db.record_activity(&uid, &NewActivity::new(ActivityKind::DailyLogin, 5))
                .unwrap();
            db.record_activity(
                &uid,
                &NewActivity::new(ActivityKind::Other("penalty".into()), -20),
            )
            .unwrap();
            let user = db.get_user(&uid).unwrap().unwrap();
            assert_eq!(user.total_points, 0);
        }

        #[test]
        fn unknown_user_is_not_found_and_logs_nothing() {
            let db = setup_db();
            let result =
                db.record_activity("ghost", &NewActivity::new(ActivityKind::DailyLogin, 1));
            assert!(matches!(result, Err(Error::NotFound { entity: "user", .. })));
            assert_eq!(count(&db, "SELECT COUNT(*) FROM activity_log"), 0);
        }

        #[test]
        fn streak_grows_on_consecutive_days_and_resets_after_gap() {
            let db = setup_db();
            let uid = add_user(&db, "streak@example.com");
            let login = NewActivity::new(ActivityKind::DailyLogin, 1);

            db.record_activity_at(&uid, &login, day(2024, 1, 1)).unwrap();
            db.record_activity_at(&uid, &login, day(2024, 1, 1)).unwrap();
            assert_eq!(db.get_user(&uid).unwrap().unwrap().consecutive_days, 1);

            db.record_activity_at(&uid, &login, day(2024, 1, 2)).unwrap();
            db.record_activity_at(&uid, &login, day(2024, 1, 3)).unwrap();
            assert_eq!(db.get_user(&uid).unwrap().unwrap().consecutive_days, 3);

            db.record_activity_at(&uid, &login, day(2024, 1, 10)).unwrap();
            assert_eq!(db.get_user(&uid).unwrap().unwrap().consecutive_days, 1);
        }

        #[test]
        fn last_activity_is_monotonic() {
            let db = setup_db();
            let uid = add_user(&db, "mono@example.com");
            let login = NewActivity::new(ActivityKind::DailyLogin, 1);
            db.record_activity_at(&uid, &login, day(2024, 2, 10)).unwrap();
            db.record_activity_at(&uid, &login, day(2024, 2, 1)).unwrap();

            let user = db.get_user(&uid).unwrap().unwrap();
            assert_eq!(user.last_activity.as_deref(), Some("2024-02-10"));
            assert_eq!(user.consecutive_days, 1);
            assert_eq!(user.total_points, 2);
        }

        #[test]
        fn next_streak_rules() {
            let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
            assert_eq!(Database::next_streak(0, None, d(5)), 1);
            assert_eq!(Database::next_streak(4, Some(d(5)), d(5)), 4);
            assert_eq!(Database::next_streak(4, Some(d(4)), d(5)), 5);
            assert_eq!(Database::next_streak(4, Some(d(2)), d(5)), 1);
            assert_eq!(Database::next_streak(4, Some(d(9)), d(5)), 4);
        }

        #[test]
        fn streak_crosses_month_boundary() {
            let a = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
            let b = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
            assert_eq!(Database::next_streak(2, Some(a), b), 3);
        }
    }

    mod category_stats_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn mastery_is_identified_over_encountered() {
            let db = setup_db();
            let uid = add_user(&db, "m@example.com");
            db.update_category_stats(&uid, "logical", 4, 1).unwrap();
            let stats = db.update_category_stats(&uid, "logical", 4, 5).unwrap();
            assert_eq!(stats.encountered, 8);
            assert_eq!(stats.identified, 6);
            assert!((stats.mastery_level - 0.75).abs() < 1e-9);
        }

        #[test]
        fn mastery_is_clamped_to_one() {
            let db = setup_db();
            let uid = add_user(&db, "clamp@example.com");
            let stats = db.update_category_stats(&uid, "syntax", 1, 3).unwrap();
            assert_eq!(stats.mastery_level, 1.0);
        }

        #[test]
        fn zero_encounters_means_zero_mastery() {
            let db = setup_db();
            let uid = add_user(&db, "zero@example.com");
            let stats = db.update_category_stats(&uid, "syntax", 0, 0).unwrap();
            assert_eq!(stats.mastery_level, 0.0);
        }

        #[test]
        fn one_row_per_user_and_category() {
            let db = setup_db();
            let uid = add_user(&db, "one@example.com");
            db.update_category_stats(&uid, "logical", 1, 1).unwrap();
            db.update_category_stats(&uid, "LOGICAL", 1, 0).unwrap();
            db.update_category_stats(&uid, "syntax", 1, 0).unwrap();
            let all = db.category_stats(&uid).unwrap();
            assert_eq!(all.len(), 2);
        }

        #[test]
        fn negative_counts_rejected() {
            let db = setup_db();
            let uid = add_user(&db, "n@example.com");
            assert!(db.update_category_stats(&uid, "logical", -1, 0).is_err());
        }
    }
}
