use chrono::{TimeDelta, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{BadgeProgressSummary, DailyActivity, UserPerformanceSummary};

const SUMMARY_COLUMNS: &str = r#"
    uid, email, display_name_en, total_points, reviews_completed, consecutive_days,
    practice_sessions, completed_practices, avg_accuracy, badges_earned, paths_completed
"#;

fn map_summary(row: &Row) -> rusqlite::Result<UserPerformanceSummary> {
    Ok(UserPerformanceSummary {
        uid: row.get(0)?,
        email: row.get(1)?,
        display_name_en: row.get(2)?,
        total_points: row.get(3)?,
        reviews_completed: row.get(4)?,
        consecutive_days: row.get(5)?,
        practice_sessions: row.get(6)?,
        completed_practices: row.get(7)?,
        avg_accuracy: row.get(8)?,
        badges_earned: row.get(9)?,
        paths_completed: row.get(10)?,
    })
}

impl Database {
    pub fn user_performance_summary(&self, uid: &str) -> Result<Option<UserPerformanceSummary>> {
        let sql = format!(
            "SELECT {} FROM user_performance_summary WHERE uid = ?1",
            SUMMARY_COLUMNS
        );
        let summary = self
            .conn
            .query_row(&sql, params![uid], map_summary)
            .optional()?;
        Ok(summary)
    }

    pub fn performance_summaries(&self) -> Result<Vec<UserPerformanceSummary>> {
        let sql = format!(
            "SELECT {} FROM user_performance_summary ORDER BY total_points DESC, uid",
            SUMMARY_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Activity per day for the last `days` days, today included, newest first.
    pub fn daily_activity_summary(&self, days: i64) -> Result<Vec<DailyActivity>> {
        if days <= 0 {
            return Err(Error::InvalidData(format!(
                "day range must be positive, got {}",
                days
            )));
        }
        let since = TimeDelta::try_days(days - 1)
            .and_then(|span| Utc::now().date_naive().checked_sub_signed(span))
            .ok_or_else(|| Error::InvalidData(format!("day range {} is out of range", days)))?
            .format("%Y-%m-%d")
            .to_string();
        let mut stmt = self.conn.prepare(
            r#"
            SELECT activity_date, active_users, activities, points_awarded
            FROM daily_activity_summary
            WHERE activity_date >= ?1
            ORDER BY activity_date DESC
            "#,
        )?;
        let rows = stmt
            .query_map(params![since], |row| {
                Ok(DailyActivity {
                    activity_date: row.get(0)?,
                    active_users: row.get(1)?,
                    activities: row.get(2)?,
                    points_awarded: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn badge_progress_summary(&self) -> Result<Vec<BadgeProgressSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT badge_id, name, rarity, times_awarded, award_rate
            FROM badge_progress_summary
            ORDER BY times_awarded DESC, badge_id
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(BadgeProgressSummary {
                    badge_id: row.get(0)?,
                    name: row.get(1)?,
                    rarity: row.get(2)?,
                    times_awarded: row.get(3)?,
                    award_rate: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
