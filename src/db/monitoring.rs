use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{params, Row};
use tracing::{debug, warn};

use super::{json_value, now_timestamp, sql_timestamp, Database};
use crate::config::MonitoringConfig;
use crate::error::{translate, Error, Result};
use crate::models::{
    Alert, AlertSeverity, BadgeProgressEntry, LearningAchievement, MetricsSnapshot,
    NewAchievement, NewAlert,
};

/// Compare a snapshot against the thresholds.
///
/// No completion rate means no workflows started in the completion window.
/// That case raises no `low_completion_rate` alert; an idle system is not
/// reported as a 0% completion rate.
pub fn check_alerts(snapshot: &MetricsSnapshot, cfg: &MonitoringConfig) -> Vec<NewAlert> {
    let mut alerts = Vec::new();

    if snapshot.error_rate > cfg.high_error_rate {
        alerts.push(NewAlert {
            alert_type: "high_error_rate".to_string(),
            severity: AlertSeverity::Warning,
            message: format!("Error rate is {:.2}%", snapshot.error_rate * 100.0),
            metric_value: Some(snapshot.error_rate),
            threshold: Some(cfg.high_error_rate),
        });
    }

    if snapshot.avg_response_time_secs > cfg.slow_response_time_secs {
        alerts.push(NewAlert {
            alert_type: "slow_response_time".to_string(),
            severity: AlertSeverity::Warning,
            message: format!(
                "Average response time is {:.1}s",
                snapshot.avg_response_time_secs
            ),
            metric_value: Some(snapshot.avg_response_time_secs),
            threshold: Some(cfg.slow_response_time_secs),
        });
    }

    if snapshot.active_sessions > cfg.high_session_count {
        alerts.push(NewAlert {
            alert_type: "high_session_count".to_string(),
            severity: AlertSeverity::Info,
            message: format!("High concurrent sessions: {}", snapshot.active_sessions),
            metric_value: Some(snapshot.active_sessions as f64),
            threshold: Some(cfg.high_session_count as f64),
        });
    }

    if let Some(rate) = snapshot.workflow_completion_rate {
        if rate < cfg.low_completion_rate {
            alerts.push(NewAlert {
                alert_type: "low_completion_rate".to_string(),
                severity: AlertSeverity::Warning,
                message: format!("Low completion rate: {:.1}%", rate * 100.0),
                metric_value: Some(rate),
                threshold: Some(cfg.low_completion_rate),
            });
        }
    }

    alerts
}

fn map_alert(row: &Row) -> rusqlite::Result<Alert> {
    let severity: String = row.get(2)?;
    Ok(Alert {
        id: row.get(0)?,
        alert_type: row.get(1)?,
        severity: AlertSeverity::from_str(&severity).unwrap_or(AlertSeverity::Info),
        message: row.get(3)?,
        metric_value: row.get(4)?,
        threshold: row.get(5)?,
        resolved: row.get(6)?,
        created_at: row.get(7)?,
        resolved_at: row.get(8)?,
    })
}

fn window_cutoff(now: DateTime<Utc>, minutes: i64, key: &str) -> Result<String> {
    TimeDelta::try_minutes(minutes.max(0))
        .and_then(|span| now.checked_sub_signed(span))
        .map(sql_timestamp)
        .ok_or_else(|| {
            Error::Config(format!("monitoring.{} = {} is out of range", key, minutes))
        })
}

impl Database {
    pub fn collect_metrics(&self, cfg: &MonitoringConfig) -> Result<MetricsSnapshot> {
        self.collect_metrics_at(Utc::now(), cfg)
    }

    /// Compute health figures for the windows ending at `now` and store each
    /// figure in system_metrics.
    pub fn collect_metrics_at(
        &self,
        now: DateTime<Utc>,
        cfg: &MonitoringConfig,
    ) -> Result<MetricsSnapshot> {
        let now_ts = sql_timestamp(now);
        let window_start = window_cutoff(now, cfg.window_minutes, "window_minutes")?;
        let completion_start = window_cutoff(
            now,
            cfg.completion_window_minutes,
            "completion_window_minutes",
        )?;

        let tx = self.write_tx()?;

        // Sessions overlapping the window
        let active_sessions: i64 = tx.query_row(
            r#"
            SELECT COUNT(*) FROM user_sessions
            WHERE started_at <= ?1 AND (ended_at IS NULL OR ended_at >= ?2)
            "#,
            params![now_ts, window_start],
            |row| row.get(0),
        )?;

        let (total_interactions, failed): (i64, i64) = tx.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END), 0)
            FROM user_interactions
            WHERE created_at >= ?1 AND created_at <= ?2
            "#,
            params![window_start, now_ts],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let error_rate = if total_interactions > 0 {
            failed as f64 / total_interactions as f64
        } else {
            0.0
        };

        let avg_response_time_secs: f64 = tx.query_row(
            r#"
            SELECT COALESCE(AVG(time_spent_seconds), 0.0)
            FROM user_interactions
            WHERE created_at >= ?1 AND created_at <= ?2 AND time_spent_seconds > 0
            "#,
            params![window_start, now_ts],
            |row| row.get(0),
        )?;

        let (workflows, completed): (i64, i64) = tx.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
            FROM workflow_tracking
            WHERE started_at >= ?1 AND started_at <= ?2
            "#,
            params![completion_start, now_ts],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let workflow_completion_rate = if workflows > 0 {
            Some(completed as f64 / workflows as f64)
        } else {
            None
        };

        let snapshot = MetricsSnapshot {
            collected_at: now_ts.clone(),
            active_sessions,
            total_interactions,
            error_rate,
            avg_response_time_secs,
            workflow_completion_rate,
        };

        let mut figures = vec![
            ("active_sessions", snapshot.active_sessions as f64),
            ("total_interactions", snapshot.total_interactions as f64),
            ("error_rate", snapshot.error_rate),
            ("avg_response_time", snapshot.avg_response_time_secs),
        ];
        if let Some(rate) = snapshot.workflow_completion_rate {
            figures.push(("workflow_completion_rate", rate));
        }
        for (name, value) in figures {
            tx.execute(
                "INSERT INTO system_metrics (metric_name, metric_value, recorded_at) VALUES (?1, ?2, ?3)",
                params![name, value, now_ts],
            )?;
        }
        tx.commit()?;

        debug!(
            active_sessions,
            total_interactions,
            error_rate,
            "collected metrics"
        );
        Ok(snapshot)
    }

    pub fn raise_alert(&self, alert: &NewAlert) -> Result<i64> {
        self.conn
            .execute(
                r#"
                INSERT INTO system_alerts (alert_type, severity, message, metric_value, threshold, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    alert.alert_type,
                    alert.severity.as_str(),
                    alert.message,
                    alert.metric_value,
                    alert.threshold,
                    now_timestamp()
                ],
            )
            .map_err(|e| translate(e, "alert"))?;
        warn!(
            alert_type = %alert.alert_type,
            severity = alert.severity.as_str(),
            "ALERT: {}",
            alert.message
        );
        Ok(self.conn.last_insert_rowid())
    }

    /// Mark an alert resolved. Returns false if it was already resolved.
    pub fn resolve_alert(&self, id: i64) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM system_alerts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(Error::not_found("alert", id));
        }
        let updated = self.conn.execute(
            "UPDATE system_alerts SET resolved = 1, resolved_at = ?1 WHERE id = ?2 AND resolved = 0",
            params![now_timestamp(), id],
        )?;
        Ok(updated > 0)
    }

    pub fn open_alerts(&self) -> Result<Vec<Alert>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, alert_type, severity, message, metric_value, threshold,
                   resolved, created_at, resolved_at
            FROM system_alerts
            WHERE resolved = 0
            ORDER BY created_at DESC, id DESC
            "#,
        )?;
        let alerts = stmt
            .query_map([], map_alert)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(alerts)
    }

    pub fn log_performance(
        &self,
        operation: &str,
        duration_ms: f64,
        success: bool,
        details: Option<&serde_json::Value>,
    ) -> Result<i64> {
        let details = match details {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };
        self.conn.execute(
            r#"
            INSERT INTO system_performance_logs (operation, duration_ms, success, details, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![operation, duration_ms, success, details, now_timestamp()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn log_badge_progress(
        &self,
        uid: &str,
        badge_id: &str,
        current: i64,
        target: i64,
    ) -> Result<BadgeProgressEntry> {
        if target <= 0 || current < 0 {
            return Err(Error::InvalidData(format!(
                "badge progress {}/{} is out of range",
                current, target
            )));
        }
        let percentage = (current as f64 / target as f64 * 100.0).min(100.0);
        let logged_at = now_timestamp();
        self.conn
            .execute(
                r#"
                INSERT INTO badge_progress_logs
                    (user_id, badge_id, current_value, target_value, progress_percentage, logged_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![uid, badge_id, current, target, percentage, logged_at],
            )
            .map_err(|e| translate(e, &format!("progress on {} for user {}", badge_id, uid)))?;
        Ok(BadgeProgressEntry {
            id: self.conn.last_insert_rowid(),
            user_id: uid.to_string(),
            badge_id: badge_id.to_string(),
            current_value: current,
            target_value: target,
            progress_percentage: percentage,
            logged_at,
        })
    }

    pub fn record_learning_achievement(&self, new: &NewAchievement) -> Result<i64> {
        let details = match &new.details {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };
        self.conn
            .execute(
                r#"
                INSERT INTO learning_achievements
                    (user_id, achievement_type, title_en, title_zh, details, points, achieved_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    new.user_id,
                    new.achievement_type,
                    new.title_en,
                    new.title_zh,
                    details,
                    new.points,
                    now_timestamp()
                ],
            )
            .map_err(|e| translate(e, &format!("achievement for user {}", new.user_id)))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn learning_achievements(&self, uid: &str) -> Result<Vec<LearningAchievement>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, achievement_type, title_en, title_zh, details, points, achieved_at
            FROM learning_achievements
            WHERE user_id = ?1
            ORDER BY achieved_at DESC, id DESC
            "#,
        )?;
        let rows = stmt
            .query_map(params![uid], |row| {
                Ok(LearningAchievement {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    achievement_type: row.get(2)?,
                    title_en: row.get(3)?,
                    title_zh: row.get(4)?,
                    details: json_value(row.get(5)?),
                    points: row.get(6)?,
                    achieved_at: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
