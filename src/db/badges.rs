use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::users::apply_activity;
use super::{json_value, now_timestamp, Database};
use crate::error::{constraint_kind, translate, Constraint, Error, Result};
use crate::models::{ActivityKind, Badge, Difficulty, NewActivity, NewBadge, UserBadge};

const BADGE_COLUMNS: &str = r#"
    badge_id, name, description, icon, category, difficulty, points,
    achievement_category, unlock_criteria, rarity, is_active, created_at
"#;

fn map_badge(row: &Row) -> rusqlite::Result<Badge> {
    let difficulty: String = row.get(5)?;
    Ok(Badge {
        badge_id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        category: row.get(4)?,
        difficulty: Difficulty::from_str(&difficulty).unwrap_or(Difficulty::Easy),
        points: row.get(6)?,
        achievement_category: row.get(7)?,
        unlock_criteria: json_value(row.get(8)?),
        rarity: row.get(9)?,
        is_active: row.get(10)?,
        created_at: row.get(11)?,
    })
}

impl Database {
    pub fn add_badge(&self, new: &NewBadge) -> Result<()> {
        let criteria = match &new.unlock_criteria {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };
        self.conn
            .execute(
                r#"
                INSERT INTO badges
                    (badge_id, name, description, icon, category, difficulty, points,
                     achievement_category, unlock_criteria, rarity)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    new.badge_id,
                    new.name,
                    new.description,
                    new.icon,
                    new.category,
                    new.difficulty.as_str(),
                    new.points,
                    new.achievement_category,
                    criteria,
                    new.rarity
                ],
            )
            .map_err(|e| translate(e, &format!("badge {}", new.badge_id)))?;
        Ok(())
    }

    pub fn get_badge(&self, badge_id: &str) -> Result<Option<Badge>> {
        let sql = format!("SELECT {} FROM badges WHERE badge_id = ?1", BADGE_COLUMNS);
        let badge = self
            .conn
            .query_row(&sql, params![badge_id], map_badge)
            .optional()?;
        Ok(badge)
    }

    pub fn list_badges(&self) -> Result<Vec<Badge>> {
        let sql = format!(
            "SELECT {} FROM badges WHERE is_active = 1 ORDER BY points, badge_id",
            BADGE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let badges = stmt
            .query_map([], map_badge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(badges)
    }

    /// Award a badge and credit its points. A badge is held at most once.
    pub fn award_badge(&self, uid: &str, badge_id: &str) -> Result<UserBadge> {
        let tx = self.write_tx()?;
        let badge = tx
            .query_row(
                "SELECT name, points FROM badges WHERE badge_id = ?1",
                params![badge_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        let (name, points) = badge.ok_or_else(|| Error::not_found("badge", badge_id))?;

        let user_exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE uid = ?1",
            params![uid],
            |row| row.get(0),
        )?;
        if !user_exists {
            return Err(Error::not_found("user", uid));
        }

        tx.execute(
            "INSERT INTO user_badges (user_id, badge_id, awarded_at) VALUES (?1, ?2, ?3)",
            params![uid, badge_id, now_timestamp()],
        )
        .map_err(|e| match constraint_kind(&e) {
            Some(Constraint::Unique) => Error::BadgeAlreadyAwarded {
                user_id: uid.to_string(),
                badge_id: badge_id.to_string(),
            },
            _ => translate(e, "user badge"),
        })?;
        let id = tx.last_insert_rowid();

        apply_activity(
            &tx,
            uid,
            &NewActivity::new(ActivityKind::BadgeEarned, points).with_details(
                format!("Earned badge: {}", name),
                format!("獲得徽章：{}", name),
            ),
            Utc::now(),
        )?;

        let awarded = tx.query_row(
            "SELECT id, user_id, badge_id, awarded_at FROM user_badges WHERE id = ?1",
            params![id],
            |row| {
                Ok(UserBadge {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    badge_id: row.get(2)?,
                    awarded_at: row.get(3)?,
                })
            },
        )?;
        tx.commit()?;
        info!(uid, badge_id, points, "awarded badge");
        Ok(awarded)
    }

    pub fn user_badges(&self, uid: &str) -> Result<Vec<(UserBadge, Badge)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT ub.id, ub.user_id, ub.badge_id, ub.awarded_at,
                   b.badge_id, b.name, b.description, b.icon, b.category, b.difficulty, b.points,
                   b.achievement_category, b.unlock_criteria, b.rarity, b.is_active, b.created_at
            FROM user_badges ub
            JOIN badges b ON b.badge_id = ub.badge_id
            WHERE ub.user_id = ?1
            ORDER BY ub.awarded_at, ub.id
            "#,
        )?;
        let rows = stmt
            .query_map(params![uid], |row| {
                let held = UserBadge {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    badge_id: row.get(2)?,
                    awarded_at: row.get(3)?,
                };
                let difficulty: String = row.get(9)?;
                let badge = Badge {
                    badge_id: row.get(4)?,
                    name: row.get(5)?,
                    description: row.get(6)?,
                    icon: row.get(7)?,
                    category: row.get(8)?,
                    difficulty: Difficulty::from_str(&difficulty).unwrap_or(Difficulty::Easy),
                    points: row.get(10)?,
                    achievement_category: row.get(11)?,
                    unlock_criteria: json_value(row.get(12)?),
                    rarity: row.get(13)?,
                    is_active: row.get(14)?,
                    created_at: row.get(15)?,
                };
                Ok((held, badge))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
