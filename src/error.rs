//! Error types for the store.

use rusqlite::ffi;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("user {user_id} is already enrolled in path {path_id}")]
    AlreadyEnrolled { user_id: String, path_id: i64 },

    #[error("badge {badge_id} already awarded to user {user_id}")]
    BadgeAlreadyAwarded { user_id: String, badge_id: String },

    #[error("duplicate value: {0}")]
    Duplicate(String),

    #[error("missing reference: {0}")]
    MissingReference(String),

    #[error("invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("invalid step: {0}")]
    InvalidStep(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Error::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

/// Which constraint a failed statement tripped over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Unique,
    ForeignKey,
    Check,
    NotNull,
}

/// Classify a sqlite failure by its extended result code.
pub fn constraint_kind(err: &rusqlite::Error) -> Option<Constraint> {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            match e.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    Some(Constraint::Unique)
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Constraint::ForeignKey),
                ffi::SQLITE_CONSTRAINT_CHECK => Some(Constraint::Check),
                ffi::SQLITE_CONSTRAINT_NOTNULL => Some(Constraint::NotNull),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Map generic constraint violations onto domain errors. `what` names the
/// record being written so the message is useful to the caller.
pub fn translate(err: rusqlite::Error, what: &str) -> Error {
    match constraint_kind(&err) {
        Some(Constraint::Unique) => Error::Duplicate(what.to_string()),
        Some(Constraint::ForeignKey) => Error::MissingReference(what.to_string()),
        Some(Constraint::Check) | Some(Constraint::NotNull) => {
            Error::InvalidData(format!("{}: {}", what, err))
        }
        None => Error::Sqlite(err),
    }
}
