//! Storage core for the Java peer review training system.
//!
//! A single SQLite database holds user identity and progress counters, the
//! bilingual Java error catalog, learning paths, practice and workflow
//! tracking, interaction telemetry and operational monitoring. Every write
//! that touches more than one table runs in one transaction.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
