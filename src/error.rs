use std::fmt;
use thiserror::Error;

use crate::query::period::Granularity;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Invalid granularity: {0} (expected day, week or month)")]
    InvalidGranularity(String),

    #[error("Invalid window count: {0} (at least one period is required)")]
    InvalidWindowCount(usize),

    #[error("{n} {granularity} periods with a {cutoff_days}-day cutoff reach outside the supported date range")]
    PeriodOutOfRange {
        granularity: Granularity,
        n: usize,
        cutoff_days: u32,
    },

    #[error("Ingest error for {path}: {message}")]
    Ingest { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Repository not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
