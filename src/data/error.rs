use crate::data::mapping::SqlType;
use thiserror::Error;

pub type DataResult<T> = Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Column `{column}` expected {expected:?} but got {found}")]
    Mapping {
        column: &'static str,
        expected: SqlType,
        found: &'static str,
    },
    #[error("Entity `{0}` declares no insertable columns")]
    NoInsertableColumns(&'static str),
    #[error("Database connection lock poisoned")]
    ConnectionPoisoned,
    #[error("Database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
