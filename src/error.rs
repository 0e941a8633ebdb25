use thiserror::Error;

use crate::types::EntityKind;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected upstream payload: {0}")]
    Schema(String),

    #[error("Transient fetch error from {source_name}: {message}")]
    TransientFetch { source_name: String, message: String },

    #[error("Fetch from {source_name} failed after {attempts} attempt(s): {last}")]
    FatalFetch {
        source_name: String,
        attempts: u32,
        last: String,
    },

    #[error("Upstream returned zero {kind} game records")]
    EmptyResult { kind: EntityKind },

    #[error("Failed writing chunk {chunk} of {table}: {source}")]
    PersistenceChunk {
        table: &'static str,
        chunk: usize,
        #[source]
        source: Box<AppError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Whether the retry policy may try the failed call again.
    /// Network trouble, upstream 5xx/429 and payloads of the wrong shape are
    /// retried; everything else escalates on the first failure.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Http(e) => {
                if e.is_timeout() || e.is_connect() || e.is_decode() || e.is_body() {
                    return true;
                }
                match e.status() {
                    Some(status) => status.is_server_error() || status.as_u16() == 429,
                    None => e.is_request(),
                }
            }
            AppError::Json(_) | AppError::Schema(_) | AppError::TransientFetch { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_is_transient() {
        assert!(AppError::Schema("missing rowSet".into()).is_transient());
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(AppError::Json(json_err).is_transient());
    }

    #[test]
    fn terminal_errors_are_not_retried() {
        assert!(!AppError::Config("bad".into()).is_transient());
        assert!(!AppError::EmptyResult { kind: EntityKind::Player }.is_transient());
        let fatal = AppError::FatalFetch {
            source_name: "stats".into(),
            attempts: 4,
            last: "timeout".into(),
        };
        assert!(!fatal.is_transient());
    }

    #[test]
    fn chunk_error_names_table_and_chunk() {
        let err = AppError::PersistenceChunk {
            table: "streak_events",
            chunk: 2,
            source: Box::new(AppError::Config("disk full".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("chunk 2"), "{msg}");
        assert!(msg.contains("streak_events"), "{msg}");
    }
}
