//! Error types for job preparation and inventory splitting.

use std::time::Duration;

use thiserror::Error;

/// Main error type for migration job preparation.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source or target PostgreSQL query error
    #[error("Database error: {0}")]
    Source(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Data access error raised by a non-PostgreSQL collaborator
    #[error("Query failed ({context}): {message}")]
    Query { context: String, message: String },

    /// Preparation of a job item failed; retry from scratch is expected to help.
    #[error("{message}")]
    PrepareFailed {
        message: String,
        #[source]
        source: Box<MigrateError>,
    },

    /// The table cannot be split into inventory tasks (structural, not retryable).
    #[error("Can not split table {table}: {reason}")]
    SplitJob { table: String, reason: String },

    /// The job's prepare lock was not acquired and no other worker prepared the target.
    #[error("Lock {lock} not acquired within {timeout:?} and target is not prepared")]
    LockTimeout { lock: String, timeout: Duration },

    /// Lock service failure
    #[error("Lock error: {0}")]
    Lock(String),

    /// Progress store failure
    #[error("Progress store error: {0}")]
    State(String),

    /// Pipeline task failure
    #[error("Task {task_id} failed: {message}")]
    Task { task_id: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Work was cancelled through the job's stop token
    #[error("Cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Query error
    pub fn query(context: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Query {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Wrap an error as a prepare failure.
    pub fn prepare_failed(message: impl Into<String>, source: MigrateError) -> Self {
        MigrateError::PrepareFailed {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Create a SplitJob error
    pub fn split_job(table: impl Into<String>, reason: impl Into<String>) -> Self {
        MigrateError::SplitJob {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Create a Task error
    pub fn task(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Task {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from talking to a database.
    pub fn is_data_access(&self) -> bool {
        matches!(
            self,
            MigrateError::Source(_) | MigrateError::Pool { .. } | MigrateError::Query { .. }
        )
    }

    /// Whether re-running prepare may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MigrateError::PrepareFailed { .. } | MigrateError::LockTimeout { .. }
        ) || self.is_data_access()
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
