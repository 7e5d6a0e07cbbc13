//! Error taxonomy for the pipeline
//!
//! Constraint violations and failed statements are row-scoped while
//! loading. Connection loss and every input or setup error abort the
//! current stage and, through the orchestrator, the run.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Category of a database constraint violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    NotNull,
    Check,
    ForeignKey,
    Unique,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::NotNull => "not_null",
            ConstraintKind::Check => "check",
            ConstraintKind::ForeignKey => "foreign_key",
            ConstraintKind::Unique => "unique",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    #[error("{table}: {kind} constraint violated: {detail}")]
    Constraint {
        table: String,
        kind: ConstraintKind,
        detail: String,
    },

    #[error("query on {target} failed: {message}")]
    Query { target: String, message: String },

    #[error("missing required columns in '{table}': {}", .columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    #[error("missing required tables: {}", .0.join(", "))]
    MissingTables(Vec<String>),

    #[error("invalid database url: {0}")]
    InvalidDatabaseUrl(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("report error: {0}")]
    Report(#[from] serde_json::Error),
}

impl EtlError {
    /// Whether a failed row write leaves the connection usable, so the
    /// load may continue with the next row.
    pub fn is_row_scoped(&self) -> bool {
        matches!(self, EtlError::Constraint { .. } | EtlError::Query { .. })
    }

    pub fn connection(target: impl Into<String>, message: impl fmt::Display) -> Self {
        EtlError::Connection {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn query(target: impl Into<String>, message: impl fmt::Display) -> Self {
        EtlError::Query {
            target: target.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = EtlError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_loss_is_not_row_scoped() {
        let constraint = EtlError::Constraint {
            table: "places".into(),
            kind: ConstraintKind::Check,
            detail: "rating".into(),
        };
        assert!(constraint.is_row_scoped());
        assert!(!EtlError::connection("olap", "refused").is_row_scoped());
        assert!(EtlError::query("olap", "numeric field overflow").is_row_scoped());
        assert!(!EtlError::MissingTables(vec!["users".into()]).is_row_scoped());
    }

    #[test]
    fn missing_columns_lists_names() {
        let err = EtlError::MissingColumns {
            table: "users".into(),
            columns: vec!["email".into(), "updated_at".into()],
        };
        assert_eq!(
            err.to_string(),
            "missing required columns in 'users': email, updated_at"
        );
    }

    #[test]
    fn constraint_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ConstraintKind::ForeignKey).unwrap();
        assert_eq!(json, "\"foreign_key\"");
    }
}
