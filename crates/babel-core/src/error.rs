//! Error types shared by the Babel core.

use std::path::PathBuf;

/// Fatal errors raised while building compendia or conflations.
///
/// Rejected merges are *not* errors: they are reported through
/// [`crate::audit::AuditLog`] and processing continues.
#[derive(Debug, thiserror::Error)]
pub enum BabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CURIE (missing prefix separator): {0:?}")]
    InvalidCurie(String),

    #[error("malformed row at {source_name}:{line}: {reason}")]
    MalformedRow {
        source_name: String,
        line: usize,
        reason: String,
    },

    #[error("partition violation: {identifier} appears in {occurrences} compendium records")]
    PartitionViolation {
        identifier: String,
        occurrences: usize,
    },

    #[error("identifier {identifier} appears in more than one clique of compendium {compendium}")]
    DuplicateMember {
        compendium: String,
        identifier: String,
    },

    #[error("compendium {compendium} contains a record with no identifiers (line {line})")]
    EmptyClique { compendium: String, line: usize },

    #[error("no compendium configuration for semantic type {0}")]
    UnknownSemanticType(String),
}

impl BabelError {
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(source_name: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            source_name: source_name.into(),
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BabelError>;
