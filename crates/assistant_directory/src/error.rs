use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("line {line} in {path} has an empty '{column}' field")]
    EmptyField {
        path: PathBuf,
        line: u64,
        column: &'static str,
    },

    #[error("line {line} in {path} redefines assistant '{name}'")]
    DuplicateName {
        path: PathBuf,
        line: u64,
        name: String,
    },
}

impl DirectoryError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}
