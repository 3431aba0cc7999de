use displaydoc::Display;
use statemig_models::error::ModelsError;
use std::path::PathBuf;
use thiserror::Error;

/// export tree result
pub type TreeResult<T, E = TreeError> = core::result::Result<T, E>;

/// Errors reading or writing the export tree
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum TreeError {
    /// invalid argument: {0}
    InvalidArgument(String),
    /// io error at {path:?}: {source}
    Io {
        /// offending path
        path: PathBuf,
        /// cause
        source: std::io::Error,
    },
    /// json error at {path:?}: {source}
    Json {
        /// offending path
        path: PathBuf,
        /// cause
        source: serde_json::Error,
    },
}

/// Errors reported by a state source
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// transport error: {0}
    Transport(String),
    /// malformed source data: {0}
    Malformed(String),
}

/// Errors aborting an export
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum ExportError {
    /// {0}
    Tree(#[from] TreeError),
    /// source error: {0}
    Source(#[from] SourceError),
    /// models error: {0}
    Models(#[from] ModelsError),
}

/// Errors aborting a migration
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum MigrationError {
    /// {0}
    Tree(#[from] TreeError),
    /// models error: {0}
    Models(#[from] ModelsError),
    /// account {account}: {source}
    Account {
        /// account being migrated
        account: String,
        /// cause
        source: Box<MigrationError>,
    },
    /// inconsistent export tree: {0}
    Inconsistent(String),
    /// the batch consumer went away
    ChannelClosed,
}

impl MigrationError {
    /// Errors confined to one account: bad names, rows not matching their
    /// schema, unsupported index kinds. The walk goes on with the next account.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            MigrationError::Models(_) | MigrationError::Tree(TreeError::InvalidArgument(_))
        )
    }

    /// Attach the account being migrated. A closed channel is left as is.
    pub fn in_account(self, account: impl ToString) -> Self {
        match self {
            MigrationError::ChannelClosed => self,
            other => MigrationError::Account {
                account: account.to_string(),
                source: Box::new(other),
            },
        }
    }
}
