//! Error taxonomy shared across the crate.
//!
//! Most variants are plain context-carrying messages; [`Error::DimensionMismatch`]
//! and [`Error::NotFound`] stay structurally matchable because the service
//! downgrades the former to a warning on the write path and maps the latter to
//! tool-level errors.

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unparseable configuration, unknown provider, invalid `.memoryignore` regex.
    #[error("config: {0}")]
    Config(String),

    /// Filesystem failure during vault or database file operations.
    #[error("io: {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Relational engine failure, wrapped with the failing operation.
    #[error("storage: {context}: {source}")]
    Storage {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Vector table width differs from what the provider produced.
    /// Non-fatal for writes (vectors are skipped), fatal for reindex intent.
    #[error("embedding dimension mismatch: database has {stored}, provider returned {got}. Run 'echovault reindex' to rebuild")]
    DimensionMismatch { stored: usize, got: usize },

    /// Network or protocol failure from an embedding provider.
    #[error("embedding: {0}")]
    Embedding(String),

    /// ID or prefix resolution yielded no row.
    #[error("memory not found: {0}")]
    NotFound(String),

    /// Missing or contradictory caller-supplied arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a rusqlite error with the operation that issued it.
    pub fn storage(context: &'static str, source: rusqlite::Error) -> Self {
        Self::Storage { context, source }
    }
}

/// Extension for attaching an operation name to rusqlite results.
pub trait StorageContext<T> {
    fn storage_context(self, context: &'static str) -> Result<T>;
}

impl<T> StorageContext<T> for std::result::Result<T, rusqlite::Error> {
    fn storage_context(self, context: &'static str) -> Result<T> {
        self.map_err(|e| Error::storage(context, e))
    }
}
