use std::path::PathBuf;

/// Errors from a document store.
///
/// Any of these aborts the single request that hit it; callers log and
/// leave in-memory state untouched.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Reading a seed file failed.
    #[error("failed to read seed file {path}: {source}")]
    SeedIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A seed file is not valid JSON of the expected shape.
    #[error("invalid seed data: {0}")]
    SeedFormat(#[source] serde_json::Error),

    /// A zone document has no string `zone` field to key it by.
    #[error("zone document has no `zone` name")]
    UnnamedZone,
}
