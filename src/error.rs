use thiserror::Error;

/// Error taxonomy for the retrieval and indexing core.
///
/// Construction-time problems are `Config` and never recovered. Single-call
/// failures against external services are `Transient`: the indexer counts
/// them per file and keeps going. `NotFound` covers version-control queries
/// for branches or commits that don't exist. `DataIntegrity` marks corrupt
/// on-disk metadata or store records with missing payload fields; the
/// corrupt entity is skipped with a warning. `Aborted` is a cancellation
/// signal observed mid-run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt data: {0}")]
    DataIntegrity(String),

    #[error("operation aborted")]
    Aborted,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Store(#[from] qdrant_client::QdrantError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        fn read() -> Result<String> {
            Ok(std::fs::read_to_string("/definitely/not/a/file")?)
        }
        assert!(matches!(read(), Err(Error::Io(_))));
    }

    #[test]
    fn test_messages_name_the_kind() {
        assert!(Error::Config("weights".into())
            .to_string()
            .contains("invalid configuration"));
        assert!(Error::NotFound("branch".into()).to_string().contains("branch"));
        assert_eq!(Error::Aborted.to_string(), "operation aborted");
    }
}
