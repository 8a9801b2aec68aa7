use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("record id already exists: {0}")]
    IdConflict(String),

    #[error("name already taken under aggregate {aggregate_id}: {name}")]
    NameConflict { aggregate_id: String, name: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("locked by another actor: {0}")]
    Locked(String),
}
