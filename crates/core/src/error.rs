use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("name cannot be made valid: {proposed:?}")]
    InvalidName { proposed: String },

    #[error("no sort keys left below the baseline minimum")]
    SortKeysExhausted,

    #[error("config error: {0}")]
    Config(String),
}
