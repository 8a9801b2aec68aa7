use thiserror::Error;
use varsync_core::CoreError;
use varsync_storage::StorageError;

use crate::gate::Denial;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("name cannot be made valid: {proposed:?}")]
    NameRejected { proposed: String },

    #[error("plan rejected: {} operation(s) not permitted", .0.len())]
    PermissionDenied(Vec<Denial>),

    #[error("variation id already in use: {0}")]
    IdentityTaken(String),

    #[error("variation not found: {0}")]
    VariationNotFound(String),

    #[error("variation name may not be blank")]
    BlankName,

    #[error("at most {max} variations allowed")]
    TooManyVariations { max: usize },

    #[error("at least two variations required, have {count}")]
    NotEnoughVariations { count: usize },
}

impl EngineError {
    /// Rejections happen during planning and leave the store untouched.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NameRejected { .. }
                | Self::PermissionDenied(_)
                | Self::IdentityTaken(_)
                | Self::Core(CoreError::SortKeysExhausted)
        )
    }
}
