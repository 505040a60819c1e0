//! Codebook persistence: loading the scheme and writing edits back

mod manager;

pub use manager::{CodebookManager, PendingSync, SyncReport};

use crate::scheme::CodeId;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodebookError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("unknown code: {0}")]
    UnknownCode(CodeId),

    #[error("{failed} store write(s) failed; first: {first}")]
    Sync {
        failed: usize,
        #[source]
        first: StoreError,
    },

    #[error("sync task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type CodebookResult<T> = Result<T, CodebookError>;
