use crux_kv::error::KeyValueError;

use crate::{AppError, ErrorKind};

/// Outcome of a `get`, `set` or `delete`; `set` and `delete` report the previous value.
pub type KvResult = Result<Option<Vec<u8>>, KeyValueError>;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("key-value store failure: {0}")]
    Store(#[from] KeyValueError),
}

impl From<KvError> for AppError {
    fn from(e: KvError) -> Self {
        AppError::new(ErrorKind::Storage, "Unable to access local storage")
            .with_internal(e.to_string())
    }
}
