use thiserror::Error;

use crate::{dao::storage::StorageError, data::PackageError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed.
    #[error("storage failure")]
    Storage(#[from] StorageError),
    /// A topic package could not be loaded or is malformed.
    #[error("package failure")]
    Package(#[from] PackageError),
    /// Invalid input provided by the user.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Every configured game room is currently occupied.
    #[error("no free game room")]
    NoFreeRoom,
    /// The selected package does not hold enough topics the players have not
    /// already seen.
    #[error("not enough fresh topics (needed {needed}, found {available})")]
    NotEnoughTopics {
        /// Number of topics the game was configured to play.
        needed: usize,
        /// Number of unplayed topics actually available.
        available: usize,
    },
}
