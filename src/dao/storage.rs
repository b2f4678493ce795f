//! Storage traits and the error type shared by every backend.

use std::{error::Error, io};

use thiserror::Error;

use crate::{data::TopicId, gateway::UserId};

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backing medium rejected a read or write.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failed operation.
        message: String,
        /// Underlying backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Shorthand for wrapping an I/O failure.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::unavailable(message, source)
    }
}

/// Persistent per-player Elo-like ratings and display names.
///
/// Reads are served from memory; mutations become durable on [`commit`].
/// A player is in at most one active session, so the game that just ended
/// is the sole writer for its players — no further write coordination is
/// required.
///
/// [`commit`]: RatingStore::commit
pub trait RatingStore: Send + Sync {
    /// Current rating of a player, defaulting to 1500 for unknown players.
    fn rating(&self, user: UserId) -> i32;

    /// All known `(user, name, rating)` records.
    fn all_ratings(&self) -> Vec<(UserId, String, i32)>;

    /// Overwrite a player's rating.
    fn set_rating(&self, user: UserId, rating: i32);

    /// Record or refresh a player's display name.
    fn set_name(&self, user: UserId, name: String);

    /// Flush rating state to the backing medium.
    fn commit_ratings(&self) -> StorageResult<()>;
}

/// Persistent played-topic exclusion set.
pub trait PlayedStore: Send + Sync {
    /// Whether a player has already seen a topic.
    fn is_played(&self, user: UserId, topic: &TopicId) -> bool;

    /// Mark a topic as seen by a player.
    fn add_played(&self, user: UserId, topic: TopicId);

    /// Flush played-topic state to the backing medium.
    fn commit_played(&self) -> StorageResult<()>;
}
