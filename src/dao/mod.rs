//! Persistence collaborators: rating records and played-topic bookkeeping.

pub mod file;
pub mod storage;

pub use file::FileStore;
pub use storage::{PlayedStore, RatingStore, StorageError, StorageResult};
