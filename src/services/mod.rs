//! Services built on top of the storage layer and the session core.

pub mod rating;
pub mod registry;

pub use registry::{GameSetup, Registry};
