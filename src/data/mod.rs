//! Read-only trivia package model: topic sets, topics, and questions.
//!
//! Packages are plain JSON documents loaded once at startup; sessions only
//! hold cursors into them and never mutate the data.

pub mod question;
pub mod topic;

pub use question::Question;
pub use topic::{PackageError, Topic, TopicId, TopicSet};
