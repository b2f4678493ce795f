//! Library crate for svoyak-bot, exposing the game-session engine, rating
//! logic, and their collaborators for the binary and integration tests.

pub mod config;
pub mod dao;
pub mod data;
mod error;
pub mod gateway;
pub mod services;
pub mod session;

pub use error::ServiceError;
