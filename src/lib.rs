/// Settings read from the environment.
pub mod config;
/// Traits and types used for interacting with the database.
pub mod database;
/// Contains functions for logging.
pub mod log;
/// Standings, qualification and the propagation of players between groups.
///
/// The entry point is [`seeding::orchestrator::Orchestrator`], which the surrounding
/// application notifies whenever a match result is saved.
pub mod seeding;
pub mod utils;

/// A thread-safe Error type used by the engine.
pub type SeedError = anyhow::Error;
