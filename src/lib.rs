// Public API for the party client, the integration tests and the dev store binary

pub mod config;
pub mod events;
pub mod leaderboard;
pub mod llm;
pub mod party;
pub mod poll;
pub mod puzzle;
pub mod reconcile;
pub mod score;
pub mod server;
pub mod session;
pub mod signal;
pub mod store;
pub mod types;
