//! # Corpnet Worker Library
//!
//! Runs the follow-up work the API schedules in the `jobs` table: stats
//! recounts and user notifications.
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `queue`: claiming jobs and recording their outcome
//! - `handlers`: one handler per job type, behind the `JobHandler` trait
//! - `notifier`: stores notifications and publishes them to Redis
//! - `orchestrator`: the poll loop with bounded concurrency and graceful shutdown

pub mod config;
pub mod handlers;
pub mod notifier;
pub mod orchestrator;
pub mod queue;
