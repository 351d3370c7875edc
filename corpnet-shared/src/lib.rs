//! # Corpnet Shared Library
//!
//! Types, persistence and business rules shared by the Corpnet API server and
//! the background worker.
//!
//! ## Module Organization
//!
//! - `db`: connection pool and embedded migrations
//! - `auth`: bearer token validation, request identity, permission checks
//! - `models`: accounts, users, contacts, events and their party collections,
//!   stats, notifications and the job queue table
//! - `redis`: Redis connection wrapper used for notification fan-out
//! - `logging`: tracing subscriber setup shared by both binaries

pub mod auth;
pub mod db;
pub mod logging;
pub mod models;
pub mod redis;

/// Current version of the Corpnet shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
