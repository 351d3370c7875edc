//! # Corpnet API Server Library
//!
//! HTTP surface of Corpnet: contacts and contact requests, the per-kind event
//! listings, party lists, event stats and notifications.
//!
//! ## Modules
//!
//! - `app`: Application state, router builder and auth middleware
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
