//! Room Service Library
//!
//! Personal meeting rooms: each owner has a stable slug. Opening the slug
//! as the owner provisions a short-lived video meeting and redirects to it.
//! Visitors arriving first wait on a server-sent event stream and are
//! redirected the moment the owner's meeting becomes active.
//!
//! # Architecture
//!
//! Handler -> Service -> Repository:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Owner session resolution
//! - `models` - Data models and wire payloads
//! - `observability` - Metrics
//! - `repositories` - Owner, meeting and waiting-session stores
//! - `routes` - Axum router setup
//! - `services` - Lifecycle manager, notification bus, provisioner, accounts

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
