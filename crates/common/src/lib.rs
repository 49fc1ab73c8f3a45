//! Common utilities and types shared across the meeting room crates.

#![warn(clippy::pedantic)]

/// Module for common identifier types
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for room slug normalization, allocation and validation
pub mod slug;
