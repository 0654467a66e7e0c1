//! Common utilities and types shared across the conference relay crates.

#![warn(clippy::pedantic)]

/// Module for common error types
pub mod error;

/// Module for common data types (phone numbers, call directions)
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;
