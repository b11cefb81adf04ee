//! # Audy Common Library
//!
//! Shared code for the Audy server crates:
//! - Track and user models
//! - Event types (`AudyEvent`, `ImportEvent`) and their wire envelope
//! - Bootstrap configuration loading and root folder resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
pub use models::{Track, User};
