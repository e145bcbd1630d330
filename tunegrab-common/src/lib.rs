//! # tunegrab Common Library
//!
//! Shared code for the tunegrab crates:
//! - Common error and result types
//! - TOML bootstrap configuration and directory resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
