//! tunegrab-ai library interface
//!
//! Acquire & ingest: finds the best source for a song query, downloads its
//! audio, enriches the file and moves it into the library.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod wanted;
pub mod workflow;

pub use crate::error::{AcquireError, AcquireResult};
