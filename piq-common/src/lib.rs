//! # PortfolioIQ Common Library
//!
//! Shared code for the PortfolioIQ services including:
//! - Error types
//! - Progress event types (ProgressEvent)
//! - Configuration loading (TOML + environment)
//! - SQLite pool initialization
//! - SSE framing for progress events

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
pub use events::{ProgressEvent, ProgressEventKind, SubscriberId};
