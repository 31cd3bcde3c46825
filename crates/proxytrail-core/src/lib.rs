//! Core types and trait definitions for the proxytrail ingestion pipeline.
//!
//! This crate has no file-system or database dependencies.
//! The parser, the storage backend and the orchestrator all depend on it.

pub mod batch;
pub mod cursor;
pub mod error;
pub mod partition;
pub mod record;
pub mod store;

pub use error::{Error, Result};
