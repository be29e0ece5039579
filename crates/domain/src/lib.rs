//! Shared types for the taskloom runtime: the error taxonomy, provider
//! wire-agnostic message/tool model, streaming events, model
//! capabilities, structured trace events, and configuration.

pub mod capability;
pub mod config;
pub mod ctx;
pub mod error;
pub mod stream;
pub mod tool;
pub mod trace;

pub use error::{Error, Result};
