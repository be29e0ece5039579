//! Tool registry: name-keyed lookup and dispatch of tool implementations.
//!
//! Concrete tools (file access, shell execution, web fetch) are an
//! external concern; this crate ships the dispatch seam the main turn
//! runtime calls into.

pub mod registry;
pub mod traits;

pub use registry::ToolRegistry;
pub use traits::Tool;
