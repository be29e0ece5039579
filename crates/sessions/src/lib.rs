//! Session storage for the main turn runtime.
//!
//! Implements the Session port: resolve-or-create by key, ordered
//! message append, windowed read, a metadata map, and save. Channel
//! routing, identity linking across channels, and the on-disk layout
//! of a production session store are external, front-end concerns.

pub mod store;

pub use store::{Session, SessionStore};
