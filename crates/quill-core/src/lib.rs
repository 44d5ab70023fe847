//! Core domain types for the quill chat engine.
//!
//! This crate holds the pure domain layer: chat messages and their parsed
//! parts, the incremental block parser, chat groups, session read models,
//! the store traits implemented by the infrastructure layer, and the shared
//! error type.

pub mod chat;
pub mod error;
pub mod license;
pub mod session;
pub mod store;

pub use error::{QuillError, Result};
