//! # docsync core
//!
//! Pure logic shared by the docsync engine: the data model, supported
//! formats, the chunking processor, the change-detection policy, and the
//! store traits with in-memory implementations.
//!
//! This crate performs no filesystem or network I/O and pulls in no async
//! runtime.

pub mod chunk;
pub mod format;
pub mod models;
pub mod policy;
pub mod store;
