//! Directory source adapter.
//!
//! Binds to the directory service, runs one subtree search per pass
//! and produces the authoritative [`concord_core::UserRecord`]
//! snapshot that the user passes converge on.

pub mod config;
pub mod source;

pub use config::DirectoryConfig;
pub use source::{DirectorySource, DIRECTORY_ATTRS};
