//! Read-only ZIP/JAR archive storage with hash-indexed entry lookup
//!
//! This crate provides shared, read-only access to ZIP and JAR archives:
//! each archive is indexed once from its central directory, registered in a
//! process-wide storage, and handed out as counted handles. Entries resolve
//! by name hash and read their payloads lazily, stored or deflated.

pub mod archive;
pub mod error;
pub mod format;
pub mod storage;
pub mod types;

mod directory;
mod fio;
mod index;

pub use error::{JarError, Result};
pub use storage::{JarHandle, JarStorage, global};
pub use types::{JarEntry, StorageConfig, StorageStats};

// Re-export commonly used types
pub use archive::{Archive, Entries};
