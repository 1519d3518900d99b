//! Error types for JAR storage operations

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JarError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid archive format: {0}")]
    Format(String),

    #[error("Corrupt archive: {0}")]
    Corrupt(String),

    #[error("Archive path too long: {len} > {max}")]
    PathTooLong { len: usize, max: usize },

    #[error("Read offset out of range: {pos} >= {size}")]
    ReadOutOfRange { pos: u64, size: u64 },

    #[error("Entry not compressed")]
    NotCompressed,
}

pub type Result<T> = std::result::Result<T, JarError>;
