//! Error types for FileDB
//!
//! This module defines all error types used throughout the store.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for FileDB
#[derive(Error, Debug)]
pub enum Error {
    // ========== Lexer Errors ==========
    #[error("Lexer error: unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),

    #[error("Lexer error: unterminated string literal starting at position {0}")]
    UnterminatedString(usize),

    #[error("Lexer error: invalid number format at position {0}")]
    InvalidNumber(usize),

    // ========== Parser Errors ==========
    #[error("Parse error: unexpected token '{found}', expected {expected}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    // ========== Catalog Errors ==========
    #[error("Catalog error: entity type '{0}' not found")]
    EntityNotFound(String),

    #[error("Catalog error: entity type '{0}' already exists")]
    EntityAlreadyExists(String),

    // ========== Key Errors ==========
    #[error("Key error: record for '{entity}' is missing primary key field '{field}'")]
    MissingPrimaryKey { entity: String, field: String },

    #[error("Key error: '{0}' cannot be used as a record file name")]
    InvalidKey(String),

    // ========== Storage Errors ==========
    #[error("Storage error: directory '{}' is missing", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Storage error: record file '{}' is corrupted: {reason}", .path.display())]
    CorruptedRecord { path: PathBuf, reason: String },

    // ========== I/O Errors ==========
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for FileDB operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::EntityNotFound("tasks".to_string());
        assert_eq!(err.to_string(), "Catalog error: entity type 'tasks' not found");

        let err = Error::UnexpectedCharacter('@', 5);
        assert_eq!(
            err.to_string(),
            "Lexer error: unexpected character '@' at position 5"
        );

        let err = Error::MissingDirectory(PathBuf::from("data/tasks"));
        assert_eq!(
            err.to_string(),
            "Storage error: directory 'data/tasks' is missing"
        );
    }
}
