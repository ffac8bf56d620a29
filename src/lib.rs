//! # Confstore - versioned configuration and secrets store
//!
//! Named, typed, versioned properties organized by namespace, section and
//! environment, served over a streaming RPC protocol and persisted in SQLite.
//!
//! Confstore provides:
//! - A property model with typed values and optional secret encryption
//! - An append-only SQLite storage engine with dynamic queries
//! - A streaming Store/Search service with revision bumping and dedup
//! - A client with ordered delivery, call deadlines and TOML import

pub mod value;
pub mod property;
pub mod cipher;
pub mod storage;
pub mod rpc;
pub mod server;
pub mod client;
pub mod config;
pub mod ui;


// Re-exports for convenient access
pub use value::{Value, ValueType, TypedValue, DecodeError, ConversionError};
pub use property::{Property, Environment, Query, values_equal, DEFAULT_NAMESPACE};
pub use cipher::{Cipher, SecretKey};
pub use storage::{PropertyStorage, SqliteStore};
pub use server::{ConfigStoreService, Server};
pub use client::{ConfigStoreClient, ConfigSection};
pub use rpc::StatusCode;

/// Result type alias for Confstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Confstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("property key is not set")]
    MissingKey,

    #[error("no results")]
    NoRowsFound,

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{code}: {message}")]
    Status { code: StatusCode, message: String },

    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("config store key cannot be empty when using secrets")]
    MissingSecretKey,

    #[error("Unknown environment: {0}")]
    InvalidEnvironment(String),
}

impl Error {
    /// True for the "no data" sentinel returned by storage searches
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NoRowsFound)
    }
}
