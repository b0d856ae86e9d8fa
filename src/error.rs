//! Error types for the drawing pad.
//!
//! Surface and snapshot problems are `DrawError`, the remote gallery
//! collaborator reports `ApiError`, the local fallback store reports
//! `StorageError`, and `ConfigError` covers loading and validating settings.

use std::io;
use thiserror::Error;

/// Errors raised while editing, encoding or restoring the surface.
#[derive(Error, Debug)]
pub enum DrawError {
    /// A color string was not `#rrggbb`.
    #[error("Invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),

    /// A surface cannot have a zero-sized dimension.
    #[error("Invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    /// A snapshot or saved image is not a base64 image data URL.
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    /// Base64 payload could not be decoded.
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// PNG encode/decode failure.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// No history entry exists at the requested index.
    #[error("No snapshot at history index {0}")]
    MissingSnapshot(usize),

    /// Pointer position with a NaN or infinite coordinate.
    #[error("Invalid pointer position ({x}, {y})")]
    InvalidPoint { x: f64, y: f64 },
}

/// Errors reported by the remote save/list/clear collaborator.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No server is reachable or configured.
    #[error("Drawing service unavailable: {0}")]
    Unavailable(String),

    /// The server refused the request.
    #[error("Drawing service returned status {0}")]
    Status(u16),

    /// The record was rejected before storing.
    #[error("Invalid image data")]
    InvalidImage,

    /// Body could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the local key/value fallback store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error while touching the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The slot content is not a valid JSON record list.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A compressed slot could not be decompressed.
    #[error("Corrupted storage slot '{0}'")]
    Corrupted(String),
}

/// Errors related to loading and validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error while reading the configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TOML could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configuration value is out of its valid range.
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// No default data directory exists on this platform.
    #[error("No data directory available for local storage")]
    NoDataDir,
}

/// Result type alias for surface operations.
pub type DrawResult<T> = Result<T, DrawError>;

/// Result type alias for remote collaborator calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for local storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
