//! Unified error handling for Valvemon
//!
//! This crate provides the single error type used across the monitor: configuration
//! validation, replay parsing, GPIO/SPI access and alert delivery all report through it.

use std::io;
use std::path::PathBuf;

/// Result type alias using ValvemonError
pub type Result<T> = std::result::Result<T, ValvemonError>;

/// Unified error type for all Valvemon operations
#[derive(thiserror::Error, Debug)]
pub enum ValvemonError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("File not found or not readable: {0}")]
    FileNotFound(PathBuf),

    #[error("File too large: {path} ({size} bytes, max {max_size} bytes)")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Failed to parse {path} as a configuration document: {reason}")]
    Document {
        path: PathBuf,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    ConfigValidation(String),

    // ============================================================================
    // Replay File Errors
    // ============================================================================
    #[error("Replay file {path}, line {line}: {reason}")]
    ReplayFormat {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    // ============================================================================
    // Hardware Access Errors
    // ============================================================================
    #[error("GPIO error on pin {pin}: {reason}")]
    Gpio {
        pin: u32,
        reason: String,
    },

    #[error("SPI error on {device}: {reason}")]
    Spi {
        device: PathBuf,
        reason: String,
    },

    // ============================================================================
    // Alert Delivery Errors
    // ============================================================================
    #[error("Alert dispatch failed: {0}")]
    AlertDispatch(String),
}

impl ValvemonError {
    /// Create a configuration validation error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a replay format error for a line of a replay file
    pub fn replay(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::ReplayFormat {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Create a GPIO error for a pin
    pub fn gpio(pin: u32, reason: impl Into<String>) -> Self {
        Self::Gpio {
            pin,
            reason: reason.into(),
        }
    }

    /// Create an SPI error for a device node
    pub fn spi(device: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Spi {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create an alert dispatch error
    pub fn alert_dispatch(msg: impl Into<String>) -> Self {
        Self::AlertDispatch(msg.into())
    }

    /// True for errors raised by GPIO or SPI access
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Gpio { .. } | Self::Spi { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_error_names_file_and_line() {
        let err = ValvemonError::replay("samples.csv", 4, "\"2\" is not a valid bit");
        assert_eq!(
            err.to_string(),
            "Replay file samples.csv, line 4: \"2\" is not a valid bit"
        );
    }

    #[test]
    fn test_hardware_classification() {
        assert!(ValvemonError::gpio(17, "busy").is_hardware());
        assert!(ValvemonError::spi("/dev/spidev0.0", "ioctl failed").is_hardware());
        assert!(!ValvemonError::config("bad").is_hardware());
        assert!(!ValvemonError::alert_dispatch("unreachable").is_hardware());
    }
}
