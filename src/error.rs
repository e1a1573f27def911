//! Error types for PhysicsCoin state persistence

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed or incompatible serialized state bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Buffer of {len} bytes is shorter than the {needed}-byte state header")]
    HeaderTruncated { len: usize, needed: usize },
    #[error("Invalid magic number {found:#010x}")]
    BadMagic { found: u32 },
    #[error("Unsupported format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("Wallet records truncated: {count} wallets need {needed} bytes, {available} available")]
    RecordsTruncated {
        count: u32,
        needed: usize,
        available: usize,
    },
    #[error("Wallet count {count} does not fit in the state header")]
    WalletCountOverflow { count: usize },
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("State file {} is empty", .path.display())]
    EmptyFile { path: PathBuf },
    #[error("Short read: expected {expected} bytes, read {read}")]
    ShortRead { expected: usize, read: usize },
    #[error("Short write: expected {expected} bytes, wrote {written}")]
    ShortWrite { expected: usize, written: usize },
    #[error("Cannot reserve storage for {slots} wallets")]
    AllocationFailed { slots: usize },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Wallet capacity exceeded (max {max})")]
    CapacityExceeded { max: usize },
    #[error("Wallet already exists")]
    WalletExists,
}

impl StateError {
    /// True for malformed or incompatible serialized bytes.
    pub fn is_format(&self) -> bool {
        matches!(self, StateError::Format(_))
    }

    /// True for storage-layer failures: open, size, read or write.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            StateError::Io(_)
                | StateError::EmptyFile { .. }
                | StateError::ShortRead { .. }
                | StateError::ShortWrite { .. }
                | StateError::AllocationFailed { .. }
        )
    }
}

impl From<toml::de::Error> for StateError {
    fn from(err: toml::de::Error) -> Self {
        StateError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, StateError>;
