//! PhysicsCoin - chained ledger snapshots with a compact binary file format
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Ledger State
//! - [`snapshot`] - In-memory snapshot and hash-chain linkage
//! - [`wallet`] - Fixed-size wallet records
//!
//! ## Binary Format
//! - [`codec`] - Header codec, record transcoder and buffer serializer
//!
//! ## Storage
//! - [`persistence`] - Whole-file save/load and storage backends
//!
//! ## Networking
//! - [`network`] - Peer network contract and loopback implementation
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Ledger State
// ============================================================================
pub mod snapshot;
pub mod wallet;

// ============================================================================
// Binary Format
// ============================================================================
pub mod codec;

// ============================================================================
// Storage
// ============================================================================
pub mod persistence;

// ============================================================================
// Networking
// ============================================================================
pub mod network;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use error::{FormatError, Result, StateError};
pub use snapshot::{Digest, Snapshot, DIGEST_SIZE};
pub use wallet::{WalletRecord, RECORD_SIZE};
