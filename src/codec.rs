//! Binary state format
//!
//! A serialized snapshot is a fixed [`StateHeader`] immediately followed by
//! `wallet_count` fixed-size wallet records. All integers and floats are
//! little-endian; there is no padding, trailer or checksum beyond the
//! embedded state digest.

pub mod buffer;
pub mod header;
pub mod records;

pub use buffer::*;
pub use header::*;
pub use records::{decode_records, encode_records, records_len};
