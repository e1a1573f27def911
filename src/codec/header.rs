use crate::error::FormatError;
use crate::snapshot::{Digest, Snapshot, DIGEST_SIZE};

/// "PHYS" read as a little-endian u32.
pub const MAGIC: u32 = 0x5048_5953;

/// The only layout this build reads or writes.
pub const FORMAT_VERSION: u32 = 1;

/// Fixed-size prefix of every serialized snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StateHeader {
    pub magic: u32,
    pub format_version: u32,
    pub version: u64,
    pub timestamp: u64,
    pub wallet_count: u32,
    pub token_supply_total: f64,
    pub state_digest: Digest,
    pub prev_state_digest: Digest,
}

impl StateHeader {
    pub const SIZE: usize = 4 + 4 + 8 + 8 + 4 + 8 + DIGEST_SIZE + DIGEST_SIZE; // 100 bytes

    /// Builds the header describing `snapshot`.
    pub fn for_snapshot(snapshot: &Snapshot) -> Result<Self, FormatError> {
        let count = snapshot.wallet_count();
        let wallet_count =
            u32::try_from(count).map_err(|_| FormatError::WalletCountOverflow { count })?;

        Ok(Self {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            version: snapshot.version,
            timestamp: snapshot.timestamp,
            wallet_count,
            token_supply_total: snapshot.token_supply_total,
            state_digest: snapshot.state_digest,
            prev_state_digest: snapshot.prev_state_digest,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.format_version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.version.to_le_bytes());
        buf[16..24].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[24..28].copy_from_slice(&self.wallet_count.to_le_bytes());
        buf[28..36].copy_from_slice(&self.token_supply_total.to_le_bytes());
        buf[36..68].copy_from_slice(&self.state_digest);
        buf[68..100].copy_from_slice(&self.prev_state_digest);
        buf
    }

    /// Parses and validates the header at the start of `bytes`.
    ///
    /// Any format version other than [`FORMAT_VERSION`] is rejected outright;
    /// there is no forward-compatible parsing.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < Self::SIZE {
            return Err(FormatError::HeaderTruncated {
                len: bytes.len(),
                needed: Self::SIZE,
            });
        }

        let magic = read_u32(bytes, 0);
        if magic != MAGIC {
            return Err(FormatError::BadMagic { found: magic });
        }

        let format_version = read_u32(bytes, 4);
        if format_version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion {
                found: format_version,
                expected: FORMAT_VERSION,
            });
        }

        Ok(Self {
            magic,
            format_version,
            version: read_u64(bytes, 8),
            timestamp: read_u64(bytes, 16),
            wallet_count: read_u32(bytes, 24),
            token_supply_total: f64::from_bits(read_u64(bytes, 28)),
            state_digest: read_digest(bytes, 36),
            prev_state_digest: read_digest(bytes, 68),
        })
    }
}

/// Encodes the header block for `snapshot`.
pub fn encode_header(snapshot: &Snapshot) -> Result<[u8; StateHeader::SIZE], FormatError> {
    StateHeader::for_snapshot(snapshot).map(|header| header.to_bytes())
}

pub fn decode_header(bytes: &[u8]) -> Result<StateHeader, FormatError> {
    StateHeader::from_bytes(bytes)
}

// Offsets below are only reached after the length check in `from_bytes`.
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

fn read_digest(bytes: &[u8], offset: usize) -> Digest {
    let mut digest = [0u8; DIGEST_SIZE];
    digest.copy_from_slice(&bytes[offset..offset + DIGEST_SIZE]);
    digest
}
