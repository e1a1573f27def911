//! Wallet records as stored inside a ledger snapshot

/// Size of a wallet public key in bytes.
pub const KEY_SIZE: usize = 32;

/// Encoded size of one [`WalletRecord`]: key, energy and nonce with no padding.
pub const RECORD_SIZE: usize = KEY_SIZE + 8 + 8;

pub type PublicKey = [u8; KEY_SIZE];

/// One wallet entry of the ledger.
///
/// The persistence layer never interprets these fields; it only needs a
/// byte layout that does not depend on the host's struct padding, so each
/// field is written at a fixed little-endian offset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WalletRecord {
    pub public_key: PublicKey,
    /// Balance, modelled as the wallet's energy.
    pub energy: f64,
    /// Transaction counter used for replay protection.
    pub nonce: u64,
}

impl WalletRecord {
    pub fn new(public_key: PublicKey, energy: f64) -> Self {
        Self {
            public_key,
            energy,
            nonce: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        self.write_to(&mut buf);
        buf
    }

    /// Writes the record into the first [`RECORD_SIZE`] bytes of `buf`.
    ///
    /// Callers guarantee `buf.len() >= RECORD_SIZE`.
    pub(crate) fn write_to(&self, buf: &mut [u8]) {
        buf[0..32].copy_from_slice(&self.public_key);
        buf[32..40].copy_from_slice(&self.energy.to_le_bytes());
        buf[40..48].copy_from_slice(&self.nonce.to_le_bytes());
    }

    pub fn from_bytes(buf: &[u8; RECORD_SIZE]) -> Self {
        let mut public_key = [0u8; KEY_SIZE];
        public_key.copy_from_slice(&buf[0..32]);

        let mut energy = [0u8; 8];
        energy.copy_from_slice(&buf[32..40]);
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&buf[40..48]);

        Self {
            public_key,
            energy: f64::from_le_bytes(energy),
            nonce: u64::from_le_bytes(nonce),
        }
    }

    pub fn address_hex(&self) -> String {
        hex::encode(self.public_key)
    }
}
