//! In-memory ledger snapshot
//!
//! A [`Snapshot`] is one versioned image of the full ledger: scalar metadata,
//! the digest pair that links it into a hash chain, and the ordered wallet
//! records. Wallet order is first-seen order and is preserved by every
//! encode/decode path.

use crate::error::{Result, StateError};
use crate::wallet::{PublicKey, WalletRecord};

/// Size of a state digest in bytes.
pub const DIGEST_SIZE: usize = 32;

/// Wallet slots reserved by [`Snapshot::new`].
pub const INITIAL_WALLET_CAPACITY: usize = 100;

/// Hard upper bound on wallets held by one snapshot.
pub const MAX_WALLETS: usize = 10_000;

/// Opaque digest supplied by the caller; this crate never computes one.
pub type Digest = [u8; DIGEST_SIZE];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub version: u64,
    pub timestamp: u64,
    pub token_supply_total: f64,
    pub state_digest: Digest,
    pub prev_state_digest: Digest,
    wallets: Vec<WalletRecord>,
}

impl Snapshot {
    /// Creates the initial state: version 1, current time, no supply and
    /// [`INITIAL_WALLET_CAPACITY`] reserved wallet slots.
    pub fn new() -> Self {
        Self {
            version: 1,
            timestamp: chrono::Utc::now().timestamp().max(0) as u64,
            token_supply_total: 0.0,
            state_digest: [0; DIGEST_SIZE],
            prev_state_digest: [0; DIGEST_SIZE],
            wallets: Vec::with_capacity(INITIAL_WALLET_CAPACITY),
        }
    }

    pub fn wallets(&self) -> &[WalletRecord] {
        &self.wallets
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    /// Number of wallet slots available before the storage must grow.
    /// Always `>= wallet_count()`.
    pub fn wallets_capacity(&self) -> usize {
        self.wallets.capacity()
    }

    /// Drops the wallet storage owned by this snapshot, leaving it empty
    /// with no reserved slots. Scalar fields are untouched.
    pub fn release(&mut self) {
        self.wallets = Vec::new();
    }

    /// Installs freshly decoded wallet storage, replacing whatever was held.
    pub(crate) fn install_wallets(&mut self, wallets: Vec<WalletRecord>) {
        self.wallets = wallets;
    }

    pub fn find_wallet(&self, public_key: &PublicKey) -> Option<&WalletRecord> {
        self.wallets.iter().find(|w| &w.public_key == public_key)
    }

    pub fn find_wallet_mut(&mut self, public_key: &PublicKey) -> Option<&mut WalletRecord> {
        self.wallets.iter_mut().find(|w| &w.public_key == public_key)
    }

    /// Appends a wallet record, keeping first-seen order.
    ///
    /// Storage doubles when full (starting at 8 slots) and never exceeds
    /// [`MAX_WALLETS`].
    pub fn push_wallet(&mut self, record: WalletRecord) -> Result<()> {
        if self.find_wallet(&record.public_key).is_some() {
            return Err(StateError::WalletExists);
        }
        if self.wallets.len() >= MAX_WALLETS {
            return Err(StateError::CapacityExceeded { max: MAX_WALLETS });
        }

        if self.wallets.len() == self.wallets.capacity() {
            let current = self.wallets.capacity();
            let target = if current == 0 { 8 } else { current * 2 }.min(MAX_WALLETS);
            self.wallets.reserve_exact(target - self.wallets.len());
        }

        self.wallets.push(record);
        Ok(())
    }

    /// Reports whether this snapshot directly supersedes `prev` in the hash
    /// chain. Persistence never calls this; chain integrity is checked by
    /// the ledger above it.
    pub fn follows(&self, prev: &Snapshot) -> bool {
        self.prev_state_digest == prev.state_digest && self.version > prev.version
    }
}
