//! Whole-snapshot serialization into a single flat buffer.

use super::header::{decode_header, StateHeader};
use super::records::{decode_records_into, records_len, write_records};
use crate::error::{FormatError, StateError};
use crate::snapshot::Snapshot;
use crate::wallet::WalletRecord;
use tracing::{debug, warn};

/// Extra wallet slots reserved on every deserialize so the loaded snapshot
/// can absorb that many new wallets before reallocating.
pub const DEFAULT_WALLET_SLACK: usize = 100;

/// Exact number of bytes [`serialize_into`] writes for `snapshot`.
pub fn serialized_size(snapshot: &Snapshot) -> usize {
    StateHeader::SIZE + snapshot.wallet_count() * crate::wallet::RECORD_SIZE
}

/// Serializes `snapshot` into the front of `buf`.
///
/// Returns the number of bytes written, or `Ok(0)` when `buf` is smaller than
/// [`serialized_size`]. A real image is never empty because the header alone
/// is non-zero, so zero always means "retry with a larger buffer".
pub fn serialize_into(snapshot: &Snapshot, buf: &mut [u8]) -> Result<usize, FormatError> {
    let required = serialized_size(snapshot);
    if required > buf.len() {
        debug!(
            "Buffer too small for snapshot: need {} bytes, have {}",
            required,
            buf.len()
        );
        return Ok(0);
    }

    let header = StateHeader::for_snapshot(snapshot)?;
    buf[..StateHeader::SIZE].copy_from_slice(&header.to_bytes());
    write_records(snapshot.wallets(), &mut buf[StateHeader::SIZE..required]);

    Ok(required)
}

/// Serializes `snapshot` into an exactly-sized buffer.
pub fn serialize(snapshot: &Snapshot) -> Result<Vec<u8>, FormatError> {
    let mut buf = vec![0u8; serialized_size(snapshot)];
    let written = serialize_into(snapshot, &mut buf)?;
    buf.truncate(written);
    Ok(buf)
}

/// Rebuilds `dest` from a serialized image, reserving [`DEFAULT_WALLET_SLACK`]
/// spare wallet slots.
pub fn deserialize(dest: &mut Snapshot, bytes: &[u8]) -> crate::error::Result<()> {
    deserialize_with_slack(dest, bytes, DEFAULT_WALLET_SLACK)
}

/// Rebuilds `dest` from a serialized image.
///
/// Header errors leave `dest` untouched. Once the header is accepted, the
/// wallet storage `dest` owned is released; a truncated record section then
/// fails with `dest` left in that released state. On success `dest` holds
/// every decoded wallet in order with capacity of at least
/// `wallet_count + slack`. If that storage cannot be reserved the call fails
/// with [`StateError::AllocationFailed`] and `dest` stays released.
pub fn deserialize_with_slack(
    dest: &mut Snapshot,
    bytes: &[u8],
    slack: usize,
) -> crate::error::Result<()> {
    let header = decode_header(bytes)?;

    dest.release();

    let body = &bytes[StateHeader::SIZE..];
    let count = header.wallet_count as usize;
    let needed = records_len(count).unwrap_or(usize::MAX);
    if body.len() < needed {
        warn!(
            "Snapshot image truncated: header declares {} wallets ({} bytes), {} available",
            count,
            needed,
            body.len()
        );
        return Err(FormatError::RecordsTruncated {
            count: header.wallet_count,
            needed,
            available: body.len(),
        }
        .into());
    }
    if body.len() > needed {
        warn!(
            "Ignoring {} trailing bytes after wallet records",
            body.len() - needed
        );
    }

    let slots = count
        .checked_add(slack)
        .ok_or(StateError::AllocationFailed { slots: usize::MAX })?;
    let mut wallets: Vec<WalletRecord> = Vec::new();
    if wallets.try_reserve_exact(slots).is_err() {
        warn!("Cannot reserve {} wallet slots for snapshot", slots);
        return Err(StateError::AllocationFailed { slots });
    }
    decode_records_into(body, header.wallet_count, &mut wallets)?;

    dest.version = header.version;
    dest.timestamp = header.timestamp;
    dest.token_supply_total = header.token_supply_total;
    dest.state_digest = header.state_digest;
    dest.prev_state_digest = header.prev_state_digest;
    dest.install_wallets(wallets);

    debug!(
        "Deserialized snapshot v{} with {} wallets (capacity {})",
        dest.version,
        dest.wallet_count(),
        dest.wallets_capacity()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::header::FORMAT_VERSION;
    use crate::snapshot::DIGEST_SIZE;
    use crate::wallet::RECORD_SIZE;

    fn snapshot_with_wallets(n: u8) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.version = 3;
        snapshot.timestamp = 555;
        snapshot.token_supply_total = 999.99;
        snapshot.state_digest = [0x01; DIGEST_SIZE];
        snapshot.prev_state_digest = [0x02; DIGEST_SIZE];
        for i in 0..n {
            let mut record = WalletRecord::new([i + 1; 32], i as f64 * 1.25);
            record.nonce = i as u64 * 3;
            snapshot.push_wallet(record).unwrap();
        }
        snapshot
    }

    #[test]
    fn test_round_trip() {
        let original = snapshot_with_wallets(4);
        let bytes = serialize(&original).unwrap();
        assert_eq!(bytes.len(), StateHeader::SIZE + 4 * RECORD_SIZE);

        let mut restored = Snapshot::default();
        deserialize(&mut restored, &bytes).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_capacity_guard() {
        let snapshot = snapshot_with_wallets(2);
        let required = serialized_size(&snapshot);

        let mut small = vec![0u8; required - 1];
        assert_eq!(serialize_into(&snapshot, &mut small).unwrap(), 0);

        let mut exact = vec![0u8; required];
        assert_eq!(serialize_into(&snapshot, &mut exact).unwrap(), required);

        let mut large = vec![0u8; required + 64];
        assert_eq!(serialize_into(&snapshot, &mut large).unwrap(), required);
        assert_eq!(&large[..required], &exact[..]);
    }

    #[test]
    fn test_empty_snapshot_is_header_only() {
        let snapshot = snapshot_with_wallets(0);
        let bytes = serialize(&snapshot).unwrap();
        assert_eq!(bytes.len(), StateHeader::SIZE);

        let mut restored = snapshot_with_wallets(3);
        deserialize(&mut restored, &bytes).unwrap();
        assert_eq!(restored.wallet_count(), 0);
        assert!(restored.wallets_capacity() >= DEFAULT_WALLET_SLACK);
    }

    #[test]
    fn test_slack_allocation() {
        let bytes = serialize(&snapshot_with_wallets(7)).unwrap();

        let mut restored = Snapshot::default();
        deserialize(&mut restored, &bytes).unwrap();
        assert!(restored.wallets_capacity() >= 7 + DEFAULT_WALLET_SLACK);

        let mut tight = Snapshot::default();
        deserialize_with_slack(&mut tight, &bytes, 0).unwrap();
        assert!(tight.wallets_capacity() >= 7);
        assert_eq!(tight.wallet_count(), 7);
    }

    #[test]
    fn test_bad_magic_leaves_destination_untouched() {
        let mut bytes = serialize(&snapshot_with_wallets(1)).unwrap();
        bytes[2] ^= 0x10;

        let mut dest = snapshot_with_wallets(5);
        let before = dest.clone();
        let capacity = dest.wallets_capacity();

        let result = deserialize(&mut dest, &bytes);
        assert!(matches!(
            result,
            Err(StateError::Format(FormatError::BadMagic { .. }))
        ));
        assert_eq!(dest, before);
        assert_eq!(dest.wallets_capacity(), capacity);
    }

    #[test]
    fn test_bad_version_leaves_destination_untouched() {
        let mut bytes = serialize(&snapshot_with_wallets(1)).unwrap();
        bytes[4..8].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());

        let mut dest = snapshot_with_wallets(2);
        let before = dest.clone();
        let result = deserialize(&mut dest, &bytes);
        assert!(matches!(
            result,
            Err(StateError::Format(FormatError::UnsupportedVersion {
                found: 2,
                ..
            }))
        ));
        assert_eq!(dest, before);
    }

    #[test]
    fn test_truncated_records_rejected() {
        let bytes = serialize(&snapshot_with_wallets(3)).unwrap();
        let cut = &bytes[..bytes.len() - RECORD_SIZE / 2];

        let mut dest = snapshot_with_wallets(2);
        let result = deserialize(&mut dest, cut);
        assert!(matches!(
            result,
            Err(StateError::Format(FormatError::RecordsTruncated {
                count: 3,
                ..
            }))
        ));
        assert_eq!(dest.wallet_count(), 0);
    }

    #[test]
    fn test_huge_declared_count_does_not_allocate() {
        let mut bytes = serialize(&snapshot_with_wallets(0)).unwrap();
        bytes[24..28].copy_from_slice(&u32::MAX.to_le_bytes());

        let mut dest = Snapshot::default();
        let result = deserialize(&mut dest, &bytes);
        assert!(matches!(
            result,
            Err(StateError::Format(FormatError::RecordsTruncated { .. }))
        ));
        assert_eq!(dest.wallets_capacity(), 0);
    }

    #[test]
    fn test_unreservable_slack_is_io_error() {
        let bytes = serialize(&snapshot_with_wallets(1)).unwrap();

        for slack in [usize::MAX, isize::MAX as usize / 2] {
            let mut dest = snapshot_with_wallets(3);
            let err = deserialize_with_slack(&mut dest, &bytes, slack).unwrap_err();
            assert!(matches!(err, StateError::AllocationFailed { .. }));
            assert!(err.is_io());
            assert_eq!(dest.wallet_count(), 0);
        }
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let original = snapshot_with_wallets(2);
        let mut bytes = serialize(&original).unwrap();
        bytes.extend_from_slice(&[0xEE; 10]);

        let mut restored = Snapshot::default();
        deserialize(&mut restored, &bytes).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_repeated_loads_replace_wallets() {
        let first = serialize(&snapshot_with_wallets(6)).unwrap();
        let second = serialize(&snapshot_with_wallets(2)).unwrap();

        let mut dest = Snapshot::default();
        deserialize(&mut dest, &first).unwrap();
        deserialize(&mut dest, &second).unwrap();
        assert_eq!(dest, snapshot_with_wallets(2));
    }
}
