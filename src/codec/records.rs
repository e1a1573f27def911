use crate::error::FormatError;
use crate::wallet::{WalletRecord, RECORD_SIZE};

/// Bytes occupied by `count` encoded records, or `None` on overflow.
pub fn records_len(count: usize) -> Option<usize> {
    count.checked_mul(RECORD_SIZE)
}

/// Concatenates the records as fixed-size blocks, in order.
pub fn encode_records(records: &[WalletRecord]) -> Vec<u8> {
    let mut buf = vec![0u8; records.len() * RECORD_SIZE];
    write_records(records, &mut buf);
    buf
}

/// Writes every record into `buf`, which must hold `records.len() * RECORD_SIZE` bytes.
pub(crate) fn write_records(records: &[WalletRecord], buf: &mut [u8]) {
    for (record, chunk) in records.iter().zip(buf.chunks_exact_mut(RECORD_SIZE)) {
        record.write_to(chunk);
    }
}

/// Decodes `count` records from the front of `bytes`.
pub fn decode_records(bytes: &[u8], count: u32) -> Result<Vec<WalletRecord>, FormatError> {
    let mut records = Vec::new();
    decode_records_into(bytes, count, &mut records)?;
    Ok(records)
}

/// Appends `count` decoded records to `out`. Nothing is appended on error,
/// and no byte past `count * RECORD_SIZE` is touched.
pub(crate) fn decode_records_into(
    bytes: &[u8],
    count: u32,
    out: &mut Vec<WalletRecord>,
) -> Result<(), FormatError> {
    let truncated = |needed| FormatError::RecordsTruncated {
        count,
        needed,
        available: bytes.len(),
    };

    let needed = records_len(count as usize).ok_or_else(|| truncated(usize::MAX))?;
    if bytes.len() < needed {
        return Err(truncated(needed));
    }

    out.reserve(count as usize);
    out.extend(bytes[..needed].chunks_exact(RECORD_SIZE).map(|chunk| {
        let mut block = [0u8; RECORD_SIZE];
        block.copy_from_slice(chunk);
        WalletRecord::from_bytes(&block)
    }));
    Ok(())
}
