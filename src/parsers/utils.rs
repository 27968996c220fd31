//! Common parsing utilities

use crate::error::{PsError, PsResult};

/// Decode a 33-bit PTS/DTS stored as `prefix:4 ts[32:30] 1 ts[29:15] 1 ts[14:0] 1`
pub fn read_timestamp(p: &[u8]) -> Option<u64> {
    if p.len() < 5 {
        return None;
    }
    // marker bits must be set
    if p[0] & 0x01 == 0 || p[2] & 0x01 == 0 || p[4] & 0x01 == 0 {
        return None;
    }
    Some(
        ((p[0] as u64 & 0x0E) << 29)
            | ((p[1] as u64) << 22)
            | (((p[2] as u64 & 0xFE) >> 1) << 15)
            | ((p[3] as u64) << 7)
            | ((p[4] as u64) >> 1),
    )
}

/// Big-endian u32 at `at`, or a short-buffer error
pub fn be_u32(buf: &[u8], at: usize) -> PsResult<u32> {
    let bytes = buf
        .get(at..at + 4)
        .ok_or_else(|| PsError::short(at + 4, buf.len()))?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn ensure_len(buf: &[u8], needed: usize) -> PsResult<()> {
    if buf.len() < needed {
        return Err(PsError::short(needed, buf.len()));
    }
    Ok(())
}
