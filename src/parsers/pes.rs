//! PES header (MPEG-2) and packet header (MPEG-1) timestamp extraction

use crate::constants::*;
use crate::error::{PsError, PsResult};
use crate::types::{MpegVersion, PesHeader};

use super::utils::{ensure_len, read_timestamp};

/// MPEG-1 allows at most 16 stuffing bytes
const MAX_STUFFING: usize = 16;

/// Streams whose payload follows the length field directly
fn has_no_header_extension(stream_id: u8) -> bool {
    matches!(
        stream_id,
        PROGRAM_STREAM_MAP
            | PADDING_STREAM
            | PRIVATE_STREAM_2
            | 0xF0 // ECM
            | 0xF1 // EMM
            | 0xF2 // DSMCC
            | 0xF8 // H.222.1 type E
            | PROGRAM_STREAM_DIRECTORY
    )
}

fn bad(stream_id: u8, reason: &str) -> PsError {
    PsError::BadPesHeader {
        stream_id,
        reason: reason.to_string(),
    }
}

/// Parse the header of a packet chunk (start code included)
pub fn parse_pes_header(version: MpegVersion, buf: &[u8]) -> PsResult<PesHeader> {
    ensure_len(buf, PACKET_LENGTH_PREFIX)?;
    let stream_id = buf[3];

    if has_no_header_extension(stream_id) {
        return Ok(PesHeader {
            stream_id,
            pts: None,
            dts: None,
            payload_offset: PACKET_LENGTH_PREFIX,
        });
    }

    match version {
        MpegVersion::Mpeg2 => parse_mpeg2(stream_id, buf),
        MpegVersion::Mpeg1 => parse_mpeg1(stream_id, buf),
    }
}

fn parse_mpeg2(stream_id: u8, buf: &[u8]) -> PsResult<PesHeader> {
    ensure_len(buf, 9)?;
    if buf[6] & 0xC0 != 0x80 {
        return Err(bad(stream_id, "missing '10' marker"));
    }
    let flags = buf[7] >> 6;
    let payload_offset = 9 + buf[8] as usize;
    ensure_len(buf, payload_offset)?;

    let (pts, dts) = match flags {
        0b10 => (Some(timestamp(stream_id, buf, 9)?), None),
        0b11 => (
            Some(timestamp(stream_id, buf, 9)?),
            Some(timestamp(stream_id, buf, 14)?),
        ),
        0b00 => (None, None),
        _ => return Err(bad(stream_id, "forbidden PTS_DTS_flags value")),
    };

    Ok(PesHeader {
        stream_id,
        pts,
        dts,
        payload_offset,
    })
}

fn parse_mpeg1(stream_id: u8, buf: &[u8]) -> PsResult<PesHeader> {
    let mut pos = PACKET_LENGTH_PREFIX;

    let mut stuffing = 0;
    while buf.get(pos) == Some(&0xFF) {
        stuffing += 1;
        if stuffing > MAX_STUFFING {
            return Err(bad(stream_id, "too many stuffing bytes"));
        }
        pos += 1;
    }

    ensure_len(buf, pos + 1)?;
    if buf[pos] & 0xC0 == 0x40 {
        // STD_buffer_scale + STD_buffer_size
        pos += 2;
        ensure_len(buf, pos + 1)?;
    }

    let (pts, dts) = match buf[pos] & 0xF0 {
        0x20 => {
            let pts = timestamp(stream_id, buf, pos)?;
            pos += 5;
            (Some(pts), None)
        }
        0x30 => {
            let pts = timestamp(stream_id, buf, pos)?;
            let dts = timestamp(stream_id, buf, pos + 5)?;
            pos += 10;
            (Some(pts), Some(dts))
        }
        _ if buf[pos] == 0x0F => {
            pos += 1;
            (None, None)
        }
        _ => return Err(bad(stream_id, "unexpected byte in packet header")),
    };

    Ok(PesHeader {
        stream_id,
        pts,
        dts,
        payload_offset: pos,
    })
}

fn timestamp(stream_id: u8, buf: &[u8], at: usize) -> PsResult<u64> {
    buf.get(at..)
        .and_then(read_timestamp)
        .ok_or_else(|| bad(stream_id, "truncated or unmarked timestamp"))
}
