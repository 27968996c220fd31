//! System header (`00 00 01 BB`) parser

use bitstream_io::{BigEndian, BitRead, BitReader};

use crate::constants::PACKET_LENGTH_PREFIX;
use crate::error::{PsError, PsResult};
use crate::types::{StreamBound, SystemHeader};

use super::utils::ensure_len;

const FIXED_PART_LEN: usize = 6;
const STREAM_ENTRY_LEN: usize = 3;

fn bad(reason: &str) -> PsError {
    PsError::BadSystemHeader(reason.to_string())
}

/// Parse a complete system header chunk, start code included
pub fn parse_system_header(buf: &[u8]) -> PsResult<SystemHeader> {
    ensure_len(buf, PACKET_LENGTH_PREFIX + FIXED_PART_LEN)?;
    let header_length = u16::from_be_bytes([buf[4], buf[5]]) as usize;
    let end = PACKET_LENGTH_PREFIX + header_length;
    ensure_len(buf, end)?;
    if header_length < FIXED_PART_LEN {
        return Err(bad("header_length too small"));
    }
    let body = &buf[PACKET_LENGTH_PREFIX..end];

    let mut br = BitReader::endian(&body[..FIXED_PART_LEN], BigEndian);
    let map_io = |_| bad("truncated fixed part");

    if br.read::<1, u8>().map_err(map_io)? != 1 {
        return Err(bad("missing marker before rate_bound"));
    }
    let rate_bound = br.read::<22, u32>().map_err(map_io)?;
    br.skip(1).map_err(map_io)?; // marker
    let audio_bound = br.read::<6, u8>().map_err(map_io)?;
    let fixed = br.read_bit().map_err(map_io)?;
    let constrained = br.read_bit().map_err(map_io)?;
    let audio_lock = br.read_bit().map_err(map_io)?;
    let video_lock = br.read_bit().map_err(map_io)?;
    br.skip(1).map_err(map_io)?; // marker
    let video_bound = br.read::<5, u8>().map_err(map_io)?;
    // packet_rate_restriction_flag + reserved bits are not kept

    let mut streams = Vec::new();
    let mut rest = &body[FIXED_PART_LEN..];
    while rest.len() >= STREAM_ENTRY_LEN && rest[0] & 0x80 != 0 {
        let mut br = BitReader::endian(&rest[..STREAM_ENTRY_LEN], BigEndian);
        let stream_id = br.read::<8, u8>().map_err(map_io)?;
        if br.read::<2, u8>().map_err(map_io)? != 0b11 {
            return Err(bad("stream entry marker bits"));
        }
        let buffer_bound_scale = br.read_bit().map_err(map_io)?;
        let buffer_size_bound = br.read::<13, u16>().map_err(map_io)?;
        streams.push(StreamBound {
            stream_id,
            buffer_bound_scale,
            buffer_size_bound,
        });
        rest = &rest[STREAM_ENTRY_LEN..];
    }

    Ok(SystemHeader {
        rate_bound,
        audio_bound,
        video_bound,
        fixed,
        constrained,
        audio_lock,
        video_lock,
        streams,
    })
}
