//! Pack header parsers
//!
//! A pack header starts with `00 00 01 BA` and carries the System Clock
//! Reference plus the multiplex rate. The bit packing differs between
//! MPEG-1 (ISO 11172-1) and MPEG-2 (ISO 13818-1); both layouts are decoded
//! from two big-endian words following the start code.

use crate::constants::*;
use crate::error::{PsError, PsResult};
use crate::types::{MpegVersion, PackHeader};

use super::utils::{be_u32, ensure_len};

/// Tell the two layouts apart from the first byte after the start code
pub fn detect_version(marker: u8) -> Option<MpegVersion> {
    if marker & 0xC0 == 0x40 {
        Some(MpegVersion::Mpeg2)
    } else if marker & 0xF0 == 0x20 {
        Some(MpegVersion::Mpeg1)
    } else {
        None
    }
}

/// Decode an MPEG-2 pack header (at least 14 bytes, start code included)
///
/// ```text
/// w1: 01 scr[32:30] 1 scr[29:15] 1 scr[14:5]
/// w2: scr[4:0] 1 scr_ext[8:0] 1 mux_rate[21:14]...
/// ```
pub fn parse_mpeg2_pack_header(buf: &[u8]) -> PsResult<PackHeader> {
    ensure_len(buf, MPEG2_PACK_HEADER_LEN)?;
    if detect_version(buf[4]) != Some(MpegVersion::Mpeg2) {
        return Err(PsError::BadPackHeader(buf[4]));
    }

    let scr1 = be_u32(buf, 4)? as u64;
    let scr2 = be_u32(buf, 8)? as u64;

    let mut scr = (scr1 & 0x3800_0000) << 3;
    scr |= (scr1 & 0x03ff_f800) << 4;
    scr |= (scr1 & 0x0000_03ff) << 5;
    scr |= (scr2 & 0xf800_0000) >> 27;

    let scr_ext = (scr2 & 0x03fe_0000) >> 17;
    let scr = (scr * SCR_EXT_DIVISOR + scr_ext % SCR_EXT_DIVISOR) / SCR_EXT_DIVISOR;

    let mux_rate = (be_u32(buf, 10)? & 0xffff_fc00) >> 10;

    Ok(PackHeader {
        version: MpegVersion::Mpeg2,
        scr,
        scr_ext: scr_ext as u16,
        mux_rate,
    })
}

/// Decode an MPEG-1 pack header (12 bytes, start code included)
///
/// ```text
/// 0010 scr[32:30] 1 scr[29:15] 1 scr[14:0] 1 | 1 mux_rate[21:0] 1
/// ```
pub fn parse_mpeg1_pack_header(buf: &[u8]) -> PsResult<PackHeader> {
    ensure_len(buf, MPEG1_PACK_HEADER_LEN)?;
    if detect_version(buf[4]) != Some(MpegVersion::Mpeg1) {
        return Err(PsError::BadPackHeader(buf[4]));
    }

    let scr1 = be_u32(buf, 4)? as u64;
    let scr2 = be_u32(buf, 8)? as u64;

    let mut scr = (scr1 & 0x0e00_0000) << 5;
    scr |= (scr1 & 0x00ff_fe00) << 6;
    scr |= (scr1 & 0x0000_00ff) << 7;
    scr |= (scr2 & 0xfe00_0000) >> 25;

    // the rate straddles bytes 9..12, read byte by byte to stay inside 12 bytes
    let mut mux_rate = (buf[9] as u32 & 0x7f) << 15;
    mux_rate |= (buf[10] as u32) << 7;
    mux_rate |= (buf[11] as u32) >> 1;

    Ok(PackHeader {
        version: MpegVersion::Mpeg1,
        scr,
        scr_ext: 0,
        mux_rate,
    })
}

pub fn parse_pack_header(version: MpegVersion, buf: &[u8]) -> PsResult<PackHeader> {
    match version {
        MpegVersion::Mpeg1 => parse_mpeg1_pack_header(buf),
        MpegVersion::Mpeg2 => parse_mpeg2_pack_header(buf),
    }
}
