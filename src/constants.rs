//! Constants for MPEG program stream parsing and SCR handling

/// Start code prefix shared by every system-level chunk
pub const START_CODE_PREFIX: [u8; 3] = [0x00, 0x00, 0x01];

/// System-level start code ids
pub const PROGRAM_END_CODE: u8 = 0xB9;
pub const PACK_START_CODE: u8 = 0xBA;
pub const SYSTEM_HEADER_START_CODE: u8 = 0xBB;
pub const PROGRAM_STREAM_MAP: u8 = 0xBC;
pub const PRIVATE_STREAM_1: u8 = 0xBD;
pub const PADDING_STREAM: u8 = 0xBE;
pub const PRIVATE_STREAM_2: u8 = 0xBF;
pub const PROGRAM_STREAM_DIRECTORY: u8 = 0xFF;

/// Pack header sizes (start code included)
pub const MPEG1_PACK_HEADER_LEN: usize = 12;
pub const MPEG2_PACK_HEADER_LEN: usize = 14;

/// Start code + 16-bit packet length
pub const PACKET_LENGTH_PREFIX: usize = 6;

/// SCR / PTS clock: 90 kHz
pub const CLOCK_FREQ: u64 = 90_000;
/// SCR extension runs at 27 MHz, i.e. 300 extension ticks per base tick
pub const SCR_EXT_DIVISOR: u64 = 300;
/// mux_rate is expressed in units of 50 bytes/second
pub const MUX_RATE_BYTES_UNIT: u64 = 50;
/// ... which is 400 bits/second
pub const MUX_RATE_BITS_UNIT: u64 = 400;

/// Maximum tolerated deviation between predicted and observed SCR
pub const DEFAULT_MAX_DISCONT: u64 = 10_000;

pub const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Convert 90 kHz ticks to nanoseconds (ticks * 1e9 / 90000)
pub const fn mpegtime_to_ns(ticks: u64) -> u64 {
    ticks * 100_000 / 9
}

/// Convert nanoseconds to 90 kHz ticks
pub const fn ns_to_mpegtime(ns: u64) -> u64 {
    ns * 9 / 100_000
}
