use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::constants::*;

/// System stream flavour, learnt from the first pack header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
}

impl MpegVersion {
    pub fn number(self) -> u8 {
        match self {
            MpegVersion::Mpeg1 => 1,
            MpegVersion::Mpeg2 => 2,
        }
    }
}

/// What a chunk's start code id says it is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    PackHeader,
    SystemHeader,
    ProgramEnd,
    /// PES packet (MPEG-2) or packet (MPEG-1), keyed by stream id
    Packet(u8),
    /// Start code that has no meaning at system level
    Unknown(u8),
}

/// One start-code delimited unit of the program stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: u8,
    /// Absolute byte offset of the start code in the input
    pub offset: u64,
    /// Whole chunk, start code included
    pub data: Bytes,
}

impl Chunk {
    pub fn new(id: u8, offset: u64, data: Bytes) -> Self {
        Self { id, offset, data }
    }

    pub fn kind(&self) -> ChunkKind {
        match self.id {
            PACK_START_CODE => ChunkKind::PackHeader,
            SYSTEM_HEADER_START_CODE => ChunkKind::SystemHeader,
            PROGRAM_END_CODE => ChunkKind::ProgramEnd,
            id if id >= PROGRAM_STREAM_MAP => ChunkKind::Packet(id),
            id => ChunkKind::Unknown(id),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Decoded pack header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackHeader {
    pub version: MpegVersion,
    /// SCR in 90 kHz ticks
    pub scr: u64,
    /// 27 MHz extension (always 0 for MPEG-1)
    pub scr_ext: u16,
    /// Multiplex rate in units of 50 bytes/second
    pub mux_rate: u32,
}

/// P-STD buffer bound announced for one stream in the system header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamBound {
    pub stream_id: u8,
    pub buffer_bound_scale: bool,
    pub buffer_size_bound: u16,
}

impl StreamBound {
    /// Buffer size in bytes
    pub fn buffer_size(&self) -> u32 {
        let unit = if self.buffer_bound_scale { 1024 } else { 128 };
        self.buffer_size_bound as u32 * unit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemHeader {
    pub rate_bound: u32,
    pub audio_bound: u8,
    pub video_bound: u8,
    pub fixed: bool,
    pub constrained: bool,
    pub audio_lock: bool,
    pub video_lock: bool,
    pub streams: Vec<StreamBound>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesHeader {
    pub stream_id: u8,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    /// Offset of the elementary stream payload within the chunk
    pub payload_offset: usize,
}

/// Stream properties published whenever the mux rate changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub mpeg_version: u8,
    /// Bits per second
    pub bitrate: u64,
}

/// Units accepted by conversion and seeking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Bytes,
    /// Nanoseconds
    Time,
    /// 90 kHz SCR ticks
    Scr,
}

/// Known-good position carried by an upstream discontinuity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscontSeed {
    pub byte_offset: Option<u64>,
    pub time: Option<Duration>,
}

/// Where the caller must reposition its input after a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekTarget {
    pub byte_offset: u64,
    /// Expected SCR at that offset, in 90 kHz ticks
    pub expected_scr: u64,
}

/// Output of the system parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// Chunk forwarded downstream, stamped with the current SCR time
    Data {
        chunk: Chunk,
        timestamp: Option<Duration>,
    },
    /// Time base jumped; carries the corrected timestamp
    Discont { timestamp: Duration },
    StreamInfo(StreamInfo),
    Unrecognized { id: u8, offset: u64 },
    End,
}

/// Parser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Wait on the SCR clock before releasing data
    #[serde(default)]
    pub sync: bool,
    /// Maximum allowed SCR discontinuity in 90 kHz ticks
    #[serde(default = "default_max_discont")]
    pub max_discont: u64,
    /// Record a byte/time association per pack header
    #[serde(default = "default_true")]
    pub index: bool,
}

fn default_max_discont() -> u64 {
    DEFAULT_MAX_DISCONT
}

fn default_true() -> bool {
    true
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            sync: false,
            max_discont: DEFAULT_MAX_DISCONT,
            index: true,
        }
    }
}

/// Configuration options for the inspector
pub struct Options {
    pub source: Source,
    pub refresh_secs: u64,
    pub config: ParseConfig,
    /// Seek to this position before reading (file input only)
    pub start: Option<Duration>,
    /// Print every event as it is produced
    pub print_events: bool,
}

/// Where the program stream comes from
#[derive(Debug, Clone)]
pub enum Source {
    File(std::path::PathBuf),
    Udp(std::net::SocketAddr),
}
