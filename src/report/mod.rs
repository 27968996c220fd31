//! Report generation for program stream parsing results

use serde::Serialize;

use crate::clock::ClockState;
use crate::processor::SystemParser;
use crate::stats::{StreamKind, StreamStats};
use crate::types::{StreamInfo, SystemHeader};

/// Per stream entry of the report
#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub stream_id: u8,
    pub kind: StreamKind,
    pub packets: u64,
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_pts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<u32>,
}

impl From<&StreamStats> for StreamReport {
    fn from(s: &StreamStats) -> Self {
        Self {
            stream_id: s.stream_id,
            kind: s.kind,
            packets: s.packets,
            bytes: s.bytes,
            bitrate_kbps: s.bitrate_kbps().map(|b| (b * 10.0).round() / 10.0),
            first_pts: s.first_pts,
            last_pts: s.last_pts,
            buffer_size: s.buffer_size,
        }
    }
}

/// Header and chunk counters
#[derive(Debug, Clone, Serialize)]
pub struct Counters {
    pub bytes: u64,
    pub skipped_bytes: u64,
    pub pack_headers: u64,
    pub system_headers: u64,
    pub malformed_headers: u64,
    pub unrecognized: u64,
    pub index_entries: usize,
}

/// Complete parse report
#[derive(Debug, Clone, Serialize)]
pub struct ParseReport {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_info: Option<StreamInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_ms: Option<u128>,
    pub clock: ClockState,
    pub counters: Counters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_header: Option<SystemHeader>,
    pub streams: Vec<StreamReport>,
}

/// Report generator for parse results
pub struct Reporter;

impl Reporter {
    /// Generate a structured ParseReport for API consumers
    pub fn create_report(parser: &SystemParser) -> ParseReport {
        let stats = parser.stats();
        ParseReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            stream_info: parser.stream_info(),
            position_ms: parser.position().map(|p| p.as_millis()),
            clock: parser.tracker().state(),
            counters: Counters {
                bytes: stats.bytes(),
                skipped_bytes: parser.skipped_bytes(),
                pack_headers: stats.pack_headers(),
                system_headers: stats.system_headers(),
                malformed_headers: stats.malformed_headers(),
                unrecognized: stats.unrecognized(),
                index_entries: parser.index().len(),
            },
            system_header: parser.system_header().cloned(),
            streams: stats.iter().map(StreamReport::from).collect(),
        }
    }

    /// Generate pretty-printed JSON string for CLI output
    pub fn generate_json_report(parser: &SystemParser) -> String {
        let rep = Self::create_report(parser);
        serde_json::to_string_pretty(&rep)
            .unwrap_or_else(|_| "{\"error\": \"JSON serialization failed\"}".to_string())
    }
}
