//! Per stream id statistics

use std::collections::BTreeMap;

use serde::Serialize;

use crate::constants::*;
use crate::types::{PesHeader, StreamBound};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamKind {
    Video,
    Audio,
    Private1,
    Private2,
    Padding,
    Other,
}

impl StreamKind {
    pub fn from_stream_id(id: u8) -> Self {
        match id {
            0xE0..=0xEF => StreamKind::Video,
            0xC0..=0xDF => StreamKind::Audio,
            PRIVATE_STREAM_1 => StreamKind::Private1,
            PRIVATE_STREAM_2 => StreamKind::Private2,
            PADDING_STREAM => StreamKind::Padding,
            _ => StreamKind::Other,
        }
    }
}

/// Rolling statistics for one stream id
#[derive(Debug, Clone, Serialize)]
pub struct StreamStats {
    pub stream_id: u8,
    pub kind: StreamKind,
    pub packets: u64,
    pub bytes: u64,
    pub first_pts: Option<u64>,
    pub last_pts: Option<u64>,
    /// P-STD buffer size announced by the system header
    pub buffer_size: Option<u32>,
    /// SCR of the first packet seen
    #[serde(skip)]
    first_scr: Option<u64>,
    #[serde(skip)]
    last_scr: Option<u64>,
}

impl StreamStats {
    fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            kind: StreamKind::from_stream_id(stream_id),
            packets: 0,
            bytes: 0,
            first_pts: None,
            last_pts: None,
            buffer_size: None,
            first_scr: None,
            last_scr: None,
        }
    }

    /// Average bitrate over the SCR span this stream was seen in
    pub fn bitrate_kbps(&self) -> Option<f64> {
        let span = self.last_scr?.checked_sub(self.first_scr?)?;
        if span == 0 {
            return None;
        }
        let seconds = span as f64 / CLOCK_FREQ as f64;
        Some((self.bytes as f64 * 8.0 / 1000.0) / seconds)
    }
}

/// Manages per stream statistics
#[derive(Debug, Default)]
pub struct StatsManager {
    streams: BTreeMap<u8, StreamStats>,
    pack_headers: u64,
    system_headers: u64,
    malformed_headers: u64,
    unrecognized: u64,
    bytes: u64,
}

impl StatsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams announced by a system header
    pub fn register_bounds(&mut self, bounds: &[StreamBound]) {
        self.system_headers += 1;
        for b in bounds {
            self.streams
                .entry(b.stream_id)
                .or_insert_with(|| StreamStats::new(b.stream_id))
                .buffer_size = Some(b.buffer_size());
        }
    }

    pub fn update_packet(&mut self, header: &PesHeader, len: usize, scr: Option<u64>) {
        let stats = self
            .streams
            .entry(header.stream_id)
            .or_insert_with(|| StreamStats::new(header.stream_id));
        stats.packets += 1;
        stats.bytes += len as u64;
        if let Some(pts) = header.pts {
            stats.first_pts.get_or_insert(pts);
            stats.last_pts = Some(pts);
        }
        if let Some(scr) = scr {
            stats.first_scr.get_or_insert(scr);
            stats.last_scr = Some(scr);
        }
    }

    pub fn count_bytes(&mut self, len: usize) {
        self.bytes += len as u64;
    }

    pub fn count_pack_header(&mut self) {
        self.pack_headers += 1;
    }

    pub fn count_malformed(&mut self) {
        self.malformed_headers += 1;
    }

    pub fn count_unrecognized(&mut self) {
        self.unrecognized += 1;
    }

    pub fn get(&self, stream_id: u8) -> Option<&StreamStats> {
        self.streams.get(&stream_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamStats> {
        self.streams.values()
    }

    pub fn pack_headers(&self) -> u64 {
        self.pack_headers
    }

    pub fn system_headers(&self) -> u64 {
        self.system_headers
    }

    pub fn malformed_headers(&self) -> u64 {
        self.malformed_headers
    }

    pub fn unrecognized(&self) -> u64 {
        self.unrecognized
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pes(stream_id: u8, pts: Option<u64>) -> PesHeader {
        PesHeader {
            stream_id,
            pts,
            dts: None,
            payload_offset: 14,
        }
    }

    #[test]
    fn kinds_by_stream_id() {
        assert_eq!(StreamKind::from_stream_id(0xE3), StreamKind::Video);
        assert_eq!(StreamKind::from_stream_id(0xC1), StreamKind::Audio);
        assert_eq!(StreamKind::from_stream_id(0xBD), StreamKind::Private1);
        assert_eq!(StreamKind::from_stream_id(0xBE), StreamKind::Padding);
        assert_eq!(StreamKind::from_stream_id(0xFF), StreamKind::Other);
    }

    #[test]
    fn packets_and_pts_range() {
        let mut m = StatsManager::new();
        m.update_packet(&pes(0xE0, Some(3_600)), 1000, Some(0));
        m.update_packet(&pes(0xE0, None), 1000, Some(45_000));
        m.update_packet(&pes(0xE0, Some(7_200)), 500, Some(90_000));
        let s = m.get(0xE0).unwrap();
        assert_eq!(s.packets, 3);
        assert_eq!(s.bytes, 2500);
        assert_eq!(s.first_pts, Some(3_600));
        assert_eq!(s.last_pts, Some(7_200));
        // 2500 bytes over one second of SCR
        assert_eq!(s.bitrate_kbps(), Some(20.0));
    }

    #[test]
    fn bitrate_needs_a_time_span() {
        let mut m = StatsManager::new();
        m.update_packet(&pes(0xC0, None), 100, Some(10));
        assert_eq!(m.get(0xC0).unwrap().bitrate_kbps(), None);
    }

    #[test]
    fn system_header_bounds() {
        let mut m = StatsManager::new();
        m.register_bounds(&[StreamBound {
            stream_id: 0xE0,
            buffer_bound_scale: true,
            buffer_size_bound: 46,
        }]);
        assert_eq!(m.system_headers(), 1);
        assert_eq!(m.get(0xE0).unwrap().buffer_size, Some(46 * 1024));
        assert_eq!(m.get(0xE0).unwrap().packets, 0);
    }
}
