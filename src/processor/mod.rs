//! Program stream system parser
//!
//! Drives the packetizer, parses system-level headers, keeps the SCR tracker
//! up to date and stamps every forwarded chunk with the current SCR time.

use std::time::Duration;

use log::{debug, info, warn};

use crate::clock::ScrTracker;
use crate::constants::*;
use crate::error::{PsError, PsResult};
use crate::index::SeekIndex;
use crate::packetize::Packetizer;
use crate::parsers::{detect_version, parse_pack_header, parse_pes_header, parse_system_header};
use crate::stats::StatsManager;
use crate::types::{
    Chunk, ChunkKind, DiscontSeed, Format, MpegVersion, ParseConfig, ParseEvent, SeekTarget,
    StreamInfo, SystemHeader,
};

pub struct SystemParser {
    config: ParseConfig,
    packetizer: Packetizer,
    tracker: ScrTracker,
    index: SeekIndex,
    stats: StatsManager,
    stream_info: Option<StreamInfo>,
    version: Option<MpegVersion>,
    system_header: Option<SystemHeader>,
    /// First SCR of the stream, origin for byte offsets in conversion seeks
    base_scr: Option<u64>,
    /// Data is withheld until a fresh SCR allows announcing the new time base
    discont_pending: bool,
    /// No pack header parsed since the last restart
    scr_pending: bool,
}

impl SystemParser {
    pub fn new(config: ParseConfig) -> Self {
        Self {
            tracker: ScrTracker::new(config.max_discont),
            config,
            packetizer: Packetizer::new(),
            index: SeekIndex::new(),
            stats: StatsManager::new(),
            stream_info: None,
            version: None,
            system_header: None,
            base_scr: None,
            discont_pending: false,
            scr_pending: false,
        }
    }

    /// Stream start: forget everything but the configuration
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    pub fn set_max_discont(&mut self, max_discont: u64) {
        self.config.max_discont = max_discont;
        self.tracker.set_max_discont(max_discont);
    }

    pub fn set_sync(&mut self, sync: bool) {
        self.config.sync = sync;
    }

    /// Feed input bytes, returning the events for every complete chunk
    pub fn push(&mut self, data: &[u8]) -> Vec<ParseEvent> {
        self.packetizer.push(data);
        let mut events = Vec::new();
        while let Some(chunk) = self.packetizer.next_chunk() {
            self.process_chunk(chunk, &mut events);
        }
        events
    }

    /// End of input; an incomplete trailing chunk is dropped
    pub fn finish(&mut self) {
        let pending = self.packetizer.pending();
        if pending > 0 {
            debug!("dropping {pending} trailing bytes at end of stream");
        }
        self.packetizer.reset_to(self.packetizer.offset() + pending as u64);
    }

    /// Handle one chunk, appending the resulting events
    pub fn process_chunk(&mut self, chunk: Chunk, events: &mut Vec<ParseEvent>) {
        debug!("have chunk 0x{:02X} at {}", chunk.id, chunk.offset);
        let version = self.version().unwrap_or(MpegVersion::Mpeg2);
        self.stats.count_bytes(chunk.len());

        match chunk.kind() {
            ChunkKind::PackHeader => self.handle_pack_header(&chunk, events),
            ChunkKind::SystemHeader => match parse_system_header(&chunk.data) {
                Ok(hdr) => {
                    self.stats.register_bounds(&hdr.streams);
                    self.system_header = Some(hdr);
                }
                Err(e) => {
                    warn!("system header at {}: {e}", chunk.offset);
                    self.stats.count_malformed();
                }
            },
            ChunkKind::Packet(id) => {
                if version == MpegVersion::Mpeg2 && !(PRIVATE_STREAM_1..=0xFE).contains(&id) {
                    debug!("unusual stream id 0x{id:02X} in MPEG-2 stream");
                }
                match parse_pes_header(version, &chunk.data) {
                    Ok(hdr) => {
                        let scr = self.tracker.current_scr();
                        self.stats.update_packet(&hdr, chunk.len(), scr);
                    }
                    Err(e) => {
                        warn!("packet at {}: {e}", chunk.offset);
                        self.stats.count_malformed();
                    }
                }
            }
            ChunkKind::ProgramEnd => {}
            ChunkKind::Unknown(id) => {
                warn!("unknown start code 0x{id:02X} at {}", chunk.offset);
                self.stats.count_unrecognized();
                events.push(ParseEvent::Unrecognized {
                    id,
                    offset: chunk.offset,
                });
                self.tracker.advance(chunk.len() as u64);
                return;
            }
        }

        let is_end = chunk.kind() == ChunkKind::ProgramEnd;
        self.send_data(chunk, events);
        if is_end {
            events.push(ParseEvent::End);
        }
    }

    fn handle_pack_header(&mut self, chunk: &Chunk, events: &mut Vec<ParseEvent>) {
        let Some(version) = chunk.data.get(4).copied().and_then(detect_version) else {
            warn!("unrecognized pack header layout at {}", chunk.offset);
            self.stats.count_malformed();
            return;
        };
        self.version = Some(version);

        let header = match parse_pack_header(version, &chunk.data) {
            Ok(h) => h,
            Err(e) => {
                warn!("pack header at {}: {e}", chunk.offset);
                self.stats.count_malformed();
                return;
            }
        };
        self.stats.count_pack_header();

        let update = self.tracker.apply(&header);
        self.scr_pending = false;
        self.base_scr.get_or_insert(update.scr);
        let time = Duration::from_nanos(mpegtime_to_ns(update.scr));

        if self.config.index {
            self.index.add_association(chunk.offset, time);
        }

        if update.rate_changed {
            let info = StreamInfo {
                mpeg_version: header.version.number(),
                bitrate: header.mux_rate as u64 * MUX_RATE_BITS_UNIT,
            };
            info!(
                "stream is MPEG-{} at {:.3} Mbps",
                info.mpeg_version,
                info.bitrate as f64 / 1_000_000.0
            );
            self.stream_info = Some(info);
            events.push(ParseEvent::StreamInfo(info));
        }

        // a pending discontinuity announces the time base itself
        if update.discont && !self.discont_pending {
            events.push(ParseEvent::Discont { timestamp: time });
        }
    }

    fn send_data(&mut self, chunk: Chunk, events: &mut Vec<ParseEvent>) {
        let len = chunk.len() as u64;

        if self.discont_pending {
            if self.scr_pending {
                debug!("waiting for SCR, dropping chunk at {}", chunk.offset);
                return;
            }
            if let Some(timestamp) = self.tracker.current_time() {
                debug!("discontinuity, new time base {timestamp:?}");
                events.push(ParseEvent::Discont { timestamp });
            }
            self.discont_pending = false;
            // the withheld chunk still occupied its bytes of the multiplex
            self.tracker.advance(len);
            return;
        }

        let timestamp = self.tracker.current_time();
        events.push(ParseEvent::Data { chunk, timestamp });
        self.tracker.advance(len);
    }

    /// Upstream discontinuity (new segment, lost data)
    ///
    /// Resets the clock state unconditionally. A known byte offset re-bases the
    /// packetizer, a known time seeds the SCR prediction.
    pub fn discont(&mut self, seed: DiscontSeed) {
        let expected_scr = seed.time.map(|t| ns_to_mpegtime(t.as_nanos() as u64));
        info!(
            "discontinuity at byte {:?}, expected SCR {:?}",
            seed.byte_offset, expected_scr
        );
        match seed.byte_offset {
            Some(offset) => self.packetizer.reset_to(offset),
            None => self.packetizer.resync(),
        }
        self.tracker.restart(expected_scr);
        self.discont_pending = true;
        self.scr_pending = true;
    }

    /// Work out where to continue reading for a seek to `value` in `format`
    ///
    /// The index is consulted first; without a usable entry the target is
    /// converted through the mux rate. On success the parser expects the
    /// caller to feed input starting at the returned byte offset.
    pub fn seek(&mut self, format: Format, value: u64) -> PsResult<SeekTarget> {
        let target = match self.index_seek(format, value) {
            Some(t) => t,
            None => self.normal_seek(format, value)?,
        };
        debug!("seeking to byte {} (SCR {})", target.byte_offset, target.expected_scr);
        self.discont(DiscontSeed {
            byte_offset: Some(target.byte_offset),
            time: Some(Duration::from_nanos(mpegtime_to_ns(target.expected_scr))),
        });
        Ok(target)
    }

    fn index_seek(&self, format: Format, value: u64) -> Option<SeekTarget> {
        let entry = self.index.lookup_before(format, value)?;
        Some(SeekTarget {
            byte_offset: entry.offset,
            expected_scr: ns_to_mpegtime(entry.time.as_nanos() as u64),
        })
    }

    /// Byte offsets count from the start of the input, times from the first SCR
    fn normal_seek(&self, format: Format, value: u64) -> PsResult<SeekTarget> {
        let base = self.base_scr.unwrap_or(0);
        let target = match format {
            Format::Bytes => SeekTarget {
                byte_offset: value,
                expected_scr: base + self.convert(Format::Bytes, value, Format::Scr)?,
            },
            Format::Time | Format::Scr => {
                let scr = self.convert(format, value, Format::Scr)?;
                SeekTarget {
                    byte_offset: self.convert(Format::Scr, scr.saturating_sub(base), Format::Bytes)?,
                    expected_scr: scr,
                }
            }
        };
        Ok(target)
    }

    /// Convert between bytes, time (ns) and SCR ticks using the mux rate
    pub fn convert(&self, src: Format, value: u64, dest: Format) -> PsResult<u64> {
        if src == dest {
            return Ok(value);
        }
        let byte_rate = self.tracker.mux_rate() as u128 * MUX_RATE_BYTES_UNIT as u128;
        if byte_rate == 0 && (src == Format::Bytes || dest == Format::Bytes) {
            return Err(PsError::UnknownRate);
        }
        let ns = match src {
            Format::Bytes => (value as u128 * NSEC_PER_SEC as u128 / byte_rate) as u64,
            Format::Time => value,
            Format::Scr => mpegtime_to_ns(value),
        };
        Ok(match dest {
            Format::Bytes => (byte_rate * ns as u128 / NSEC_PER_SEC as u128) as u64,
            Format::Time => ns,
            Format::Scr => ns_to_mpegtime(ns),
        })
    }

    /// Current position in stream time
    pub fn position(&self) -> Option<Duration> {
        self.tracker.current_time()
    }

    /// Total duration of an input of `total_bytes`
    pub fn duration(&self, total_bytes: u64) -> PsResult<Duration> {
        self.convert(Format::Bytes, total_bytes, Format::Time)
            .map(Duration::from_nanos)
    }

    pub fn stream_info(&self) -> Option<StreamInfo> {
        self.stream_info
    }

    /// SCR of the first pack header seen since the last reset
    pub fn base_scr(&self) -> Option<u64> {
        self.base_scr
    }

    pub fn system_header(&self) -> Option<&SystemHeader> {
        self.system_header.as_ref()
    }

    /// Stream version from the last pack header
    pub fn version(&self) -> Option<MpegVersion> {
        self.version.or_else(|| self.packetizer.version())
    }

    pub fn tracker(&self) -> &ScrTracker {
        &self.tracker
    }

    pub fn index(&self) -> &SeekIndex {
        &self.index
    }

    pub fn stats(&self) -> &StatsManager {
        &self.stats
    }

    pub fn skipped_bytes(&self) -> u64 {
        self.packetizer.skipped_bytes()
    }

    pub fn is_discont_pending(&self) -> bool {
        self.discont_pending
    }
}

impl Default for SystemParser {
    fn default() -> Self {
        Self::new(ParseConfig::default())
    }
}
