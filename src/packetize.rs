//! Start-code packetizer for the program stream system layer
//!
//! Input arrives in arbitrary pieces; complete chunks are cut out of the
//! buffered data as soon as their length is known.

use bytes::{Buf, BytesMut};
use log::{debug, trace};

use crate::constants::*;
use crate::parsers::detect_version;
use crate::types::{Chunk, MpegVersion};

#[derive(Debug, Default)]
pub struct Packetizer {
    buf: BytesMut,
    /// Absolute input offset of `buf[0]`
    offset: u64,
    version: Option<MpegVersion>,
    /// Drop everything up to the next pack header
    resync: bool,
    skipped_bytes: u64,
}

enum Scan {
    NeedMore,
    Skip(usize),
    Chunk(usize),
}

impl Packetizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Stream version learnt from the last pack header
    pub fn version(&self) -> Option<MpegVersion> {
        self.version
    }

    pub fn is_mpeg2(&self) -> bool {
        self.version == Some(MpegVersion::Mpeg2)
    }

    /// Bytes discarded while hunting for start codes
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes
    }

    /// Bytes held back waiting for the rest of a chunk
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Absolute offset of the next byte to be scanned
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Ignore everything until the next pack header
    pub fn resync(&mut self) {
        self.resync = true;
    }

    /// Drop buffered data; the next pushed byte lives at `offset`
    pub fn reset_to(&mut self, offset: u64) {
        self.buf.clear();
        self.offset = offset;
        self.resync = true;
    }

    /// Cut the next complete chunk out of the buffer
    pub fn next_chunk(&mut self) -> Option<Chunk> {
        loop {
            match self.scan() {
                Scan::NeedMore => return None,
                Scan::Skip(n) => self.skip(n),
                Scan::Chunk(len) => {
                    let id = self.buf[3];
                    if self.resync {
                        if id != PACK_START_CODE {
                            self.skip(4);
                            continue;
                        }
                        debug!("resynced on pack header at offset {}", self.offset);
                        self.resync = false;
                    }
                    let offset = self.offset;
                    let data = self.buf.split_to(len).freeze();
                    self.offset += len as u64;
                    trace!("chunk 0x{id:02X} at {offset}, {len} bytes");
                    return Some(Chunk::new(id, offset, data));
                }
            }
        }
    }

    fn skip(&mut self, n: usize) {
        self.buf.advance(n);
        self.offset += n as u64;
        self.skipped_bytes += n as u64;
    }

    fn scan(&mut self) -> Scan {
        let Some(pos) = find_start_code(&self.buf) else {
            // keep a possible partial prefix at the tail
            let keep = self.buf.len().min(START_CODE_PREFIX.len() - 1);
            let drop = self.buf.len() - keep;
            return if drop > 0 { Scan::Skip(drop) } else { Scan::NeedMore };
        };
        if pos > 0 {
            trace!("skipping {pos} bytes of garbage at offset {}", self.offset);
            return Scan::Skip(pos);
        }
        if self.buf.len() < 4 {
            return Scan::NeedMore;
        }

        let available = self.buf.len();
        let scan = match self.buf[3] {
            PACK_START_CODE => {
                if available < 5 {
                    return Scan::NeedMore;
                }
                match detect_version(self.buf[4]) {
                    Some(MpegVersion::Mpeg2) => {
                        if available < MPEG2_PACK_HEADER_LEN {
                            return Scan::NeedMore;
                        }
                        self.version = Some(MpegVersion::Mpeg2);
                        Scan::Chunk(MPEG2_PACK_HEADER_LEN + (self.buf[13] & 0x07) as usize)
                    }
                    Some(MpegVersion::Mpeg1) => {
                        self.version = Some(MpegVersion::Mpeg1);
                        Scan::Chunk(MPEG1_PACK_HEADER_LEN)
                    }
                    None => {
                        debug!("bogus pack header marker 0x{:02X}", self.buf[4]);
                        Scan::Skip(4)
                    }
                }
            }
            PROGRAM_END_CODE => Scan::Chunk(4),
            id if id >= SYSTEM_HEADER_START_CODE => {
                if available < PACKET_LENGTH_PREFIX {
                    return Scan::NeedMore;
                }
                let len = u16::from_be_bytes([self.buf[4], self.buf[5]]) as usize;
                Scan::Chunk(PACKET_LENGTH_PREFIX + len)
            }
            _ => Scan::Chunk(4),
        };
        scan.need(available)
    }
}

impl Scan {
    /// A chunk longer than what is buffered has to wait
    fn need(self, available: usize) -> Scan {
        match self {
            Scan::Chunk(len) if len > available => Scan::NeedMore,
            other => other,
        }
    }
}

fn find_start_code(buf: &[u8]) -> Option<usize> {
    buf.windows(3).position(|w| w == START_CODE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::test_support::*;
    use crate::types::ChunkKind;

    fn drain(p: &mut Packetizer) -> Vec<Chunk> {
        std::iter::from_fn(|| p.next_chunk()).collect()
    }

    fn stream() -> Vec<u8> {
        [
            mpeg2_pack(90_000, 0, 2000, 2),
            system_header(2000, &[(0xE0, true, 232)]),
            mpeg2_pes(0xE0, Some(93_600), 100),
            mpeg2_pes(0xC0, None, 40),
            vec![0x00, 0x00, 0x01, 0xB9],
        ]
        .concat()
    }

    #[test]
    fn splits_stream_into_chunks() {
        let mut p = Packetizer::new();
        p.push(&stream());
        let chunks = drain(&mut p);
        let kinds: Vec<_> = chunks.iter().map(Chunk::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChunkKind::PackHeader,
                ChunkKind::SystemHeader,
                ChunkKind::Packet(0xE0),
                ChunkKind::Packet(0xC0),
                ChunkKind::ProgramEnd,
            ]
        );
        assert_eq!(chunks[0].len(), 16);
        assert_eq!(chunks[1].offset, 16);
        assert!(p.is_mpeg2());
        assert_eq!(p.pending(), 0);
    }

    #[test]
    fn reassembles_across_push_boundaries() {
        let data = stream();
        let mut whole = Packetizer::new();
        whole.push(&data);
        let expected = drain(&mut whole);

        let mut p = Packetizer::new();
        let mut got = Vec::new();
        for piece in data.chunks(7) {
            p.push(piece);
            got.extend(drain(&mut p));
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn garbage_is_skipped_and_counted() {
        let mut data = vec![0x12, 0x34, 0x00, 0x56];
        data.extend(mpeg1_pack(1, 1));
        let mut p = Packetizer::new();
        p.push(&data);
        let chunks = drain(&mut p);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].offset, 4);
        assert_eq!(p.skipped_bytes(), 4);
        assert_eq!(p.version(), Some(MpegVersion::Mpeg1));
    }

    #[test]
    fn resync_waits_for_pack_header() {
        let mut p = Packetizer::new();
        p.reset_to(1_000);
        p.push(&[mpeg2_pes(0xE0, None, 8), mpeg2_pack(1, 0, 1, 0)].concat());
        let chunks = drain(&mut p);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind(), ChunkKind::PackHeader);
        assert_eq!(chunks[0].offset, 1_000 + 17);
    }

    #[test]
    fn unknown_start_code_is_a_short_chunk() {
        let mut p = Packetizer::new();
        p.push(&[0x00, 0x00, 0x01, 0xB3, 0x00, 0x00, 0x01, 0xB9]);
        let chunks = drain(&mut p);
        assert_eq!(chunks[0].kind(), ChunkKind::Unknown(0xB3));
        assert_eq!(chunks[1].kind(), ChunkKind::ProgramEnd);
    }
}
