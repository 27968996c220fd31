use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tokio::net::UdpSocket;
use tokio::time::{Instant, sleep_until};

use crate::constants::mpegtime_to_ns;
use crate::error::PsResult;
use crate::inspector::{Options, Source};
use crate::network::create_udp_socket;
use crate::processor::SystemParser;
use crate::report::Reporter;
use crate::types::{DiscontSeed, Format, ParseConfig, ParseEvent, SeekTarget};

const READ_SIZE: usize = 64 * 1024;
/// Bytes read up front to learn the mux rate before a start seek
const PROBE_SIZE: usize = 256 * 1024;

pub async fn run(opts: Options) -> anyhow::Result<()> {
    let mut parser = SystemParser::new(source_config(&opts.source, &opts.config));
    match &opts.source {
        Source::File(path) => run_file(path, &opts, &mut parser).await?,
        Source::Udp(addr) => {
            let socket = create_udp_socket(*addr)?;
            let sock = UdpSocket::from_std(socket.into())?;
            run_udp(sock, &opts, &mut parser).await?;
        }
    }
    parser.finish();
    println!("{}", Reporter::generate_json_report(&parser));
    Ok(())
}

async fn run_file(path: &Path, opts: &Options, parser: &mut SystemParser) -> anyhow::Result<()> {
    let mut file = File::open(path).await?;
    let total = file.metadata().await?.len();
    info!("reading {} ({total} bytes)", path.display());

    if let Some(start) = opts.start {
        let mut head = vec![0u8; PROBE_SIZE];
        let n = file.read(&mut head).await?;
        let target = start_target(&head[..n], start)?;
        info!(
            "starting at {start:?}, byte {} (SCR {})",
            target.byte_offset, target.expected_scr
        );
        file.seek(SeekFrom::Start(target.byte_offset)).await?;
        parser.discont(DiscontSeed {
            byte_offset: Some(target.byte_offset),
            time: Some(Duration::from_nanos(mpegtime_to_ns(target.expected_scr))),
        });
    }

    drive(file, opts, parser).await?;
    if let Ok(duration) = parser.duration(total) {
        info!("estimated duration {duration:?}");
    }
    Ok(())
}

/// Seek target `start` after the first SCR, using the head of the file
fn start_target(head: &[u8], start: Duration) -> PsResult<SeekTarget> {
    let mut probe = SystemParser::new(ParseConfig {
        index: false,
        ..ParseConfig::default()
    });
    probe.push(head);
    let base = probe.base_scr().unwrap_or(0);
    probe.seek(Format::Time, mpegtime_to_ns(base) + start.as_nanos() as u64)
}

/// Live input cannot seek, so the index would only grow
fn source_config(source: &Source, config: &ParseConfig) -> ParseConfig {
    match source {
        Source::File(_) => config.clone(),
        Source::Udp(_) => ParseConfig {
            index: false,
            ..config.clone()
        },
    }
}

async fn run_udp(sock: UdpSocket, opts: &Options, parser: &mut SystemParser) -> anyhow::Result<()> {
    let mut buf = vec![0u8; READ_SIZE];
    let mut pacer = ClockSync::new(opts.config.sync);
    let mut last_print = std::time::Instant::now();

    loop {
        let n = tokio::select! {
            r = sock.recv(&mut buf) => r?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
        };
        if n == 0 {
            continue;
        }
        let events = parser.push(&buf[..n]);
        if handle_events(events, opts, &mut pacer).await {
            return Ok(());
        }
        maybe_report(parser, opts, &mut last_print);
    }
}

/// Feed a byte source through the parser until it ends or the stream does
pub async fn drive<R>(mut reader: R, opts: &Options, parser: &mut SystemParser) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_SIZE];
    let mut pacer = ClockSync::new(opts.config.sync);
    let mut last_print = std::time::Instant::now();

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            debug!("end of input");
            return Ok(());
        }
        let events = parser.push(&buf[..n]);
        if handle_events(events, opts, &mut pacer).await {
            return Ok(());
        }
        maybe_report(parser, opts, &mut last_print);
    }
}

/// Returns true once the program end code went through
async fn handle_events(events: Vec<ParseEvent>, opts: &Options, pacer: &mut ClockSync) -> bool {
    let mut ended = false;
    for ev in events {
        match &ev {
            ParseEvent::Data {
                timestamp: Some(ts),
                ..
            } => pacer.wait(*ts).await,
            ParseEvent::Discont { timestamp } => pacer.rebase(*timestamp),
            ParseEvent::End => ended = true,
            _ => {}
        }
        if opts.print_events {
            println!("{}", describe(&ev));
        }
    }
    ended
}

fn maybe_report(parser: &SystemParser, opts: &Options, last_print: &mut std::time::Instant) {
    if opts.refresh_secs == 0 {
        return;
    }
    if last_print.elapsed() >= Duration::from_secs(opts.refresh_secs) {
        println!("{}", Reporter::generate_json_report(parser));
        *last_print = std::time::Instant::now();
    }
}

fn describe(ev: &ParseEvent) -> String {
    match ev {
        ParseEvent::Data { chunk, timestamp } => format!(
            "data   0x{:02X} @{:<10} {:>6} B  {}",
            chunk.id,
            chunk.offset,
            chunk.len(),
            timestamp.map_or_else(|| "-".to_string(), |t| format!("{t:?}"))
        ),
        ParseEvent::Discont { timestamp } => format!("discont {timestamp:?}"),
        ParseEvent::StreamInfo(info) => {
            format!("info   MPEG-{} {} bit/s", info.mpeg_version, info.bitrate)
        }
        ParseEvent::Unrecognized { id, offset } => format!("unknown 0x{id:02X} @{offset}"),
        ParseEvent::End => "end".to_string(),
    }
}

/// Paces output against a wall clock anchored on the stream time base
struct ClockSync {
    enabled: bool,
    anchor: Option<(Instant, Duration)>,
}

impl ClockSync {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            anchor: None,
        }
    }

    fn rebase(&mut self, timestamp: Duration) {
        if self.enabled {
            debug!("clock re-anchored at {timestamp:?}");
            self.anchor = Some((Instant::now(), timestamp));
        }
    }

    async fn wait(&mut self, timestamp: Duration) {
        if !self.enabled {
            return;
        }
        let Some((wall, base)) = self.anchor else {
            self.anchor = Some((Instant::now(), timestamp));
            return;
        };
        match timestamp.checked_sub(base) {
            Some(ahead) => sleep_until(wall + ahead).await,
            None => warn!("timestamp {timestamp:?} before clock base {base:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::test_support::{mpeg2_pack, mpeg2_pes};

    #[tokio::test(start_paused = true)]
    async fn sync_waits_for_stream_time() {
        let mut sync = ClockSync::new(true);
        let t0 = Instant::now();
        sync.wait(Duration::from_secs(10)).await;
        sync.wait(Duration::from_millis(10_500)).await;
        assert!(t0.elapsed() >= Duration::from_millis(500));

        // a discontinuity restarts the clock from the new time base
        sync.rebase(Duration::from_secs(1));
        let t1 = Instant::now();
        sync.wait(Duration::from_secs(1)).await;
        assert!(t1.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_sync_never_sleeps() {
        let mut sync = ClockSync::new(false);
        let t0 = Instant::now();
        sync.wait(Duration::from_secs(1)).await;
        sync.wait(Duration::from_secs(100)).await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }

    fn continuous(first_scr: u64, count: u64) -> Vec<u8> {
        (0..count)
            .flat_map(|i| {
                [mpeg2_pack(first_scr + i * 900, 0, 2000, 0), mpeg2_pes(0xE0, None, 977)].concat()
            })
            .collect()
    }

    #[test]
    fn start_is_relative_to_the_first_scr() {
        let data = continuous(90_000, 20);
        let target = start_target(&data[..4_096], Duration::from_millis(50)).unwrap();
        assert_eq!(target.byte_offset, 5_000);
        assert_eq!(target.expected_scr, 94_500);

        let mut parser = SystemParser::default();
        parser.discont(DiscontSeed {
            byte_offset: Some(target.byte_offset),
            time: Some(Duration::from_nanos(mpegtime_to_ns(target.expected_scr))),
        });
        parser.push(&data[target.byte_offset as usize..]);
        assert_eq!(parser.tracker().discontinuities(), 0);
        assert_eq!(parser.tracker().adjust(), 0);
        assert_eq!(
            parser.position(),
            Some(Duration::from_nanos(mpegtime_to_ns(90_000 + 19 * 900)))
        );
    }

    #[test]
    fn start_needs_a_known_rate() {
        assert!(start_target(&[], Duration::from_secs(1)).is_err());
    }

    #[test]
    fn udp_input_is_never_indexed() {
        let config = ParseConfig::default();
        let udp = source_config(&Source::Udp("127.0.0.1:1234".parse().unwrap()), &config);
        assert!(!udp.index);
        assert_eq!(udp.max_discont, config.max_discont);
        let file = source_config(&Source::File("in.mpg".into()), &config);
        assert!(file.index);
    }

    #[test]
    fn events_are_described() {
        assert_eq!(describe(&ParseEvent::End), "end");
        assert_eq!(
            describe(&ParseEvent::Unrecognized { id: 0xB3, offset: 14 }),
            "unknown 0xB3 @14"
        );
    }
}
