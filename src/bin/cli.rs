use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use mpegps_sync::ParseConfig;
use mpegps_sync::constants::DEFAULT_MAX_DISCONT;
use mpegps_sync::inspector::{Options, Source, run};

#[derive(Parser)]
#[clap(about = "MPEG program stream parser with SCR discontinuity tracking")]
struct Opt {
    /// Program stream file to read
    #[clap(long, conflicts_with = "addr")]
    input: Option<PathBuf>,

    /// UDP socket to bind + listen (IPv4)
    #[clap(long, default_value = "239.1.1.2:1234")]
    addr: String,

    /// Refresh interval for the JSON snapshot (0 disables it)
    #[clap(long, default_value_t = 2)]
    refresh: u64,

    /// Release data in step with the SCR clock
    #[clap(long, default_value_t = false)]
    sync: bool,

    /// Largest SCR jump (90 kHz ticks) not treated as a discontinuity
    #[clap(long, default_value_t = DEFAULT_MAX_DISCONT)]
    max_discont: u64,

    /// Start position in seconds (file input only)
    #[clap(long)]
    start: Option<f64>,

    /// Print every parser event
    #[clap(long, default_value_t = false)]
    events: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opt = Opt::parse();

    let source = match opt.input {
        Some(path) => Source::File(path),
        None => Source::Udp(opt.addr.parse()?),
    };
    let start = opt
        .start
        .map(Duration::try_from_secs_f64)
        .transpose()
        .map_err(|e| anyhow::anyhow!("invalid --start: {e}"))?;

    run(Options {
        source,
        refresh_secs: opt.refresh,
        config: ParseConfig {
            sync: opt.sync,
            max_discont: opt.max_discont,
            ..ParseConfig::default()
        },
        start,
        print_events: opt.events,
    })
    .await
}
