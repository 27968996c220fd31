// src/lib.rs
pub mod inspector {
    pub use crate::types::{Options, Source};

    /// Async entry-point; returns at end of input (file) or on Ctrl-C (UDP)
    pub async fn run(opts: Options) -> anyhow::Result<()> {
        crate::core::run(opts).await
    }
}

pub mod clock;
pub mod constants;
mod core;
pub mod error;
pub mod index;
pub mod network;
pub mod packetize;
pub mod parsers;
pub mod processor;
pub mod report;
pub mod stats;
pub mod types;

pub use clock::{ClockState, ScrTracker, ScrUpdate};
pub use error::{PsError, PsResult};
pub use processor::SystemParser;
pub use report::{ParseReport, Reporter};
pub use types::{
    Chunk, ChunkKind, DiscontSeed, Format, MpegVersion, PackHeader, ParseConfig, ParseEvent,
    PesHeader, SeekTarget, StreamInfo, SystemHeader,
};
