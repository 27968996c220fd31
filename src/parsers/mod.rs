//! Header parsers for the program stream system layer
//!
//! All parsers are pure: they take a complete chunk (start code included)
//! and return the decoded header without touching any parser state.

mod pack;
mod pes;
mod system;
mod utils;

pub use pack::{detect_version, parse_mpeg1_pack_header, parse_mpeg2_pack_header, parse_pack_header};
pub use pes::parse_pes_header;
pub use system::parse_system_header;
pub use utils::read_timestamp;

#[cfg(test)]
pub(crate) mod test_support {
    pub(crate) use super::pack::tests::{mpeg1_pack, mpeg2_pack};
    pub(crate) use super::pes::tests::{mpeg1_packet, mpeg2_pes};
    pub(crate) use super::system::tests::system_header;
}
