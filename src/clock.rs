//! SCR tracking: discontinuity detection, adjustment and extrapolation
//!
//! The tracker keeps a single continuous 90 kHz time base across pack
//! headers. Each pack header's SCR is compared against the value predicted
//! from the bytes consumed since the previous one; when the two disagree by
//! more than `max_discont` ticks the jump is absorbed into `adjust` and the
//! predicted value is used instead.

use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;

use crate::constants::*;
use crate::types::PackHeader;

/// Result of applying one pack header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrUpdate {
    /// SCR in the adjusted time domain, in 90 kHz ticks
    pub scr: u64,
    /// The raw SCR jumped and was replaced by the prediction
    pub discont: bool,
    pub rate_changed: bool,
}

/// Snapshot of the tracker state for reports
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ClockState {
    pub current_scr: Option<u64>,
    pub next_scr: Option<u64>,
    pub adjust: i64,
    pub bytes_since_scr: u64,
    pub mux_rate: u32,
    pub discontinuities: u64,
}

#[derive(Debug, Clone)]
pub struct ScrTracker {
    current_scr: Option<u64>,
    next_scr: Option<u64>,
    adjust: i64,
    bytes_since_scr: u64,
    mux_rate: u32,
    max_discont: u64,
    discontinuities: u64,
}

/// `scr + bytes * CLOCK_FREQ / (mux_rate * 50)`, or `scr` when the rate is unknown
///
/// The same interpolation is used for MPEG-1 and MPEG-2 streams.
pub fn extrapolate(scr: u64, bytes: u64, mux_rate: u32) -> u64 {
    let byte_rate = mux_rate as u64 * MUX_RATE_BYTES_UNIT;
    if byte_rate == 0 {
        return scr;
    }
    scr + ((bytes as u128 * CLOCK_FREQ as u128) / byte_rate as u128) as u64
}

/// An adjusted SCR below zero is pinned to the origin
fn clamp_scr(scr: i64) -> u64 {
    scr.max(0) as u64
}

impl ScrTracker {
    pub fn new(max_discont: u64) -> Self {
        Self {
            current_scr: None,
            next_scr: None,
            adjust: 0,
            bytes_since_scr: 0,
            mux_rate: 0,
            max_discont,
            discontinuities: 0,
        }
    }

    /// Back to the state of a freshly started stream
    pub fn reset(&mut self) {
        *self = Self::new(self.max_discont);
    }

    /// Restart after a seek or upstream discontinuity
    ///
    /// Counters and `adjust` are zeroed and `current_scr` is forgotten. The
    /// mux rate survives so byte/time conversion keeps working. `expected_scr`
    /// seeds the prediction for the next pack header; without it the next
    /// pack header is taken as is.
    pub fn restart(&mut self, expected_scr: Option<u64>) {
        self.current_scr = None;
        self.next_scr = expected_scr;
        self.adjust = 0;
        self.bytes_since_scr = 0;
    }

    /// Apply a freshly parsed pack header
    pub fn apply(&mut self, header: &PackHeader) -> ScrUpdate {
        let raw = header.scr;
        let adjusted = (raw as i64).saturating_add(self.adjust);
        self.bytes_since_scr = 0;

        let mut discont = false;
        let scr = match self.next_scr {
            None => {
                self.next_scr = Some(raw);
                clamp_scr(adjusted)
            }
            Some(next) if (next as i64).abs_diff(adjusted) > self.max_discont => {
                warn!(
                    "SCR discontinuity: expected {next} got {adjusted} (raw {raw}, adjust {})",
                    self.adjust
                );
                self.adjust = next as i64 - raw as i64;
                self.discontinuities += 1;
                discont = true;
                debug!("new SCR adjust {}", self.adjust);
                next
            }
            Some(_) => clamp_scr(adjusted),
        };

        debug!(
            "SCR {raw} -> {scr} ({:?}), next was {:?}",
            Duration::from_nanos(mpegtime_to_ns(scr)),
            self.next_scr
        );

        self.current_scr = Some(scr);
        self.next_scr = Some(scr);

        let rate_changed = self.mux_rate != header.mux_rate;
        self.mux_rate = header.mux_rate;

        ScrUpdate {
            scr,
            discont,
            rate_changed,
        }
    }

    /// Account for `bytes` emitted since the last pack header and refresh the prediction
    pub fn advance(&mut self, bytes: u64) {
        self.bytes_since_scr += bytes;
        if let Some(scr) = self.current_scr {
            self.next_scr = Some(extrapolate(scr, self.bytes_since_scr, self.mux_rate));
        }
    }

    pub fn current_scr(&self) -> Option<u64> {
        self.current_scr
    }

    pub fn next_scr(&self) -> Option<u64> {
        self.next_scr
    }

    pub fn adjust(&self) -> i64 {
        self.adjust
    }

    pub fn bytes_since_scr(&self) -> u64 {
        self.bytes_since_scr
    }

    pub fn mux_rate(&self) -> u32 {
        self.mux_rate
    }

    pub fn max_discont(&self) -> u64 {
        self.max_discont
    }

    pub fn set_max_discont(&mut self, max_discont: u64) {
        self.max_discont = max_discont;
    }

    pub fn discontinuities(&self) -> u64 {
        self.discontinuities
    }

    /// Current SCR as wall-clock comparable time
    pub fn current_time(&self) -> Option<Duration> {
        self.current_scr
            .map(|scr| Duration::from_nanos(mpegtime_to_ns(scr)))
    }

    pub fn state(&self) -> ClockState {
        ClockState {
            current_scr: self.current_scr,
            next_scr: self.next_scr,
            adjust: self.adjust,
            bytes_since_scr: self.bytes_since_scr,
            mux_rate: self.mux_rate,
            discontinuities: self.discontinuities,
        }
    }
}

impl Default for ScrTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DISCONT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MpegVersion;

    fn pack(scr: u64, mux_rate: u32) -> PackHeader {
        PackHeader {
            version: MpegVersion::Mpeg2,
            scr,
            scr_ext: 0,
            mux_rate,
        }
    }

    #[test]
    fn first_pack_header_is_taken_as_is() {
        let mut t = ScrTracker::default();
        let up = t.apply(&pack(100_000, 2000));
        assert_eq!(up.scr, 100_000);
        assert!(!up.discont);
        assert!(up.rate_changed);
        assert_eq!(t.current_scr(), Some(100_000));
        assert_eq!(t.adjust(), 0);
    }

    #[test]
    fn extrapolation_scenario() {
        let mut t = ScrTracker::default();
        t.apply(&pack(100_000, 2000));
        t.advance(8000);
        assert_eq!(t.next_scr(), Some(107_200));
    }

    #[test]
    fn jump_beyond_threshold_is_absorbed() {
        let mut t = ScrTracker::new(10_000);
        t.apply(&pack(100_000, 2000));
        t.advance(8000);

        let up = t.apply(&pack(500_000, 2000));
        assert!(up.discont);
        assert_eq!(up.scr, 107_200);
        assert_eq!(t.current_scr(), Some(107_200));
        assert_eq!(t.adjust(), -392_800);
        assert_eq!(t.discontinuities(), 1);

        // the raw clock keeps progressing linearly from its new origin
        t.advance(8000);
        let up = t.apply(&pack(507_200, 2000));
        assert!(!up.discont);
        assert_eq!(up.scr, 114_400);
        assert_eq!(t.adjust(), -392_800);
    }

    #[test]
    fn jump_within_threshold_keeps_adjust() {
        let mut t = ScrTracker::new(10_000);
        t.apply(&pack(100_000, 2000));
        t.advance(8000);
        let up = t.apply(&pack(117_000, 2000));
        assert!(!up.discont);
        assert_eq!(up.scr, 117_000);
        assert_eq!(t.adjust(), 0);
    }

    #[test]
    fn negative_adjusted_scr_is_compared_unclamped() {
        let mut t = ScrTracker::new(10_000);
        // unknown rate: the prediction stays on the current SCR
        t.apply(&pack(5_000, 0));
        t.apply(&pack(100_000, 0));
        assert_eq!(t.adjust(), -95_000);

        // 89 000 - 95 000 = -6 000, i.e. 11 000 ticks behind the prediction
        let up = t.apply(&pack(89_000, 0));
        assert!(up.discont);
        assert_eq!(up.scr, 5_000);
        assert_eq!(t.adjust(), 5_000 - 89_000);

        // inside the window a negative value is pinned to zero
        let up = t.apply(&pack(80_000, 0));
        assert!(!up.discont);
        assert_eq!(up.scr, 0);
    }

    #[test]
    fn backwards_jump_is_a_discontinuity_too() {
        let mut t = ScrTracker::new(10_000);
        t.apply(&pack(1_000_000, 2000));
        t.advance(1000);
        let up = t.apply(&pack(0, 2000));
        assert!(up.discont);
        assert_eq!(up.scr, 1_000_900);
        assert_eq!(t.adjust(), 1_000_900);
    }

    #[test]
    fn monotonic_input_never_adjusts() {
        let mut t = ScrTracker::new(10_000);
        let mut raw = 3_600;
        let mut last = 0;
        for _ in 0..50 {
            let up = t.apply(&pack(raw, 2000));
            assert!(up.scr >= last);
            assert_eq!(t.adjust(), 0);
            last = up.scr;
            t.advance(2048);
            raw += 2048 * 90_000 / 100_000 + 3;
        }
    }

    #[test]
    fn zero_rate_degrades_to_no_prediction() {
        let mut t = ScrTracker::default();
        t.apply(&pack(5_000, 0));
        t.advance(1_000_000);
        assert_eq!(t.next_scr(), Some(5_000));
        assert_eq!(extrapolate(5_000, 1_000_000, 0), 5_000);
    }

    #[test]
    fn restart_seeds_prediction_and_keeps_rate() {
        let mut t = ScrTracker::new(10_000);
        t.apply(&pack(100_000, 2000));
        t.advance(8000);
        t.apply(&pack(900_000, 2000));
        assert_ne!(t.adjust(), 0);

        t.restart(Some(450_000));
        assert_eq!(t.current_scr(), None);
        assert_eq!(t.adjust(), 0);
        assert_eq!(t.mux_rate(), 2000);

        let up = t.apply(&pack(450_500, 2000));
        assert!(!up.discont);
        assert_eq!(up.scr, 450_500);
    }

    #[test]
    fn reset_forgets_everything() {
        let mut t = ScrTracker::new(42);
        t.apply(&pack(1, 10));
        t.reset();
        assert_eq!(t.mux_rate(), 0);
        assert_eq!(t.current_scr(), None);
        assert_eq!(t.next_scr(), None);
        assert_eq!(t.max_discont(), 42);
    }
}
