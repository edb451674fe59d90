//! Fixed HLS resolution ladder.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Target duration of every HLS segment, in seconds.
pub const SEGMENT_DURATION_SECS: u32 = 3;

/// Approximate bits per second advertised per pixel row of a rendition.
const BANDWIDTH_PER_LINE: u64 = 4_000;

/// Pixel height of a rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resolution(u32);

impl Resolution {
    pub const P360: Resolution = Resolution(360);
    pub const P480: Resolution = Resolution(480);
    pub const P720: Resolution = Resolution(720);
    pub const P1080: Resolution = Resolution(1080);
    pub const P1440: Resolution = Resolution(1440);
    pub const P2160: Resolution = Resolution(2160);

    pub const fn new(height: u32) -> Self {
        Resolution(height)
    }

    pub const fn height(&self) -> u32 {
        self.0
    }

    /// Directory and file-name label, e.g. `720p`.
    pub fn label(&self) -> String {
        format!("{}p", self.0)
    }

    /// Advertised `BANDWIDTH` for the master playlist.
    pub fn bandwidth(&self) -> u64 {
        u64::from(self.0) * BANDWIDTH_PER_LINE
    }

    /// Output width for a source of the given dimensions, rounded down to an
    /// even number as required by yuv420p.
    pub fn scaled_width(&self, source_width: u32, source_height: u32) -> Option<u32> {
        if source_width == 0 || source_height == 0 {
            return None;
        }
        let width = u64::from(source_width) * u64::from(self.0) / u64::from(source_height);
        let even = (width as u32) & !1;
        (even > 0).then_some(even)
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}p", self.0)
    }
}

/// Every rendition the pipeline can produce, ascending.
pub const RESOLUTION_LADDER: [Resolution; 6] = [
    Resolution::P360,
    Resolution::P480,
    Resolution::P720,
    Resolution::P1080,
    Resolution::P1440,
    Resolution::P2160,
];

/// Rungs of the ladder that do not exceed the source height.
///
/// A source shorter than the lowest rung yields an empty list.
pub fn select_renditions(source_height: u32) -> Vec<Resolution> {
    RESOLUTION_LADDER
        .iter()
        .copied()
        .filter(|r| r.height() <= source_height)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heights(list: &[Resolution]) -> Vec<u32> {
        list.iter().map(Resolution::height).collect()
    }

    #[test]
    fn selects_rungs_up_to_source_height() {
        assert_eq!(heights(&select_renditions(720)), vec![360, 480, 720]);
        assert_eq!(heights(&select_renditions(1080)), vec![360, 480, 720, 1080]);
        assert_eq!(heights(&select_renditions(1079)), vec![360, 480, 720]);
        assert_eq!(heights(&select_renditions(4320)).len(), RESOLUTION_LADDER.len());
    }

    #[test]
    fn short_sources_produce_no_renditions() {
        assert!(select_renditions(240).is_empty());
        assert!(select_renditions(0).is_empty());
        assert_eq!(heights(&select_renditions(360)), vec![360]);
    }

    #[test]
    fn ladder_is_ascending() {
        assert!(RESOLUTION_LADDER.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn labels_and_bandwidth() {
        assert_eq!(Resolution::P720.label(), "720p");
        assert_eq!(Resolution::P1080.to_string(), "1080p");
        assert!(Resolution::P1080.bandwidth() > Resolution::P720.bandwidth());
    }

    #[test]
    fn scaled_width_keeps_aspect_and_is_even() {
        assert_eq!(Resolution::P720.scaled_width(1920, 1080), Some(1280));
        assert_eq!(Resolution::P360.scaled_width(1920, 1080), Some(640));
        assert_eq!(Resolution::P480.scaled_width(1920, 1080), Some(852));
        assert_eq!(Resolution::P480.scaled_width(0, 1080), None);
    }
}
