//! Session options negotiated once, right after a `CMD_RESET` handshake
//! (§4.7): render mode, control-map id, compression aggressiveness, and a
//! CPU-overclock hint, all packed into the first post-reset word.

use serde::{Deserialize, Serialize};

use crate::constants::DIFF_THRESHOLDS;

const RENDER_MODE_WIDTH: u32 = 4;
const CONTROLS_WIDTH: u32 = 4;
const COMPRESSION_WIDTH: u32 = 2;

const RENDER_MODE_MASK: u32 = (1 << RENDER_MODE_WIDTH) - 1;
const CONTROLS_MASK: u32 = (1 << CONTROLS_WIDTH) - 1;
const COMPRESSION_MASK: u32 = (1 << COMPRESSION_WIDTH) - 1;
const OVERCLOCK_BIT: u32 =
    1 << (RENDER_MODE_WIDTH + CONTROLS_WIDTH + COMPRESSION_WIDTH);

/// Per-session configuration, fixed for the lifetime of a connection (until
/// the next `CMD_RESET`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Which render mode (resolution/scale preset) to use. Render-mode
    /// tables beyond the default are an external concern; this crate only
    /// carries the selector.
    pub render_mode: u8,
    /// Which control map (button layout) the slave should report under.
    pub control_map: u8,
    /// Index into [`DIFF_THRESHOLDS`], selecting compression aggressiveness.
    pub compression_aggressiveness: u8,
    /// Hint that the slave should overclock its CPU for this session.
    pub overclock: bool,
}

impl SessionOptions {
    /// The temporal diff threshold this session's compression setting maps
    /// to.
    #[inline]
    pub fn diff_threshold(&self) -> u16 {
        DIFF_THRESHOLDS[usize::from(self.compression_aggressiveness) % DIFF_THRESHOLDS.len()]
    }

    #[inline]
    pub fn to_word(self) -> u32 {
        (u32::from(self.render_mode) & RENDER_MODE_MASK)
            | ((u32::from(self.control_map) & CONTROLS_MASK) << RENDER_MODE_WIDTH)
            | ((u32::from(self.compression_aggressiveness) & COMPRESSION_MASK)
                << (RENDER_MODE_WIDTH + CONTROLS_WIDTH))
            | if self.overclock { OVERCLOCK_BIT } else { 0 }
    }

    #[inline]
    pub fn from_word(word: u32) -> Self {
        SessionOptions {
            render_mode: (word & RENDER_MODE_MASK) as u8,
            control_map: ((word >> RENDER_MODE_WIDTH) & CONTROLS_MASK) as u8,
            compression_aggressiveness: ((word >> (RENDER_MODE_WIDTH + CONTROLS_WIDTH))
                & COMPRESSION_MASK) as u8,
            overclock: word & OVERCLOCK_BIT != 0,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            render_mode: 0,
            control_map: 0,
            compression_aggressiveness: 2,
            overclock: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_word() {
        let opts = SessionOptions {
            render_mode: 3,
            control_map: 5,
            compression_aggressiveness: 1,
            overclock: true,
        };
        assert_eq!(SessionOptions::from_word(opts.to_word()), opts);
    }

    #[test]
    fn default_threshold_is_in_table() {
        assert!(DIFF_THRESHOLDS.contains(&SessionOptions::default().diff_threshold()));
    }
}
