//! Word packing helpers shared by both endpoints (§4.3 "Packing").
//!
//! Pixels and bitmap words travel on the wire big-endian (per
//! [`crate::link::SpiLink`]); within a packet, the four pixel bytes are
//! little-endian-ordered per §4.3. Conversion between the wire's raw
//! big-endian `u32` and this little-endian-within-packet pixel layout
//! happens in [`pixels_to_word`]/[`word_to_pixels`] so callers never touch
//! endianness directly.

/// Packs up to 4 palette-index pixels into one packet word, little-endian
/// within the word. Fewer than 4 pixels are zero-padded in the unused high
/// bytes.
#[inline]
pub fn pixels_to_word(pixels: &[u8]) -> u32 {
    debug_assert!(pixels.len() <= 4);
    let mut bytes = [0u8; 4];
    bytes[..pixels.len()].copy_from_slice(pixels);
    u32::from_le_bytes(bytes)
}

/// Unpacks a packet word into up to 4 palette-index pixels.
#[inline]
pub fn word_to_pixels(word: u32) -> [u8; 4] {
    word.to_le_bytes()
}

/// High bit of an RLE pixel-index byte, repurposed as a "repeat again"
/// marker (§4.3 RLE variant B).
pub const RLE_REPEAT_MARKER: u8 = 1 << 7;
const RLE_INDEX_MASK: u8 = RLE_REPEAT_MARKER - 1;

/// Packs one `(run_length, pixel_index)` RLE pair, setting the repeat
/// marker on the index byte when `repeat` is set.
#[inline]
pub fn pack_rle_pair(run_length: u8, pixel_index: u8, repeat: bool) -> (u8, u8) {
    debug_assert!(pixel_index & RLE_REPEAT_MARKER == 0, "pixel index must fit in 7 bits");
    let index_byte = pixel_index | if repeat { RLE_REPEAT_MARKER } else { 0 };
    (run_length, index_byte)
}

/// Unpacks one RLE pair into `(run_length, pixel_index, repeat)`.
#[inline]
pub fn unpack_rle_pair(run_length: u8, index_byte: u8) -> (u8, u8, bool) {
    (
        run_length,
        index_byte & RLE_INDEX_MASK,
        index_byte & RLE_REPEAT_MARKER != 0,
    )
}

/// Number of payload packets variant A (spatial block-repeat) needs for
/// `changed_pixels` changed pixels.
#[inline]
pub fn spatial_packet_count(changed_pixels: usize) -> u32 {
    changed_pixels.div_ceil(4) as u32
}

/// Number of payload packets variant B (RLE) needs for `runs` `(run,
/// pixel)` pairs (2 bytes each, 4 bytes per packet).
#[inline]
pub fn rle_packet_count(runs: usize) -> u32 {
    (2 * runs).div_ceil(4) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_word_round_trips() {
        let pixels = [0x11, 0x22, 0x33, 0x44];
        let word = pixels_to_word(&pixels);
        assert_eq!(word_to_pixels(word), pixels);
    }

    #[test]
    fn partial_pixel_word_pads_with_zero() {
        let word = pixels_to_word(&[0xAB]);
        assert_eq!(word_to_pixels(word), [0xAB, 0, 0, 0]);
    }

    #[test]
    fn rle_pair_round_trips_with_repeat_marker() {
        let (run, idx) = pack_rle_pair(9, 0x42, true);
        assert_eq!(unpack_rle_pair(run, idx), (9, 0x42, true));

        let (run, idx) = pack_rle_pair(1, 0x7F, false);
        assert_eq!(unpack_rle_pair(run, idx), (1, 0x7F, false));
    }

    #[test]
    fn packet_counts_match_spec_formulas() {
        assert_eq!(spatial_packet_count(0), 0);
        assert_eq!(spatial_packet_count(1), 1);
        assert_eq!(spatial_packet_count(4), 1);
        assert_eq!(spatial_packet_count(5), 2);

        assert_eq!(rle_packet_count(0), 0);
        assert_eq!(rle_packet_count(2), 1);
        assert_eq!(rle_packet_count(3), 2);
    }
}
