//! The diff encoder (§4.3): temporal diff, spatial block-repeat (variant
//! A), RLE + palette remap (variant B), and variant selection.

use remote_play_proto::{Diff, DiffPayload, Frame, SPATIAL_DIFF_BLOCK_SIZE, SPATIAL_DIFF_COLOR_LIMIT};
use remote_play_wire::pack::{rle_packet_count, spatial_packet_count};

use crate::palette::PaletteLut;

/// Pixels per bitmap packet word; `start_pixel` is always rounded down to
/// a multiple of this so the temporal bitmap can be shipped starting at a
/// 4-byte packet boundary (§4.3 "Temporal diff").
const PIXELS_PER_BITMAP_PACKET: usize = 32;

/// Stateless; holds no per-frame data, only the knobs threading through
/// every call.
pub struct DiffEncoder<'p> {
    palette: &'p PaletteLut,
    diff_threshold: u16,
}

impl<'p> DiffEncoder<'p> {
    pub fn new(palette: &'p PaletteLut, diff_threshold: u16) -> Self {
        DiffEncoder {
            palette,
            diff_threshold,
        }
    }

    /// Computes the diff driving `curr` relative to `prev`, picking
    /// whichever payload variant needs fewer packets.
    pub fn encode(&self, curr: &Frame, prev: &Frame) -> Diff {
        debug_assert_eq!(curr.total_pixels(), prev.total_pixels());
        let total = curr.total_pixels();

        let mut temporal_bits = vec![0u8; total.div_ceil(8)].into_boxed_slice();
        for i in 0..total {
            if self.color_delta(curr.pixels[i], prev.pixels[i]) > self.diff_threshold {
                temporal_bits[i / 8] |= 1 << (i % 8);
            }
        }

        let Some(first_changed) = first_set_bit(&temporal_bits) else {
            return Diff {
                temporal_bits,
                payload: DiffPayload::Spatial {
                    spatial_bits: Box::new([]),
                    pixels: Box::new([]),
                },
                start_pixel: 0,
                expected_packets: 0,
            };
        };

        let start_pixel = (first_changed / PIXELS_PER_BITMAP_PACKET) * PIXELS_PER_BITMAP_PACKET;

        let spatial = self.encode_spatial(curr, &temporal_bits, start_pixel, total);
        let rle = self.encode_rle(curr, &temporal_bits, start_pixel, total);

        let (payload, expected_packets) = if rle.1 < spatial.1 {
            rle
        } else {
            spatial
        };

        Diff {
            temporal_bits,
            payload,
            start_pixel,
            expected_packets,
        }
    }

    #[inline]
    fn color_delta(&self, a: u8, b: u8) -> u16 {
        let [ar, ag, ab] = self.palette.color_of(a);
        let [br, bg, bb] = self.palette.color_of(b);
        let delta = (i32::from(ar) - i32::from(br)).abs()
            + (i32::from(ag) - i32::from(bg)).abs()
            + (i32::from(ab) - i32::from(bb)).abs();
        delta.try_into().unwrap_or(u16::MAX)
    }

    /// Variant A: one spatial bit per `SPATIAL_DIFF_BLOCK_SIZE`-pixel
    /// block; a block is "repeated" when every pixel in it shares the same
    /// post-quantization color, in which case only its first pixel is
    /// emitted into the payload.
    fn encode_spatial(
        &self,
        curr: &Frame,
        temporal_bits: &[u8],
        start_pixel: usize,
        total: usize,
    ) -> (DiffPayload, u32) {
        let n_blocks = (total - start_pixel).div_ceil(SPATIAL_DIFF_BLOCK_SIZE);
        let mut spatial_bits = vec![0u8; n_blocks.div_ceil(8)].into_boxed_slice();
        let mut payload_pixels = Vec::new();

        for block in 0..n_blocks {
            let block_start = start_pixel + block * SPATIAL_DIFF_BLOCK_SIZE;
            let block_end = (block_start + SPATIAL_DIFF_BLOCK_SIZE).min(total);
            let block_pixels = &curr.pixels[block_start..block_end];

            if !(block_start..block_end).any(|i| bit_set(temporal_bits, i)) {
                continue;
            }

            let repeated = block_pixels.windows(2).all(|w| w[0] == w[1]) && block_pixels.len() > 1;
            if repeated {
                spatial_bits[block / 8] |= 1 << (block % 8);
                payload_pixels.push(block_pixels[0]);
            } else {
                payload_pixels.extend_from_slice(block_pixels);
            }
        }

        let packets = spatial_packet_count(payload_pixels.len());
        (
            DiffPayload::Spatial {
                spatial_bits,
                pixels: payload_pixels.into_boxed_slice(),
            },
            packets,
        )
    }

    /// Variant B: RLE over changed pixels, with an optional ≤128-entry
    /// palette remap so each compressed pixel index fits in 7 bits (the
    /// 8th bit is the repeat marker).
    fn encode_rle(
        &self,
        curr: &Frame,
        temporal_bits: &[u8],
        start_pixel: usize,
        total: usize,
    ) -> (DiffPayload, u32) {
        let changed: Vec<u8> = (start_pixel..total)
            .filter(|&i| bit_set(temporal_bits, i))
            .map(|i| curr.pixels[i])
            .collect();

        let mut palette_map: Vec<u8> = Vec::new();
        let mut compressed_of = |real_index: u8| -> Option<u8> {
            if let Some(pos) = palette_map.iter().position(|&p| p == real_index) {
                return Some(pos as u8);
            }
            if palette_map.len() >= SPATIAL_DIFF_COLOR_LIMIT {
                return None;
            }
            palette_map.push(real_index);
            Some((palette_map.len() - 1) as u8)
        };

        let mut runs: Vec<(u8, u8)> = Vec::new();
        let mut i = 0;
        while i < changed.len() {
            let pixel = changed[i];
            let mut run_len = 1usize;
            while i + run_len < changed.len() && changed[i + run_len] == pixel && run_len < u8::MAX as usize {
                run_len += 1;
            }

            let compressed = compressed_of(pixel).unwrap_or(pixel & 0x7f);
            runs.push((run_len as u8, compressed));
            i += run_len;
        }

        let packets = rle_packet_count(runs.len());
        (
            DiffPayload::Rle {
                runs: runs.into_boxed_slice(),
                palette_map: palette_map.into_boxed_slice(),
            },
            packets,
        )
    }
}

#[inline]
fn bit_set(bits: &[u8], index: usize) -> bool {
    bits[index / 8] & (1 << (index % 8)) != 0
}

#[inline]
fn first_set_bit(bits: &[u8]) -> Option<usize> {
    bits.iter().enumerate().find_map(|(byte_idx, &byte)| {
        (byte != 0).then(|| byte_idx * 8 + byte.trailing_zeros() as usize)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_play_proto::constants::RENDER_WIDTH;

    fn uniform_frame(width: usize, height: usize, index: u8) -> Frame {
        Frame {
            width,
            height,
            pixels: vec![index; width * height].into_boxed_slice(),
            audio_chunk: Box::new([]),
        }
    }

    #[test]
    fn identical_frames_produce_a_no_op_diff() {
        let palette = PaletteLut::flat_grayscale();
        let encoder = DiffEncoder::new(&palette, 1500);
        let frame = uniform_frame(RENDER_WIDTH, 4, 7);

        let diff = encoder.encode(&frame, &frame);
        assert!(diff.is_no_op());
    }

    #[test]
    fn uniform_color_change_prefers_the_shorter_variant() {
        let palette = PaletteLut::flat_grayscale();
        let encoder = DiffEncoder::new(&palette, 1);
        let prev = uniform_frame(RENDER_WIDTH, 4, 0);
        let curr = uniform_frame(RENDER_WIDTH, 4, 200);

        let diff = encoder.encode(&curr, &prev);
        assert!(!diff.is_no_op());
        assert_eq!(diff.changed_pixel_count(), curr.total_pixels());
        // A single uniform run compresses far better under RLE than the
        // one-pixel-per-block spatial payload.
        assert!(diff.use_rle());
    }

    #[test]
    fn start_pixel_is_packet_aligned() {
        let palette = PaletteLut::flat_grayscale();
        let encoder = DiffEncoder::new(&palette, 1);
        let mut prev = uniform_frame(RENDER_WIDTH, 4, 0);
        let mut curr = uniform_frame(RENDER_WIDTH, 4, 0);
        curr.pixels[100] = 255;
        prev.pixels[100] = 0;

        let diff = encoder.encode(&curr, &prev);
        assert_eq!(diff.start_pixel % PIXELS_PER_BITMAP_PACKET, 0);
        assert!(diff.start_pixel <= 100);
    }
}
