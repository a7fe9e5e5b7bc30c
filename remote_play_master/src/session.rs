//! The master frame loop (§4.5) and session reset (§4.7, master side).

use remote_play_proto::{Command, Diff, DiffPayload, Frame, Metadata, ProtocolError, Role, SessionOptions};
use remote_play_wire::link::{SpiLink, SpiSpeed};
use remote_play_wire::pack::{pack_rle_pair, pixels_to_word};
use remote_play_wire::ReliableStream;

use crate::encoder::DiffEncoder;
use crate::error::MasterError;
use crate::palette::PaletteLut;
use crate::traits::{AudioSource, FrameSource, GamepadSink};

/// Owns the transport, the previous frame, and the negotiated session
/// options; drives one link end-to-end.
pub struct MasterSession<L> {
    stream: ReliableStream<L>,
    prev: Option<Frame>,
    options: SessionOptions,
    palette: PaletteLut,
}

impl<L: SpiLink> MasterSession<L> {
    pub fn new(link: L, options: SessionOptions, palette: PaletteLut) -> Self {
        MasterSession {
            stream: ReliableStream::new(link, Role::Master),
            prev: None,
            options,
            palette,
        }
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// Issues `CMD_RESET` and negotiates session options with the slave
    /// (§4.7): the first post-reset word carries this session's
    /// render-mode/control-map/compression/overclock bit-fields, which the
    /// slave is expected to echo back unchanged. Like the metadata/keys
    /// exchange in [`Self::exchange_metadata`], this is two lockstep
    /// full-duplex transactions: the first hands the word over, the
    /// second reads the slave's echo of it.
    pub fn reset(&mut self) -> Result<(), MasterError> {
        log::info!("master: initiating session reset");
        self.stream.sync(Command::Reset)?;

        let word = self.options.to_word();
        let ack_placeholder = self.stream.link_mut().exchange32(word, SpiSpeed::Slow)?;
        let echoed = self.stream.link_mut().exchange32(ack_placeholder, SpiSpeed::Slow)?;
        if echoed != word {
            log::warn!("master: slave did not echo session options correctly");
            return Err(ProtocolError::EchoMismatch.into());
        }

        self.prev = None;
        Ok(())
    }

    /// Runs one full frame: capture, diff, transfer, key injection. On any
    /// protocol-level failure the caller is expected to call [`Self::reset`]
    /// and try again (§7 policy: "the outer frame loop, on any failure,
    /// falls through to a reset handshake").
    pub fn run_frame(
        &mut self,
        frame_source: &mut impl FrameSource,
        audio_source: &mut impl AudioSource,
        gamepad: &mut impl GamepadSink,
    ) -> Result<(), MasterError> {
        let Some(mut curr) = frame_source.next_frame() else {
            return Ok(());
        };
        curr.audio_chunk = audio_source.load_chunk();

        let blank;
        let prev_ref = match &self.prev {
            Some(prev) => prev,
            None => {
                blank = Frame::blank(curr.width, curr.height);
                &blank
            }
        };

        let encoder = DiffEncoder::new(&self.palette, self.options.diff_threshold());
        let diff = encoder.encode(&curr, prev_ref);

        self.stream.sync(Command::FrameStart)?;

        let keys = self.exchange_metadata(&diff, curr.has_audio())?;

        self.send_diff_bitmaps(&diff)?;

        if curr.has_audio() {
            self.stream.sync(Command::Audio)?;
            self.send_audio(&curr)?;
        }

        self.stream.sync(Command::Pixels)?;
        self.send_pixel_payload(&diff)?;

        self.stream.sync(Command::FrameEnd)?;

        gamepad.set_buttons(keys);
        self.prev = Some(curr);
        Ok(())
    }

    fn exchange_metadata(&mut self, diff: &Diff, has_audio: bool) -> Result<u16, MasterError> {
        let metadata = Metadata {
            start_pixel: diff.start_pixel as u32,
            expected_packets: diff.expected_packets,
            use_rle: diff.use_rle(),
            has_audio,
        };
        let word = metadata.to_word();

        let keys = self.stream.link_mut().exchange32(word, SpiSpeed::Slow)?;
        let echoed = self.stream.link_mut().exchange32(keys, SpiSpeed::Slow)?;
        if echoed != word {
            log::warn!("master: metadata echo mismatch");
            return Err(ProtocolError::EchoMismatch.into());
        }

        Ok(keys as u16)
    }

    fn send_diff_bitmaps(&mut self, diff: &Diff) -> Result<(), MasterError> {
        let start_byte = diff.start_pixel / 8;
        self.send_words(&bytes_to_words(&diff.temporal_bits[start_byte..]))?;

        match &diff.payload {
            DiffPayload::Spatial { spatial_bits, .. } => {
                self.send_words(&bytes_to_words(spatial_bits))?;
            }
            DiffPayload::Rle { palette_map, .. } => {
                // The slave has no way to learn the true remap length from
                // the metadata word, so this always ships the full
                // fixed-size table, zero-padded past the entries actually
                // used (mirrors the GBA-side fixed-size receive loop).
                let mut padded = vec![0u8; remote_play_proto::SPATIAL_DIFF_COLOR_LIMIT].into_boxed_slice();
                padded[..palette_map.len()].copy_from_slice(palette_map);
                self.send_words(&bytes_to_words(&padded))?;
            }
        }
        Ok(())
    }

    fn send_audio(&mut self, frame: &Frame) -> Result<(), MasterError> {
        self.send_words(&bytes_to_words(&frame.audio_chunk))
    }

    fn send_pixel_payload(&mut self, diff: &Diff) -> Result<(), MasterError> {
        let words: Vec<u32> = match &diff.payload {
            DiffPayload::Spatial { pixels, .. } => pixels.chunks(4).map(pixels_to_word).collect(),
            DiffPayload::Rle { runs, .. } => {
                let mut bytes = Vec::with_capacity(runs.len() * 2);
                for &(run_length, compressed_index) in runs.iter() {
                    // The encoder never splits a run across the repeat
                    // marker today; it always emits a single run per
                    // distinct pixel value (see `DiffEncoder::encode_rle`).
                    let (a, b) = pack_rle_pair(run_length, compressed_index, false);
                    bytes.push(a);
                    bytes.push(b);
                }
                bytes_to_words(&bytes)
            }
        };
        self.send_words(&words)
    }

    fn send_words(&mut self, words: &[u32]) -> Result<(), MasterError> {
        let total = words.len() as u32;
        let mut index = 0u32;
        while index < total {
            let word = words[index as usize];
            self.stream.send(word, &mut index, total)?;
        }
        Ok(())
    }
}

fn bytes_to_words(bytes: &[u8]) -> Vec<u32> {
    bytes.chunks(4).map(pixels_to_word).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_play_proto::{Role, SYNC_VALIDATIONS};
    use remote_play_wire::link::LinkError;
    use std::collections::VecDeque;

    struct FakeLink {
        responses: VecDeque<u32>,
    }

    impl SpiLink for FakeLink {
        fn exchange32(&mut self, _word: u32, _speed: SpiSpeed) -> Result<u32, LinkError> {
            Ok(self.responses.pop_front().unwrap_or(0))
        }
    }

    #[test]
    fn reset_accepts_a_correctly_echoed_word() {
        let role = Role::Master;
        let remote = role.remote(Command::Reset);
        let mut responses: VecDeque<u32> = (0..SYNC_VALIDATIONS).map(|i| remote + i).collect();

        let options = SessionOptions::default();
        responses.push_back(0); // placeholder ack, unobserved
        responses.push_back(options.to_word()); // correct echo

        let mut session = MasterSession::new(FakeLink { responses }, options, PaletteLut::flat_grayscale());
        assert!(session.reset().is_ok());
    }

    #[test]
    fn reset_rejects_a_mismatched_echo() {
        let role = Role::Master;
        let remote = role.remote(Command::Reset);
        let mut responses: VecDeque<u32> = (0..SYNC_VALIDATIONS).map(|i| remote + i).collect();

        let options = SessionOptions::default();
        responses.push_back(0);
        responses.push_back(!options.to_word()); // wrong echo

        let mut session = MasterSession::new(FakeLink { responses }, options, PaletteLut::flat_grayscale());
        assert!(matches!(session.reset(), Err(MasterError::Protocol(ProtocolError::EchoMismatch))));
    }
}
