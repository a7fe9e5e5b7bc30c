//! The slave frame loop and state machine (§4.6), session reset (§4.7,
//! device side), and VBlank-gated audio servicing.

use remote_play_proto::{
    Command, DiffPayload, Metadata, ProtocolError, Role, SessionOptions, SlaveFrameState,
    RENDER_WIDTH, TOTAL_PIXELS, TOTAL_SCREEN_PIXELS, TRANSFER_SYNC_FREQUENCY,
};
use remote_play_wire::link::{BreakableSpiLink, SpiSpeed};
use remote_play_wire::pack::{unpack_rle_pair, word_to_pixels};
use remote_play_wire::{ReceiveOutcome, ReliableStream};

use crate::decompress::Decompressor;
use crate::error::DeviceError;
use crate::traits::PlayerDriver;
use crate::vblank::VBlankTracker;

/// Owns the transport, the reconstructed pixel buffer, the scaled screen
/// framebuffer, and VBlank/audio bookkeeping; drives one link end-to-end
/// from the handheld side.
pub struct SlaveSession<L> {
    stream: ReliableStream<L>,
    vblank: VBlankTracker,
    pixels: Box<[u8]>,
    screen: Box<[u8]>,
}

impl<L: BreakableSpiLink> SlaveSession<L> {
    pub fn new(link: L) -> Self {
        SlaveSession {
            stream: ReliableStream::new(link, Role::Slave),
            vblank: VBlankTracker::new(),
            pixels: vec![0u8; TOTAL_PIXELS].into_boxed_slice(),
            screen: vec![0u8; TOTAL_SCREEN_PIXELS].into_boxed_slice(),
        }
    }

    /// Rendezvous on `CMD_RESET` and receive this session's options. See
    /// [`crate::session`] module docs and
    /// `remote_play_master::MasterSession::reset` for the paired
    /// two-transaction handshake shape.
    pub fn reset(&mut self) -> Result<SessionOptions, DeviceError> {
        log::info!("slave: awaiting session reset");
        self.stream.sync(Command::Reset)?;

        let word = self.stream.link_mut().exchange32(0, SpiSpeed::Slow)?;
        self.stream.link_mut().exchange32(word, SpiSpeed::Slow)?;

        self.pixels = vec![0u8; TOTAL_PIXELS].into_boxed_slice();
        Ok(SessionOptions::from_word(word))
    }

    /// Runs one full frame (`FrameStart` → `FrameEnd`). `Reset`/`RxDiffs`/
    /// `RxAudio`/`RxPixels`/`FrameEnd` from §4.6 correspond to the sequence
    /// of calls below; there is no partial-frame commit, matching §7's
    /// display policy. VBlank is polled on every word exchanged during the
    /// bulk transfers, not just between these phases, so audio is never
    /// starved for a whole multi-packet transfer — see
    /// [`Self::receive_words`].
    pub fn run_frame(
        &mut self,
        keys: u16,
        player: &mut impl PlayerDriver,
        vblank_raw: &mut impl FnMut() -> bool,
        pending_audio: &mut Option<Box<[u8]>>,
    ) -> Result<(), DeviceError> {
        let player: &mut dyn PlayerDriver = player;
        let vblank_raw: &mut dyn FnMut() -> bool = vblank_raw;

        self.stream.sync(Command::FrameStart)?;
        self.poll_vblank(player, vblank_raw, pending_audio);

        let metadata = self.send_keys_and_receive_metadata(keys)?;
        self.poll_vblank(player, vblank_raw, pending_audio);

        let mut state = SlaveFrameState::new(metadata, self.pixels.clone());

        let (temporal_bits, payload) = self.receive_diffs(&metadata, player, vblank_raw, pending_audio)?;
        self.poll_vblank(player, vblank_raw, pending_audio);

        if metadata.has_audio {
            self.stream.sync(Command::Audio)?;
            let chunk = self.receive_audio(player, vblank_raw, pending_audio)?;
            *pending_audio = Some(chunk);
        }
        self.poll_vblank(player, vblank_raw, pending_audio);

        self.stream.sync(Command::Pixels)?;
        let compressed = self.receive_pixels(&mut state, player, vblank_raw, pending_audio)?;
        self.poll_vblank(player, vblank_raw, pending_audio);

        self.stream.sync(Command::FrameEnd)?;

        if !state.pixels_complete() {
            log::warn!(
                "slave: frame ended with only {} of {} expected pixel packets",
                state.packets_received,
                state.metadata.expected_packets
            );
        }

        self.apply(&mut state, &temporal_bits, &payload, &compressed);
        self.pixels = state.pixels;
        Decompressor::blit_scaled(&self.pixels, RENDER_WIDTH, &mut self.screen);

        Ok(())
    }

    /// The unscaled, render-resolution pixel buffer.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The `DRAW_WIDTH × DRAW_HEIGHT` framebuffer, blitted from
    /// [`Self::pixels`] at the end of every frame — the actual display
    /// output (§2, §4.4 step 3).
    pub fn screen(&self) -> &[u8] {
        &self.screen
    }

    fn poll_vblank(
        &mut self,
        player: &mut dyn PlayerDriver,
        vblank_raw: &mut dyn FnMut() -> bool,
        pending_audio: &mut Option<Box<[u8]>>,
    ) {
        if self.vblank.poll(vblank_raw()) {
            self.drive_audio(player, pending_audio);
        }
    }

    /// VBlank-gated audio servicing (§4.6): feed a buffered chunk if the
    /// player wants one, then pump the player one step.
    fn drive_audio(&mut self, player: &mut dyn PlayerDriver, pending_audio: &mut Option<Box<[u8]>>) {
        if player.needs_data() {
            if let Some(chunk) = pending_audio.take() {
                player.feed(&chunk);
            }
        }
        player.pump();
    }

    fn send_keys_and_receive_metadata(&mut self, keys: u16) -> Result<Metadata, DeviceError> {
        let received_metadata_word = self.stream.link_mut().exchange32(u32::from(keys), SpiSpeed::Slow)?;
        let echoed_keys = self
            .stream
            .link_mut()
            .exchange32(received_metadata_word, SpiSpeed::Slow)?;

        if echoed_keys != u32::from(keys) {
            log::warn!("slave: metadata/keys echo mismatch");
            return Err(ProtocolError::EchoMismatch.into());
        }

        Metadata::from_word(received_metadata_word).map_err(DeviceError::from)
    }

    fn receive_diffs(
        &mut self,
        metadata: &Metadata,
        player: &mut dyn PlayerDriver,
        vblank_raw: &mut dyn FnMut() -> bool,
        pending_audio: &mut Option<Box<[u8]>>,
    ) -> Result<(Box<[u8]>, DiffPayload), DeviceError> {
        // Only the bytes from `start_byte` onward travel on the wire (the
        // master never changes start_pixel bits below it); reconstruct a
        // full-size, absolute-indexed bitmap so `Decompressor` can use
        // plain pixel indices the way `DiffEncoder` does on the send side.
        let start_byte = metadata.start_pixel as usize / 8;
        let mut temporal_bits = vec![0u8; remote_play_proto::TEMPORAL_DIFF_SIZE].into_boxed_slice();
        self.receive_words(&mut temporal_bits[start_byte..], player, vblank_raw, pending_audio)?;

        let payload = if metadata.use_rle {
            let mut palette_map = vec![0u8; remote_play_proto::SPATIAL_DIFF_COLOR_LIMIT].into_boxed_slice();
            self.receive_words(&mut palette_map, player, vblank_raw, pending_audio)?;
            DiffPayload::Rle {
                runs: Box::new([]),
                palette_map,
            }
        } else {
            let n_blocks = (TOTAL_PIXELS - metadata.start_pixel as usize).div_ceil(4);
            let mut spatial_bits = vec![0u8; n_blocks.div_ceil(8)].into_boxed_slice();
            self.receive_words(&mut spatial_bits, player, vblank_raw, pending_audio)?;
            DiffPayload::Spatial {
                spatial_bits,
                pixels: Box::new([]),
            }
        };

        Ok((temporal_bits, payload))
    }

    fn receive_audio(
        &mut self,
        player: &mut dyn PlayerDriver,
        vblank_raw: &mut dyn FnMut() -> bool,
        pending_audio: &mut Option<Box<[u8]>>,
    ) -> Result<Box<[u8]>, DeviceError> {
        let mut audio = vec![0u8; remote_play_proto::AUDIO_PADDED_SIZE].into_boxed_slice();
        self.receive_words(&mut audio, player, vblank_raw, pending_audio)?;
        Ok(audio)
    }

    fn receive_pixels(
        &mut self,
        state: &mut SlaveFrameState,
        player: &mut dyn PlayerDriver,
        vblank_raw: &mut dyn FnMut() -> bool,
        pending_audio: &mut Option<Box<[u8]>>,
    ) -> Result<Box<[u8]>, DeviceError> {
        let mut bytes = vec![0u8; state.metadata.expected_packets as usize * 4].into_boxed_slice();
        self.receive_words(&mut bytes, player, vblank_raw, pending_audio)?;
        for _ in 0..state.metadata.expected_packets {
            state.record_packet();
        }
        Ok(bytes)
    }

    /// Pulls `buf.len() / 4` packets over the reliable stream into `buf`,
    /// little-endian within each word (mirroring
    /// [`remote_play_wire::pack::word_to_pixels`]).
    ///
    /// VBlank is polled between every single word, not just between
    /// protocol phases (§4.6): off a checkpoint this is a plain poll that
    /// drives audio if it fires; at a checkpoint it's folded into the
    /// exchange itself via [`ReliableStream::receive_breakable`], which can
    /// turn the poll into an actual mid-transfer break and recovery
    /// rendezvous with the sender.
    fn receive_words(
        &mut self,
        buf: &mut [u8],
        player: &mut dyn PlayerDriver,
        vblank_raw: &mut dyn FnMut() -> bool,
        pending_audio: &mut Option<Box<[u8]>>,
    ) -> Result<(), DeviceError> {
        // Mirrors the sender's `bytes_to_words`, which ceil-divides and
        // zero-pads the final partial chunk: read the same packet count
        // here so the two sides stay lockstep even when `buf.len()` isn't
        // a multiple of 4.
        let total = buf.len().div_ceil(4) as u32;
        let mut index = 0u32;

        while index < total {
            if index % TRANSFER_SYNC_FREQUENCY != 0 {
                if self.vblank.poll(vblank_raw()) {
                    self.drive_audio(player, pending_audio);
                }
                let word = self.stream.receive(&mut index, total)?;
                write_word(buf, index - 1, word);
                continue;
            }

            let vblank = &mut self.vblank;
            let outcome = self
                .stream
                .receive_breakable(&mut index, total, &mut || vblank.poll(vblank_raw()))?;

            match outcome {
                ReceiveOutcome::Received(word) => write_word(buf, index - 1, word),
                ReceiveOutcome::Recovered => self.drive_audio(player, pending_audio),
            }
        }
        Ok(())
    }

    fn apply(&mut self, state: &mut SlaveFrameState, temporal_bits: &[u8], payload: &DiffPayload, compressed: &[u8]) {
        if state.metadata.expected_packets == 0 {
            return;
        }

        let start_pixel = state.metadata.start_pixel as usize;
        match payload {
            DiffPayload::Spatial { spatial_bits, .. } => {
                Decompressor::apply_spatial(
                    &mut state.pixels,
                    temporal_bits,
                    spatial_bits,
                    compressed,
                    start_pixel,
                );
            }
            DiffPayload::Rle { palette_map, .. } => {
                // `runs` travels as the pixel-payload words, not as part of
                // the diff exchange, so it never lands in this `DiffPayload`
                // on the receive path; decode it straight from `compressed`.
                let runs: Vec<(u8, u8)> = compressed
                    .chunks_exact(2)
                    .map(|pair| {
                        let (run_length, index, _repeat) = unpack_rle_pair(pair[0], pair[1]);
                        (run_length, index)
                    })
                    .collect();
                Decompressor::apply_rle(&mut state.pixels, temporal_bits, palette_map, &runs, start_pixel);
            }
        }
    }
}

fn write_word(buf: &mut [u8], packet_index: u32, word: u32) {
    let bytes = word_to_pixels(word);
    let start = packet_index as usize * 4;
    let end = (start + 4).min(buf.len());
    buf[start..end].copy_from_slice(&bytes[..end - start]);
}
