//! Capability boundaries the master session consumes (§6). Narrow traits
//! so tests can substitute synthetic sources/sinks without pulling in any
//! real capture hardware.

use remote_play_proto::Frame;

/// Produces one rendered frame per call, in palette-indexed form.
pub trait FrameSource {
    /// Renders (or loads) the next frame. `None` means no new frame is
    /// ready yet and the caller should retry rather than resend the
    /// previous one.
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Produces loopback audio chunks to interleave with frames.
pub trait AudioSource {
    /// Loads the next audio chunk, already sized to
    /// [`remote_play_proto::AUDIO_CHUNK_SIZE`]. Returns an empty slice when
    /// no audio is available this frame.
    fn load_chunk(&mut self) -> Box<[u8]>;
}

/// Receives the handheld's reported button state once per frame.
pub trait GamepadSink {
    /// Called with the raw 16-bit key bitmap the slave echoed back.
    fn set_buttons(&mut self, keys: u16);
}
