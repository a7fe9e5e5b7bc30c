//! Protocol-wide constants, translated from the render/transfer/diff
//! parameters of the original link.

/// Render resolution (width), in source pixels.
pub const RENDER_WIDTH: usize = 120;
/// Render resolution (height), in source pixels.
pub const RENDER_HEIGHT: usize = 80;
/// Total source pixels per frame.
pub const TOTAL_PIXELS: usize = RENDER_WIDTH * RENDER_HEIGHT;

/// Horizontal scale factor applied when blitting to the device screen.
pub const DRAW_SCALE_X: usize = 2;
/// Vertical scale factor applied when blitting to the device screen.
pub const DRAW_SCALE_Y: usize = 2;
/// Screen width after scaling.
pub const DRAW_WIDTH: usize = RENDER_WIDTH * DRAW_SCALE_X;
/// Screen height after scaling.
pub const DRAW_HEIGHT: usize = RENDER_HEIGHT * DRAW_SCALE_Y;
/// Total screen pixels after scaling.
pub const TOTAL_SCREEN_PIXELS: usize = DRAW_WIDTH * DRAW_HEIGHT;

/// Number of distinct palette colors (8-bit palette index).
pub const PALETTE_COLORS: usize = 256;

/// Size of one word on the wire, in bytes. Every unit on the wire is exactly
/// this many bytes; there are no variable-size packets.
pub const PACKET_SIZE: usize = 4;
/// Palette-indexed pixels packed per 4-byte packet (non-RLE payload).
pub const PIXELS_PER_PACKET: usize = PACKET_SIZE / size_of::<u8>();

/// Number of pixels per spatial-diff block (variant A).
pub const SPATIAL_DIFF_BLOCK_SIZE: usize = 4;
/// Size, in bytes, of the temporal diff bitmap (one bit per source pixel).
pub const TEMPORAL_DIFF_SIZE: usize = TOTAL_PIXELS / 8;
/// Size, in bytes, of the spatial diff bitmap (one bit per block).
pub const SPATIAL_DIFF_SIZE: usize = TOTAL_PIXELS / SPATIAL_DIFF_BLOCK_SIZE / 8;
/// Maximum number of palette entries a compressed (RLE) frame may remap.
pub const SPATIAL_DIFF_COLOR_LIMIT: usize = 128;

/// Every `TRANSFER_SYNC_FREQUENCY`-th outgoing packet is a checkpoint,
/// reliably acknowledged by the receiver's next-expected-index echo.
pub const TRANSFER_SYNC_FREQUENCY: u32 = 8;

/// Consecutive successful offset exchanges required to declare a `sync()`
/// handshake complete. Also acts as a short nonce check against spurious
/// matches.
pub const SYNC_VALIDATIONS: u32 = 3;

/// Size, in bytes, of one compressed audio chunk before packet padding.
pub const AUDIO_CHUNK_SIZE: usize = 76;
/// Size, in bytes, of one audio chunk after zero-padding to a packet
/// boundary.
pub const AUDIO_PADDED_SIZE: usize =
    AUDIO_CHUNK_SIZE.div_ceil(PACKET_SIZE) * PACKET_SIZE;
/// Number of 4-byte packets one audio chunk occupies on the wire.
pub const AUDIO_SIZE_PACKETS: usize = AUDIO_PADDED_SIZE / PACKET_SIZE;

/// Width, in bits, of the `start_pixel` field of the metadata word.
pub const START_PIXEL_WIDTH: u32 = 14;
/// Width, in bits, of the `expected_packets` field of the metadata word.
pub const EXPECTED_PACKETS_WIDTH: u32 = 13;

/// Diff thresholds selectable by the session's compression-aggressiveness
/// bit-field (§4.7); higher indices trade fidelity for bandwidth.
pub const DIFF_THRESHOLDS: [u16; 4] = [500, 1000, 1500, 2500];
