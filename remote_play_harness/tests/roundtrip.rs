//! End-to-end master+device scenarios over [`LoopbackSpiLink`], covering the
//! concrete cases this protocol is expected to handle correctly.

use remote_play_device::SlaveSession;
use remote_play_harness::loopback::LoopbackSpiLink;
use remote_play_harness::synthetic::{CountingPlayer, ExactFrames, NoAudio, RecordingGamepad};
use remote_play_master::{MasterSession, PaletteLut};
use remote_play_proto::{Frame, SessionOptions, DRAW_SCALE_X, DRAW_SCALE_Y, DRAW_WIDTH, RENDER_HEIGHT, RENDER_WIDTH};

/// Threshold low enough (500) that a single-component grayscale jump of
/// 200 levels (600 total delta under [`PaletteLut::flat_grayscale`])
/// registers as changed.
fn sensitive_options() -> SessionOptions {
    SessionOptions {
        compression_aggressiveness: 0,
        ..SessionOptions::default()
    }
}

/// Drives `frames` (in order) through a real master/device pair connected
/// by an in-memory link, on separate threads, and returns the slave's
/// final pixel buffer, scaled screen buffer, and the last keys its
/// `GamepadSink` observed.
fn run_frames(frames: Vec<Frame>, options: SessionOptions, keys: u16) -> (Vec<u8>, Vec<u8>, u16) {
    let (master_link, slave_link) = LoopbackSpiLink::pair();
    let frame_count = frames.len();

    let slave_handle = std::thread::spawn(move || {
        let mut session = SlaveSession::new(slave_link);
        session.reset().expect("slave reset");

        let mut player = CountingPlayer::default();
        let mut pending_audio = None;
        let mut vblank = || false;

        for _ in 0..frame_count {
            session
                .run_frame(keys, &mut player, &mut vblank, &mut pending_audio)
                .expect("slave frame");
        }

        (session.pixels().to_vec(), session.screen().to_vec())
    });

    let palette = PaletteLut::flat_grayscale();
    let mut session = MasterSession::new(master_link, options, palette);
    session.reset().expect("master reset");

    let mut source = ExactFrames::new(frames);
    let mut audio = NoAudio;
    let mut gamepad = RecordingGamepad::default();

    for _ in 0..frame_count {
        session
            .run_frame(&mut source, &mut audio, &mut gamepad)
            .expect("master frame");
    }

    let (pixels, screen) = slave_handle.join().expect("slave thread panicked");
    (pixels, screen, gamepad.last_keys)
}

#[test]
fn no_change_frame_leaves_the_slave_framebuffer_untouched() {
    let blank = Frame::blank(RENDER_WIDTH, RENDER_HEIGHT);
    let (pixels, screen, _) = run_frames(vec![blank], sensitive_options(), 0);
    assert!(pixels.iter().all(|&p| p == 0));
    assert!(screen.iter().all(|&p| p == 0));
}

#[test]
fn single_pixel_change_updates_exactly_that_pixel() {
    let baseline = Frame::blank(RENDER_WIDTH, RENDER_HEIGHT);
    let mut changed = baseline.clone();
    changed.pixels[1337] = 200;

    let (pixels, screen, _) = run_frames(vec![baseline, changed], sensitive_options(), 0);

    assert_eq!(pixels[1337], 200);
    assert!(pixels.iter().enumerate().all(|(i, &p)| i == 1337 || p == 0));

    // Pixel 1337 sits at (row 11, col 17) in a 120-wide frame; blit_scaled
    // replicates it across the 2x2 block starting at (row 22, col 34) in
    // the scaled screen buffer.
    let (src_x, src_y) = (1337 % RENDER_WIDTH, 1337 / RENDER_WIDTH);
    let (dst_x0, dst_y0) = (src_x * DRAW_SCALE_X, src_y * DRAW_SCALE_Y);
    for dy in 0..DRAW_SCALE_Y {
        for dx in 0..DRAW_SCALE_X {
            let idx = (dst_y0 + dy) * DRAW_WIDTH + dst_x0 + dx;
            assert_eq!(screen[idx], 200);
        }
    }
    assert!(screen.iter().filter(|&&p| p != 0).count() == DRAW_SCALE_X * DRAW_SCALE_Y);
}

#[test]
fn uniform_color_change_repaints_every_pixel() {
    let baseline = Frame::blank(RENDER_WIDTH, RENDER_HEIGHT);
    let changed = Frame {
        pixels: vec![255u8; RENDER_WIDTH * RENDER_HEIGHT].into_boxed_slice(),
        ..baseline.clone()
    };

    let (pixels, screen, _) = run_frames(vec![baseline, changed], sensitive_options(), 0);

    assert!(pixels.iter().all(|&p| p == 255));
    assert!(screen.iter().all(|&p| p == 255));
}

#[test]
fn gamepad_sink_receives_the_slaves_reported_keys_once_per_frame() {
    let blank = Frame::blank(RENDER_WIDTH, RENDER_HEIGHT);
    let (_, _, keys) = run_frames(vec![blank], sensitive_options(), 0xA5A5);
    assert_eq!(keys, 0xA5A5);
}

#[test]
fn session_options_round_trip_through_reset() {
    let options = SessionOptions {
        render_mode: 2,
        control_map: 1,
        compression_aggressiveness: 3,
        overclock: true,
    };

    let (master_link, slave_link) = LoopbackSpiLink::pair();

    let slave_handle = std::thread::spawn(move || {
        let mut session = SlaveSession::new(slave_link);
        session.reset().expect("slave reset")
    });

    let palette = PaletteLut::flat_grayscale();
    let mut session = MasterSession::new(master_link, options, palette);
    session.reset().expect("master reset");

    let negotiated = slave_handle.join().expect("slave thread panicked");
    assert_eq!(negotiated, options);
}
