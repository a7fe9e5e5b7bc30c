//! Demo binary: runs a synthetic master and device against each other over
//! an in-memory link for a handful of frames, logging every protocol phase.

use remote_play_harness::loopback::LoopbackSpiLink;
use remote_play_harness::synthetic::{CountingPlayer, NoAudio, RecordingGamepad, ScriptedFrames, ToneAudio};
use remote_play_master::{MasterSession, PaletteLut};
use remote_play_proto::SessionOptions;

const FRAME_COUNT: usize = 30;

fn main() {
    env_logger::init();

    let (master_link, slave_link) = LoopbackSpiLink::pair();

    let slave_handle = std::thread::spawn(move || run_slave(slave_link));
    run_master(master_link);

    slave_handle.join().expect("slave thread panicked");
}

fn run_master(link: LoopbackSpiLink) {
    let options = SessionOptions::default();
    let palette = PaletteLut::flat_grayscale();
    let mut session = MasterSession::new(link, options, palette);

    session.reset().expect("master: initial reset failed");
    log::info!("master: session established with {options:?}");

    let mut frames = ScriptedFrames::new(FRAME_COUNT);
    let mut audio = ToneAudio::new(64);
    let mut silence = NoAudio;
    let mut gamepad = RecordingGamepad::default();

    for i in 0..FRAME_COUNT {
        let result = if i % 4 == 0 {
            session.run_frame(&mut frames, &mut audio, &mut gamepad)
        } else {
            session.run_frame(&mut frames, &mut silence, &mut gamepad)
        };

        match result {
            Ok(()) => log::info!("master: frame {i} delivered, keys={:#06x}", gamepad.last_keys),
            Err(e) => {
                log::warn!("master: frame {i} failed ({e}), resetting");
                session.reset().expect("master: recovery reset failed");
            }
        }
    }
}

fn run_slave(link: LoopbackSpiLink) {
    let mut session = remote_play_device::SlaveSession::new(link);
    let options = session.reset().expect("slave: initial reset failed");
    log::info!("slave: session established with {options:?}");

    let mut player = CountingPlayer::default();
    let mut pending_audio = None;
    let mut vblank_toggle = false;
    let mut vblank = move || {
        vblank_toggle = !vblank_toggle;
        vblank_toggle
    };

    for i in 0..FRAME_COUNT {
        match session.run_frame(0, &mut player, &mut vblank, &mut pending_audio) {
            Ok(()) => log::info!("slave: frame {i} rendered"),
            Err(e) => log::warn!("slave: frame {i} failed ({e})"),
        }
    }

    log::info!(
        "slave: {} audio chunks fed, {} player pumps",
        player.chunks_fed,
        player.pumps
    );
}
