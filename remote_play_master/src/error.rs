//! Master-side error type: wraps protocol and transport failures with the
//! context the frame loop needs to decide whether to reset.

use remote_play_proto::ProtocolError;
use remote_play_wire::link::LinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MasterError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("transport error: {0}")]
    Link(#[from] LinkError),
    #[error("palette cache I/O failed: {0}")]
    PaletteIo(#[from] std::io::Error),
}
