//! Slave-side error type.

use remote_play_proto::ProtocolError;
use remote_play_wire::link::LinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("transport error: {0}")]
    Link(#[from] LinkError),
}
