//! The reliable packet stream built on top of [`SpiLink`] (§4.2): sync
//! handshakes and checkpointed, resynchronizable payload transfer.

use remote_play_proto::{Command, ProtocolError, Role, SYNC_VALIDATIONS, TRANSFER_SYNC_FREQUENCY};

use crate::link::{BreakableSpiLink, LinkError, SpiLink, SpiSpeed};

/// Outcome of one [`ReliableStream::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The packet was accepted and `index` advanced by one.
    Sent,
    /// The peer broke the stream to recover; `index` was reset to the
    /// value the peer requested and the caller should resend from there.
    Recovered,
}

/// Outcome of one [`ReliableStream::receive_breakable`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The peer's payload word for this index; `index` advanced by one.
    Received(u32),
    /// `may_break` requested a pause at this checkpoint and the peer
    /// agreed; `index` is left unchanged, so the caller resumes from the
    /// same packet once it's ready to continue.
    Recovered,
}

/// Shared sync/send logic, parametrized by [`Role`] so master and slave use
/// the exact same state machine (§4.2).
pub struct ReliableStream<L> {
    link: L,
    role: Role,
}

impl<L> ReliableStream<L> {
    pub fn new(link: L, role: Role) -> Self {
        ReliableStream { link, role }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }
}

impl<L: SpiLink> ReliableStream<L> {
    /// Rendezvous on `command`: repeatedly exchange `local + i` and expect
    /// `remote + i` back, for `i` in `0..SYNC_VALIDATIONS`, until
    /// `SYNC_VALIDATIONS` consecutive exchanges all match. Aborts with
    /// [`ProtocolError::Desync`] if the peer answers with a raw
    /// `CMD_RESET`.
    pub fn sync(&mut self, command: Command) -> Result<(), ProtocolError> {
        let local = self.role.local(command);
        let remote = self.role.remote(command);

        loop {
            let mut confirmation = 0u32;
            let mut on_sync = true;

            for i in 0..SYNC_VALIDATIONS {
                confirmation = self
                    .link
                    .exchange32(local + i, SpiSpeed::Slow)
                    .map_err(|e| self.map_link_error(e))?;
                if confirmation != remote + i {
                    on_sync = false;
                    break;
                }
            }

            if on_sync {
                return Ok(());
            }

            if confirmation == Command::Reset.base() {
                log::warn!(
                    "sync({command:?}) aborted: peer sent CMD_RESET (sent {local:#x}, expected {remote:#x})"
                );
                return Err(ProtocolError::Desync);
            }

            log::debug!("sync({command:?}) retrying, peer echoed {confirmation:#x}");
        }
    }

    /// Sends one payload packet at the current `index` out of `total`.
    /// Every `TRANSFER_SYNC_FREQUENCY`-th packet is a checkpoint, carrying
    /// an echoed expected-index for resynchronization; the rest fire at
    /// full speed without inspecting the return word.
    pub fn send(
        &mut self,
        packet: u32,
        index: &mut u32,
        total: u32,
    ) -> Result<SendOutcome, ProtocolError> {
        if *index % TRANSFER_SYNC_FREQUENCY == 0 {
            self.reliably_send(packet, index, total)
        } else {
            self.link
                .exchange32(packet, SpiSpeed::Fast)
                .map_err(|e| self.map_link_error(e))?;
            *index += 1;
            Ok(SendOutcome::Sent)
        }
    }

    fn reliably_send(
        &mut self,
        packet: u32,
        index: &mut u32,
        total: u32,
    ) -> Result<SendOutcome, ProtocolError> {
        let requested_index = self
            .link
            .exchange32(packet, SpiSpeed::Fast)
            .map_err(|e| self.map_link_error(e))?;

        if requested_index >= total {
            if requested_index == self.role.remote(Command::Recovery) {
                log::debug!("checkpoint: peer requested recovery");
                self.sync(Command::Recovery)?;
                let next = self
                    .link
                    .exchange32(0, SpiSpeed::Slow)
                    .map_err(|e| self.map_link_error(e))?;
                *index = next;
                return Ok(SendOutcome::Recovered);
            }
            if requested_index == Command::Reset.base() {
                log::warn!("checkpoint: peer reset mid-transfer");
                return Err(ProtocolError::Desync);
            }
            // Unknown/line-noise value above `total`: ignore, treat the
            // checkpoint as acknowledged.
            *index += 1;
            return Ok(SendOutcome::Sent);
        }

        if requested_index == *index {
            *index += 1;
            Ok(SendOutcome::Sent)
        } else {
            log::warn!("checkpoint desync: expected index {}, peer requested {requested_index}", *index);
            Err(ProtocolError::Desync)
        }
    }

    /// Receives one payload word at the current `index` out of `total`
    /// (the receiving side's counterpart to [`Self::send`]): puts `index`
    /// itself on the wire — signaling which packet this side is ready
    /// for — and returns whatever payload word the peer placed on the link
    /// in that same full-duplex transaction.
    ///
    /// Checkpoint/recovery bookkeeping lives entirely on the sending side
    /// (`send`/`reliably_send` inspect the echoed index); the receiver
    /// just advances. This method never breaks the transfer itself — see
    /// [`Self::receive_breakable`] for the checkpoint-aligned counterpart
    /// that can.
    pub fn receive(&mut self, index: &mut u32, total: u32) -> Result<u32, ProtocolError> {
        debug_assert!(*index < total);
        let word = self
            .link
            .exchange32(*index, SpiSpeed::Fast)
            .map_err(|e| self.map_link_error(e))?;
        *index += 1;
        Ok(word)
    }

    fn map_link_error(&self, err: LinkError) -> ProtocolError {
        log::warn!("transport failure during reliable stream operation: {err}");
        ProtocolError::Desync
    }
}

impl<L: BreakableSpiLink> ReliableStream<L> {
    /// The receiving side's counterpart to [`Self::receive`] that can
    /// actually break the transfer, mirroring `_main.cpp`'s
    /// `transfer()`/`sync(CMD_RECOVERY)` pair: at a checkpoint, `may_break`
    /// gets a chance to substitute a recovery request for the expected
    /// index, which [`Self::reliably_send`] on the other end recognizes in
    /// that same paired exchange.
    ///
    /// Only checkpoint-aligned indices (`index % TRANSFER_SYNC_FREQUENCY ==
    /// 0`) are offered the chance to break: `reliably_send` only inspects
    /// the echoed word at those same indices, so a break requested off a
    /// checkpoint would go unnoticed by the sender until its next one,
    /// leaving the two sides' packet counts out of step. `may_break` is
    /// not called at all off a checkpoint, so an edge-triggered poll isn't
    /// consumed before the next checkpoint gets a chance to see it.
    pub fn receive_breakable(
        &mut self,
        index: &mut u32,
        total: u32,
        may_break: &mut dyn FnMut() -> bool,
    ) -> Result<ReceiveOutcome, ProtocolError> {
        debug_assert!(*index < total);

        let can_break = *index % TRANSFER_SYNC_FREQUENCY == 0;
        let break_word = self.role.local(Command::Recovery);
        let (word, broke) = self
            .link
            .transfer_breakable(*index, break_word, &mut || can_break && may_break())
            .map_err(|e| self.map_link_error(e))?;

        if broke {
            log::debug!("receive: breaking transfer at checkpoint index {}", *index);
            self.sync(Command::Recovery)?;
            let resume_from = *index;
            self.link
                .exchange32(resume_from, SpiSpeed::Slow)
                .map_err(|e| self.map_link_error(e))?;
            return Ok(ReceiveOutcome::Recovered);
        }

        *index += 1;
        Ok(ReceiveOutcome::Received(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// A scripted [`SpiLink`] that replays a fixed sequence of responses,
    /// recording everything sent to it.
    struct ScriptedLink {
        responses: VecDeque<u32>,
        sent: Vec<u32>,
    }

    impl SpiLink for ScriptedLink {
        fn exchange32(&mut self, word: u32, _speed: SpiSpeed) -> Result<u32, LinkError> {
            self.sent.push(word);
            Ok(self.responses.pop_front().unwrap_or(0))
        }
    }

    impl BreakableSpiLink for ScriptedLink {}

    #[test]
    fn sync_succeeds_when_peer_echoes_remote_offsets() {
        let role = Role::Master;
        let command = Command::FrameStart;
        let remote = role.remote(command);
        let responses = (0..SYNC_VALIDATIONS).map(|i| remote + i).collect();

        let mut stream = ReliableStream::new(
            ScriptedLink {
                responses,
                sent: Vec::new(),
            },
            role,
        );

        assert!(stream.sync(command).is_ok());
    }

    #[test]
    fn sync_reports_desync_on_reset() {
        let role = Role::Master;
        let command = Command::FrameStart;
        let mut responses = VecDeque::new();
        responses.push_back(Command::Reset.base());

        let mut stream = ReliableStream::new(
            ScriptedLink {
                responses,
                sent: Vec::new(),
            },
            role,
        );

        assert_eq!(stream.sync(command), Err(ProtocolError::Desync));
    }

    #[test]
    fn send_at_non_checkpoint_index_does_not_inspect_reply() {
        let role = Role::Master;
        let mut stream = ReliableStream::new(
            ScriptedLink {
                responses: VecDeque::new(),
                sent: Vec::new(),
            },
            role,
        );

        let mut index = 1; // not a multiple of TRANSFER_SYNC_FREQUENCY
        let outcome = stream.send(0xDEAD_BEEF, &mut index, 100).unwrap();
        assert_eq!(outcome, SendOutcome::Sent);
        assert_eq!(index, 2);
    }

    #[test]
    fn checkpoint_send_advances_on_matching_echo() {
        let role = Role::Master;
        let mut responses = VecDeque::new();
        responses.push_back(0); // echoes back the expected index
        let mut stream = ReliableStream::new(
            ScriptedLink {
                responses,
                sent: Vec::new(),
            },
            role,
        );

        let mut index = 0;
        let outcome = stream.send(0x1234, &mut index, 100).unwrap();
        assert_eq!(outcome, SendOutcome::Sent);
        assert_eq!(index, 1);
    }

    #[test]
    fn receive_returns_the_peers_payload_and_advances_index() {
        let role = Role::Slave;
        let mut responses = VecDeque::new();
        responses.push_back(0xCAFE_F00D);
        let mut stream = ReliableStream::new(
            ScriptedLink {
                responses,
                sent: Vec::new(),
            },
            role,
        );

        let mut index = 0;
        let word = stream.receive(&mut index, 4).unwrap();
        assert_eq!(word, 0xCAFE_F00D);
        assert_eq!(index, 1);
        assert_eq!(stream.link().sent, vec![0]);
    }

    #[test]
    fn receive_breakable_behaves_like_receive_when_may_break_stays_false() {
        let role = Role::Slave;
        let mut responses = VecDeque::new();
        responses.push_back(0xCAFE_F00D);
        let mut stream = ReliableStream::new(
            ScriptedLink {
                responses,
                sent: Vec::new(),
            },
            role,
        );

        let mut index = 0; // checkpoint-aligned
        let outcome = stream
            .receive_breakable(&mut index, 100, &mut || false)
            .unwrap();
        assert_eq!(outcome, ReceiveOutcome::Received(0xCAFE_F00D));
        assert_eq!(index, 1);
        assert_eq!(stream.link().sent, vec![0]);
    }

    #[test]
    fn receive_breakable_ignores_may_break_off_checkpoint() {
        let role = Role::Slave;
        let mut responses = VecDeque::new();
        responses.push_back(0xCAFE_F00D);
        let mut stream = ReliableStream::new(
            ScriptedLink {
                responses,
                sent: Vec::new(),
            },
            role,
        );

        let mut index = 3; // not a multiple of TRANSFER_SYNC_FREQUENCY
        let outcome = stream
            .receive_breakable(&mut index, 100, &mut || true)
            .unwrap();
        assert_eq!(outcome, ReceiveOutcome::Received(0xCAFE_F00D));
        assert_eq!(index, 4);
        // The substituted recovery word is never sent off a checkpoint.
        assert_eq!(stream.link().sent, vec![3]);
    }

    #[test]
    fn receive_breakable_sends_the_recovery_word_and_resumes_at_the_same_index() {
        let role = Role::Slave;
        let remote = role.remote(Command::Recovery);
        let mut responses: VecDeque<u32> = (0..SYNC_VALIDATIONS).map(|i| remote + i).collect();
        responses.push_back(0); // reply to the resume-index exchange, unobserved
        let mut stream = ReliableStream::new(
            ScriptedLink {
                responses,
                sent: Vec::new(),
            },
            role,
        );

        let mut index = 8; // checkpoint-aligned
        let outcome = stream
            .receive_breakable(&mut index, 100, &mut || true)
            .unwrap();
        assert_eq!(outcome, ReceiveOutcome::Recovered);
        assert_eq!(index, 8, "recovered checkpoint resumes at the same index");
        assert_eq!(stream.link().sent[0], role.local(Command::Recovery));
        assert_eq!(*stream.link().sent.last().unwrap(), 8);
    }

    #[test]
    fn checkpoint_send_detects_desync_on_mismatched_echo() {
        let role = Role::Master;
        let mut responses = VecDeque::new();
        responses.push_back(7); // wrong index, below total
        let mut stream = ReliableStream::new(
            ScriptedLink {
                responses,
                sent: Vec::new(),
            },
            role,
        );

        let mut index = 0;
        assert_eq!(
            stream.send(0x1234, &mut index, 100),
            Err(ProtocolError::Desync)
        );
    }
}
