//! Command words: the magic-prefixed values that delimit protocol phases.

/// Any word below this value is data (a payload or metadata word), never a
/// command. Command magics are chosen well above it, and the role offsets
/// (at most [`Role::SLAVE_OFFSET`]) never push a command below it either.
pub const MIN_COMMAND: u32 = 0x1100_0000;

/// Base magic values for each command kind, before a role's offset is
/// added. `sync()` compares `command + OWN_OFFSET` against
/// `command + OTHER_OFFSET`, so these never appear on the wire unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    /// Abort the session and renegotiate from scratch.
    Reset = 0x9876_5400,
    /// Begin a new frame.
    FrameStart = 0x1234_5610,
    /// The audio chunk for this frame follows.
    Audio = 0x9876_5420,
    /// The pixel payload for this frame follows.
    Pixels = 0x9876_5430,
    /// The frame is complete.
    FrameEnd = 0x9876_5440,
    /// Re-rendezvous after a slave-initiated break.
    Recovery = 0x9876_5450,
    /// The spatial/palette auxiliary bitmap follows (sent only when the
    /// frame uses block-repeat or RLE compression).
    SpatialDiffsStart = 0x9876_5460,
}

impl Command {
    const ALL: [Command; 7] = [
        Command::Reset,
        Command::FrameStart,
        Command::Audio,
        Command::Pixels,
        Command::FrameEnd,
        Command::Recovery,
        Command::SpatialDiffsStart,
    ];

    /// Recovers a [`Command`] from its base magic (no role offset applied).
    #[inline]
    pub fn from_base(word: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|&cmd| cmd as u32 == word)
    }

    #[inline]
    pub const fn base(self) -> u32 {
        self as u32
    }
}

/// Which endpoint a [`Role`]-qualified offset belongs to. `sync()` is
/// symmetric: each side adds its own offset when sending and expects the
/// other side's offset on the word it receives back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    pub const MASTER_OFFSET: u32 = 1;
    pub const SLAVE_OFFSET: u32 = 2;

    #[inline]
    pub const fn own_offset(self) -> u32 {
        match self {
            Role::Master => Self::MASTER_OFFSET,
            Role::Slave => Self::SLAVE_OFFSET,
        }
    }

    #[inline]
    pub const fn other_offset(self) -> u32 {
        match self {
            Role::Master => Self::SLAVE_OFFSET,
            Role::Slave => Self::MASTER_OFFSET,
        }
    }

    /// The word this role sends to announce `command`.
    #[inline]
    pub const fn local(self, command: Command) -> u32 {
        command.base() + self.own_offset()
    }

    /// The word this role expects back once both sides agree on `command`.
    #[inline]
    pub const fn remote(self, command: Command) -> u32 {
        command.base() + self.other_offset()
    }
}

/// The classification of a 32-bit wire word: either a recognized command
/// (qualified by whichever role's offset produced it), or data (a payload
/// or metadata word, indistinguishable at this layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolWord {
    Command { command: Command, offset: u32 },
    Data(u32),
}

impl ProtocolWord {
    /// Classifies `word` per §6: anything below [`MIN_COMMAND`] is data;
    /// anything at or above it is checked against known command magics
    /// under either role offset, falling back to data (treated as line
    /// noise by callers) if nothing matches.
    #[inline]
    pub fn classify(word: u32) -> Self {
        if word < MIN_COMMAND {
            return ProtocolWord::Data(word);
        }

        for offset in [Role::MASTER_OFFSET, Role::SLAVE_OFFSET] {
            if let Some(base) = word.checked_sub(offset) {
                if let Some(command) = Command::from_base(base) {
                    return ProtocolWord::Command { command, offset };
                }
            }
        }

        ProtocolWord::Data(word)
    }
}
