//! Cross-processor command sets.
//!
//! Every action one processor requests from the other is a tagged command
//! posted into shared state: the requester writes the parameter fields first,
//! then posts the command; the executor applies the effect, then clears it.
//! Posting is idempotent: re-posting a pending command is a no-op, so a
//! request repeated before the next tick does not duplicate its effect.
//!
//! Commands are stored as bit sets but only manipulated through the typed
//! [`VoiceCommand`] / [`Mp3Command`] variants, and the voice engine drains
//! them in one fixed order ([`VoiceCommand::DRAIN_ORDER`]).

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct VoiceCmdBits: u8 {
        const DELAY      = 0x01;
        const STOP       = 0x02;
        const PLAY       = 0x04;
        const SET_VOLUME = 0x08;
        const SET_PAN    = 0x10;
        const SET_RATE   = 0x20;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct Mp3CmdBits: u16 {
        const INIT       = 0x001;
        const SET_RATE   = 0x002;
        const PAUSE      = 0x004;
        const STOP       = 0x008;
        const PLAY       = 0x010;
        const MIX        = 0x020;
        const MIXING     = 0x040;
        const WAITING    = 0x080;
        const ALLOC_DONE = 0x100;
    }
}

bitflags! {
    /// Global (non-per-voice) flags shared between the two processors.
    ///
    /// `READY` is the coprocessor's init handshake; `SET_MASTER_VOLUME`
    /// requests a master volume update from `master_volume`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GlobalCmd: u8 {
        /// Audio coprocessor has finished bring-up and services ticks.
        const READY = 0x01;
        /// Apply the shared `master_volume` field to hardware.
        const SET_MASTER_VOLUME = 0x02;
    }
}

/// A per-voice command, posted by the application processor and applied
/// (then cleared) by the audio coprocessor on its next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    /// Count down `sound.delay` ticks, then turn into `Play`.
    Delay,
    /// Disable the hardware channel.
    Stop,
    /// Program the channel from `sound` and start it.
    Play,
    /// Apply the effective `volume` field.
    SetVolume,
    /// Apply the effective `pan` field.
    SetPan,
    /// Reprogram the channel timer from `sound.rate`.
    SetRate,
}

impl VoiceCommand {
    /// The fixed order the voice engine drains commands in, once per tick.
    ///
    /// `Delay` resolves before `Play` so a zero-delay request starts on the
    /// same tick it is examined; `Stop` precedes `Play` so a stop-then-restart
    /// posted within one tick is not swallowed by hardware re-arming.
    pub const DRAIN_ORDER: [VoiceCommand; 6] = [
        VoiceCommand::Delay,
        VoiceCommand::Stop,
        VoiceCommand::Play,
        VoiceCommand::SetVolume,
        VoiceCommand::SetPan,
        VoiceCommand::SetRate,
    ];

    fn bit(self) -> VoiceCmdBits {
        match self {
            VoiceCommand::Delay => VoiceCmdBits::DELAY,
            VoiceCommand::Stop => VoiceCmdBits::STOP,
            VoiceCommand::Play => VoiceCmdBits::PLAY,
            VoiceCommand::SetVolume => VoiceCmdBits::SET_VOLUME,
            VoiceCommand::SetPan => VoiceCmdBits::SET_PAN,
            VoiceCommand::SetRate => VoiceCmdBits::SET_RATE,
        }
    }
}

/// Pending command set for one voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandSet(VoiceCmdBits);

impl CommandSet {
    /// Post a command. Idempotent.
    pub fn post(&mut self, cmd: VoiceCommand) {
        self.0.insert(cmd.bit());
    }

    /// Drop every pending command and post only `cmd`.
    ///
    /// Used when a new sound is bound to the voice: stale commands from the
    /// previous occupant must not leak into the new request.
    pub fn replace(&mut self, cmd: VoiceCommand) {
        self.0 = cmd.bit();
    }

    /// Whether `cmd` is pending.
    pub fn contains(&self, cmd: VoiceCommand) -> bool {
        self.0.contains(cmd.bit())
    }

    /// Clear a single pending command.
    pub fn clear(&mut self, cmd: VoiceCommand) {
        self.0.remove(cmd.bit());
    }

    /// Clear everything.
    pub fn clear_all(&mut self) {
        self.0 = VoiceCmdBits::empty();
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A command or phase flag of the MP3 context.
///
/// `Init`..`Play` are requests from the application processor; `Mix`,
/// `Mixing` and `Waiting` are phases the stream engine posts to itself
/// (`Mix` = program the hardware voices once, `Mixing` = keep feeding the
/// ring); `AllocDone` is the application side's half of the init handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mp3Command {
    /// Reset the decoder workspace (waits for `AllocDone`).
    Init,
    /// Retune the sample timer and both channel timers from `rate`.
    SetRate,
    /// Silence the channels and hold position.
    Pause,
    /// Stop playback and reset decoder state.
    Stop,
    /// Start playback (or resume from pause).
    Play,
    /// One-shot: set up the hardware voices to read the mix ring.
    Mix,
    /// Steady state: decode/mix into the ring every tick.
    Mixing,
    /// Suppress one timer delta after a restart.
    Waiting,
    /// The application processor has allocated the shared buffers.
    AllocDone,
}

impl Mp3Command {
    fn bit(self) -> Mp3CmdBits {
        match self {
            Mp3Command::Init => Mp3CmdBits::INIT,
            Mp3Command::SetRate => Mp3CmdBits::SET_RATE,
            Mp3Command::Pause => Mp3CmdBits::PAUSE,
            Mp3Command::Stop => Mp3CmdBits::STOP,
            Mp3Command::Play => Mp3CmdBits::PLAY,
            Mp3Command::Mix => Mp3CmdBits::MIX,
            Mp3Command::Mixing => Mp3CmdBits::MIXING,
            Mp3Command::Waiting => Mp3CmdBits::WAITING,
            Mp3Command::AllocDone => Mp3CmdBits::ALLOC_DONE,
        }
    }
}

/// Pending command/phase set for the MP3 context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mp3CommandSet(Mp3CmdBits);

impl Mp3CommandSet {
    /// Post a command. Idempotent.
    pub fn post(&mut self, cmd: Mp3Command) {
        self.0.insert(cmd.bit());
    }

    /// Drop every pending command and post only `cmd`.
    pub fn replace(&mut self, cmd: Mp3Command) {
        self.0 = cmd.bit();
    }

    /// Whether `cmd` is pending.
    pub fn contains(&self, cmd: Mp3Command) -> bool {
        self.0.contains(cmd.bit())
    }

    /// Clear a single pending command.
    pub fn clear(&mut self, cmd: Mp3Command) {
        self.0.remove(cmd.bit());
    }

    /// Clear everything.
    pub fn clear_all(&mut self) {
        self.0 = Mp3CmdBits::empty();
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_is_idempotent() {
        let mut set = CommandSet::default();
        set.post(VoiceCommand::Play);
        set.post(VoiceCommand::Play);
        assert!(set.contains(VoiceCommand::Play));
        set.clear(VoiceCommand::Play);
        assert!(set.is_empty());
    }

    #[test]
    fn test_replace_drops_stale_commands() {
        let mut set = CommandSet::default();
        set.post(VoiceCommand::Stop);
        set.post(VoiceCommand::SetVolume);
        set.replace(VoiceCommand::Play);
        assert!(set.contains(VoiceCommand::Play));
        assert!(!set.contains(VoiceCommand::Stop));
        assert!(!set.contains(VoiceCommand::SetVolume));
    }

    #[test]
    fn test_drain_order_resolves_delay_before_play_and_stop_before_play() {
        let order = VoiceCommand::DRAIN_ORDER;
        let pos = |cmd| order.iter().position(|&c| c == cmd).unwrap();
        assert!(pos(VoiceCommand::Delay) < pos(VoiceCommand::Play));
        assert!(pos(VoiceCommand::Stop) < pos(VoiceCommand::Play));
    }

    #[test]
    fn test_mp3_set_clears_independently() {
        let mut set = Mp3CommandSet::default();
        set.post(Mp3Command::Mixing);
        set.post(Mp3Command::Waiting);
        set.clear(Mp3Command::Waiting);
        assert!(set.contains(Mp3Command::Mixing));
        assert!(!set.contains(Mp3Command::Waiting));
    }
}
