//! Shared Audio State
//!
//! The single block of state both processors operate on. There is no
//! serialization step between the two sides; this struct *is* the wire
//! format, handed as `&mut` to each side's service calls by the embedding.
//!
//! Ownership discipline (checked by tests, not by the type system, to match
//! the hardware contract): every field has exactly one designated writer per
//! tick cycle, except command sets, which are set by one side and cleared by
//! the other. The sole continuously reported field is [`VoiceSlot::busy`],
//! which the audio coprocessor refreshes from hardware each tick.

pub mod commands;

use std::sync::Arc;

use commands::{CommandSet, GlobalCmd, Mp3CommandSet};

/// Number of hardware-backed voices.
pub const NUM_VOICES: usize = 16;

/// No delay on the mirrored voice.
pub const DELAY_NONE: u16 = 0;
/// One-tick delay on the mirrored voice, for virtual surround widening.
pub const DELAY_SURROUND: u16 = 1;
/// Four-tick delay on the mirrored voice, for a reverb effect.
pub const DELAY_REVERB: u16 = 4;

/// Where a voice reads its samples from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SampleSource {
    /// Nothing bound.
    #[default]
    None,
    /// Caller-owned PCM sample data.
    Pcm(Arc<[u8]>),
    /// The left (first) plane of the MP3 mix ring.
    MixLeft,
    /// The right (second) plane of the MP3 mix ring.
    MixRight,
}

/// Hardware sample formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoundFormat {
    /// Signed 8-bit PCM.
    #[default]
    Pcm8,
    /// Signed 16-bit PCM.
    Pcm16,
    /// IMA-ADPCM compressed.
    Adpcm,
}

/// Logical description of "what should play here".
#[derive(Debug, Clone, PartialEq)]
pub struct SoundInfo {
    /// Sample data.
    pub data: SampleSource,
    /// Size of the sample data in bytes.
    pub size: u32,
    /// Sample rate in Hz.
    pub rate: u32,
    /// Sample format.
    pub format: SoundFormat,
    /// Logical volume, 0..=127.
    pub volume: u8,
    /// Logical pan, 0 = left, 64 = center, 127 = right.
    pub pan: u8,
    /// Loop instead of one-shot playback.
    pub looping: bool,
    /// Scheduler priority; larger values are more important.
    pub priority: u8,
    /// Start delay in ticks.
    pub delay: u16,
}

impl Default for SoundInfo {
    fn default() -> Self {
        SoundInfo {
            data: SampleSource::None,
            size: 0,
            rate: 0,
            format: SoundFormat::Pcm8,
            volume: 127,
            pan: 64,
            looping: false,
            priority: 0,
            delay: DELAY_NONE,
        }
    }
}

/// One hardware voice slot in shared state.
#[derive(Debug, Clone, Default)]
pub struct VoiceSlot {
    /// Excluded from automatic allocation.
    pub reserved: bool,
    /// Mirrors the hardware channel-active bit. Refreshed by the audio
    /// coprocessor each tick; the application side also sets it when binding
    /// a request so two allocations within one tick cannot collide.
    pub busy: bool,
    /// Effective hardware volume (post surround model), 0..=127.
    pub volume: u8,
    /// Effective hardware pan (post surround model), 0..=127.
    pub pan: u8,
    /// Pending commands for this voice.
    pub commands: CommandSet,
    /// The bound request.
    pub sound: SoundInfo,
}

/// Externally visible phase of the MP3 player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mp3State {
    /// Nothing playing.
    #[default]
    Stopped,
    /// Decoding and feeding the ring.
    Playing,
    /// Held; resumes on `Play`.
    Paused,
    /// Stream ran dry without looping. Terminal until `Stop`/`Play`.
    OutOfData,
    /// Malformed bitstream. Terminal until `Stop`/`Play`.
    DecodeError,
}

impl Mp3State {
    /// Playing or paused; a new playback request must be refused.
    pub fn is_active(self) -> bool {
        matches!(self, Mp3State::Playing | Mp3State::Paused)
    }
}

/// The MP3 sub-state of the shared block.
#[derive(Debug, Clone, Default)]
pub struct Mp3Context {
    /// Externally visible phase.
    pub state: Mp3State,
    /// Pending commands and phase flags.
    pub commands: Mp3CommandSet,
    /// Current playback sample rate in Hz.
    pub rate: u32,
    /// Voice index playing the left plane.
    pub channel_l: usize,
    /// Voice index playing the right plane.
    pub channel_r: usize,
    /// Decoded PCM ring, `2 * buffer_size` samples: left plane then right.
    pub mix_buffer: Vec<i16>,
    /// Ring length in samples (per plane).
    pub buffer_size: usize,
    /// Write position in the ring, in samples.
    pub sound_cursor: usize,
    /// Samples owed on the current tick.
    pub num_samples: usize,
    /// Sample-timer reading at the previous tick.
    pub prev_timer: u16,
    /// Tick delay applied to the right voice (surround widening).
    pub delay: u16,
    /// Compressed source bytes: the whole stream when playing from memory,
    /// or two swap segments of `segment_size` bytes when file-streamed.
    pub mp3_buffer: Vec<u8>,
    /// Total compressed size in bytes (file size when streaming).
    pub file_size: usize,
    /// Segment size in bytes when file-streamed.
    pub segment_size: usize,
    /// Read position of the decoder in `mp3_buffer`.
    pub read_pos: usize,
    /// Compressed-byte budget left to decode.
    pub bytes_left: usize,
    /// File-backed stream (double-buffered) vs. in-memory playback.
    pub stream: bool,
    /// Restart from the beginning when the data runs out.
    pub looping: bool,
    /// The decoder crossed into the second segment; the application side
    /// must refill it.
    pub need_data: bool,
}

/// The shared block. Created once at bring-up, zero-initialized, and alive
/// for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct SharedAudioState {
    /// The 16 voice slots; index = hardware channel id.
    pub voices: [VoiceSlot; NUM_VOICES],
    /// Master volume, 0..=127. Applied on `GlobalCmd::SET_MASTER_VOLUME`.
    pub master_volume: u8,
    /// Global handshake / master-volume flags.
    pub global: GlobalCmd,
    /// Surround virtualization active.
    pub surround: bool,
    /// Half the active channel count; a voice's surround mirror lives at
    /// `index + num_chan`.
    pub num_chan: usize,
    /// MP3 playback context.
    pub mp3: Mp3Context,
}

impl SharedAudioState {
    /// Create a zeroed shared block.
    pub fn new() -> Self {
        Self::default()
    }
}
