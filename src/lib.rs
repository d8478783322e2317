//! Dual-processor handheld audio engine
//!
//! A faithful model of the split-CPU sound architecture found in dual-core
//! handheld consoles: an application processor posts commands into a shared
//! memory block, and an audio coprocessor drains them once per tick, drives
//! the 16 hardware mixer channels, and decodes MP3 into a ring the mixer
//! replays. This crate implements both halves over a hardware abstraction,
//! so the same engine runs against real register-level backends or against
//! the bundled simulator.
//!
//! # Features
//! - 16-voice priority scheduler with voice reservation and eviction
//! - Idempotent cross-processor command protocol (post and drain bits)
//! - MP3 playback from memory or from a two-segment file stream
//! - Timer-paced decode: each tick produces exactly what hardware consumed
//! - Surround virtualization over delayed, hard-panned voice pairs
//!
//! # Crate feature flags
//! - `mp3-symphonia` (default): symphonia-backed MP3 frame decoder
//!   (`codec::symphonia`)
//!
//! # Quick start
//! ```no_run
//! use dsaudio::{EngineConfig, SoundControl};
//! use dsaudio::hal::sim::NullPlatform;
//!
//! let mut ctl = SoundControl::new(NullPlatform::new(), EngineConfig::default())?;
//! ctl.init()?;
//! let data = std::fs::read("jingle.raw")?.into();
//! ctl.play_default(data, 112, 64, false, 0)?;
//! loop {
//!     ctl.service_tick();
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

pub mod codec; // MP3 frame parsing and decoder backends
pub mod control; // Application-side API
pub mod engine; // Coprocessor-side engine
pub mod hal; // Hardware and host-platform abstraction
pub mod shared; // Shared memory block and command protocol

/// Error types for engine operations
#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    /// IO error from a stream source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// MP3 bitstream or decoder failure
    #[error("Codec error: {0}")]
    Codec(#[from] codec::CodecError),

    /// The audio coprocessor did not answer a bring-up handshake
    #[error("Coprocessor handshake timed out")]
    HandshakeTimeout,

    /// MP3 operation without MP3 configured at bring-up
    #[error("MP3 support not configured")]
    Mp3Disabled,

    /// An MP3 is already playing or paused
    #[error("MP3 channel busy")]
    Mp3Busy,

    /// Channel index outside the active range, or reserved
    #[error("Channel {0} out of range or reserved")]
    ChannelOutOfRange(usize),

    /// Contradictory bring-up configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, AudioError>;

// Public API exports
pub use control::{ChannelMode, DefaultSettings, EngineConfig, SoundControl};
pub use engine::SoundEngine;
pub use shared::{
    Mp3State, SampleSource, SharedAudioState, SoundFormat, SoundInfo, NUM_VOICES,
};
