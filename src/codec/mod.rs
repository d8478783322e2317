//! MP3 frame codec layer.
//!
//! The stream engine works frame by frame: it realigns on sync words
//! ([`frame::find_sync`]), reads stream parameters from the header
//! ([`frame::FrameHeader`]), and hands single frames to a [`FrameDecoder`]
//! backend. The backend seam keeps the engine testable with a deterministic
//! stand-in ([`sim::SimDecoder`]); the real backend is symphonia's MP3
//! decoder ([`symphonia::SymphoniaMp3Decoder`], feature `mp3-symphonia`).

pub mod frame;
pub mod sim;
#[cfg(feature = "mp3-symphonia")]
pub mod symphonia;

pub use frame::{find_sync, FrameHeader, MAX_SAMPLES_PER_FRAME};

/// Errors from the frame codec layer.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// The bitstream is corrupt or not an MP3 frame.
    #[error("invalid bitstream: {0}")]
    InvalidData(&'static str),

    /// The stream uses parameters this engine does not handle.
    #[error("unsupported stream: {0}")]
    Unsupported(&'static str),

    /// The decoder backend failed.
    #[error("decoder backend: {0}")]
    Backend(String),
}

/// Result of decoding one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Decoded samples per channel.
    pub samples: usize,
    /// Channel count, 1 or 2.
    pub channels: u8,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Compressed bytes consumed from the input.
    pub consumed: usize,
}

/// Stateful frame-by-frame MP3 decoder.
///
/// `data` must start at a sync word; the implementation decodes exactly one
/// frame into `pcm` (interleaved for stereo) and reports how many bytes it
/// consumed. Inter-frame state (bit reservoir, synthesis overlap) persists
/// across calls until [`reset`](FrameDecoder::reset).
pub trait FrameDecoder {
    /// Decode the frame at the start of `data` into `pcm`.
    ///
    /// `pcm` must hold at least [`MAX_SAMPLES_PER_FRAME`] samples.
    fn decode_frame(&mut self, data: &[u8], pcm: &mut [i16]) -> Result<DecodedFrame, CodecError>;

    /// Drop all inter-frame state so the next start is click-free.
    fn reset(&mut self);
}
