//! Deterministic stand-in decoder.
//!
//! Parses real frame headers but synthesizes the PCM as a pure function of
//! the frame bytes: identical frames decode to identical samples, so looped
//! playback of a repeated buffer is exactly periodic. Used by the engine's
//! own tests and by host harnesses that have no MP3 material at hand.

use super::frame::FrameHeader;
use super::{CodecError, DecodedFrame, FrameDecoder};

/// Frame decoder producing a deterministic ramp per frame.
///
/// Sample `k` of a frame is `seed + k` (wrapping), interleaved for stereo,
/// where `seed` is built from the first payload bytes. No inter-frame state.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimDecoder;

impl SimDecoder {
    /// New stand-in decoder.
    pub fn new() -> Self {
        SimDecoder
    }
}

impl FrameDecoder for SimDecoder {
    fn decode_frame(&mut self, data: &[u8], pcm: &mut [i16]) -> Result<DecodedFrame, CodecError> {
        let header = FrameHeader::parse(data)?;
        if data.len() < header.frame_size {
            return Err(CodecError::InvalidData("truncated frame"));
        }

        let seed = i16::from_le_bytes([
            data.get(4).copied().unwrap_or(0),
            data.get(5).copied().unwrap_or(0),
        ]);

        let total = header.samples_per_frame * header.channels as usize;
        if pcm.len() < total {
            return Err(CodecError::InvalidData("pcm scratch too small"));
        }
        for (k, out) in pcm[..total].iter_mut().enumerate() {
            *out = seed.wrapping_add(k as i16);
        }

        Ok(DecodedFrame {
            samples: header.samples_per_frame,
            channels: header.channels,
            sample_rate: header.sample_rate,
            consumed: header.frame_size,
        })
    }

    fn reset(&mut self) {}
}

/// Build a syntactically valid MPEG-1 Layer III frame whose payload starts
/// with `seed`. 128 kbps / 44.1 kHz, 417 bytes; stereo unless `mono`.
pub fn build_frame(seed: i16, mono: bool) -> Vec<u8> {
    let mut frame = vec![0u8; 417];
    frame[0] = 0xFF;
    frame[1] = 0xFB;
    frame[2] = 0x90;
    frame[3] = if mono { 0xC0 } else { 0x00 };
    frame[4..6].copy_from_slice(&seed.to_le_bytes());
    frame
}
