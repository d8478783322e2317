//! MP3 frame header parsing and sync-word scanning.
//!
//! The stream engine realigns on the 11-bit sync pattern after any
//! discontinuity, then reads channel count, sample rate and frame length
//! from the 4-byte header before handing the frame to the decoder backend.

use super::CodecError;

/// Largest decoded frame: 1152 samples per channel, stereo, interleaved.
pub const MAX_SAMPLES_PER_FRAME: usize = 1152 * 2;

/// MPEG audio version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    /// MPEG-1 (32/44.1/48 kHz).
    Mpeg1,
    /// MPEG-2 (16/22.05/24 kHz).
    Mpeg2,
    /// MPEG-2.5 (8/11.025/12 kHz).
    Mpeg25,
}

/// Parsed Layer III frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// MPEG version.
    pub version: MpegVersion,
    /// Channel count, 1 or 2.
    pub channels: u8,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bitrate in bits per second.
    pub bitrate: u32,
    /// Whole frame length in bytes, header included.
    pub frame_size: usize,
    /// Decoded samples per channel (1152 for MPEG-1, 576 otherwise).
    pub samples_per_frame: usize,
}

/// Find the offset of the next frame sync word in `data`.
pub fn find_sync(data: &[u8]) -> Option<usize> {
    if data.len() < 2 {
        return None;
    }
    (0..data.len() - 1).find(|&i| data[i] == 0xFF && (data[i + 1] & 0xE0) == 0xE0)
}

// kbps, Layer III
const BITRATE_V1: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];
const BITRATE_V2: [u32; 16] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
];

impl FrameHeader {
    /// Parse the frame header at the start of `data`.
    ///
    /// Only Layer III is accepted; free-format and reserved field values are
    /// rejected as invalid data.
    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < 4 {
            return Err(CodecError::InvalidData("truncated frame header"));
        }
        let header = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);

        // AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
        // A: sync, B: version, C: layer, D: !crc, E: bitrate index,
        // F: samplerate index, G: padding, I: channel mode
        if (header & 0xFFE0_0000) != 0xFFE0_0000 {
            return Err(CodecError::InvalidData("missing sync word"));
        }

        let version = match (header >> 19) & 0x3 {
            3 => MpegVersion::Mpeg1,
            2 => MpegVersion::Mpeg2,
            0 => MpegVersion::Mpeg25,
            _ => return Err(CodecError::InvalidData("reserved MPEG version")),
        };

        // Layer III only
        if (header >> 17) & 0x3 != 1 {
            return Err(CodecError::Unsupported("only Layer III streams"));
        }

        let bitrate_idx = ((header >> 12) & 0xF) as usize;
        if bitrate_idx == 0 || bitrate_idx == 15 {
            return Err(CodecError::InvalidData("free-format or bad bitrate index"));
        }
        let bitrate_kbps = match version {
            MpegVersion::Mpeg1 => BITRATE_V1[bitrate_idx],
            _ => BITRATE_V2[bitrate_idx],
        };
        let bitrate = bitrate_kbps * 1000;

        let samplerate_idx = ((header >> 10) & 0x3) as usize;
        if samplerate_idx == 3 {
            return Err(CodecError::InvalidData("bad samplerate index"));
        }
        let sample_rate = match version {
            MpegVersion::Mpeg1 => [44_100, 48_000, 32_000][samplerate_idx],
            MpegVersion::Mpeg2 => [22_050, 24_000, 16_000][samplerate_idx],
            MpegVersion::Mpeg25 => [11_025, 12_000, 8_000][samplerate_idx],
        };

        let padding = (header >> 9) & 0x1;
        let channels = if (header >> 6) & 0x3 == 3 { 1 } else { 2 };

        // Layer III frame length: 144 * bitrate / samplerate (MPEG-1),
        // 72 * bitrate / samplerate otherwise, plus one padding byte.
        let (per_frame, samples_per_frame) = match version {
            MpegVersion::Mpeg1 => (144, 1152),
            _ => (72, 576),
        };
        let frame_size = (per_frame * bitrate / sample_rate + padding) as usize;

        Ok(FrameHeader {
            version,
            channels,
            sample_rate,
            bitrate,
            frame_size,
            samples_per_frame,
        })
    }
}
