//! Symphonia-backed MP3 frame decoder.
//!
//! Wraps `symphonia-bundle-mp3`'s `MpaDecoder` behind the [`FrameDecoder`]
//! seam: each shared-memory frame becomes one symphonia packet, and the
//! decoded audio buffer is copied out as interleaved `i16`.

use symphonia_bundle_mp3::MpaDecoder;
use symphonia_core::audio::SampleBuffer;
use symphonia_core::codecs::{
    CodecParameters, Decoder as SymDecoder, DecoderOptions, CODEC_TYPE_MP3,
};
use symphonia_core::formats::Packet;

use super::frame::FrameHeader;
use super::{CodecError, DecodedFrame, FrameDecoder};

/// [`FrameDecoder`] implementation using symphonia's MP3 decoder.
pub struct SymphoniaMp3Decoder {
    decoder: MpaDecoder,
}

impl SymphoniaMp3Decoder {
    /// Create a decoder instance.
    pub fn new() -> Result<Self, CodecError> {
        let params = CodecParameters {
            codec: CODEC_TYPE_MP3,
            ..Default::default()
        };
        let decoder = MpaDecoder::try_new(&params, &DecoderOptions::default())
            .map_err(|e| CodecError::Backend(format!("mp3 decoder init: {e}")))?;
        Ok(SymphoniaMp3Decoder { decoder })
    }
}

impl FrameDecoder for SymphoniaMp3Decoder {
    fn decode_frame(&mut self, data: &[u8], pcm: &mut [i16]) -> Result<DecodedFrame, CodecError> {
        let header = FrameHeader::parse(data)?;
        if data.len() < header.frame_size {
            return Err(CodecError::InvalidData("truncated frame"));
        }

        let packet = Packet::new_from_slice(
            0,
            0,
            header.samples_per_frame as u64,
            &data[..header.frame_size],
        );
        let decoded = self
            .decoder
            .decode(&packet)
            .map_err(|e| CodecError::Backend(format!("mp3 decode: {e}")))?;

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        if pcm.len() < samples.len() {
            return Err(CodecError::InvalidData("pcm scratch too small"));
        }
        pcm[..samples.len()].copy_from_slice(samples);

        let channels = spec.channels.count() as u8;
        Ok(DecodedFrame {
            samples: samples.len() / channels.max(1) as usize,
            channels,
            sample_rate: spec.rate,
            consumed: header.frame_size,
        })
    }

    fn reset(&mut self) {
        SymDecoder::reset(&mut self.decoder);
    }
}
