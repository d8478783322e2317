//! Application-side MP3 transport.
//!
//! Two playback modes share the engine: in-memory (the whole file resident
//! in the compressed buffer) and file streaming (a two-segment buffer the
//! application refills as the decoder crosses into the second segment). All
//! real-time work happens on the engine side; this module only moves bytes
//! and posts commands.

use std::io::{Read, Seek, SeekFrom};

use log::warn;

use crate::hal::{CacheRegion, HostPlatform};
use crate::shared::commands::{Mp3Command, VoiceCommand};
use crate::shared::{Mp3State, DELAY_NONE, DELAY_SURROUND};
use crate::{AudioError, Result};

use super::surround::surround_volumes;
use super::SoundControl;

/// Byte source for streamed MP3 playback.
pub trait Mp3Source: Read + Seek {}

impl<T: Read + Seek> Mp3Source for T {}

impl<P: HostPlatform> SoundControl<P> {
    /// Allocate the decoder workspace, reserve the output voice pair and
    /// hand the workspace to the engine. Part of bring-up.
    pub(super) fn init_mp3(&mut self) -> Result<()> {
        let seg = self.config.file_segment_size;
        let size = self.config.mix_buffer_size;
        let surround = self.config.surround;
        // in surround mode the right output runs on the left voice's mirror
        let channel_r = if surround { self.num_chan } else { 1 };
        {
            let mp3 = &mut self.shared.mp3;
            mp3.buffer_size = size;
            mp3.mix_buffer = vec![0; size * 2];
            mp3.mp3_buffer = vec![0; seg * 2];
            mp3.segment_size = seg;
            mp3.channel_l = 0;
            mp3.channel_r = channel_r;
            mp3.delay = if surround { DELAY_SURROUND } else { DELAY_NONE };
            mp3.commands.post(Mp3Command::AllocDone);
            mp3.commands.post(Mp3Command::Init);
        }
        self.shared.voices[0].reserved = true;
        self.shared.voices[channel_r].reserved = true;
        // the pair is hard-panned; stereo position is a volume difference
        self.shared.voices[0].pan = 0;
        self.shared.voices[channel_r].pan = 127;

        self.wait_handshake(|shared| !shared.mp3.commands.contains(Mp3Command::Init))?;
        self.set_mp3_volume(127)?;
        Ok(())
    }

    /// Play an MP3 file resident in memory.
    pub fn mp3_play(&mut self, data: Vec<u8>, looping: bool) -> Result<()> {
        self.check_mp3_idle()?;
        self.mp3_source = None;
        let mp3 = &mut self.shared.mp3;
        mp3.file_size = data.len();
        mp3.mp3_buffer = data;
        mp3.stream = false;
        mp3.looping = looping;
        mp3.need_data = false;
        self.platform.flush_cache(CacheRegion::FileBuffer);
        self.shared.mp3.commands.post(Mp3Command::Play);
        Ok(())
    }

    /// Stream an MP3 from a seekable byte source.
    pub fn mp3_play_stream(
        &mut self,
        mut source: Box<dyn Mp3Source>,
        looping: bool,
    ) -> Result<()> {
        self.check_mp3_idle()?;
        let size = source.seek(SeekFrom::End(0))? as usize;
        source.seek(SeekFrom::Start(0))?;

        let seg = self.config.file_segment_size;
        {
            let mp3 = &mut self.shared.mp3;
            mp3.mp3_buffer = vec![0; seg * 2];
            mp3.segment_size = seg;
            mp3.file_size = size;
            mp3.stream = true;
            mp3.looping = looping;
            mp3.need_data = false;
        }
        self.mp3_source = Some(source);
        self.fill_segment(0)?;
        self.fill_segment(seg)?;
        self.platform.flush_cache(CacheRegion::FileBuffer);
        self.shared.mp3.commands.post(Mp3Command::Play);
        Ok(())
    }

    /// Stop MP3 playback.
    pub fn mp3_stop(&mut self) -> Result<()> {
        self.check_mp3_enabled()?;
        self.mp3_source = None;
        self.shared.mp3.commands.post(Mp3Command::Stop);
        Ok(())
    }

    /// Pause MP3 playback; no-op unless playing.
    pub fn mp3_pause(&mut self) -> Result<()> {
        self.check_mp3_enabled()?;
        if self.shared.mp3.state == Mp3State::Playing {
            self.shared.mp3.commands.post(Mp3Command::Pause);
        }
        Ok(())
    }

    /// Resume a paused MP3; no-op unless paused.
    pub fn mp3_resume(&mut self) -> Result<()> {
        self.check_mp3_enabled()?;
        if self.shared.mp3.state == Mp3State::Paused {
            self.shared.mp3.commands.post(Mp3Command::Play);
        }
        Ok(())
    }

    /// Set MP3 playback volume.
    pub fn set_mp3_volume(&mut self, volume: u8) -> Result<()> {
        self.check_mp3_enabled()?;
        self.mp3_volume = volume.min(127);
        self.post_mp3_volumes();
        Ok(())
    }

    /// Set MP3 stereo position.
    pub fn set_mp3_pan(&mut self, pan: u8) -> Result<()> {
        self.check_mp3_enabled()?;
        self.mp3_pan = pan.min(127);
        self.post_mp3_volumes();
        Ok(())
    }

    /// Override the MP3 playback rate (pitch shift).
    pub fn set_mp3_rate(&mut self, rate: u32) -> Result<()> {
        self.check_mp3_enabled()?;
        self.shared.mp3.rate = rate;
        self.shared.mp3.commands.post(Mp3Command::SetRate);
        Ok(())
    }

    /// Current MP3 playback state.
    pub fn mp3_state(&self) -> Mp3State {
        self.shared.mp3.state
    }

    /// Refill the second stream segment when the engine asks for it. A read
    /// failure stops playback and drops the source.
    pub(super) fn service_mp3_stream(&mut self) {
        if !self.shared.mp3.need_data {
            return;
        }
        self.shared.mp3.need_data = false;
        let seg = self.shared.mp3.segment_size;
        if let Err(e) = self.fill_segment(seg) {
            warn!("mp3 stream read failed, stopping: {e}");
            self.mp3_source = None;
            self.shared.mp3.commands.post(Mp3Command::Stop);
            return;
        }
        self.platform.flush_cache(CacheRegion::FileBuffer);
    }

    /// Fill one segment of the stream buffer from the source. At end of
    /// file a looping stream rewinds and keeps reading; otherwise the tail
    /// is zeroed so the decoder runs out of sync words cleanly.
    ///
    /// A rewind is only allowed after the source made progress: a source
    /// that yields nothing even after seeking to the start is treated as an
    /// IO fault, never spun on.
    fn fill_segment(&mut self, offset: usize) -> Result<()> {
        let seg = self.shared.mp3.segment_size;
        let looping = self.shared.mp3.looping;
        let Some(source) = self.mp3_source.as_mut() else {
            return Ok(());
        };
        let buf = &mut self.shared.mp3.mp3_buffer[offset..offset + seg];
        let mut filled = 0;
        let mut rewound = false;
        while filled < seg {
            let n = source.read(&mut buf[filled..])?;
            if n == 0 {
                if looping && !rewound {
                    source.seek(SeekFrom::Start(0))?;
                    rewound = true;
                    continue;
                }
                if looping {
                    return Err(
                        std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into()
                    );
                }
                buf[filled..].fill(0);
                break;
            }
            filled += n;
            rewound = false;
        }
        Ok(())
    }

    fn post_mp3_volumes(&mut self) {
        let split = surround_volumes(self.mp3_volume, self.mp3_pan);
        let (l, r) = (self.shared.mp3.channel_l, self.shared.mp3.channel_r);
        let slot = &mut self.shared.voices[l];
        slot.volume = split.primary;
        slot.commands.post(VoiceCommand::SetVolume);
        let slot = &mut self.shared.voices[r];
        slot.volume = split.mirror;
        slot.commands.post(VoiceCommand::SetVolume);
    }

    fn check_mp3_enabled(&self) -> Result<()> {
        if !self.config.mp3 {
            return Err(AudioError::Mp3Disabled);
        }
        Ok(())
    }

    fn check_mp3_idle(&self) -> Result<()> {
        self.check_mp3_enabled()?;
        if self.shared.mp3.state.is_active() {
            return Err(AudioError::Mp3Busy);
        }
        Ok(())
    }
}
