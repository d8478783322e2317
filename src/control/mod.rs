//! Application-side control interface.
//!
//! [`SoundControl`] owns the shared block and turns the crate's public API
//! into commands for the audio coprocessor. It never touches sound hardware
//! itself; every operation posts command bits and lets the engine act on its
//! next tick. The one blocking spot is bring-up, where the two handshakes
//! (engine ready, decoder workspace accepted) are waited out with a bounded
//! number of ticks.

pub mod mp3;
pub mod scheduler;
pub mod surround;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::hal::{CacheRegion, HostPlatform};
use crate::shared::commands::{GlobalCmd, VoiceCommand};
use crate::shared::{
    SampleSource, SharedAudioState, SoundFormat, SoundInfo, DELAY_NONE, DELAY_SURROUND,
    NUM_VOICES,
};
use crate::{AudioError, Result};

pub use mp3::Mp3Source;
pub use scheduler::allocate_voice;
pub use surround::{surround_volumes, SurroundVolumes, BASE_VOLUME};

/// Ticks to wait on a coprocessor handshake before giving up.
const HANDSHAKE_TIMEOUT_TICKS: usize = 120;

/// How many hardware channels the engine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// All 16 channels available for effects.
    #[default]
    Sixteen,
    /// 8 channels; the upper half is kept free, either for the application
    /// or for surround mirrors.
    Eight,
}

/// Engine bring-up configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Channel mode.
    pub mode: ChannelMode,
    /// Surround virtualization: every sound runs on a voice pair.
    pub surround: bool,
    /// Bring up the MP3 decoder.
    pub mp3: bool,
    /// MP3 mix ring size in samples per channel.
    pub mix_buffer_size: usize,
    /// File-stream segment size in bytes; the stream buffer holds two.
    pub file_segment_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            mode: ChannelMode::Sixteen,
            surround: false,
            mp3: true,
            mix_buffer_size: 4096,
            file_segment_size: 8192,
        }
    }
}

impl EngineConfig {
    /// Check the configuration for contradictions.
    pub fn validate(&self) -> Result<()> {
        if self.surround && self.mode != ChannelMode::Eight {
            return Err(AudioError::InvalidConfig(
                "surround needs the eight-channel mode for its mirror voices",
            ));
        }
        if self.mp3 && self.mix_buffer_size < 2 {
            return Err(AudioError::InvalidConfig("mix buffer too small"));
        }
        if self.mp3 && self.mix_buffer_size % 2 != 0 {
            return Err(AudioError::InvalidConfig("mix buffer size must be even"));
        }
        if self.mp3 && self.file_segment_size == 0 {
            return Err(AudioError::InvalidConfig("file segment size must be nonzero"));
        }
        Ok(())
    }
}

/// Stored playback settings consumed by [`SoundControl::play_default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSettings {
    /// Sample format.
    pub format: SoundFormat,
    /// Sample rate in Hz.
    pub rate: u32,
    /// Mirror-voice start delay in ticks, applied in surround mode.
    pub delay: u16,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        DefaultSettings {
            format: SoundFormat::Pcm8,
            rate: 11_025,
            delay: DELAY_SURROUND,
        }
    }
}

/// The application-side half of the engine.
pub struct SoundControl<P: HostPlatform> {
    shared: SharedAudioState,
    platform: P,
    config: EngineConfig,
    num_chan: usize,
    mp3_source: Option<Box<dyn Mp3Source>>,
    mp3_volume: u8,
    mp3_pan: u8,
    defaults: DefaultSettings,
}

impl<P: HostPlatform> SoundControl<P> {
    /// Create a control block over `platform`. Call [`init`](Self::init)
    /// before anything else.
    pub fn new(platform: P, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(SoundControl {
            shared: SharedAudioState::new(),
            platform,
            config,
            num_chan: 0,
            mp3_source: None,
            mp3_volume: 127,
            mp3_pan: 64,
            defaults: DefaultSettings::default(),
        })
    }

    /// Bring the engine up: wait for the coprocessor, reset every voice,
    /// reserve and initialize the MP3 pair if configured.
    pub fn init(&mut self) -> Result<()> {
        self.wait_handshake(|shared| shared.global.contains(GlobalCmd::READY))?;

        self.num_chan = match self.config.mode {
            ChannelMode::Sixteen => NUM_VOICES,
            ChannelMode::Eight => NUM_VOICES / 2,
        };
        self.shared.num_chan = self.num_chan;
        self.shared.surround = self.config.surround;

        for voice in self.shared.voices.iter_mut() {
            voice.reserved = false;
            voice.busy = false;
            voice.volume = 0;
            voice.pan = 64;
            voice.commands.clear_all();
        }

        if self.config.mp3 {
            self.init_mp3()?;
        }
        self.set_master_volume(127);
        info!(
            "sound engine up: {} channels, surround {}, mp3 {}",
            self.num_chan, self.config.surround, self.config.mp3
        );
        Ok(())
    }

    /// One application frame: give the coprocessor a tick, then service
    /// pending stream refills.
    pub fn service_tick(&mut self) {
        self.platform.wait_for_tick(&mut self.shared);
        self.service_mp3_stream();
    }

    /// Play a sound on an automatically chosen voice.
    ///
    /// Returns the channel the sound landed on, or `None` when every voice
    /// is busy with higher-priority work.
    pub fn play(&mut self, sound: SoundInfo) -> Result<Option<usize>> {
        let candidates = &self.shared.voices[..self.num_chan];
        match allocate_voice(candidates, sound.priority) {
            Some(ch) => {
                self.direct_play(ch, sound)?;
                Ok(Some(ch))
            }
            None => Ok(None),
        }
    }

    /// Play a sample on an automatic voice using the stored default
    /// format, rate and delay. See [`set_default_settings`](Self::set_default_settings).
    pub fn play_default(
        &mut self,
        data: std::sync::Arc<[u8]>,
        volume: u8,
        pan: u8,
        looping: bool,
        priority: u8,
    ) -> Result<Option<usize>> {
        let size = data.len() as u32;
        let defaults = self.defaults;
        self.play(SoundInfo {
            data: SampleSource::Pcm(data),
            size,
            rate: defaults.rate,
            format: defaults.format,
            volume,
            pan,
            looping,
            priority,
            delay: defaults.delay,
        })
    }

    /// Replace the stored settings used by [`play_default`](Self::play_default).
    pub fn set_default_settings(&mut self, settings: DefaultSettings) {
        self.defaults = settings;
    }

    /// The stored settings used by [`play_default`](Self::play_default).
    pub fn default_settings(&self) -> DefaultSettings {
        self.defaults
    }

    /// Play `sound` on a specific channel, bypassing allocation.
    pub fn direct_play(&mut self, ch: usize, mut sound: SoundInfo) -> Result<()> {
        self.check_channel(ch)?;
        sound.volume = sound.volume.min(127);
        sound.pan = sound.pan.min(127);
        let (volume, pan) = (sound.volume, sound.pan);
        self.platform.flush_cache(CacheRegion::SampleData);

        // `sound` records the request; the slot's volume and pan fields are
        // the effective register values the engine applies.
        if self.shared.surround {
            let split = surround_volumes(volume, pan);
            let mirror = ch + self.num_chan;

            let slot = &mut self.shared.voices[mirror];
            slot.sound = sound.clone();
            // the mirror start offset makes the widening; longer requested
            // delays (DELAY_REVERB) turn the pair into an echo
            slot.sound.delay = if sound.delay == DELAY_NONE {
                DELAY_SURROUND
            } else {
                sound.delay
            };
            slot.volume = split.mirror;
            slot.pan = 127;
            slot.busy = true;
            slot.commands.replace(VoiceCommand::Delay);

            let slot = &mut self.shared.voices[ch];
            slot.sound = sound;
            slot.sound.delay = DELAY_NONE;
            slot.volume = split.primary;
            slot.pan = 0;
            slot.busy = true;
            slot.commands.replace(VoiceCommand::Play);
        } else {
            let slot = &mut self.shared.voices[ch];
            slot.sound = sound;
            slot.volume = volume;
            slot.pan = pan;
            slot.busy = true;
            slot.commands.replace(VoiceCommand::Play);
        }
        debug!("voice {ch}: play posted (volume {volume}, pan {pan})");
        Ok(())
    }

    /// Stop the sound on `ch` (and its surround mirror).
    pub fn stop(&mut self, ch: usize) -> Result<()> {
        self.check_channel(ch)?;
        self.shared.voices[ch].commands.post(VoiceCommand::Stop);
        if self.shared.surround {
            let mirror = ch + self.num_chan;
            self.shared.voices[mirror].commands.post(VoiceCommand::Stop);
        }
        Ok(())
    }

    /// Change the volume of the sound on `ch`.
    pub fn set_volume(&mut self, ch: usize, volume: u8) -> Result<()> {
        self.check_channel(ch)?;
        let volume = volume.min(127);
        self.shared.voices[ch].sound.volume = volume;
        if self.shared.surround {
            let split = surround_volumes(volume, self.shared.voices[ch].sound.pan);
            self.post_surround_volumes(ch, split);
        } else {
            let slot = &mut self.shared.voices[ch];
            slot.volume = volume;
            slot.commands.post(VoiceCommand::SetVolume);
        }
        Ok(())
    }

    /// Change the stereo position of the sound on `ch`.
    pub fn set_pan(&mut self, ch: usize, pan: u8) -> Result<()> {
        self.check_channel(ch)?;
        let pan = pan.min(127);
        self.shared.voices[ch].sound.pan = pan;
        if self.shared.surround {
            // position is a volume difference between the pair
            let split = surround_volumes(self.shared.voices[ch].sound.volume, pan);
            self.post_surround_volumes(ch, split);
        } else {
            let slot = &mut self.shared.voices[ch];
            slot.pan = pan;
            slot.commands.post(VoiceCommand::SetPan);
        }
        Ok(())
    }

    /// Change the sample rate of the sound on `ch`.
    pub fn set_rate(&mut self, ch: usize, rate: u32) -> Result<()> {
        self.check_channel(ch)?;
        self.shared.voices[ch].sound.rate = rate;
        self.shared.voices[ch].commands.post(VoiceCommand::SetRate);
        if self.shared.surround {
            let mirror = ch + self.num_chan;
            self.shared.voices[mirror].sound.rate = rate;
            self.shared.voices[mirror].commands.post(VoiceCommand::SetRate);
        }
        Ok(())
    }

    /// Set the hardware master volume.
    pub fn set_master_volume(&mut self, volume: u8) {
        self.shared.master_volume = volume.min(127);
        self.shared.global.insert(GlobalCmd::SET_MASTER_VOLUME);
    }

    /// Whether a sound is still running on `ch`.
    pub fn is_busy(&self, ch: usize) -> bool {
        self.shared.voices.get(ch).is_some_and(|slot| slot.busy)
    }

    /// Channels available for effect playback.
    pub fn active_channels(&self) -> usize {
        self.num_chan
    }

    /// The shared block, for inspection.
    pub fn shared(&self) -> &SharedAudioState {
        &self.shared
    }

    /// The host platform.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    fn post_surround_volumes(&mut self, ch: usize, split: SurroundVolumes) {
        let mirror = ch + self.num_chan;
        let slot = &mut self.shared.voices[ch];
        slot.volume = split.primary;
        slot.commands.post(VoiceCommand::SetVolume);
        let slot = &mut self.shared.voices[mirror];
        slot.volume = split.mirror;
        slot.commands.post(VoiceCommand::SetVolume);
    }

    fn check_channel(&self, ch: usize) -> Result<()> {
        if ch >= self.num_chan || self.shared.voices[ch].reserved {
            return Err(AudioError::ChannelOutOfRange(ch));
        }
        Ok(())
    }

    /// Run ticks until `done` holds, erroring out after the bounded wait.
    pub(crate) fn wait_handshake(
        &mut self,
        done: impl Fn(&SharedAudioState) -> bool,
    ) -> Result<()> {
        let mut ticks = 0;
        while !done(&self.shared) {
            if ticks >= HANDSHAKE_TIMEOUT_TICKS {
                return Err(AudioError::HandshakeTimeout);
            }
            self.platform.wait_for_tick(&mut self.shared);
            ticks += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::NullPlatform;
    use crate::shared::commands::Mp3Command;

    /// Handshake-only coprocessor stand-in: posts ready and accepts the
    /// decoder workspace, nothing else.
    pub(super) struct StubCop;

    impl HostPlatform for StubCop {
        fn wait_for_tick(&mut self, shared: &mut SharedAudioState) {
            shared.global.insert(GlobalCmd::READY);
            if shared.mp3.commands.contains(Mp3Command::Init)
                && shared.mp3.commands.contains(Mp3Command::AllocDone)
            {
                shared.mp3.commands.clear(Mp3Command::Init);
            }
        }
    }

    fn stereo_config() -> EngineConfig {
        EngineConfig {
            mp3: false,
            ..EngineConfig::default()
        }
    }

    fn surround_config() -> EngineConfig {
        EngineConfig {
            mode: ChannelMode::Eight,
            surround: true,
            mp3: false,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_surround_requires_eight_channels() {
        let config = EngineConfig {
            surround: true,
            ..EngineConfig::default()
        };
        assert!(matches!(
            SoundControl::new(StubCop, config),
            Err(AudioError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_init_times_out_without_coprocessor() {
        let mut ctl = SoundControl::new(NullPlatform::new(), stereo_config()).unwrap();
        assert!(matches!(ctl.init(), Err(AudioError::HandshakeTimeout)));
    }

    #[test]
    fn test_play_posts_play_command() {
        let mut ctl = SoundControl::new(StubCop, stereo_config()).unwrap();
        ctl.init().unwrap();
        let ch = ctl
            .play_default(vec![0u8; 64].into(), BASE_VOLUME, 64, false, 0)
            .unwrap()
            .unwrap();
        let slot = &ctl.shared().voices[ch];
        assert!(slot.commands.contains(VoiceCommand::Play));
        assert!(slot.busy, "channel claimed until the engine reports back");
        assert_eq!(slot.sound.volume, BASE_VOLUME);
        assert_eq!(slot.sound.rate, 11_025, "stock default rate");
    }

    #[test]
    fn test_stored_defaults_flow_into_play_default() {
        let mut ctl = SoundControl::new(StubCop, stereo_config()).unwrap();
        ctl.init().unwrap();
        ctl.set_default_settings(DefaultSettings {
            format: SoundFormat::Pcm16,
            rate: 22_050,
            delay: 3,
        });
        let ch = ctl
            .play_default(vec![0u8; 64].into(), 80, 32, true, 5)
            .unwrap()
            .unwrap();
        let slot = &ctl.shared().voices[ch];
        assert_eq!(slot.sound.format, SoundFormat::Pcm16);
        assert_eq!(slot.sound.rate, 22_050);
        assert_eq!(slot.sound.delay, 3);
        assert_eq!(slot.sound.volume, 80);
        assert!(slot.sound.looping);
        assert_eq!(slot.sound.priority, 5);
        assert_eq!(ctl.default_settings().rate, 22_050);
    }

    #[test]
    fn test_surround_play_programs_voice_pair() {
        let mut ctl = SoundControl::new(StubCop, surround_config()).unwrap();
        ctl.init().unwrap();
        let sound = SoundInfo {
            data: SampleSource::Pcm(vec![0u8; 64].into()),
            size: 64,
            rate: 22_050,
            volume: 100,
            pan: 0,
            ..SoundInfo::default()
        };
        ctl.direct_play(3, sound).unwrap();

        let primary = &ctl.shared().voices[3];
        let mirror = &ctl.shared().voices[3 + 8];
        assert_eq!(primary.pan, 0);
        assert_eq!(mirror.pan, 127);
        assert_eq!(mirror.sound.delay, DELAY_SURROUND);
        assert!(primary.commands.contains(VoiceCommand::Play));
        assert!(mirror.commands.contains(VoiceCommand::Delay));
        // hard-left pan boosts the primary and cuts the mirror
        assert!(primary.volume > mirror.volume);
        // the request itself is kept unchanged
        assert_eq!(primary.sound.volume, 100);
        assert_eq!(primary.sound.pan, 0);
    }

    #[test]
    fn test_reverb_delay_rides_the_mirror_voice() {
        use crate::shared::DELAY_REVERB;

        let mut ctl = SoundControl::new(StubCop, surround_config()).unwrap();
        ctl.init().unwrap();
        let sound = SoundInfo {
            data: SampleSource::Pcm(vec![0u8; 64].into()),
            size: 64,
            rate: 22_050,
            volume: 100,
            delay: DELAY_REVERB,
            ..SoundInfo::default()
        };
        ctl.direct_play(4, sound).unwrap();

        let mirror = &ctl.shared().voices[4 + 8];
        assert_eq!(mirror.sound.delay, DELAY_REVERB);
        assert!(mirror.commands.contains(VoiceCommand::Delay));
        // the primary still starts at once
        assert_eq!(ctl.shared().voices[4].sound.delay, DELAY_NONE);
    }

    #[test]
    fn test_set_pan_in_surround_moves_volumes_not_pans() {
        let mut ctl = SoundControl::new(StubCop, surround_config()).unwrap();
        ctl.init().unwrap();
        let sound = SoundInfo {
            data: SampleSource::Pcm(vec![0u8; 64].into()),
            size: 64,
            rate: 22_050,
            volume: 96,
            ..SoundInfo::default()
        };
        ctl.direct_play(2, sound).unwrap();
        ctl.set_pan(2, 127).unwrap();

        let primary = &ctl.shared().voices[2];
        let mirror = &ctl.shared().voices[10];
        assert_eq!(primary.pan, 0, "pair pans never move");
        assert_eq!(mirror.pan, 127);
        assert!(mirror.volume > primary.volume);
        assert!(primary.commands.contains(VoiceCommand::SetVolume));
        assert!(mirror.commands.contains(VoiceCommand::SetVolume));
    }

    #[test]
    fn test_out_of_range_channel_is_refused() {
        let mut ctl = SoundControl::new(StubCop, surround_config()).unwrap();
        ctl.init().unwrap();
        // channel 8 exists in hardware but is a mirror slot here
        assert!(matches!(
            ctl.stop(8),
            Err(AudioError::ChannelOutOfRange(8))
        ));
    }

    #[test]
    fn test_master_volume_posts_global_command() {
        let mut ctl = SoundControl::new(StubCop, stereo_config()).unwrap();
        ctl.init().unwrap();
        ctl.set_master_volume(200);
        assert_eq!(ctl.shared().master_volume, 127);
        assert!(ctl.shared().global.contains(GlobalCmd::SET_MASTER_VOLUME));
    }

    #[test]
    fn test_config_round_trips_through_serde() {
        let config = surround_config();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<EngineConfig>(&json).unwrap(), config);
    }
}
