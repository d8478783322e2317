//! Audio-coprocessor engine.
//!
//! The side of the system that owns the physical sound unit. Once per tick
//! it drains the pending voice commands in a fixed order, applies them to
//! hardware channels, and refreshes each voice's `busy` mirror; the MP3
//! stream engine ([`mp3`]) then runs its own command pass and decode/mix
//! step. Commands are cleared only after their effect is applied.

pub mod mp3;

use log::warn;

use crate::codec::FrameDecoder;
use crate::hal::{channel_period, ChannelSetup, SoundHardware};
use crate::shared::commands::{GlobalCmd, VoiceCommand};
use crate::shared::{SharedAudioState, NUM_VOICES};

use mp3::Mp3Engine;

/// The audio coprocessor's per-tick service engine.
pub struct SoundEngine<H: SoundHardware, D: FrameDecoder> {
    hw: H,
    mp3: Mp3Engine<D>,
}

impl<H: SoundHardware, D: FrameDecoder> SoundEngine<H, D> {
    /// Take ownership of the hardware and the MP3 decoder workspace.
    pub fn new(hw: H, decoder: D) -> Self {
        SoundEngine {
            hw,
            mp3: Mp3Engine::new(decoder),
        }
    }

    /// Coprocessor bring-up: announce readiness to the application side.
    pub fn init(&mut self, shared: &mut SharedAudioState) {
        shared.global.insert(GlobalCmd::READY);
    }

    /// Full per-tick service: voices first, then the MP3 stream engine.
    pub fn tick(&mut self, shared: &mut SharedAudioState) {
        self.service_voices(shared);
        self.service_mp3(shared);
    }

    /// Drain voice commands in the fixed order
    /// delay → stop → play → set-volume → set-pan → set-rate,
    /// then refresh every voice's `busy` mirror from hardware.
    pub fn service_voices(&mut self, shared: &mut SharedAudioState) {
        if shared.global.contains(GlobalCmd::SET_MASTER_VOLUME) {
            self.hw.set_master_volume(shared.master_volume.min(127));
            shared.global.remove(GlobalCmd::SET_MASTER_VOLUME);
        }

        for i in 0..NUM_VOICES {
            let slot = &mut shared.voices[i];

            // A delay at zero flips into a play that is handled below,
            // within the same tick.
            if slot.commands.contains(VoiceCommand::Delay) {
                if slot.sound.delay == 0 {
                    slot.commands.clear(VoiceCommand::Delay);
                    slot.commands.post(VoiceCommand::Play);
                } else {
                    slot.sound.delay -= 1;
                }
            }

            if slot.commands.contains(VoiceCommand::Stop) {
                self.hw.stop_channel(i);
                slot.commands.clear(VoiceCommand::Stop);
            }

            if slot.commands.contains(VoiceCommand::Play) {
                match channel_period(slot.sound.rate) {
                    Some(period) => {
                        let setup = ChannelSetup {
                            source: slot.sound.data.clone(),
                            size: slot.sound.size,
                            period,
                            volume: slot.volume.min(127),
                            pan: slot.pan.min(127),
                            looping: slot.sound.looping,
                            format: slot.sound.format,
                        };
                        self.hw.start_channel(i, &setup);
                    }
                    None => warn!("voice {i}: dropping play, unplayable rate {}", slot.sound.rate),
                }
                slot.commands.clear(VoiceCommand::Play);
            }

            if slot.commands.contains(VoiceCommand::SetVolume) {
                self.hw.set_channel_volume(i, slot.volume.min(127));
                slot.commands.clear(VoiceCommand::SetVolume);
            }

            if slot.commands.contains(VoiceCommand::SetPan) {
                self.hw.set_channel_pan(i, slot.pan.min(127));
                slot.commands.clear(VoiceCommand::SetPan);
            }

            if slot.commands.contains(VoiceCommand::SetRate) {
                match channel_period(slot.sound.rate) {
                    Some(period) => self.hw.set_channel_period(i, period),
                    None => warn!("voice {i}: dropping rate change to {}", slot.sound.rate),
                }
                slot.commands.clear(VoiceCommand::SetRate);
            }

            // The one field continuously reported back rather than commanded.
            slot.busy = self.hw.channel_active(i);
        }
    }

    /// Run the MP3 stream engine's command pass and decode/mix step.
    pub fn service_mp3(&mut self, shared: &mut SharedAudioState) {
        self.mp3.service(&mut self.hw, shared);
    }

    /// Inspect the hardware (host harnesses and tests).
    pub fn hardware(&self) -> &H {
        &self.hw
    }

    /// Mutate the hardware (host harnesses step the sample timer with this).
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }
}
