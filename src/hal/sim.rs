//! Simulated sound unit.
//!
//! A software model of the 16-channel hardware and the cascaded sample-timer
//! pair. Register writes are recorded instead of producing sound; tests (and
//! host-side harnesses) inspect them and step the timer by hand.

use super::{ChannelSetup, HostPlatform, SoundHardware};
use crate::shared::{SharedAudioState, NUM_VOICES};

/// Recorded state of one simulated channel.
#[derive(Debug, Clone, Default)]
pub struct SimChannel {
    /// Channel-enable bit.
    pub active: bool,
    /// The last full setup written by a start, if any.
    pub setup: Option<ChannelSetup>,
    /// Last volume written (by start or a volume update).
    pub volume: u8,
    /// Last pan written.
    pub pan: u8,
    /// Last timer reload written.
    pub period: u16,
    /// Number of times this channel was started.
    pub starts: usize,
}

/// Simulated hardware: channels, master volume and sample timer.
#[derive(Debug, Clone, Default)]
pub struct SimHardware {
    channels: [SimChannel; NUM_VOICES],
    /// Last master volume written.
    pub master_volume: u8,
    /// Sample timer running.
    pub timer_running: bool,
    /// Last sample-timer reload written.
    pub timer_period: u16,
    timer_count: u16,
}

impl SimHardware {
    /// Fresh hardware; all channels idle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect a channel's recorded registers.
    pub fn channel(&self, ch: usize) -> &SimChannel {
        &self.channels[ch]
    }

    /// Advance the cascaded sample counter, wrapping at 65536.
    pub fn advance_samples(&mut self, samples: u16) {
        if self.timer_running {
            self.timer_count = self.timer_count.wrapping_add(samples);
        }
    }

    /// Simulate a one-shot sample finishing: hardware drops the enable bit.
    pub fn finish_channel(&mut self, ch: usize) {
        self.channels[ch].active = false;
    }
}

impl SoundHardware for SimHardware {
    fn start_channel(&mut self, ch: usize, setup: &ChannelSetup) {
        let chan = &mut self.channels[ch];
        chan.active = true;
        chan.volume = setup.volume;
        chan.pan = setup.pan;
        chan.period = setup.period;
        chan.setup = Some(setup.clone());
        chan.starts += 1;
    }

    fn stop_channel(&mut self, ch: usize) {
        self.channels[ch].active = false;
    }

    fn set_channel_volume(&mut self, ch: usize, volume: u8) {
        self.channels[ch].volume = volume;
    }

    fn set_channel_pan(&mut self, ch: usize, pan: u8) {
        self.channels[ch].pan = pan;
    }

    fn set_channel_period(&mut self, ch: usize, period: u16) {
        self.channels[ch].period = period;
    }

    fn channel_active(&self, ch: usize) -> bool {
        self.channels[ch].active
    }

    fn set_master_volume(&mut self, volume: u8) {
        self.master_volume = volume;
    }

    fn start_sample_timer(&mut self, period: u16) {
        self.timer_period = period;
        self.timer_count = 0;
        self.timer_running = true;
    }

    fn retune_sample_timer(&mut self, period: u16) {
        // Reload write only: the elapsed count and the enable bit stay as
        // they are, so the decode loop still sees the delta it owes.
        self.timer_period = period;
    }

    fn stop_sample_timer(&mut self) {
        self.timer_running = false;
    }

    fn sample_timer(&self) -> u16 {
        self.timer_count
    }
}

/// A [`HostPlatform`] whose tick wait does nothing but count.
///
/// Suits tests where the coprocessor side is stepped explicitly, and
/// handshake-timeout tests where nobody ever answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlatform {
    /// Ticks spent waiting.
    pub ticks_waited: usize,
    /// Cache flushes issued.
    pub flushes: usize,
}

impl NullPlatform {
    /// New idle platform.
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostPlatform for NullPlatform {
    fn wait_for_tick(&mut self, _shared: &mut SharedAudioState) {
        self.ticks_waited += 1;
    }

    fn flush_cache(&mut self, _region: super::CacheRegion) {
        self.flushes += 1;
    }
}
