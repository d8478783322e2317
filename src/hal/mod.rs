//! Hardware and platform seams.
//!
//! The engine never touches registers directly; the audio coprocessor side
//! drives a [`SoundHardware`] implementation and the application side gets a
//! [`HostPlatform`] carrying the injected wait-for-tick primitive and the
//! cache-flush hooks. Both are trait seams so the whole engine runs against
//! [`sim::SimHardware`] and a mock clock in tests.

pub mod sim;

use crate::shared::{SampleSource, SharedAudioState, SoundFormat};

/// Sound unit clock in Hz. Channel periods are fixed-point divisors of it.
pub const SOUND_CLOCK: u32 = 0x0100_0000;

/// Channel timer reload value for a playback rate, `0x10000 - clock / rate`.
///
/// Returns `None` for rates the divisor cannot express (zero, or too low to
/// fit the 16-bit reload register).
pub fn channel_period(rate: u32) -> Option<u16> {
    if rate == 0 {
        return None;
    }
    let divisor = SOUND_CLOCK / rate;
    if divisor == 0 || divisor > 0xFFFF {
        return None;
    }
    Some((0x10000 - divisor) as u16)
}

/// Sample-timer reload value for a playback rate.
///
/// The free-running half of the cascaded timer pair ticks at twice the sound
/// clock, so the divisor is doubled.
pub fn sample_timer_period(rate: u32) -> Option<u16> {
    if rate == 0 {
        return None;
    }
    let divisor = (SOUND_CLOCK / rate).checked_mul(2)?;
    if divisor == 0 || divisor > 0xFFFF {
        return None;
    }
    Some((0x10000 - divisor) as u16)
}

/// Everything needed to program and start one hardware channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSetup {
    /// Sample source.
    pub source: SampleSource,
    /// Sample data length in bytes.
    pub size: u32,
    /// Channel timer reload value (see [`channel_period`]).
    pub period: u16,
    /// Hardware volume, 0..=127.
    pub volume: u8,
    /// Hardware pan, 0..=127.
    pub pan: u8,
    /// Loop instead of one-shot.
    pub looping: bool,
    /// Sample format.
    pub format: SoundFormat,
}

/// The physical sound unit, as seen from the audio coprocessor.
///
/// Sixteen channels plus a cascaded timer pair: the first timer free-runs at
/// the playback sample rate, the second counts its overflows, so the second
/// timer's reading is "samples elapsed" modulo 65536.
pub trait SoundHardware {
    /// Program and start a channel.
    fn start_channel(&mut self, ch: usize, setup: &ChannelSetup);
    /// Disable a channel immediately.
    fn stop_channel(&mut self, ch: usize);
    /// Update a running channel's volume.
    fn set_channel_volume(&mut self, ch: usize, volume: u8);
    /// Update a running channel's pan.
    fn set_channel_pan(&mut self, ch: usize, pan: u8);
    /// Reprogram a running channel's timer.
    fn set_channel_period(&mut self, ch: usize, period: u16);
    /// The channel-enable bit: false once a one-shot sample has finished.
    fn channel_active(&self, ch: usize) -> bool;
    /// Master output volume, 0..=127.
    fn set_master_volume(&mut self, volume: u8);

    /// Start the sample-timer pair, resetting the elapsed count.
    fn start_sample_timer(&mut self, period: u16);
    /// Change the sample-timer rate without resetting the elapsed count,
    /// so the decode loop still sees how much it owes.
    fn retune_sample_timer(&mut self, period: u16);
    /// Stop the sample-timer pair.
    fn stop_sample_timer(&mut self);
    /// Elapsed samples modulo 65536.
    fn sample_timer(&self) -> u16;
}

/// A shared buffer region one processor fills for the other. The writer must
/// flush it from its data cache before posting the command that publishes it;
/// the two processors are not cache-coherent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRegion {
    /// The decoded-PCM mix ring.
    MixBuffer,
    /// The compressed stream swap buffer.
    FileBuffer,
    /// Caller-provided sample or MP3 data.
    SampleData,
}

/// Platform services of the application processor.
///
/// `wait_for_tick` is the only suspension point in the system; it is handed
/// the shared block so a test double can run the coprocessor side while the
/// application side busy-waits on a handshake flag.
pub trait HostPlatform {
    /// Block until the next tick boundary.
    fn wait_for_tick(&mut self, shared: &mut SharedAudioState);

    /// Flush a shared buffer from this processor's data cache. No-op on
    /// cache-coherent hosts.
    fn flush_cache(&mut self, _region: CacheRegion) {}
}
