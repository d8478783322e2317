//! MP3 stream engine.
//!
//! Runs on the audio coprocessor. Commands arrive through the shared MP3
//! context; playback is paced by the cascaded sample-timer pair, so each tick
//! decodes exactly the number of samples hardware has consumed since the
//! previous tick rather than a fixed quota. Decoded PCM lands in the shared
//! mix ring (left plane then right plane); two looping hardware voices read
//! it back out.
//!
//! Phase flow: `Play` locates the first sync word, fills half the ring and
//! arms `Mix`; `Mix` programs the two voices once and flips to `Mixing`;
//! `Mixing` keeps the ring fed. `OutOfData` and `DecodeError` silence the
//! voices and reset the decoder so the next start is click-free.

use log::{debug, warn};

use crate::codec::{find_sync, FrameDecoder, FrameHeader, MAX_SAMPLES_PER_FRAME};
use crate::hal::{channel_period, sample_timer_period, SoundHardware};
use crate::shared::commands::{Mp3Command, VoiceCommand};
use crate::shared::{Mp3Context, Mp3State, SampleSource, SharedAudioState, SoundFormat};

/// When a looping file stream has fewer budget bytes than this, extend the
/// budget by another file length; the fill side handles the actual wrap.
/// Two maximum-size compressed frames of headroom.
const LOW_DATA_WATERMARK: usize = 2 * 1940;

/// Outcome of one ring-fill request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillOutcome {
    /// The requested span was written.
    Filled,
    /// Playback halted (out of data or decode fault); state already set.
    Halted,
}

/// The decoder-side half of MP3 playback.
pub(crate) struct Mp3Engine<D: FrameDecoder> {
    decoder: D,
    /// One decoded frame, interleaved.
    scratch: Vec<i16>,
    /// Start of the unconsumed tail of `scratch`, in interleaved samples.
    leftover_start: usize,
    /// Unconsumed samples per channel retained from the last decode.
    leftover: usize,
    stereo: bool,
}

/// The decoder's readable window: bounded by the byte budget and the end of
/// the compressed buffer (the budget may exceed the buffer while looping).
fn window(mp3: &Mp3Context) -> &[u8] {
    let avail = mp3.mp3_buffer.len().saturating_sub(mp3.read_pos);
    let len = mp3.bytes_left.min(avail);
    &mp3.mp3_buffer[mp3.read_pos..mp3.read_pos + len]
}

/// Copy `count` samples (per channel) from interleaved `src` starting at
/// interleaved index `from` into the ring planes at sample offset `at`.
fn write_planes(mix: &mut [i16], plane: usize, stereo: bool, at: usize, src: &[i16], from: usize, count: usize) {
    if stereo {
        for k in 0..count {
            mix[at + k] = src[from + 2 * k];
            mix[plane + at + k] = src[from + 2 * k + 1];
        }
    } else {
        mix[at..at + count].copy_from_slice(&src[from..from + count]);
    }
}

impl<D: FrameDecoder> Mp3Engine<D> {
    pub(crate) fn new(decoder: D) -> Self {
        Mp3Engine {
            decoder,
            scratch: vec![0; MAX_SAMPLES_PER_FRAME],
            leftover_start: 0,
            leftover: 0,
            stereo: false,
        }
    }

    /// One tick of MP3 service: drain commands, then decode/mix.
    pub(crate) fn service<H: SoundHardware>(&mut self, hw: &mut H, shared: &mut SharedAudioState) {
        {
            let mp3 = &mut shared.mp3;

            if mp3.commands.contains(Mp3Command::Init) {
                // The decoder workspace is only usable once the application
                // side has allocated the shared buffers; retry next tick.
                if mp3.commands.contains(Mp3Command::AllocDone) {
                    self.decoder.reset();
                    self.leftover = 0;
                    self.leftover_start = 0;
                    mp3.commands.clear(Mp3Command::Init);
                }
            }

            if mp3.commands.contains(Mp3Command::SetRate) {
                mp3.commands.clear(Mp3Command::SetRate);
                if let Some(period) = sample_timer_period(mp3.rate) {
                    hw.retune_sample_timer(period);
                }
                if let Some(period) = channel_period(mp3.rate) {
                    hw.set_channel_period(mp3.channel_l, period);
                    hw.set_channel_period(mp3.channel_r, period);
                }
            }

            if mp3.commands.contains(Mp3Command::Pause) {
                mp3.commands.clear(Mp3Command::Pause);
                hw.stop_channel(mp3.channel_l);
                hw.stop_channel(mp3.channel_r);
                hw.stop_sample_timer();
                // wait for the restart
                mp3.commands.post(Mp3Command::Waiting);
                mp3.state = Mp3State::Paused;
            }

            if mp3.commands.contains(Mp3Command::Stop) {
                mp3.commands.clear(Mp3Command::Stop);
                self.stop(hw, mp3);
                return;
            }

            if mp3.commands.contains(Mp3Command::Play) {
                mp3.commands.clear(Mp3Command::Play);

                if mp3.state == Mp3State::Paused {
                    // restart on a fresh basis
                    mp3.prev_timer = 0;
                    let half = mp3.buffer_size / 2;
                    if self.fill(hw, mp3, 0, half) != FillOutcome::Filled {
                        return;
                    }
                    mp3.sound_cursor = half;
                    if let Some(period) = sample_timer_period(mp3.rate) {
                        hw.start_sample_timer(period);
                    }
                    mp3.commands.post(Mp3Command::Mix);
                } else {
                    mp3.prev_timer = 0;
                    mp3.num_samples = 0;
                    mp3.read_pos = 0;
                    mp3.bytes_left = mp3.file_size;
                    self.leftover = 0;
                    self.leftover_start = 0;

                    // realign on the first frame and read the stream format
                    let Some(offset) = find_sync(window(mp3)) else {
                        self.stop(hw, mp3);
                        mp3.state = Mp3State::OutOfData;
                        return;
                    };
                    mp3.read_pos += offset;
                    mp3.bytes_left -= offset;
                    match FrameHeader::parse(window(mp3)) {
                        Ok(header) => {
                            self.stereo = header.channels == 2;
                            mp3.rate = header.sample_rate;
                        }
                        Err(e) => {
                            warn!("mp3 start: unreadable first frame: {e}");
                            self.stop(hw, mp3);
                            mp3.state = Mp3State::DecodeError;
                            return;
                        }
                    }

                    // prime half of the ring before hardware starts draining
                    let half = mp3.buffer_size / 2;
                    if self.fill(hw, mp3, 0, half) != FillOutcome::Filled {
                        return;
                    }
                    mp3.sound_cursor = half;
                    if let Some(period) = sample_timer_period(mp3.rate) {
                        hw.start_sample_timer(period);
                    }
                    mp3.commands.post(Mp3Command::Mix);
                }
                mp3.state = Mp3State::Playing;
            }
        }

        // decode/mix step
        if shared.mp3.commands.contains(Mp3Command::Mixing) {
            let mp3 = &mut shared.mp3;
            let current = hw.sample_timer();

            if mp3.commands.contains(Mp3Command::Waiting) {
                mp3.commands.clear(Mp3Command::Waiting);
            } else {
                // samples hardware consumed since the previous tick; clamped
                // so wrap copies can never exceed the ring
                let elapsed = current.wrapping_sub(mp3.prev_timer) as usize;
                mp3.num_samples = elapsed.min(mp3.buffer_size);
            }
            mp3.prev_timer = current;

            let want = mp3.num_samples;
            let cursor = mp3.sound_cursor;
            let size = mp3.buffer_size;
            if cursor + want >= size {
                // split the copy at the wrap boundary
                let first = size - cursor;
                if self.fill(hw, mp3, cursor, first) == FillOutcome::Filled {
                    self.fill(hw, mp3, 0, want - first);
                }
            } else {
                self.fill(hw, mp3, cursor, want);
            }

            if mp3.commands.contains(Mp3Command::Mixing) {
                mp3.sound_cursor = cursor + want;
                if mp3.sound_cursor >= size {
                    mp3.sound_cursor -= size;
                }
            }
        } else if shared.mp3.commands.contains(Mp3Command::Mix) {
            // one-shot: point the two voices at the ring planes
            let (l, r, rate, delay, plane_bytes, stereo) = {
                let mp3 = &shared.mp3;
                (
                    mp3.channel_l,
                    mp3.channel_r,
                    mp3.rate,
                    mp3.delay,
                    (mp3.buffer_size * 2) as u32,
                    self.stereo,
                )
            };

            let left = &mut shared.voices[l];
            left.sound.data = SampleSource::MixLeft;
            left.sound.size = plane_bytes;
            left.sound.format = SoundFormat::Pcm16;
            left.sound.rate = rate;
            left.sound.looping = true;
            left.sound.delay = 0;
            left.commands.post(VoiceCommand::Play);

            let right = &mut shared.voices[r];
            right.sound.data = if stereo {
                SampleSource::MixRight
            } else {
                SampleSource::MixLeft
            };
            right.sound.size = plane_bytes;
            right.sound.format = SoundFormat::Pcm16;
            right.sound.rate = rate;
            right.sound.looping = true;
            right.sound.delay = delay;
            right.commands.post(VoiceCommand::Delay);

            shared.mp3.commands.clear(Mp3Command::Mix);
            shared.mp3.commands.post(Mp3Command::Mixing);
        }
    }

    /// Stop playback: silence both voices, halt the timer, reset the decoder
    /// so the next start does not click.
    fn stop<H: SoundHardware>(&mut self, hw: &mut H, mp3: &mut Mp3Context) {
        hw.stop_channel(mp3.channel_l);
        hw.stop_channel(mp3.channel_r);
        hw.stop_sample_timer();
        mp3.rate = 0;
        mp3.commands.clear_all();
        mp3.state = Mp3State::Stopped;
        self.decoder.reset();
        self.leftover = 0;
        self.leftover_start = 0;
    }

    /// Fill `want` samples (per channel) of the ring starting at sample
    /// offset `at`: drain retained samples first, then decode frame by frame;
    /// anything decoded past `want` is retained for the next tick.
    fn fill<H: SoundHardware>(
        &mut self,
        hw: &mut H,
        mp3: &mut Mp3Context,
        at: usize,
        want: usize,
    ) -> FillOutcome {
        let plane = mp3.buffer_size;
        let mut out = at;
        let mut want = want;

        // retained tail of the previous frame first
        let have = self.leftover.min(want);
        if have > 0 {
            write_planes(
                &mut mp3.mix_buffer,
                plane,
                self.stereo,
                out,
                &self.scratch,
                self.leftover_start,
                have,
            );
            out += have;
            want -= have;
            self.leftover_start += if self.stereo { have * 2 } else { have };
            self.leftover -= have;
            if self.leftover == 0 {
                self.leftover_start = 0;
            }
        }

        if want > 0 {
            // a looping file stream never runs its budget down; the fill
            // side wraps the file for us
            if mp3.stream && mp3.looping && mp3.bytes_left < LOW_DATA_WATERMARK {
                mp3.bytes_left += mp3.file_size;
            }

            loop {
                // find the start of the next frame (assume end of data if
                // no sync is found)
                let mut offset = find_sync(window(mp3));
                if offset.is_none() && mp3.looping && !mp3.stream {
                    // in-memory loop: retry from the start
                    mp3.read_pos = 0;
                    mp3.bytes_left = mp3.file_size;
                    offset = find_sync(window(mp3));
                }
                let Some(offset) = offset else {
                    self.stop(hw, mp3);
                    mp3.state = Mp3State::OutOfData;
                    return FillOutcome::Halted;
                };
                mp3.read_pos += offset;
                mp3.bytes_left -= offset;

                let frame = {
                    let data = &mp3.mp3_buffer
                        [mp3.read_pos..mp3.read_pos + mp3.bytes_left.min(mp3.mp3_buffer.len() - mp3.read_pos)];
                    self.decoder.decode_frame(data, &mut self.scratch)
                };
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("mp3 decode fault: {e}");
                        self.stop(hw, mp3);
                        mp3.state = Mp3State::DecodeError;
                        return FillOutcome::Halted;
                    }
                };
                mp3.read_pos += frame.consumed;
                mp3.bytes_left = mp3.bytes_left.saturating_sub(frame.consumed);

                let take = frame.samples.min(want);
                write_planes(
                    &mut mp3.mix_buffer,
                    plane,
                    self.stereo,
                    out,
                    &self.scratch,
                    0,
                    take,
                );
                out += take;
                want -= take;

                if want == 0 {
                    // keep the surplus for the next tick
                    self.leftover_start = if self.stereo { take * 2 } else { take };
                    self.leftover = frame.samples - take;
                    break;
                }
            }
        }

        // crossed into the second stream segment: slide it down and ask the
        // application side for a refill
        if mp3.stream && mp3.read_pos >= mp3.segment_size {
            let seg = mp3.segment_size;
            mp3.mp3_buffer.copy_within(seg..seg * 2, 0);
            mp3.read_pos -= seg;
            mp3.need_data = true;
            debug!("mp3 stream: segment consumed, refill requested");
        }

        FillOutcome::Filled
    }
}
