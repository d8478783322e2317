//! Full-stack playback tests: the application control surface driving the
//! real coprocessor engine over simulated hardware.

use std::io::Write;
use std::sync::Arc;

use dsaudio::codec::sim::{build_frame, SimDecoder};
use dsaudio::control::BASE_VOLUME;
use dsaudio::hal::sim::SimHardware;
use dsaudio::hal::HostPlatform;
use dsaudio::{
    ChannelMode, EngineConfig, Mp3State, SampleSource, SharedAudioState, SoundControl,
    SoundEngine, SoundInfo,
};

/// Host platform wired straight to an engine instance: every wait runs one
/// coprocessor tick, after advancing the sample timer as if `samples_per_tick`
/// samples of mixer output had played.
struct Loopback {
    engine: SoundEngine<SimHardware, SimDecoder>,
    started: bool,
    samples_per_tick: u16,
}

impl Loopback {
    fn new(samples_per_tick: u16) -> Self {
        Loopback {
            engine: SoundEngine::new(SimHardware::new(), SimDecoder::new()),
            started: false,
            samples_per_tick,
        }
    }

    fn hw(&self) -> &SimHardware {
        self.engine.hardware()
    }
}

impl HostPlatform for Loopback {
    fn wait_for_tick(&mut self, shared: &mut SharedAudioState) {
        if !self.started {
            self.engine.init(shared);
            self.started = true;
        }
        self.engine.hardware_mut().advance_samples(self.samples_per_tick);
        self.engine.tick(shared);
    }
}

fn effects_only() -> EngineConfig {
    EngineConfig {
        mp3: false,
        ..EngineConfig::default()
    }
}

fn pcm_sound(priority: u8) -> SoundInfo {
    SoundInfo {
        data: SampleSource::Pcm(Arc::from(vec![0u8; 256])),
        size: 256,
        rate: 22_050,
        priority,
        ..SoundInfo::default()
    }
}

#[test]
fn test_bring_up_handshake_completes() {
    let mut ctl = SoundControl::new(Loopback::new(0), effects_only()).unwrap();
    ctl.init().unwrap();
    assert_eq!(ctl.active_channels(), 16);
}

#[test]
fn test_effect_reaches_hardware() {
    let mut ctl = SoundControl::new(Loopback::new(0), effects_only()).unwrap();
    ctl.init().unwrap();

    let data: Arc<[u8]> = Arc::from(vec![0u8; 256]);
    let ch = ctl.play_default(data, BASE_VOLUME, 64, false, 0).unwrap().unwrap();
    ctl.service_tick();

    let hw = ctl.platform_mut().hw();
    let chan = hw.channel(ch);
    assert!(chan.active);
    assert_eq!(chan.starts, 1);
    assert_eq!(chan.volume, BASE_VOLUME);
    assert!(ctl.is_busy(ch));
}

#[test]
fn test_equal_priority_requests_get_distinct_channels() {
    let mut ctl = SoundControl::new(Loopback::new(0), effects_only()).unwrap();
    ctl.init().unwrap();

    // both posted within one frame, before the engine runs at all
    let a = ctl.play(pcm_sound(5)).unwrap().unwrap();
    let b = ctl.play(pcm_sound(5)).unwrap().unwrap();
    assert_ne!(a, b, "second request must not steal the pending voice");

    ctl.service_tick();
    let hw = ctl.platform_mut().hw();
    assert!(hw.channel(a).active);
    assert!(hw.channel(b).active);
}

#[test]
fn test_low_priority_request_is_skipped_on_full_board() {
    let mut ctl = SoundControl::new(Loopback::new(0), effects_only()).unwrap();
    ctl.init().unwrap();

    for _ in 0..16 {
        assert!(ctl.play(pcm_sound(5)).unwrap().is_some());
    }
    assert_eq!(ctl.play(pcm_sound(0)).unwrap(), None);
}

#[test]
fn test_high_priority_evicts_lowest_victim() {
    let mut ctl = SoundControl::new(Loopback::new(0), effects_only()).unwrap();
    ctl.init().unwrap();

    for priority in 0..16 {
        ctl.play(pcm_sound(10 + priority)).unwrap().unwrap();
    }
    ctl.service_tick();

    // free scan fills downward, so the lowest priority sits on channel 15
    let victim = ctl.play(pcm_sound(100)).unwrap().unwrap();
    assert_eq!(victim, 15);
    ctl.service_tick();
    assert_eq!(ctl.platform_mut().hw().channel(victim).starts, 2);
}

#[test]
fn test_eviction_targets_minimum_priority_regardless_of_order() {
    let mut ctl = SoundControl::new(Loopback::new(0), effects_only()).unwrap();
    ctl.init().unwrap();

    let priorities = [7, 3, 12, 9, 1, 15, 4, 11, 2, 14, 6, 10, 8, 13, 5, 16];
    let mut weakest = 0;
    for &p in &priorities {
        let ch = ctl.play(pcm_sound(p)).unwrap().unwrap();
        if p == 1 {
            weakest = ch;
        }
    }

    // priorities 1 and 2 are both evictable for an incoming 2; the minimum
    // must lose no matter where the scrambled order placed it
    let got = ctl.play(pcm_sound(2)).unwrap().unwrap();
    assert_eq!(got, weakest);
}

#[test]
fn test_finished_voice_frees_up() {
    let mut ctl = SoundControl::new(Loopback::new(0), effects_only()).unwrap();
    ctl.init().unwrap();

    let ch = ctl.play(pcm_sound(5)).unwrap().unwrap();
    ctl.service_tick();
    assert!(ctl.is_busy(ch));

    ctl.platform_mut().engine.hardware_mut().finish_channel(ch);
    ctl.service_tick();
    assert!(!ctl.is_busy(ch));

    // and the scheduler hands it out again
    let next = ctl.play(pcm_sound(5)).unwrap().unwrap();
    assert_eq!(next, ch);
}

#[test]
fn test_surround_pair_reaches_hardware() {
    let config = EngineConfig {
        mode: ChannelMode::Eight,
        surround: true,
        mp3: false,
        ..EngineConfig::default()
    };
    let mut ctl = SoundControl::new(Loopback::new(0), config).unwrap();
    ctl.init().unwrap();

    ctl.direct_play(2, pcm_sound(5)).unwrap();
    ctl.service_tick(); // primary starts, mirror counts its delay down
    ctl.service_tick(); // mirror starts

    let hw = ctl.platform_mut().hw();
    assert!(hw.channel(2).active);
    assert!(hw.channel(10).active);
    assert_eq!(hw.channel(2).pan, 0);
    assert_eq!(hw.channel(10).pan, 127);
    assert_eq!(
        hw.channel(2).starts,
        hw.channel(10).starts,
        "mirror must start exactly once"
    );
}

#[test]
fn test_master_volume_reaches_hardware() {
    let mut ctl = SoundControl::new(Loopback::new(0), effects_only()).unwrap();
    ctl.init().unwrap();
    ctl.set_master_volume(90);
    ctl.service_tick();
    assert_eq!(ctl.platform_mut().hw().master_volume, 90);
}

fn mp3_config() -> EngineConfig {
    EngineConfig {
        mix_buffer_size: 1024,
        file_segment_size: 2048,
        ..EngineConfig::default()
    }
}

/// Frames whose decoded output forms one continuous ramp.
fn ramp_file(frames: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for n in 0..frames {
        data.extend_from_slice(&build_frame((n * 2 * 1152) as i16, false));
    }
    data
}

#[test]
fn test_mp3_playback_end_to_end() {
    let mut ctl = SoundControl::new(Loopback::new(256), mp3_config()).unwrap();
    ctl.init().unwrap();

    ctl.mp3_play(ramp_file(8), false).unwrap();
    for _ in 0..3 {
        ctl.service_tick();
    }

    assert_eq!(ctl.mp3_state(), Mp3State::Playing);
    let shared = ctl.shared();
    assert_eq!(shared.mp3.rate, 44_100);
    // the ramp landed deinterleaved in the ring planes
    assert_eq!(shared.mp3.mix_buffer[0], 0);
    assert_eq!(shared.mp3.mix_buffer[100], 200);
    assert_eq!(shared.mp3.mix_buffer[1024], 1);

    // the reserved output pair is running
    let hw = ctl.platform_mut().hw();
    assert!(hw.channel(0).active);
    assert!(hw.channel(1).active);
    assert_eq!(hw.channel(0).pan, 0);
    assert_eq!(hw.channel(1).pan, 127);
}

#[test]
fn test_mp3_runs_out_of_data() {
    let mut ctl = SoundControl::new(Loopback::new(256), mp3_config()).unwrap();
    ctl.init().unwrap();

    ctl.mp3_play(ramp_file(1), false).unwrap();
    for _ in 0..20 {
        ctl.service_tick();
    }

    assert_eq!(ctl.mp3_state(), Mp3State::OutOfData);
    let hw = ctl.platform_mut().hw();
    assert!(!hw.channel(0).active);
    assert!(!hw.channel(1).active);
    assert!(!hw.timer_running);
}

#[test]
fn test_mp3_pause_and_resume_through_engine() {
    let mut ctl = SoundControl::new(Loopback::new(256), mp3_config()).unwrap();
    ctl.init().unwrap();

    ctl.mp3_play(ramp_file(8), true).unwrap();
    for _ in 0..3 {
        ctl.service_tick();
    }
    assert_eq!(ctl.mp3_state(), Mp3State::Playing);

    ctl.mp3_pause().unwrap();
    ctl.service_tick();
    assert_eq!(ctl.mp3_state(), Mp3State::Paused);
    assert!(!ctl.platform_mut().hw().timer_running);

    ctl.mp3_resume().unwrap();
    for _ in 0..3 {
        ctl.service_tick();
    }
    assert_eq!(ctl.mp3_state(), Mp3State::Playing);
    assert!(ctl.platform_mut().hw().channel(0).active);
}

#[test]
fn test_mp3_looped_memory_playback_keeps_running() {
    let mut ctl = SoundControl::new(Loopback::new(256), mp3_config()).unwrap();
    ctl.init().unwrap();

    // a single looped frame must survive far past its own length
    ctl.mp3_play(ramp_file(1), true).unwrap();
    for _ in 0..40 {
        ctl.service_tick();
    }
    assert_eq!(ctl.mp3_state(), Mp3State::Playing);
}

#[test]
fn test_mp3_streams_from_a_real_file() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut file = tempfile::tempfile()?;
    file.write_all(&ramp_file(24))?;

    let mut ctl = SoundControl::new(Loopback::new(256), mp3_config())?;
    ctl.init()?;
    ctl.mp3_play_stream(Box::new(file), false)?;
    for _ in 0..10 {
        ctl.service_tick();
    }
    assert_eq!(ctl.mp3_state(), Mp3State::Playing);
    Ok(())
}

#[test]
fn test_mp3_stream_refills_during_playback() {
    let mut ctl = SoundControl::new(Loopback::new(256), mp3_config()).unwrap();
    ctl.init().unwrap();

    let file = ramp_file(24); // ~10k bytes, several 2k segments
    ctl.mp3_play_stream(Box::new(std::io::Cursor::new(file)), false)
        .unwrap();
    for _ in 0..30 {
        ctl.service_tick();
    }

    assert_eq!(ctl.mp3_state(), Mp3State::Playing);
    // by now the decoder crossed a segment boundary at least once and the
    // refill path kept read_pos inside the first segment
    assert!(ctl.shared().mp3.read_pos < 2048);
}
