use std::time::Duration;

use approx::assert_relative_eq;
use vb_vsu::backend::{AudioBackend, BackendCall, BackendError, RecordingBackend, SharedBackend, VoiceId};
use vb_vsu::vsu::params::melodic_sample_rate;
use vb_vsu::vsu::waveform::{convert_sample, WAVEFORM_LEN};
use vb_vsu::vsu::{ChannelId, ChannelRegister, SoundEngine, WaveSlot};
use vb_vsu::{SoundConfig, SoundMemory, VsuError};

const SSTOP: u32 = 0x0100_0580;

struct Rig {
    engine: SoundEngine<RecordingBackend>,
    memory: SoundMemory,
}

impl Rig {
    fn new() -> Self {
        Self::with_config(SoundConfig::default())
    }

    fn with_config(config: SoundConfig) -> Self {
        let mut rig = Rig {
            engine: SoundEngine::with_backend(config, RecordingBackend::new()),
            memory: SoundMemory::new(),
        };
        rig.calls();
        rig
    }

    fn write(&mut self, address: u32, value: u8) {
        self.memory.write_byte(address, value);
        self.engine.notify_register_write(&self.memory, address);
    }

    fn set(&mut self, id: ChannelId, register: ChannelRegister, value: u8) {
        self.write(id.register_address(register), value);
    }

    fn fill_slot(&mut self, slot: u8, sample: impl Fn(usize) -> u8) {
        let slot = WaveSlot::new(slot).unwrap();
        for i in 0..WAVEFORM_LEN {
            self.write(slot.sample_address(i), sample(i));
        }
    }

    fn calls(&mut self) -> Vec<BackendCall> {
        self.engine
            .backend_mut()
            .map(|b| b.take_calls())
            .unwrap_or_default()
    }

    fn backend(&self) -> &RecordingBackend {
        self.engine.backend().unwrap()
    }
}

fn melodic(id: ChannelId) -> VoiceId {
    VoiceId(id.index())
}

fn noise(pattern: usize) -> VoiceId {
    VoiceId(5 + pattern)
}

fn expected_waveform(sample: impl Fn(usize) -> u8) -> [u8; WAVEFORM_LEN] {
    std::array::from_fn(|i| convert_sample(sample(i)))
}

#[test]
fn key_on_uploads_dirty_waveform() {
    let mut rig = Rig::new();
    let pattern = |i: usize| (i * 2) as u8;
    rig.fill_slot(0, pattern);
    assert!(rig.engine.waveforms().is_dirty(WaveSlot::new(0).unwrap()));

    rig.set(ChannelId::Ch1, ChannelRegister::Control, 0x80);

    let voice = melodic(ChannelId::Ch1);
    assert_eq!(
        rig.calls(),
        vec![
            BackendCall::UploadWaveform {
                voice,
                samples: expected_waveform(pattern),
            },
            BackendCall::SetPosition { voice, offset: 0 },
            BackendCall::Start(voice),
        ]
    );
    assert!(!rig.engine.waveforms().is_dirty(WaveSlot::new(0).unwrap()));
    assert_eq!(rig.backend().voice(voice).unwrap().samples, expected_waveform(pattern));
    assert!(rig.engine.channel(ChannelId::Ch1).enabled);
}

#[test]
fn key_on_without_interval_bit_issues_no_sweep() {
    let mut rig = Rig::new();
    // Interval length set, interval enable clear
    rig.set(ChannelId::Ch1, ChannelRegister::Control, 0x9F);

    let calls = rig.calls();
    assert!(!calls
        .iter()
        .any(|c| matches!(c, BackendCall::SweepFrequency { .. })));
    assert_eq!(rig.engine.channel(ChannelId::Ch1).sweep.interval_time, None);
}

#[test]
fn key_on_with_interval_holds_frequency_for_the_interval() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch1, ChannelRegister::FreqLo, 0x00);
    rig.set(ChannelId::Ch1, ChannelRegister::FreqHi, 0x04);
    rig.calls();

    rig.set(ChannelId::Ch1, ChannelRegister::Control, 0xA3);

    let voice = melodic(ChannelId::Ch1);
    let calls = rig.calls();
    let sweep = calls
        .iter()
        .find_map(|c| match *c {
            BackendCall::SweepFrequency {
                voice: v,
                duration,
                target_hz,
            } if v == voice => Some((duration, target_hz)),
            _ => None,
        })
        .unwrap();
    assert_eq!(sweep.0, Duration::from_micros(3_840 * 4));
    assert_relative_eq!(sweep.1, 5_000_000.0 / 1024.0);
    assert_eq!(
        rig.engine.channel(ChannelId::Ch1).sweep.interval_time,
        Some(Duration::from_micros(15_360))
    );
    assert_eq!(calls.last(), Some(&BackendCall::Start(voice)));
}

#[test]
fn key_off_stops_voice() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch4, ChannelRegister::Control, 0x80);
    rig.set(ChannelId::Ch4, ChannelRegister::Control, 0x00);

    let voice = melodic(ChannelId::Ch4);
    assert!(!rig.backend().voice(voice).unwrap().playing);
    assert!(!rig.engine.channel(ChannelId::Ch4).enabled);
}

#[test]
fn volume_and_pan_follow_level_registers() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch2, ChannelRegister::Envelope0, 0xF0);
    rig.set(ChannelId::Ch2, ChannelRegister::Level, 0x0F);

    let ch = rig.engine.channel(ChannelId::Ch2);
    assert_eq!(ch.volume, 120);
    assert_eq!(ch.pan, 248);
    let voice = rig.backend().voice(melodic(ChannelId::Ch2)).unwrap();
    assert_eq!((voice.volume, voice.pan), (120, 248));

    // Both sides silent
    rig.set(ChannelId::Ch2, ChannelRegister::Level, 0x00);
    assert_eq!(rig.engine.channel(ChannelId::Ch2).volume, 0);
    assert_eq!(rig.engine.channel(ChannelId::Ch2).pan, 128);
}

#[test]
fn envelope_decay_ramps_from_current_volume() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch1, ChannelRegister::Level, 0xFF);
    rig.set(ChannelId::Ch1, ChannelRegister::Envelope1, 0x02);
    rig.calls();

    rig.set(ChannelId::Ch1, ChannelRegister::Envelope0, 0xF1);

    let voice = melodic(ChannelId::Ch1);
    let calls = rig.calls();
    assert_eq!(
        calls.last(),
        Some(&BackendCall::RampVolume {
            voice,
            target: 0,
            duration: Duration::from_micros(15_360 * 3 * 7),
        })
    );
    let envelope = rig.engine.channel(ChannelId::Ch1).envelope;
    assert!(envelope.active);
    assert!(!envelope.growing);
    assert_eq!(envelope.step_time, Duration::from_micros(15_360 * 3));
    assert_eq!(envelope.current_level, 15);
}

#[test]
fn noise_envelope_uses_its_own_step_register() {
    let mut rig = Rig::new();
    // Another channel's EV1 must not leak into CH6
    rig.set(ChannelId::Ch4, ChannelRegister::Envelope1, 0x07);
    rig.set(ChannelId::Ch6, ChannelRegister::Envelope1, 0x0D);
    rig.set(ChannelId::Ch6, ChannelRegister::Level, 0x11);
    rig.calls();

    rig.set(ChannelId::Ch6, ChannelRegister::Envelope0, 0x81);

    assert_eq!(
        rig.calls().last(),
        Some(&BackendCall::RampVolume {
            voice: noise(0),
            target: 255,
            duration: Duration::from_micros(15_360 * 6 * 15),
        })
    );
    assert!(rig.engine.channel(ChannelId::Ch6).envelope.growing);
}

#[test]
fn ch5_sweep_up_to_top_of_range() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch5, ChannelRegister::FreqLo, 0x00);
    rig.set(ChannelId::Ch5, ChannelRegister::FreqHi, 0x07);
    rig.set(ChannelId::Ch5, ChannelRegister::Sweep, 0x2B);
    assert!(!rig
        .calls()
        .iter()
        .any(|c| matches!(c, BackendCall::SweepFrequency { .. })));

    rig.set(ChannelId::Ch5, ChannelRegister::Envelope1, 0x40);

    assert_eq!(
        rig.calls().last(),
        Some(&BackendCall::SweepFrequency {
            voice: melodic(ChannelId::Ch5),
            duration: Duration::from_micros(122_400),
            target_hz: 500_000.0,
        })
    );
    let sweep = rig.engine.channel(ChannelId::Ch5).sweep;
    assert!(sweep.active);
    assert!(!sweep.is_modulation);
}

#[test]
fn ch5_sweep_down_on_slow_clock() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch5, ChannelRegister::FreqLo, 0x00);
    rig.set(ChannelId::Ch5, ChannelRegister::FreqHi, 0x07);
    rig.set(ChannelId::Ch5, ChannelRegister::Envelope1, 0x40);
    rig.calls();

    rig.set(ChannelId::Ch5, ChannelRegister::Sweep, 0x90);

    match rig.calls().last() {
        Some(&BackendCall::SweepFrequency {
            duration, target_hz, ..
        }) => {
            assert_eq!(duration, Duration::from_micros(7_680 * 1792));
            assert_relative_eq!(target_hz, melodic_sample_rate(0));
        }
        other => panic!("expected a sweep, got {other:?}"),
    }
}

#[test]
fn ch5_modulation_is_tracked_but_silent() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch5, ChannelRegister::Sweep, 0x2B);
    rig.set(ChannelId::Ch5, ChannelRegister::Envelope1, 0x50);

    assert!(!rig
        .calls()
        .iter()
        .any(|c| matches!(c, BackendCall::SweepFrequency { .. })));
    let sweep = rig.engine.channel(ChannelId::Ch5).sweep;
    assert!(sweep.active);
    assert!(sweep.is_modulation);
}

#[test]
fn sweep_bits_ignored_outside_ch5() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch3, ChannelRegister::Envelope1, 0x40);
    assert!(!rig.engine.channel(ChannelId::Ch3).sweep.active);
    assert!(!rig
        .calls()
        .iter()
        .any(|c| matches!(c, BackendCall::SweepFrequency { .. })));
}

#[test]
fn noise_switch_while_playing_moves_playback() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch6, ChannelRegister::Control, 0x80);
    assert_eq!(
        rig.calls(),
        vec![
            BackendCall::SetPosition {
                voice: noise(0),
                offset: 0
            },
            BackendCall::Start(noise(0)),
        ]
    );

    rig.set(ChannelId::Ch6, ChannelRegister::Envelope1, 0x30);

    let calls = rig.calls();
    assert_eq!(calls[0], BackendCall::Stop(noise(0)));
    assert!(matches!(calls[1], BackendCall::SetFrequency { voice, .. } if voice == noise(3)));
    assert_eq!(calls[2], BackendCall::Start(noise(3)));
    // Level registers are applied to the new voice
    assert!(calls[3..].iter().all(|c| c.voice() == noise(3)));

    assert!(!rig.backend().voice(noise(0)).unwrap().playing);
    assert!(rig.backend().voice(noise(3)).unwrap().playing);
    assert_eq!(rig.engine.noise_selector().active_voice_index(), 3);
    assert_eq!(rig.engine.voice(ChannelId::Ch6), Some(noise(3)));
}

#[test]
fn noise_switch_while_stopped_stays_silent() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch6, ChannelRegister::Envelope1, 0x50);

    let calls = rig.calls();
    assert_eq!(calls[0], BackendCall::Stop(noise(0)));
    assert!(!calls.contains(&BackendCall::Start(noise(5))));
    assert_eq!(rig.backend().playing_count(), 0);
    assert_eq!(rig.engine.noise_selector().active_voice_index(), 5);
}

#[test]
fn noise_switch_carries_frequency() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch6, ChannelRegister::FreqLo, 0xFF);
    rig.set(ChannelId::Ch6, ChannelRegister::FreqHi, 0x07);
    assert_relative_eq!(rig.backend().get_frequency(noise(0)), 500_000.0);

    rig.set(ChannelId::Ch6, ChannelRegister::Envelope1, 0x20);
    assert_relative_eq!(rig.backend().get_frequency(noise(2)), 500_000.0);
}

#[test]
fn global_stop_leaves_channel_state_alone() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch1, ChannelRegister::FreqLo, 0x34);
    rig.set(ChannelId::Ch1, ChannelRegister::FreqHi, 0x02);
    rig.set(ChannelId::Ch1, ChannelRegister::Envelope0, 0xA0);
    rig.set(ChannelId::Ch1, ChannelRegister::Level, 0x8C);
    rig.set(ChannelId::Ch1, ChannelRegister::Control, 0x80);
    rig.set(ChannelId::Ch6, ChannelRegister::Control, 0x80);
    let before = rig.engine.channels().to_vec();
    rig.calls();

    rig.write(SSTOP, 0x01);

    let calls = rig.calls();
    assert_eq!(
        calls,
        (0..13).map(|i| BackendCall::Stop(VoiceId(i))).collect::<Vec<_>>()
    );
    assert_eq!(rig.engine.channels(), &before[..]);
    assert!(rig.engine.channel(ChannelId::Ch1).enabled);
    assert!(rig.engine.noise_selector().is_playing());
    assert_eq!(rig.backend().playing_count(), 0);
}

#[test]
fn wave_pointer_uploads_immediately_when_idle() {
    let mut rig = Rig::new();
    rig.fill_slot(1, |_| 0x3F);
    rig.calls();

    rig.set(ChannelId::Ch2, ChannelRegister::WavePointer, 0x01);

    assert_eq!(
        rig.calls(),
        vec![BackendCall::UploadWaveform {
            voice: melodic(ChannelId::Ch2),
            samples: [0x7C; WAVEFORM_LEN],
        }]
    );
    let slot = WaveSlot::new(1).unwrap();
    assert!(!rig.engine.waveforms().is_dirty(slot));
    assert_eq!(rig.engine.channel(ChannelId::Ch2).loaded_waveform(), Some(slot));

    // Clean slot already in the voice: key-on does not upload again
    rig.set(ChannelId::Ch2, ChannelRegister::Control, 0x80);
    assert!(!rig
        .calls()
        .iter()
        .any(|c| matches!(c, BackendCall::UploadWaveform { .. })));
}

#[test]
fn wave_pointer_change_while_playing_waits_for_key_on() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch2, ChannelRegister::WavePointer, 0x01);
    rig.set(ChannelId::Ch2, ChannelRegister::Control, 0x80);
    rig.calls();

    rig.set(ChannelId::Ch2, ChannelRegister::WavePointer, 0x00);
    assert!(rig.calls().is_empty());
    let ch = rig.engine.channel(ChannelId::Ch2);
    assert_eq!(ch.waveform, WaveSlot::new(0).unwrap());
    assert_eq!(ch.loaded_waveform(), WaveSlot::new(1));

    rig.set(ChannelId::Ch2, ChannelRegister::Control, 0x00);
    rig.set(ChannelId::Ch2, ChannelRegister::Control, 0x80);
    assert_eq!(
        rig.calls()[1],
        BackendCall::UploadWaveform {
            voice: melodic(ChannelId::Ch2),
            samples: [0x80; WAVEFORM_LEN],
        }
    );
    assert_eq!(
        rig.engine.channel(ChannelId::Ch2).loaded_waveform(),
        WaveSlot::new(0)
    );
}

#[test]
fn wave_pointer_to_missing_slot_is_ignored() {
    let mut rig = Rig::new();
    rig.set(ChannelId::Ch3, ChannelRegister::WavePointer, 0x02);
    rig.calls();

    rig.set(ChannelId::Ch3, ChannelRegister::WavePointer, 0x06);

    assert!(rig.calls().is_empty());
    assert_eq!(
        rig.engine.channel(ChannelId::Ch3).waveform,
        WaveSlot::new(2).unwrap()
    );
}

#[test]
fn channels_sharing_a_slot_each_get_fresh_data() {
    let mut rig = Rig::new();
    let first = |i: usize| i as u8;
    rig.fill_slot(0, first);
    rig.set(ChannelId::Ch1, ChannelRegister::Control, 0x80);
    rig.set(ChannelId::Ch3, ChannelRegister::Control, 0x80);
    for id in [ChannelId::Ch1, ChannelId::Ch3] {
        assert_eq!(
            rig.backend().voice(melodic(id)).unwrap().samples,
            expected_waveform(first)
        );
    }

    rig.set(ChannelId::Ch1, ChannelRegister::Control, 0x00);
    rig.set(ChannelId::Ch3, ChannelRegister::Control, 0x00);
    let second = |i: usize| (63 - i) as u8;
    rig.fill_slot(0, second);
    rig.set(ChannelId::Ch3, ChannelRegister::Control, 0x80);
    rig.set(ChannelId::Ch1, ChannelRegister::Control, 0x80);
    for id in [ChannelId::Ch1, ChannelId::Ch3] {
        assert_eq!(
            rig.backend().voice(melodic(id)).unwrap().samples,
            expected_waveform(second)
        );
    }
}

#[test]
fn mirrored_addresses_reach_canonical_registers() {
    let mut rig = Rig::new();
    rig.write(0x0100_0C00, 0x80);
    assert!(rig.engine.channel(ChannelId::Ch1).enabled);

    rig.write(0x01FF_FD80, 0x01);
    assert_eq!(rig.backend().playing_count(), 0);
}

#[test]
fn mirrors_ignored_when_folding_disabled() {
    let mut rig = Rig::with_config(SoundConfig {
        fold_mirrors: false,
        ..SoundConfig::default()
    });
    rig.write(0x0100_0C00, 0x80);
    assert!(!rig.engine.channel(ChannelId::Ch1).enabled);
    assert!(rig.calls().is_empty());
}

#[test]
fn undefined_addresses_are_ignored() {
    let mut rig = Rig::new();
    let before = rig.engine.channels().to_vec();
    for address in [0x0100_0558, 0x0100_041C, 0x0100_0300, 0x0100_0584, 0x0500_0000] {
        rig.write(address, 0xFF);
    }
    assert!(rig.calls().is_empty());
    assert_eq!(rig.engine.channels(), &before[..]);
}

#[test]
fn disabled_config_never_opens_backend() {
    let mut opened = false;
    let mut engine = SoundEngine::new(SoundConfig::disabled(), || {
        opened = true;
        RecordingBackend::open()
    });
    assert!(!opened);
    assert!(!engine.is_enabled());

    let mut memory = SoundMemory::new();
    let int = ChannelId::Ch1.register_address(ChannelRegister::Control);
    memory.write_byte(int, 0x80);
    engine.notify_register_write(&memory, int);
    assert!(!engine.channel(ChannelId::Ch1).enabled);
    assert!(engine.backend().is_none());
    assert!(engine.shutdown().is_none());
}

#[test]
fn backend_failure_disables_sound() {
    let unavailable = || -> Result<RecordingBackend, BackendError> {
        Err(BackendError::DeviceUnavailable("no device".into()))
    };

    let result = SoundEngine::<RecordingBackend>::try_new(SoundConfig::default(), unavailable);
    assert!(matches!(
        result,
        Err(VsuError::Backend(BackendError::DeviceUnavailable(_)))
    ));

    let mut engine = SoundEngine::<RecordingBackend>::new(SoundConfig::default(), unavailable);
    assert!(!engine.is_enabled());
    let mut memory = SoundMemory::new();
    memory.write_byte(SSTOP, 1);
    engine.notify_register_write(&memory, SSTOP);
    assert!(engine.backend().is_none());
}

#[test]
fn resync_rebuilds_state_from_memory() {
    let mut rig = Rig::new();
    let ch = ChannelId::Ch1;
    rig.fill_slot(3, |_| 0x20);
    rig.memory.write_byte(ch.register_address(ChannelRegister::WavePointer), 0x03);
    rig.memory.write_byte(ch.register_address(ChannelRegister::FreqLo), 0x00);
    rig.memory.write_byte(ch.register_address(ChannelRegister::FreqHi), 0x04);
    rig.memory.write_byte(ch.register_address(ChannelRegister::Envelope0), 0xF0);
    rig.memory.write_byte(ch.register_address(ChannelRegister::Level), 0xFF);
    rig.memory.write_byte(ch.register_address(ChannelRegister::Control), 0x80);
    rig.calls();

    rig.engine.resync(&rig.memory);

    let state = rig.engine.channel(ch);
    assert!(state.enabled);
    assert_eq!(state.frequency_reg, 0x400);
    assert_eq!(state.volume, 120);
    assert_eq!(state.loaded_waveform(), WaveSlot::new(3));
    let voice = rig.backend().voice(melodic(ch)).unwrap();
    assert!(voice.playing);
    assert_eq!(voice.samples, vec![0x00; WAVEFORM_LEN]);
    assert_eq!(rig.backend().playing_count(), 1);
}

#[test]
fn resync_reloads_waveform_of_playing_channel() {
    let mut rig = Rig::new();
    let ch = ChannelId::Ch1;
    rig.set(ch, ChannelRegister::Control, 0x80);
    assert_eq!(rig.engine.channel(ch).loaded_waveform(), WaveSlot::new(0));

    // Restored image points the still-playing channel at another slot
    rig.fill_slot(3, |_| 0x20);
    rig.memory.write_byte(ch.register_address(ChannelRegister::WavePointer), 0x03);
    rig.calls();

    rig.engine.resync(&rig.memory);

    let state = rig.engine.channel(ch);
    assert!(state.enabled);
    assert_eq!(state.loaded_waveform(), WaveSlot::new(3));
    let voice = rig.backend().voice(melodic(ch)).unwrap();
    assert!(voice.playing);
    assert_eq!(voice.samples, vec![0x00; WAVEFORM_LEN]);
    assert_eq!(rig.backend().playing_count(), 1);
}

#[test]
fn engine_drives_shared_backend() {
    let shared = SharedBackend::new(RecordingBackend::new());
    let observer = shared.clone();
    let mut engine = SoundEngine::with_backend(SoundConfig::default(), shared);
    let mut memory = SoundMemory::new();

    let int = ChannelId::Ch3.register_address(ChannelRegister::Control);
    memory.write_byte(int, 0x80);
    engine.notify_register_write(&memory, int);

    let playing = std::thread::spawn(move || observer.lock().voice(VoiceId(2)).unwrap().playing)
        .join()
        .unwrap();
    assert!(playing);
}
