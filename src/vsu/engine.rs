//! Register-to-voice engine
//!
//! [`SoundEngine`] owns the channel model and the waveform/noise stores and
//! drives 13 backend voices: one per waveform channel plus the eight noise
//! patterns CH6 switches between. The bus calls
//! [`SoundEngine::notify_register_write`] after every store into the VSU
//! window; the engine reads the affected registers back and pushes the
//! derived parameters to the backend.

use log::{debug, error, trace};

use crate::backend::{AudioBackend, BackendError};
use crate::bus::MemoryBus;
use crate::config::SoundConfig;
use crate::Result;

use super::channel::{
    Channel, ChannelId, LoadedWave, NoiseSelector, CHANNEL_COUNT, MELODIC_CHANNELS,
};
use super::noise::{NoiseStore, NOISE_PATTERNS};
use super::params::{
    derive_mix, envelope_ramp, frequency_code, interval_duration, sweep_ramp, SweepMode,
};
use super::registers::{
    fold_mirror, ChannelRegister, ControlFlags, Envelope0Flags, Envelope1Flags, Register,
};
use super::waveform::{WaveSlot, WaveformStore, SILENT_SAMPLE, WAVEFORM_LEN};

/// Total number of backend voices
pub const VOICE_COUNT: usize = MELODIC_CHANNELS + NOISE_PATTERNS;

/// Opened backend plus the voices allocated on it
struct Output<B: AudioBackend> {
    backend: B,
    melodic: [B::Voice; MELODIC_CHANNELS],
    noise: [B::Voice; NOISE_PATTERNS],
}

impl<B: AudioBackend> Output<B> {
    fn open(mut backend: B, patterns: &NoiseStore) -> std::result::Result<Self, BackendError> {
        let mut voices = Vec::with_capacity(VOICE_COUNT);
        let silent = [SILENT_SAMPLE; WAVEFORM_LEN];
        let mut buffers: Vec<&[u8]> = vec![&silent[..]; MELODIC_CHANNELS];
        buffers.extend(patterns.iter());

        for buffer in buffers {
            match backend.create_voice(buffer) {
                Ok(voice) => voices.push(voice),
                Err(e) => {
                    for voice in voices {
                        backend.release_voice(voice);
                    }
                    return Err(e);
                }
            }
        }

        let noise: Vec<B::Voice> = voices.split_off(MELODIC_CHANNELS);
        let melodic: [B::Voice; MELODIC_CHANNELS] = voices
            .try_into()
            .map_err(|_| BackendError::VoiceAllocation("melodic voice count mismatch".into()))?;
        let noise: [B::Voice; NOISE_PATTERNS] = noise
            .try_into()
            .map_err(|_| BackendError::VoiceAllocation("noise voice count mismatch".into()))?;

        Ok(Output {
            backend,
            melodic,
            noise,
        })
    }

    fn stop_all(&mut self) {
        for &voice in self.melodic.iter().chain(self.noise.iter()) {
            self.backend.stop(voice);
        }
    }

    fn release(mut self) -> B {
        for &voice in self.melodic.iter().chain(self.noise.iter()) {
            self.backend.stop(voice);
            self.backend.release_voice(voice);
        }
        self.backend
    }
}

/// VSU emulation on top of an [`AudioBackend`]
pub struct SoundEngine<B: AudioBackend> {
    config: SoundConfig,
    output: Option<Output<B>>,
    channels: [Channel; CHANNEL_COUNT],
    waveforms: WaveformStore,
    noise: NoiseStore,
    noise_selector: NoiseSelector,
}

impl<B: AudioBackend> SoundEngine<B> {
    fn disabled(config: SoundConfig) -> Self {
        SoundEngine {
            config,
            output: None,
            channels: ChannelId::ALL.map(Channel::new),
            waveforms: WaveformStore::new(),
            noise: NoiseStore::new(),
            noise_selector: NoiseSelector::new(),
        }
    }

    /// Open the backend and allocate every voice.
    ///
    /// With sound disabled in `config`, `open` is never called and the
    /// engine is returned disabled.
    pub fn try_new<F>(config: SoundConfig, open: F) -> Result<Self>
    where
        F: FnOnce() -> std::result::Result<B, BackendError>,
    {
        let mut engine = Self::disabled(config);
        if !engine.config.enabled {
            debug!("sound disabled by configuration");
            return Ok(engine);
        }

        let backend = open()?;
        engine.output = Some(Output::open(backend, &engine.noise)?);
        debug!(
            "VSU ready: {} voices, noise periods {:?}",
            VOICE_COUNT,
            (0..NOISE_PATTERNS)
                .map(|i| engine.noise.pattern_len(i))
                .collect::<Vec<_>>()
        );
        Ok(engine)
    }

    /// Like [`try_new`](Self::try_new), but a backend failure is logged once
    /// and leaves the engine disabled for its lifetime.
    pub fn new<F>(config: SoundConfig, open: F) -> Self
    where
        F: FnOnce() -> std::result::Result<B, BackendError>,
    {
        match Self::try_new(config.clone(), open) {
            Ok(engine) => engine,
            Err(e) => {
                error!("sound output unavailable, continuing without sound: {e}");
                Self::disabled(config)
            }
        }
    }

    /// Build an engine on an already opened backend
    pub fn with_backend(config: SoundConfig, backend: B) -> Self {
        Self::new(config, || Ok(backend))
    }

    /// Stop and release every voice, handing the backend back
    pub fn shutdown(self) -> Option<B> {
        self.output.map(Output::release)
    }

    /// A backend is attached and register writes are acted on
    pub fn is_enabled(&self) -> bool {
        self.output.is_some()
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &SoundConfig {
        &self.config
    }

    /// State of one channel
    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.index()]
    }

    /// All six channels
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Waveform slots and their dirty flags
    pub fn waveforms(&self) -> &WaveformStore {
        &self.waveforms
    }

    /// Noise patterns
    pub fn noise(&self) -> &NoiseStore {
        &self.noise
    }

    /// CH6 voice selection
    pub fn noise_selector(&self) -> &NoiseSelector {
        &self.noise_selector
    }

    /// The backend, when sound is enabled
    pub fn backend(&self) -> Option<&B> {
        self.output.as_ref().map(|o| &o.backend)
    }

    /// Mutable access to the backend
    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.output.as_mut().map(|o| &mut o.backend)
    }

    /// Voice currently backing a channel (CH6 follows the noise selector)
    pub fn voice(&self, id: ChannelId) -> Option<B::Voice> {
        let output = self.output.as_ref()?;
        Some(match id {
            ChannelId::Ch6 => output.noise[self.noise_selector.active_voice_index()],
            _ => output.melodic[id.index()],
        })
    }

    /// Voice holding noise pattern `index`
    pub fn noise_voice(&self, index: usize) -> Option<B::Voice> {
        self.output.as_ref()?.noise.get(index).copied()
    }

    /// React to a byte written at `address`.
    ///
    /// The new value must already be visible through `bus`.
    pub fn notify_register_write<M: MemoryBus + ?Sized>(&mut self, bus: &M, address: u32) {
        let Some(output) = self.output.as_mut() else {
            return;
        };

        let address = if self.config.fold_mirrors {
            fold_mirror(address)
        } else {
            address
        };
        let Some(register) = Register::decode(address) else {
            trace!("ignored write to {address:#010x}");
            return;
        };
        trace!("{register} <- {:#04x}", bus.read_byte(address));

        match register {
            Register::WaveRam(slot) => self.waveforms.mark_dirty(slot),
            // Modulation playback is not audible; the table is never read
            Register::ModulationRam => {}
            Register::StopAll => {
                debug!("SSTOP: stopping all voices");
                output.stop_all();
            }
            Register::Channel(id, reg) => {
                let mut update = ChannelUpdate {
                    output,
                    channel: &mut self.channels[id.index()],
                    waveforms: &mut self.waveforms,
                    selector: &mut self.noise_selector,
                    bus,
                };
                match reg {
                    ChannelRegister::Control => update.control(),
                    ChannelRegister::Level
                    | ChannelRegister::Envelope0
                    | ChannelRegister::Envelope1
                    | ChannelRegister::Sweep => update.mix(),
                    ChannelRegister::FreqLo | ChannelRegister::FreqHi => update.frequency(),
                    ChannelRegister::WavePointer => update.wave_pointer(),
                }
            }
        }
    }

    /// Re-derive every channel from the current register contents, e.g.
    /// after the host restored a saved memory image.
    ///
    /// Every waveform slot is treated as rewritten.
    pub fn resync<M: MemoryBus + ?Sized>(&mut self, bus: &M) {
        if !self.is_enabled() {
            return;
        }
        for slot in WaveSlot::ALL {
            self.waveforms.mark_dirty(slot);
        }
        // Replayed writes must take the key-on path, not the re-key one
        for channel in &mut self.channels {
            channel.enabled = false;
            channel.loaded = None;
        }
        self.noise_selector.set_playing(false);
        for id in ChannelId::ALL {
            if id.has_wave_pointer() {
                self.notify_register_write(bus, id.register_address(ChannelRegister::WavePointer));
            }
            self.notify_register_write(bus, id.register_address(ChannelRegister::FreqLo));
            self.notify_register_write(bus, id.register_address(ChannelRegister::Level));
            self.notify_register_write(bus, id.register_address(ChannelRegister::Control));
        }
    }
}

/// Borrowed view of everything one channel-register write touches
struct ChannelUpdate<'a, B: AudioBackend, M: ?Sized> {
    output: &'a mut Output<B>,
    channel: &'a mut Channel,
    waveforms: &'a mut WaveformStore,
    selector: &'a mut NoiseSelector,
    bus: &'a M,
}

impl<B: AudioBackend, M: MemoryBus + ?Sized> ChannelUpdate<'_, B, M> {
    fn id(&self) -> ChannelId {
        self.channel.id()
    }

    fn read(&self, register: ChannelRegister) -> u8 {
        self.bus.read_byte(self.id().register_address(register))
    }

    fn voice(&self) -> B::Voice {
        match self.id() {
            ChannelId::Ch6 => self.output.noise[self.selector.active_voice_index()],
            id => self.output.melodic[id.index()],
        }
    }

    /// SxINT
    fn control(&mut self) {
        let int = self.read(ChannelRegister::Control);
        let voice = self.voice();
        let is_noise = self.id() == ChannelId::Ch6;

        if !ControlFlags::from_bits_truncate(int).contains(ControlFlags::ENABLE) {
            self.output.backend.stop(voice);
            if self.channel.enabled {
                debug!("CH{} key-off", self.id().number());
            }
            self.channel.enabled = false;
            if is_noise {
                self.selector.set_playing(false);
            }
            return;
        }

        // Sound RAM may only change while a channel is off
        if !self.channel.enabled && self.id().has_wave_pointer() {
            self.sync_waveform();
        }

        let interval = interval_duration(int);
        self.channel.sweep.interval_time = interval;
        if let Some(duration) = interval {
            let hz = self.output.backend.get_frequency(voice);
            self.output.backend.sweep_frequency(voice, duration, hz);
        }

        self.output.backend.set_position(voice, 0);
        self.output.backend.start(voice);
        debug!(
            "CH{} key-on{}",
            self.id().number(),
            if self.channel.enabled { " (restart)" } else { "" }
        );
        self.channel.enabled = true;
        if is_noise {
            self.selector.set_playing(true);
        }
    }

    /// Bring the voice buffer up to date with the selected slot
    fn sync_waveform(&mut self) {
        let slot = self.channel.waveform;
        let fresh = self.waveforms.recopy_if_dirty(slot, self.bus);
        let current = LoadedWave {
            slot,
            revision: self.waveforms.revision(slot),
        };
        if fresh.is_none() && self.channel.loaded == Some(current) {
            return;
        }

        let samples = fresh.unwrap_or(*self.waveforms.samples(slot));
        let voice = self.voice();
        self.output.backend.upload_waveform(voice, &samples);
        self.channel.loaded = Some(current);
        debug!(
            "CH{} loaded waveform {}",
            self.id().number(),
            slot.index() + 1
        );
    }

    /// SxLRV, SxEV0, SxEV1 and S5SWP
    fn mix(&mut self) {
        // Switch first so level and envelope land on the voice now playing
        if self.id() == ChannelId::Ch6 {
            self.select_noise();
        }

        let lrv = self.read(ChannelRegister::Level);
        let ev0 = self.read(ChannelRegister::Envelope0);
        let ev1 = self.read(ChannelRegister::Envelope1);
        let voice = self.voice();

        let level = ev0 >> 4;
        let mix = derive_mix(lrv, level);
        self.output.backend.set_volume(voice, mix.volume);
        self.output.backend.set_pan(voice, mix.pan);
        self.channel.volume = mix.volume;
        self.channel.pan = mix.pan;

        let envelope = &mut self.channel.envelope;
        envelope.current_level = level;
        envelope.active = Envelope0Flags::from_bits_truncate(ev0).contains(Envelope0Flags::ENABLE);
        if envelope.active {
            let ramp = envelope_ramp(ev1, self.output.backend.get_volume(voice));
            envelope.growing = ramp.growing;
            envelope.step_time = ramp.step_time;
            self.output
                .backend
                .ramp_volume(voice, ramp.target, ramp.duration);
        }

        if self.id().has_sweep_unit() {
            self.sweep_unit(ev1);
        }
    }

    /// CH5 sweep/modulation unit
    fn sweep_unit(&mut self, ev1: u8) {
        let mode = SweepMode::from_ev1(ev1);
        self.channel.sweep.active = mode != SweepMode::Off;
        self.channel.sweep.is_modulation = mode == SweepMode::Modulation;
        if mode != SweepMode::Sweep {
            return;
        }

        let code = frequency_code(
            self.read(ChannelRegister::FreqLo),
            self.read(ChannelRegister::FreqHi),
        );
        let ramp = sweep_ramp(self.read(ChannelRegister::Sweep), code);
        let voice = self.voice();
        self.output
            .backend
            .sweep_frequency(voice, ramp.duration, ramp.target_hz);
    }

    /// Follow the CH6 tap selector in S6EV1
    fn select_noise(&mut self) {
        let ev1 = self.read(ChannelRegister::Envelope1);
        let tap = (ev1 >> Envelope1Flags::TAP_SHIFT) & 0x07;
        let Some(switch) = self.selector.select(tap as usize) else {
            return;
        };

        let old = self.output.noise[switch.previous];
        let new = self.output.noise[switch.next];
        self.output.backend.stop(old);
        self.output
            .backend
            .set_frequency(new, self.channel.sample_rate());
        if switch.resume {
            self.output.backend.start(new);
        }
        debug!(
            "CH6 noise pattern {} -> {}{}",
            switch.previous,
            switch.next,
            if switch.resume { " (playing)" } else { "" }
        );
    }

    /// SxFQL and SxFQH
    fn frequency(&mut self) {
        self.channel.frequency_reg = frequency_code(
            self.read(ChannelRegister::FreqLo),
            self.read(ChannelRegister::FreqHi),
        );
        let voice = self.voice();
        self.output
            .backend
            .set_frequency(voice, self.channel.sample_rate());
    }

    /// SxRAM
    fn wave_pointer(&mut self) {
        let value = self.read(ChannelRegister::WavePointer);
        let Some(slot) = WaveSlot::from_register(value) else {
            debug!(
                "CH{}: waveform slot {} does not exist, pointer unchanged",
                self.id().number(),
                value & 0x07
            );
            return;
        };
        self.channel.waveform = slot;

        if self.channel.enabled {
            // Picked up on the next key-on
            return;
        }

        let samples = self.waveforms.recopy(slot, self.bus);
        let voice = self.voice();
        self.output.backend.upload_waveform(voice, &samples);
        self.channel.loaded = Some(LoadedWave {
            slot,
            revision: self.waveforms.revision(slot),
        });
    }
}
