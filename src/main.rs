#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!(
        "vsu-trace requires the \"cli\" feature. Rebuild with `--features cli` to enable it."
    );
}

#[cfg(feature = "cli")]
mod cli {
    use std::path::PathBuf;

    use anyhow::{Context, Result};
    use clap::Parser;
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::util::SubscriberInitExt;

    use vb_vsu::backend::{BackendCall, RecordingBackend};
    use vb_vsu::vsu::SoundEngine;
    use vb_vsu::{ChannelId, RegisterTrace, SoundConfig, SoundMemory};

    /// Replay a VSU register trace and show the resulting voice parameters
    #[derive(Parser, Debug)]
    #[command(name = "vsu-trace", version, about)]
    struct Args {
        /// JSON register trace
        trace: PathBuf,

        /// JSON sound configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Replay with sound disabled
        #[arg(long)]
        no_sound: bool,

        /// Log verbosity (-v debug, -vv trace)
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,

        /// Print every backend call
        #[arg(long)]
        calls: bool,
    }

    fn setup_logging(verbose: u8) {
        let level = match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };
        tracing_subscriber::fmt()
            .with_max_level(level)
            .compact()
            .finish()
            .init();
    }

    fn format_call(call: &BackendCall) -> String {
        match call {
            BackendCall::CreateVoice { voice, len } => format!("{voice} create ({len} samples)"),
            BackendCall::ReleaseVoice(voice) => format!("{voice} release"),
            BackendCall::Start(voice) => format!("{voice} start"),
            BackendCall::Stop(voice) => format!("{voice} stop"),
            BackendCall::SetPosition { voice, offset } => format!("{voice} position {offset}"),
            BackendCall::SetFrequency { voice, hz } => format!("{voice} frequency {hz:.1}Hz"),
            BackendCall::SetVolume { voice, volume } => format!("{voice} volume {volume}"),
            BackendCall::SetPan { voice, pan } => format!("{voice} pan {pan}"),
            BackendCall::RampVolume {
                voice,
                target,
                duration,
            } => format!("{voice} ramp volume -> {target} over {duration:?}"),
            BackendCall::SweepFrequency {
                voice,
                duration,
                target_hz,
            } => format!("{voice} sweep -> {target_hz:.1}Hz over {duration:?}"),
            BackendCall::UploadWaveform { voice, samples } => {
                let hex: Vec<String> = samples.iter().map(|s| format!("{s:02X}")).collect();
                format!("{voice} waveform {}", hex.join(""))
            }
        }
    }

    fn print_channels(engine: &SoundEngine<RecordingBackend>) {
        println!("CH  ON   CODE      RATE  VOL  PAN  ENV  SRC");
        for id in ChannelId::ALL {
            let ch = engine.channel(id);
            let source = match id {
                ChannelId::Ch6 => format!(
                    "noise {}",
                    engine.noise_selector().active_voice_index()
                ),
                _ => match ch.loaded_waveform() {
                    Some(slot) => format!("wave {}", slot.index() + 1),
                    None => "--".to_string(),
                },
            };
            println!(
                "{:<3} {:<4} {:>5} {:>9.1} {:>4} {:>4} {:>4}  {}",
                id.number(),
                if ch.enabled { "yes" } else { "no" },
                ch.frequency_reg,
                ch.sample_rate(),
                ch.volume,
                ch.pan,
                if ch.envelope.active {
                    if ch.envelope.growing {
                        "up"
                    } else {
                        "down"
                    }
                } else {
                    "--"
                },
                source
            );
        }
    }

    pub fn run() -> Result<()> {
        let args = Args::parse();
        setup_logging(args.verbose);

        let mut config = match &args.config {
            Some(path) => SoundConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => SoundConfig::default(),
        };
        if args.no_sound {
            config.enabled = false;
        }

        let trace = RegisterTrace::load(&args.trace)
            .with_context(|| format!("loading trace {}", args.trace.display()))?;

        let mut engine = SoundEngine::try_new(config, RecordingBackend::open)?;
        let mut memory = SoundMemory::new();
        let replayed = trace.replay(&mut engine, &mut memory);
        println!(
            "Replayed {replayed} writes from {}{}",
            args.trace.display(),
            if engine.is_enabled() { "" } else { " (sound disabled)" }
        );

        print_channels(&engine);

        if args.calls {
            if let Some(backend) = engine.backend() {
                println!();
                for (i, call) in backend.calls().iter().enumerate() {
                    println!("{i:>6}  {}", format_call(call));
                }
            }
        }

        engine.shutdown();
        Ok(())
    }
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::run()
}
