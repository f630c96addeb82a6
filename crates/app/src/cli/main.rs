//! Soundstage CLI
//!
//! Applies the effects chain to raw 16-bit little-endian stereo PCM.

mod pcm;
mod settings_file;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use soundstage_core::{
    frames_from_i16, frames_to_i16, Engine, EngineConfig, Environment, PipelineTuning,
    SettingsPatch, TONE_PRESETS,
};
use soundstage_infra::{AudioSession, Chunker};
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "soundstage")]
#[command(about = "Stereo effects engine: EQ, spatializer, enhancer, limiter and reverb", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List tone presets and reverb environments
    Presets,

    /// Process a raw s16le stereo file
    Process(ProcessArgs),

    /// Inspect or write the persisted settings file
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Play a raw s16le stereo file through the default output device
    #[cfg(feature = "device")]
    Play(PlayArgs),
}

#[derive(clap::Args)]
struct ProcessArgs {
    /// Input file (raw 16-bit little-endian interleaved stereo)
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (same format as the input)
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    engine: EngineArgs,

    #[command(flatten)]
    settings: SettingsArgs,

    /// Process in fixed-size chunks with persistent state instead of one buffer
    #[arg(long)]
    streaming: bool,

    /// Run the streaming path on a dedicated audio thread
    #[arg(long, requires = "streaming")]
    threaded: bool,
}

#[derive(clap::Args)]
struct EngineArgs {
    /// Engine configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sample rate in Hz (overrides the configuration file)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Frames per streaming chunk (overrides the configuration file)
    #[arg(long)]
    chunk: Option<usize>,

    /// Pipeline tuning: studio or live
    #[arg(long)]
    tuning: Option<String>,
}

#[derive(clap::Args)]
struct SettingsArgs {
    /// Persisted settings file (defaults to the user config directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Tone preset name or alias
    #[arg(long)]
    preset: Option<String>,

    /// Reverb environment name or alias
    #[arg(long)]
    environment: Option<String>,

    /// Override a single setting, e.g. `--set bass=70` or `--set 环境=hall`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the resolved settings
    Show {
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Write a settings file from a preset and environment
    Init {
        /// Target path (defaults to the user config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        #[arg(long, default_value = "无")]
        preset: String,

        #[arg(long, default_value = "无")]
        environment: String,
    },
}

#[cfg(feature = "device")]
#[derive(clap::Args)]
struct PlayArgs {
    /// Input file (raw 16-bit little-endian interleaved stereo)
    #[arg(short, long)]
    input: PathBuf,

    #[command(flatten)]
    engine: EngineArgs,

    #[command(flatten)]
    settings: SettingsArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    info!("Soundstage starting...");

    match cli.command {
        Command::Presets => list_presets(),
        Command::Process(args) => process(args).await,
        Command::Settings { action } => settings(action).await,
        #[cfg(feature = "device")]
        Command::Play(args) => play(args).await,
    }
}

fn list_presets() -> Result<()> {
    println!("Tone presets (bass / treble / surround intensity / surround depth):");
    for preset in TONE_PRESETS {
        println!(
            "  {:<6} {:<12} {:>5} {:>5} {:>5} {:>5}",
            preset.name,
            preset.alias,
            preset.bass,
            preset.treble,
            preset.surround_intensity,
            preset.surround_depth
        );
    }

    println!("Environments (wet / decay / damping):");
    for environment in Environment::ALL {
        let params = environment.params();
        println!(
            "  {:<6} {:<12} {:>5} {:>4}s {:>5}",
            environment.name(),
            environment.alias(),
            params.wet,
            params.decay_secs,
            params.damping
        );
    }
    Ok(())
}

async fn process(args: ProcessArgs) -> Result<()> {
    let config = engine_config(&args.engine).await?;
    let settings = resolve_settings(&args.settings).await?;

    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input.display()))?;
    let samples = pcm::decode_s16le(&bytes)?;
    info!(
        input = %args.input.display(),
        frames = samples.len() / 2,
        "Processing with {:?}",
        settings
    );

    let streaming = args.streaming;
    let threaded = args.threaded;
    let processed = tokio::task::spawn_blocking(move || -> Result<Vec<i16>> {
        let mut engine = Engine::with_config(config)?;
        if !streaming {
            return Ok(engine.process_i16_buffer(&samples, &settings)?);
        }

        engine.replace_settings(settings);
        let frames = frames_from_i16(&samples)?;
        let output = if threaded {
            let session = AudioSession::start(engine)?;
            let output = session.process_all(&frames)?;
            session.stop()?;
            output
        } else {
            let chunker = Chunker::new(engine.config().chunk_frames)?;
            chunker.process(&mut engine, &frames)?
        };
        Ok(frames_to_i16(&output))
    })
    .await??;

    tokio::fs::write(&args.output, pcm::encode_s16le(&processed))
        .await
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(output = %args.output.display(), "Done");
    Ok(())
}

async fn settings(action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show { settings } => {
            let resolved = resolve_settings(&settings).await?;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        SettingsAction::Init {
            path,
            preset,
            environment,
        } => {
            let path = match path.or_else(settings_file::default_settings_path) {
                Some(path) => path,
                None => bail!("no config directory available; pass --path"),
            };
            let persisted = soundstage_core::PersistedSettings {
                preset,
                environment,
                ..Default::default()
            };
            // Reject unknown names before anything is written
            persisted.resolve()?;
            settings_file::save_settings(&persisted, &path).await?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(feature = "device")]
async fn play(args: PlayArgs) -> Result<()> {
    use soundstage_infra::OutputStream;
    use std::time::Duration;

    let config = engine_config(&args.engine).await?;
    let settings = resolve_settings(&args.settings).await?;
    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input.display()))?;
    let frames = frames_from_i16(&pcm::decode_s16le(&bytes)?)?;

    let engine = Engine::with_config(config)?;
    engine.replace_settings(settings);
    let fifo_frames = engine.config().chunk_frames * 8;
    let output = OutputStream::open_default(engine, fifo_frames)?;
    info!("Playing on {}", output.device_name());

    let mut position = 0;
    while position < frames.len() {
        position += output.fifo().push_frames(&frames[position..]);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    while !output.fifo().is_empty() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    info!("Playback finished ({} underruns)", output.fifo().underruns());
    Ok(())
}

async fn engine_config(args: &EngineArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => settings_file::load_engine_config(path).await?,
        None => EngineConfig::default(),
    };
    if let Some(sample_rate) = args.sample_rate {
        config.sample_rate = sample_rate;
    }
    if let Some(chunk) = args.chunk {
        config.chunk_frames = chunk;
    }
    if let Some(tuning) = &args.tuning {
        config.tuning = PipelineTuning::by_name(tuning)?;
    }
    Ok(config)
}

/// Settings file, then `--preset`/`--environment`, then `--set` overrides
async fn resolve_settings(args: &SettingsArgs) -> Result<soundstage_core::EffectSettings> {
    let path = args
        .settings
        .clone()
        .or_else(settings_file::default_settings_path);
    if let Some(explicit) = &args.settings {
        if !tokio::fs::try_exists(explicit).await.unwrap_or(false) {
            bail!("settings file {} does not exist", explicit.display());
        }
    }

    let mut persisted = settings_file::load_settings_or_default(path.as_deref()).await?;
    if let Some(preset) = &args.preset {
        persisted.preset = preset.clone();
    }
    if let Some(environment) = &args.environment {
        persisted.environment = environment.clone();
    }

    let resolved = persisted.resolve()?;
    let patch = parse_overrides(&args.overrides)?;
    Ok(patch.apply_to(resolved)?)
}

fn parse_overrides(overrides: &[String]) -> Result<SettingsPatch> {
    let mut map = serde_json::Map::new();
    for entry in overrides {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("override `{}` is not KEY=VALUE", entry);
        };
        let value = match value.trim().parse::<f64>() {
            Ok(number) => serde_json::json!(number),
            Err(_) => serde_json::Value::String(value.trim().to_string()),
        };
        map.insert(key.trim().to_string(), value);
    }
    Ok(SettingsPatch::from_json_map(&map)?)
}
