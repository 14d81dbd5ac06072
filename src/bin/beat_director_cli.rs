use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use beat_director::analysis::judge::{BeatJudge, JudgeOptions};
use beat_director::audio::beat_length_ms;
use beat_director::config::AppConfig;
use beat_director::director::Playlist;
use beat_director::error::{log_config_error, log_director_error};
use beat_director::simulation::{run_simulation, run_simulation_with_pcm, SimulationParams};
use beat_director::telemetry;
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "beat_director_cli",
    about = "Offline harness for the beat clock, judge and wave director"
)]
struct Cli {
    /// Config file (defaults to assets/director_config.json, then built-in defaults)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the frame loop over a synthetic drum track or a WAV file
    Simulate {
        #[arg(long)]
        playlist: Option<PathBuf>,
        /// Mono or multi-channel WAV to analyze instead of the synthetic track
        #[arg(long)]
        wav: Option<PathBuf>,
        /// Overrides the configured tempo
        #[arg(long)]
        bpm: Option<f64>,
        #[arg(long, default_value_t = 16_000.0)]
        duration_ms: f64,
        #[arg(long, default_value_t = 1)]
        stage: u32,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Append the telemetry snapshot to the report
        #[arg(long)]
        telemetry: bool,
    },
    /// Classify a single beat phase
    Judge {
        #[arg(long)]
        phase: f64,
        #[arg(long, default_value_t = 0.12)]
        window: f64,
        #[arg(long, default_value_t = 0.0)]
        offset_ms: f64,
        #[arg(long, default_value_t = 120.0)]
        bpm: f64,
    },
    /// Print the effective configuration as JSON
    DumpConfig,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            AppConfig::from_json_str(&json).map_err(|err| {
                log_config_error(&err, "cli --config");
                anyhow!("{}", err)
            })?
        }
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Simulate {
            playlist,
            wav,
            bpm,
            duration_ms,
            stage,
            seed,
            output,
            telemetry,
        } => {
            let mut config = config;
            if let Some(bpm) = bpm {
                config.conductor.bpm = bpm;
            }
            if seed.is_some() {
                config.director.seed = seed;
            }
            let params = SimulationParams {
                duration_ms,
                stage,
                ..SimulationParams::default()
            };
            run_simulate(&config, playlist, wav, params, output, telemetry)
        }
        Commands::Judge {
            phase,
            window,
            offset_ms,
            bpm,
        } => run_judge(phase, window, offset_ms, bpm),
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

fn run_simulate(
    config: &AppConfig,
    playlist_path: Option<PathBuf>,
    wav: Option<PathBuf>,
    mut params: SimulationParams,
    output_path: Option<PathBuf>,
    include_telemetry: bool,
) -> Result<ExitCode> {
    let playlist = match playlist_path {
        Some(path) => {
            let json = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            Playlist::from_json_str(&json)
                .map_err(|err| {
                    log_config_error(&err, "cli --playlist");
                    anyhow!("{}", err)
                })
                .with_context(|| format!("parsing playlist {}", path.display()))?
        }
        None => Playlist::load_from_file("assets/playlist_normal.json"),
    };

    let report = match wav {
        Some(path) => {
            let (samples, sample_rate) = read_wav(&path)?;
            params.sample_rate = sample_rate;
            let track_ms = samples.len() as f64 * 1000.0 / sample_rate as f64;
            params.duration_ms = params.duration_ms.min(track_ms);
            run_simulation_with_pcm(config, playlist, &params, &samples)
        }
        None => run_simulation(config, playlist, &params),
    }
    .map_err(|err| {
        log_director_error(&err, "simulate");
        anyhow!("{}", err)
    })?;

    tracing::info!(
        frames = report.frames,
        spawns = report.spawns.len(),
        fallback = report.fallback_spawns,
        "simulation finished"
    );

    let payload = SimulateReportPayload {
        report: &report,
        telemetry: include_telemetry.then(|| telemetry::hub().snapshot()),
    };
    let json = serde_json::to_string_pretty(&payload)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(ExitCode::from(0))
}

fn run_judge(phase: f64, window: f64, offset_ms: f64, bpm: f64) -> Result<ExitCode> {
    let judge = BeatJudge::new(
        Box::new(move || phase),
        JudgeOptions {
            window,
            offset_ms,
            beat_length_ms: beat_length_ms(bpm),
        },
    );
    let outcome = judge.judge_with_distance();
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(ExitCode::from(0))
}

/// Read a WAV file, downmixing to mono
fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|sample| sample.map(|value| value as f32 / max).map_err(|err| anyhow!(err)))
                    .collect::<Result<Vec<f32>>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / max).map_err(|err| anyhow!(err)))
                    .collect::<Result<Vec<f32>>>()?,
                other => {
                    return Err(anyhow!(
                        "Unsupported bits per sample {} in {}",
                        other,
                        path.display()
                    ))
                }
            }
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

#[derive(Serialize)]
struct SimulateReportPayload<'a> {
    report: &'a beat_director::simulation::SimulationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    telemetry: Option<telemetry::TelemetrySnapshot>,
}
