//! # notescan - note extraction from recorded audio
//!
//! Command-line front-end for `notescan-core`. Decodes a WAV file, runs the
//! pitch analysis pipeline and prints the resulting notes, optionally saving
//! them as JSON or as a Standard MIDI File.
//!
//! ## Architecture
//! - **Decoding**: hound reads the WAV file, channels are averaged to mono
//! - **Analysis**: `notescan_core::analyze_with`, progress reported through `log`
//! - **Output**: note table on stdout, JSON (serde_json) and MIDI (midly) files
//! - **Live mode** (`live` feature): cpal capture thread feeding the core's
//!   live scanner over crossbeam channels

mod profile;
mod wav;

#[cfg(feature = "live")]
mod live;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use notescan_core::export::{MidiExportConfig, write_midi};
use notescan_core::{AnalysisConfig, EstimatorKind, NoteEvent, SampleBuffer, ScanProgress, tuning};

#[derive(Parser)]
#[command(name = "notescan", version)]
#[command(about = "Detects pitches in audio and converts them into timed notes")]
struct Cli {
    /// Show debug output from the analysis pipeline
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a WAV file and print the detected notes
    Analyze(AnalyzeArgs),

    /// Write an analysis profile with default settings
    Profile {
        /// Output JSON file path
        #[arg(default_value = "notescan-profile.json")]
        output: PathBuf,

        /// Start from the chord-oriented defaults
        #[arg(long)]
        polyphonic: bool,
    },

    /// Capture from the default input device and transcribe it
    #[cfg(feature = "live")]
    Live(live::LiveArgs),
}

/// Estimator selection on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// One note at a time (time-domain correlation)
    Mono,
    /// Chords (spectral peaks with harmonic filtering)
    Poly,
}

/// Options shared by every command that runs the pipeline.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Estimator to run (overrides the profile)
    #[arg(long, short, value_enum)]
    mode: Option<Mode>,

    /// Analysis profile (JSON) to start from
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Analysis window in samples
    #[arg(long)]
    window: Option<usize>,

    /// Hop between windows in samples
    #[arg(long)]
    hop: Option<usize>,

    /// Write the notes as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the notes as a Standard MIDI File
    #[arg(long)]
    midi: Option<PathBuf>,

    /// Tempo of the exported MIDI file
    #[arg(long, default_value_t = 120.0)]
    bpm: f64,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// WAV file to analyze
    input: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Command::Analyze(args) => run_analyze(&args),
        Command::Profile { output, polyphonic } => {
            let config = if polyphonic {
                AnalysisConfig::polyphonic()
            } else {
                AnalysisConfig::default()
            };
            profile::save_profile(&config, &output)?;
            log::info!("Wrote default profile to {}", output.display());
            Ok(())
        }
        #[cfg(feature = "live")]
        Command::Live(args) => live::run_live(&args),
    }
}

/// Resolves the analysis profile: file or built-in defaults, then flags.
pub fn build_config(args: &PipelineArgs) -> Result<AnalysisConfig> {
    let mut config = match &args.profile {
        Some(path) => profile::load_profile(path)?,
        None => match args.mode {
            Some(Mode::Poly) => AnalysisConfig::polyphonic(),
            _ => AnalysisConfig::default(),
        },
    };

    if let Some(mode) = args.mode {
        config.estimator = match mode {
            Mode::Mono => EstimatorKind::Monophonic,
            Mode::Poly => EstimatorKind::Polyphonic,
        };
    }
    if let Some(window) = args.window {
        config.window_size = window;
    }
    if let Some(hop) = args.hop {
        config.hop_size = hop;
    }

    config.validate().context("invalid analysis settings")?;
    Ok(config)
}

fn run_analyze(args: &AnalyzeArgs) -> Result<()> {
    let config = build_config(&args.pipeline)?;
    let audio = wav::read_wav_mono(&args.input)?;
    log::info!(
        "Loaded {}: {:.2}s at {} Hz ({} channel(s))",
        args.input.display(),
        audio.samples.len() as f64 / audio.sample_rate as f64,
        audio.sample_rate,
        audio.channels
    );

    let buffer = SampleBuffer::new(&audio.samples, audio.sample_rate)
        .with_context(|| format!("cannot analyze {}", args.input.display()))?;

    let mut last_reported = 0;
    let mut observer = |progress: ScanProgress| {
        let percent = (progress.fraction() * 100.0) as u32;
        if percent >= last_reported + 25 {
            last_reported = percent - percent % 25;
            log::info!("Analysis {}% ({} frames)", last_reported, progress.frames_completed);
        }
    };
    let notes = notescan_core::analyze_with(buffer, &config, Some(&mut observer), None)?;

    print_notes(&notes);
    write_outputs(&notes, &args.pipeline)
}

/// Prints one line per note: onset, length, note names and velocity.
pub fn print_notes(notes: &[NoteEvent]) {
    println!("{:>9}  {:>8}  {:<20} {}", "time (s)", "dur (s)", "notes", "vel");
    for note in notes {
        let names: Vec<&str> = note.midi_notes.iter().map(|&m| tuning::note_name(m)).collect();
        let velocity = note.velocity.map_or_else(|| "-".to_string(), |v| v.to_string());
        println!(
            "{:>9.3}  {:>8.3}  {:<20} {}",
            note.time,
            note.duration_seconds,
            names.join(" "),
            velocity
        );
    }
    println!("{} notes", notes.len());
}

/// Writes the JSON and MIDI files requested on the command line.
pub fn write_outputs(notes: &[NoteEvent], args: &PipelineArgs) -> Result<()> {
    if let Some(path) = &args.json {
        profile::save_notes(notes, path)?;
        log::info!("Wrote {} notes to {}", notes.len(), path.display());
    }
    if let Some(path) = &args.midi {
        let export = MidiExportConfig {
            bpm: args.bpm,
            ..MidiExportConfig::default()
        };
        save_midi(notes, &export, path)?;
        log::info!("Wrote MIDI file {}", path.display());
    }
    Ok(())
}

fn save_midi(notes: &[NoteEvent], export: &MidiExportConfig, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    write_midi(notes, export, BufWriter::new(file))
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(args: &[&str]) -> PipelineArgs {
        let mut argv = vec!["notescan", "analyze", "in.wav"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Analyze(analyze) => analyze.pipeline,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_default_pipeline_is_monophonic() {
        let config = build_config(&pipeline(&[])).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_poly_mode_uses_chord_defaults() {
        let config = build_config(&pipeline(&["--mode", "poly"])).unwrap();
        assert_eq!(config.estimator, EstimatorKind::Polyphonic);
        assert_eq!(config.window_size, 4096);
    }

    #[test]
    fn test_window_and_hop_overrides() {
        let config = build_config(&pipeline(&["--window", "1024", "--hop", "128"])).unwrap();
        assert_eq!(config.window_size, 1024);
        assert_eq!(config.hop_size, 128);
    }

    #[test]
    fn test_invalid_override_is_reported() {
        assert!(build_config(&pipeline(&["--window", "256", "--hop", "512"])).is_err());
    }

    #[test]
    fn test_bpm_default() {
        assert_eq!(pipeline(&[]).bpm, 120.0);
    }
}
