// Melodist CLI entry point.
//
// Generates one melody and writes it to a MIDI file. The pipeline: load
// config -> load vocabulary and model (degrading to defaults / fallback mode)
// -> generate -> build track -> write MIDI.
//
// Usage:
//   generate [OUTPUT] [--config PATH] [--vocab PATH] [--model PATH]
//     [--temperature T] [--length N] [--seed N]
//
// Log verbosity is controlled by the LOG_LEVEL environment variable
// (default: info).

use anyhow::{Context, Result};
use clap::Parser;
use melodist::{Composer, GenerationRequest, GeneratorConfig};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Generate a melody and write it as a MIDI file")]
struct CliArgs {
    /// Where to write the MIDI file.
    #[arg(default_value = "outputs/generated.mid")]
    output: PathBuf,

    /// JSON configuration file. CLI flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Persisted note data (JSON).
    #[arg(long)]
    vocab: Option<PathBuf>,

    /// Transition model (JSON).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Sampling temperature; below 1 is more repetitive, above 1 more varied.
    #[arg(short, long)]
    temperature: Option<f64>,

    /// Number of notes to generate. Defaults depend on whether a model loaded.
    #[arg(short, long)]
    length: Option<usize>,

    /// Seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .init();

    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => GeneratorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    if let Some(vocab) = args.vocab {
        config.vocab_path = Some(vocab);
    }
    if let Some(model) = args.model {
        config.model_path = Some(model);
    }

    println!("=== Melodist ===");
    println!("[1/3] Loading vocabulary and model...");
    let composer = Composer::from_config(config).context("invalid configuration")?;
    println!(
        "  {} symbols, {} mode",
        composer.vocabulary().len(),
        composer.mode()
    );

    let defaults = composer.default_request();
    let request = GenerationRequest {
        length: args.length.unwrap_or(defaults.length),
        temperature: args.temperature.unwrap_or(defaults.temperature),
        seed: args.seed,
    };

    println!(
        "[2/3] Generating {} notes at temperature {}...",
        request.length, request.temperature
    );
    let report = composer
        .compose(&request, &args.output)
        .with_context(|| format!("generating {}", args.output.display()))?;

    println!("[3/3] Wrote {}", report.path.display());
    println!(
        "  {} notes written, {} skipped, {:.1} quarter notes",
        report.events_written, report.events_dropped, report.duration_quarters
    );
    println!("  Seed: {} (pass --seed to reproduce)", report.seed);

    Ok(())
}
