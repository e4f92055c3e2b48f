use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use blow_detector::capture::{wav_files, Capture};
use blow_detector::{AppConfig, AppContext, EpochLogs, FeatureExtractor, FnObserver, Label};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "blow_cli",
    about = "Train and run the blow / not-blow classifier on WAV clips"
)]
struct Cli {
    /// JSON configuration file (defaults apply when missing)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the model store directory
    #[arg(long)]
    store_dir: Option<PathBuf>,
    /// Log at debug level
    #[arg(long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a summary of the log-Mel spectrogram for one clip
    Extract {
        #[arg(long)]
        wav: PathBuf,
    },
    /// Train on two directories of clips and save the model
    Train {
        #[arg(long)]
        blow_dir: PathBuf,
        #[arg(long)]
        not_blow_dir: PathBuf,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        epochs: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Classify one clip with a saved model
    Predict {
        #[arg(long)]
        wav: PathBuf,
        #[arg(long)]
        model: Option<String>,
    },
    /// Count clips per label that produce usable features
    Counts {
        #[arg(long)]
        blow_dir: PathBuf,
        #[arg(long)]
        not_blow_dir: PathBuf,
    },
}

#[derive(Serialize)]
struct ExtractReport {
    path: String,
    sample_rate: u32,
    duration_secs: f32,
    frames: usize,
    mels: usize,
    mean: f32,
    std_dev: f32,
    degraded_frames: u64,
}

fn main() -> ExitCode {
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
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::default(),
    };
    if let Some(dir) = cli.store_dir {
        config.store.directory = dir;
    }

    match cli.command {
        Commands::Extract { wav } => run_extract(&wav),
        Commands::Train {
            blow_dir,
            not_blow_dir,
            model,
            epochs,
            seed,
        } => {
            if let Some(epochs) = epochs {
                config.training.epochs = epochs;
            }
            if seed.is_some() {
                config.training.seed = seed;
            }
            run_train(config, &blow_dir, &not_blow_dir, model.as_deref())
        }
        Commands::Predict { wav, model } => run_predict(config, &wav, model.as_deref()),
        Commands::Counts {
            blow_dir,
            not_blow_dir,
        } => run_counts(config, &blow_dir, &not_blow_dir),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run_extract(wav: &Path) -> Result<ExitCode> {
    let capture = Capture::read_wav(wav)?;
    let extractor = FeatureExtractor::new(capture.sample_rate);
    let Some(spectrogram) = extractor.extract(&capture.samples) else {
        eprintln!(
            "{}: clip too short for one analysis window ({} samples)",
            wav.display(),
            capture.samples.len()
        );
        return Ok(ExitCode::from(2));
    };

    let report = ExtractReport {
        path: wav.display().to_string(),
        sample_rate: capture.sample_rate,
        duration_secs: capture.duration_secs(),
        frames: spectrogram.n_frames(),
        mels: spectrogram.n_mels(),
        mean: spectrogram.mean(),
        std_dev: spectrogram.std_dev(),
        degraded_frames: extractor.degraded_frames(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

/// Feed every clip in `dir` into the context under `label`
fn load_dir(ctx: &AppContext, dir: &Path, label: Label) -> Result<usize> {
    let mut accepted = 0;
    for path in wav_files(dir)? {
        let capture = Capture::read_wav(&path)?;
        if ctx
            .add_capture(label, &capture.samples, capture.sample_rate)
            .with_context(|| format!("adding {}", path.display()))?
        {
            accepted += 1;
        } else {
            log::warn!("[blow_cli] Skipped {} (no features)", path.display());
        }
    }
    Ok(accepted)
}

fn run_train(config: AppConfig, blow_dir: &Path, not_blow_dir: &Path, model: Option<&str>) -> Result<ExitCode> {
    let ctx = AppContext::new(config);
    load_dir(&ctx, blow_dir, Label::Blow)?;
    load_dir(&ctx, not_blow_dir, Label::NotBlow)?;

    let counts = ctx.counts()?;
    log::info!(
        "[blow_cli] Corpus: {} blow, {} not_blow",
        counts.blow,
        counts.not_blow
    );
    if !counts.is_trainable() {
        eprintln!("Both labels need at least one usable clip");
        return Ok(ExitCode::from(2));
    }

    let mut observer = FnObserver::new(|epoch, logs: &EpochLogs| {
        println!(
            "{}",
            serde_json::json!({ "epoch": epoch, "logs": logs })
        );
        ControlFlow::Continue(())
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let history = runtime.block_on(ctx.train(&mut observer))?;

    ctx.save_model(model)?;
    if let Some(last) = history.final_logs() {
        log::info!(
            "[blow_cli] Final loss {:.4}, accuracy {:.3}",
            last.loss,
            last.accuracy
        );
    }
    Ok(ExitCode::from(0))
}

fn run_predict(config: AppConfig, wav: &Path, model: Option<&str>) -> Result<ExitCode> {
    let ctx = AppContext::new(config);
    ctx.load_model(model)?;

    let capture = Capture::read_wav(wav)?;
    match ctx.predict_clip(&capture.samples, capture.sample_rate)? {
        Some(prediction) => {
            println!("{}", serde_json::to_string(&prediction)?);
            Ok(ExitCode::from(0))
        }
        None => {
            eprintln!("{}: no features extracted", wav.display());
            Ok(ExitCode::from(2))
        }
    }
}

fn run_counts(config: AppConfig, blow_dir: &Path, not_blow_dir: &Path) -> Result<ExitCode> {
    let ctx = AppContext::new(config);
    load_dir(&ctx, blow_dir, Label::Blow)?;
    load_dir(&ctx, not_blow_dir, Label::NotBlow)?;
    println!("{}", serde_json::to_string(&ctx.counts()?)?);
    Ok(ExitCode::from(0))
}
