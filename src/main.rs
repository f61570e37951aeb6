use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use epochal::training::{
    BatchSource, ClassificationTrainer, DataLoader, DataLoaderConfig, GaussianBlobs, MlpClassifier,
    TrainerFeedback, TrainingEvent,
};
use epochal::RunConfig;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "epochal")]
#[command(about = "Train and evaluate classifiers on synthetic data", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a training job
    Train {
        /// Run configuration (.json, .yaml or .yml)
        #[arg(short, long)]
        config: PathBuf,

        /// Where to write the training history as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a run configuration file
    Config {
        /// Configuration file to validate
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show system information
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Train { config, output } => train(config, output).await?,
        Commands::Config { file } => validate_config(file)?,
        Commands::Info => show_system_info(),
    }

    Ok(())
}

fn init_logging(verbosity: u8, json_output: bool) {
    let default_level = match verbosity {
        0 => "epochal=info,warn",
        1 => "epochal=debug,info",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_output {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(env_filter);
        tracing_subscriber::registry().with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer().with_target(false).with_filter(env_filter);
        tracing_subscriber::registry().with(fmt_layer).init();
    }
}

async fn train(config_path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let config = RunConfig::from_file(&config_path).context("Failed to load run configuration")?;
    info!("Loaded run configuration from {}", config_path.display());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let stop = Arc::new(AtomicBool::new(false));

    let monitor = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log_event(&event);
        }
    });

    let interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current epoch");
            interrupt.store(true, Ordering::SeqCst);
        }
    });

    let feedback = tokio::task::spawn_blocking(move || run_training(config, tx, stop))
        .await
        .context("Training task panicked")??;
    monitor.await.context("Event monitor panicked")?;

    info!(
        "Training finished: {} epochs in {}s",
        feedback.len(),
        feedback.elapsed().num_seconds()
    );
    if let Some(last) = feedback.last() {
        info!("Final epoch: {last}");
    }
    if let Some(test) = &feedback.test_metrics {
        info!("Test metrics: {test:?}");
    }

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create output directory")?;
        }
        let json = feedback
            .to_json_pretty()
            .context("Failed to serialize training history")?;
        fs::write(&path, json).context("Failed to write training history")?;
        info!("Training history saved to {}", path.display());
    }

    Ok(())
}

/// Build data, model and trainer, then fit
///
/// The trainer drops its event sender on return, which ends the monitor task.
fn run_training(
    config: RunConfig,
    tx: mpsc::UnboundedSender<TrainingEvent>,
    stop: Arc<AtomicBool>,
) -> Result<TrainerFeedback> {
    let device = config.trainer.device()?;
    let data = &config.data;

    let blobs = GaussianBlobs::new(
        config.trainer.num_classes,
        data.feature_dim,
        data.separation,
        data.spread,
        data.seed,
    )?;
    let loader = |per_class: usize, seed_offset: u64, shuffle: bool| -> Result<DataLoader> {
        let dataset = blobs.sample(per_class, data.seed + seed_offset, &device)?;
        let loader = DataLoader::new(
            Arc::new(dataset),
            DataLoaderConfig {
                batch_size: data.batch_size,
                shuffle,
                drop_last: false,
                seed: data.seed,
            },
        )?;
        Ok(loader)
    };

    let train = loader(data.train_per_class, 1, data.shuffle)?;
    let eval = match data.eval_per_class {
        0 => None,
        n => Some(loader(n, 2, false)?),
    };
    let test = match data.test_per_class {
        0 => None,
        n => Some(loader(n, 3, false)?),
    };
    debug!(
        train_batches = train.num_batches(),
        eval_batches = eval.as_ref().map(DataLoader::num_batches),
        test_batches = test.as_ref().map(DataLoader::num_batches),
        "Data loaders ready"
    );

    let mut model = MlpClassifier::new(config.model.clone(), &device)?;
    info!("Model has {} parameters", model.parameter_count());

    let mut trainer = ClassificationTrainer::from_config(config.trainer.clone())?
        .with_event_monitoring(tx)
        .with_stop_signal(stop);

    let feedback = trainer.fit(
        &mut model,
        &train,
        eval.as_ref().map(|l| l as &dyn BatchSource),
        test.as_ref().map(|l| l as &dyn BatchSource),
    )?;
    Ok(feedback)
}

fn log_event(event: &TrainingEvent) {
    match event {
        TrainingEvent::EpochStarted { epoch } => debug!("Epoch {} started", epoch + 1),
        TrainingEvent::StepCompleted { step, loss, lr } => {
            debug!(step, loss, lr, "Optimizer step")
        }
        TrainingEvent::EvaluationCompleted { epoch, metrics } => {
            info!("Validation after epoch {}: {:?}", epoch + 1, metrics)
        }
        TrainingEvent::EpochCompleted { .. } => {}
        TrainingEvent::TestCompleted { metrics } => info!("Test pass: {:?}", metrics),
        TrainingEvent::TrainingCompleted {
            epochs,
            total_steps,
        } => info!("Ran {} epochs, {} optimizer steps", epochs, total_steps),
    }
}

fn validate_config(config_path: PathBuf) -> Result<()> {
    info!("Validating configuration file: {}", config_path.display());

    let config =
        RunConfig::from_file(&config_path).context("Failed to load configuration file")?;

    info!("Configuration is valid");
    info!("  - Epochs: {}", config.trainer.num_epochs);
    info!("  - Classes: {} ({:?})", config.trainer.num_classes, config.trainer.loss);
    info!(
        "  - Accumulation window: {}, validation every {} epochs",
        config.trainer.dl_accumulation_steps, config.trainer.validate_every_n_steps
    );
    info!(
        "  - Model: {} -> {:?} -> {}",
        config.model.input_dim, config.model.hidden_dims, config.model.num_outputs
    );
    info!(
        "  - Data: {} train / {} eval / {} test samples per class",
        config.data.train_per_class, config.data.eval_per_class, config.data.test_per_class
    );

    Ok(())
}

fn show_system_info() {
    println!("epochal {}", epochal::VERSION);
    println!();
    println!("Hardware support:");

    #[cfg(feature = "cuda")]
    println!("  CUDA: yes");
    #[cfg(not(feature = "cuda"))]
    println!("  CUDA: not compiled");

    #[cfg(feature = "metal")]
    println!("  Metal: yes");
    #[cfg(not(feature = "metal"))]
    println!("  Metal: not compiled");

    #[cfg(feature = "accelerate")]
    println!("  Accelerate: yes");
    #[cfg(not(feature = "accelerate"))]
    println!("  Accelerate: not compiled");

    println!("  CPU: yes");
    println!();
    println!("Usage:");
    println!("  epochal train -c run.yaml -o history.json");
    println!("  epochal config -f run.yaml   # Validate configuration");
    println!("  epochal info                 # Show this information");
}
