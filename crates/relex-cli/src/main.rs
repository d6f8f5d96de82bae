//! relex CLI - Command-line interface
//!
//! Usage:
//!   relex train --input notes.jsonl --output out/
//!   relex fit --data out/training-data.jsonl --model model.json
//!   relex predict --input notes.jsonl --model model.json --output relations.jsonl
//!   relex evaluate --input notes.jsonl --predictions relations.jsonl

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use relex_core::{AppConfig, Document, LoggingConfig, RelationIndex};
use relex_extractor::{
    read_training_data, AggregateMetrics, BatchReport, CategoryRegistry, Classifier, Evaluator,
    LinearModel, PerceptronTrainer, RelationEngine,
};

#[derive(Parser)]
#[command(name = "relex")]
#[command(about = "Pairwise event-event relation extraction")]
#[command(version)]
struct Cli {
    /// TOML configuration file (RELEX_* variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive, e.g. `debug` or `relex_extractor=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write labeled training data from gold-annotated documents
    Train {
        /// Documents as JSON Lines
        #[arg(long)]
        input: PathBuf,
        /// Directory for training-data.jsonl
        #[arg(long)]
        output: Option<PathBuf>,
        /// Probability of keeping each negative pair
        #[arg(long)]
        keep_probability: Option<f64>,
        /// Seed for negative sampling
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Train a linear model from training data
    Fit {
        /// training-data.jsonl written by `train`
        #[arg(long)]
        data: PathBuf,
        /// Where to write the model
        #[arg(long)]
        model: PathBuf,
        #[arg(long, default_value_t = 10)]
        epochs: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Classify candidate pairs and write relations
    Predict {
        /// Documents as JSON Lines
        #[arg(long)]
        input: PathBuf,
        /// Model written by `fit`
        #[arg(long)]
        model: Option<PathBuf>,
        /// Relation indexes as JSON Lines
        #[arg(long)]
        output: PathBuf,
        /// Number of parallel workers
        #[arg(long, default_value_t = 1)]
        jobs: usize,
    },
    /// Score predicted relations against gold annotations
    Evaluate {
        /// Gold-annotated documents as JSON Lines
        #[arg(long)]
        input: PathBuf,
        /// Relation indexes written by `predict`
        #[arg(long)]
        predictions: PathBuf,
        /// Compare argument pairs only, ignoring categories
        #[arg(long)]
        unlabeled: bool,
        /// Print metrics as JSON instead of a text report
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging);

    match cli.command {
        Commands::Train {
            input,
            output,
            keep_probability,
            seed,
        } => {
            config.engine.training = true;
            if output.is_some() {
                config.engine.output_location = output;
            }
            if let Some(p) = keep_probability {
                config.engine.negative_keep_probability = p;
            }
            if seed.is_some() {
                config.engine.seed = seed;
            }
            train(&config, &input)
        }
        Commands::Fit {
            data,
            model,
            epochs,
            seed,
        } => fit(&data, &model, epochs, seed),
        Commands::Predict {
            input,
            model,
            output,
            jobs,
        } => {
            config.engine.training = false;
            if model.is_some() {
                config.engine.classifier_location = model;
            }
            predict(config, &input, &output, jobs).await
        }
        Commands::Evaluate {
            input,
            predictions,
            unlabeled,
            json,
        } => evaluate(&config, &input, &predictions, unlabeled, json),
    }
}

// ============================================================================
// Setup
// ============================================================================

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_documents(path: &Path) -> anyhow::Result<Vec<Document>> {
    let file =
        File::open(path).with_context(|| format!("cannot open documents {}", path.display()))?;
    let mut documents = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let document: Document = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid document", path.display(), n + 1))?;
        documents.push(document);
    }
    tracing::info!(path = %path.display(), documents = documents.len(), "Read documents");
    Ok(documents)
}

fn print_summary(report: &BatchReport) {
    println!(
        "Documents: {} processed, {} skipped ({} ms)",
        report.documents_processed,
        report.documents_failed(),
        report.elapsed().num_milliseconds()
    );
    println!(
        "Candidates: {} | Extractor failures: {}",
        report.candidates, report.extractor_failures
    );
    for failure in &report.failures {
        println!("  skipped {}: {}", failure.document_id, failure.error);
    }
}

// ============================================================================
// Commands
// ============================================================================

fn train(config: &AppConfig, input: &Path) -> anyhow::Result<()> {
    let documents = read_documents(input)?;
    let mut engine =
        RelationEngine::from_config(config).context("cannot start training engine")?;

    let output = engine.process_batch(&documents)?;
    engine.finish().context("cannot flush training data")?;

    print_summary(&output.report);
    println!(
        "Examples: {} positive, {} negative kept, {} negative dropped",
        output.report.positives, output.report.negatives_kept, output.report.negatives_dropped
    );
    Ok(())
}

fn fit(data: &Path, model_path: &Path, epochs: usize, seed: u64) -> anyhow::Result<()> {
    let examples = read_training_data(data)
        .with_context(|| format!("cannot read training data {}", data.display()))?;
    let model = PerceptronTrainer::new()
        .with_epochs(epochs)
        .with_seed(seed)
        .train(&examples)?;
    model
        .save(model_path)
        .with_context(|| format!("cannot write model {}", model_path.display()))?;

    println!(
        "Trained on {} examples: {} categories, {} features",
        examples.len(),
        model.categories().len(),
        model.feature_count()
    );
    Ok(())
}

async fn predict(config: AppConfig, input: &Path, output: &Path, jobs: usize) -> anyhow::Result<()> {
    config.validate()?;
    let Some(model_path) = config.engine.classifier_location.clone() else {
        bail!("no model given; pass --model or set RELEX_MODEL");
    };
    let classifier: Arc<dyn Classifier> = Arc::new(LinearModel::load(&model_path)?);

    let documents = read_documents(input)?;
    let jobs = jobs.clamp(1, documents.len().max(1));
    let shard_size = documents.len().div_ceil(jobs).max(1);

    let mut shards: Vec<Vec<Document>> = Vec::with_capacity(jobs);
    let mut remaining = documents.into_iter().peekable();
    while remaining.peek().is_some() {
        shards.push(remaining.by_ref().take(shard_size).collect());
    }

    let mut handles = Vec::with_capacity(shards.len());
    for (shard_id, shard) in shards.into_iter().enumerate() {
        let config = config.clone();
        let classifier = Arc::clone(&classifier);
        handles.push(tokio::task::spawn_blocking(move || {
            tracing::debug!(shard = shard_id, documents = shard.len(), "Prediction shard started");
            let mut engine = RelationEngine::for_prediction(&config, classifier)?;
            let output = engine.process_batch(&shard)?;
            engine.finish()?;
            Ok::<_, relex_core::RelexError>(output)
        }));
    }

    let mut report = BatchReport::new();
    let mut writer = BufWriter::new(
        File::create(output)
            .with_context(|| format!("cannot create predictions {}", output.display()))?,
    );
    let mut relations = 0;
    for handle in handles {
        let shard = handle.await.context("prediction worker panicked")??;
        for index in &shard.indexes {
            relations += index.len();
            serde_json::to_writer(&mut writer, index)?;
            writer.write_all(b"\n")?;
        }
        report.merge(shard.report);
    }
    writer.flush()?;

    print_summary(&report);
    println!("Relations: {relations} written to {}", output.display());
    Ok(())
}

fn evaluate(
    config: &AppConfig,
    input: &Path,
    predictions: &Path,
    unlabeled: bool,
    json: bool,
) -> anyhow::Result<()> {
    let documents = read_documents(input)?;

    let file = File::open(predictions)
        .with_context(|| format!("cannot open predictions {}", predictions.display()))?;
    let mut predicted: HashMap<String, RelationIndex> = HashMap::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let index: RelationIndex = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid relation index", predictions.display(), n + 1))?;
        predicted.insert(index.document_id().to_string(), index);
    }

    let evaluator = Evaluator::new(CategoryRegistry::from_config(&config.categories))
        .with_category_matching(!unlabeled);
    let mut aggregate = AggregateMetrics::default();
    for document in &documents {
        let index = predicted
            .remove(&document.id)
            .unwrap_or_else(|| RelationIndex::new(document.id.as_str()));
        aggregate.add_document(&evaluator.evaluate_document(&index, &document.gold_relations));
    }
    if !predicted.is_empty() {
        tracing::warn!(
            documents = predicted.len(),
            "Predictions for documents missing from the gold input were ignored"
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&aggregate)?);
    } else {
        print!("{}", aggregate.report());
    }
    Ok(())
}
