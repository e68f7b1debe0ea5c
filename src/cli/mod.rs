//! tabserve CLI module
//!
//! Command-line interface for fitting pipelines, scoring files and serving.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::inference::{BatchPrediction, InferenceService, ModelContext, ModelStore, PipelineLoader};
use crate::preprocessing::PipelineBuilder;
use crate::training::Classifier;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString { s.truecolor(230, 110, 110) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tabserve")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validated tabular-classifier inference")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit the preprocessing pipeline and classifier, then save the artifact
    Train {
        /// Application config file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Training data (CSV with header)
        #[arg(short, long)]
        data: PathBuf,

        /// Version to tag the artifact with (defaults to the config's model_version)
        #[arg(long)]
        version: Option<String>,
    },

    /// Score a JSON file of records with a saved artifact
    Predict {
        /// Application config file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// JSON array of records, or {"inputs": [...]}
        #[arg(short, long)]
        input: PathBuf,

        /// Artifact version to load (defaults to the config's model_version)
        #[arg(long)]
        version: Option<String>,

        /// Write results as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the HTTP server
    Serve {
        /// Application config file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Server host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show data information
    Info {
        /// Input data file (CSV)
        #[arg(short, long)]
        data: PathBuf,
    },
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_data(path: &Path) -> anyhow::Result<DataFrame> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let df = match ext {
        "csv" => CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        _ => anyhow::bail!("Unsupported file format: {} (expected csv)", ext),
    };

    Ok(df)
}

/// Read records from a JSON array or an `{"inputs": [...]}` object
pub fn load_records(path: &Path) -> anyhow::Result<Vec<Value>> {
    let json = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&json)? {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => match map.remove("inputs") {
            Some(Value::Array(records)) => Ok(records),
            _ => anyhow::bail!("{}: expected an \"inputs\" array", path.display()),
        },
        _ => anyhow::bail!("{}: expected a JSON array of records", path.display()),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Fit and save; returns the artifact path
pub fn cmd_train(config_path: &Path, data_path: &Path, version: Option<&str>) -> anyhow::Result<PathBuf> {
    section("Train");

    let mut config = AppConfig::from_file(config_path)?;
    if let Some(v) = version {
        config.model_version = v.to_string();
    }

    step_run("Loading data");
    let start = Instant::now();
    let df = load_data(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    step_run(&format!("Fitting {:?}", config.pipeline.classifier.model_type));
    let start = Instant::now();
    let (pipeline, matrix) = PipelineBuilder::new(config.schema.clone(), config.pipeline.clone())
        .with_version(config.model_version.clone())
        .fit_transform(&df)?;
    let elapsed = start.elapsed();
    step_done(&format!("{:?}", elapsed));

    let labels = config.schema.labels(&df)?;
    let predicted = pipeline.classifier().predict(&matrix)?;
    let correct = predicted.iter().zip(labels.iter()).filter(|(p, y)| (*p - *y).abs() < 1e-9).count();
    let accuracy = correct as f64 / labels.len() as f64;

    step_run("Saving artifact");
    let path = ModelStore::new(&config.models_dir).save(&pipeline)?;
    step_done(&path.display().to_string());

    println!();
    kv("Version", pipeline.version());
    kv("Features", &pipeline.feature_names().len().to_string());
    kv("Accuracy", &format!("{:.4}", accuracy));
    kv("Time", &format!("{:.3}s", elapsed.as_secs_f64()));
    println!();

    Ok(path)
}

fn load_context(config: &AppConfig) -> anyhow::Result<ModelContext> {
    let store = ModelStore::new(&config.models_dir);
    let pipeline = store.load_fitted_pipeline(&config.model_version)?;
    Ok(ModelContext::new(pipeline)?)
}

pub fn cmd_predict(
    config_path: &Path,
    input_path: &Path,
    version: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<BatchPrediction> {
    section("Predict");

    let mut config = AppConfig::from_file(config_path)?;
    if let Some(v) = version {
        config.model_version = v.to_string();
    }

    step_run(&format!("Loading model {}", config.model_version));
    let service = InferenceService::new(Arc::new(load_context(&config)?));
    step_done("");

    let records = load_records(input_path)?;
    step_run(&format!("Scoring {} records", records.len()));
    let start = Instant::now();
    let batch = service.predict_batch(&records);
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    for (index, result) in batch.results.iter().enumerate() {
        match (&result.prediction, &result.errors) {
            (Some(p), _) => println!("  {:>5}  {}", muted(&index.to_string()), ok(&p.to_string())),
            (None, Some(errors)) => {
                let detail: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                println!("  {:>5}  {}", muted(&index.to_string()), bad(&detail.join("; ")));
            }
            (None, None) => println!("  {:>5}  {}", muted(&index.to_string()), bad("no result")),
        }
    }
    println!();
    kv("Succeeded", &batch.n_succeeded().to_string());
    kv("Failed", &batch.n_failed().to_string());

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&batch)?)?;
        kv("Output", &path.display().to_string());
    }
    println!();

    Ok(batch)
}

pub async fn cmd_serve(config_path: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    use crate::server::run_server;

    let mut config = AppConfig::from_file(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let context = load_context(&config)?;

    section(&format!("{} v{}", config.project_name, env!("CARGO_PKG_VERSION")));
    let base = format!("http://{}:{}", config.server.host, config.server.port);
    kv("Model", context.version());
    kv("Index", &base);
    kv("Health", &format!("{}{}/health", base, config.api_prefix));
    kv("Predict", &format!("{}{}/predict", base, config.api_prefix));
    println!("  {}", dim("ctrl+c to stop"));
    println!();

    run_server(config, context).await
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = load_data(data_path)?;

    kv("File", &data_path.display().to_string());
    kv("Rows", &df.height().to_string());
    kv("Columns", &df.width().to_string());
    println!();

    println!("  {:<20} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(40)));

    for col in df.get_columns() {
        println!(
            "  {:<20} {:<12} {:>6}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
        );
    }

    println!();
    Ok(())
}
