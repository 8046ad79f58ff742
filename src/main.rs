use std::path::{Path, PathBuf};

use adobe1b::{
    load_request, write_json, Config, EmbeddingModel, HashingEmbedder, Pipeline, Strategy,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "adobe1b", version, about = "PDF outlines and persona-driven section ranking")]
struct Args {
    /// JSON file overriding the default thresholds
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract a title and heading outline from a PDF or a directory of PDFs
    Outline {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Rank sections of the requested documents for a persona and a job
    Rank {
        /// Directory holding the documents
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Request file (defaults to <input>/input.json)
        #[arg(long)]
        request: Option<PathBuf>,
        #[arg(long, env = "ADOBE1B_TOP_N")]
        top_n: Option<usize>,
        #[arg(long, env = "ADOBE1B_STRATEGY")]
        strategy: Option<Strategy>,
        /// Sentence embedding model directory for semantic and hybrid ranking
        #[arg(long, env = "ADOBE1B_MODEL_DIR")]
        model_dir: Option<PathBuf>,
        /// Use the word-overlap hashing embedder instead of a model
        #[arg(long, conflicts_with = "model_dir")]
        hashing_embedder: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = match &args.rules {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("Failed to load rules from {}", path.display()))?,
        None => Config::default(),
    };

    match args.command {
        Command::Outline { input, output } => {
            let pipeline = Pipeline::new(config);
            if input.is_dir() {
                let written = pipeline
                    .outline_dir(&input, &output)
                    .with_context(|| format!("Failed to process {}", input.display()))?;
                println!("Successfully processed {} documents from {}", written, input.display());
            } else {
                let outline = pipeline
                    .outline(&input)
                    .with_context(|| format!("Failed to process {}", input.display()))?;
                write_json(&output, &outline)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                println!("Successfully processed {}", input.display());
            }
        }
        Command::Rank {
            input,
            output,
            request,
            top_n,
            strategy,
            model_dir,
            hashing_embedder,
        } => {
            if let Some(top_n) = top_n {
                config.ranking.top_n = top_n;
            }
            if let Some(strategy) = strategy {
                config.ranking.strategy = strategy;
            }

            let request_path = request.unwrap_or_else(|| input.join("input.json"));
            let request = load_request(&request_path)
                .with_context(|| format!("Failed to read request {}", request_path.display()))?;

            let mut pipeline = Pipeline::new(config);
            if let Some(dir) = &model_dir {
                pipeline = pipeline.with_embedder(load_model(dir)?);
            } else if hashing_embedder {
                pipeline = pipeline.with_embedder(Box::new(HashingEmbedder::default()));
            }

            let ranking = pipeline
                .rank(&input, &request)
                .with_context(|| format!("Failed to rank documents in {}", input.display()))?;
            write_json(&output, &ranking)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Successfully ranked {} sections into {}",
                ranking.extracted_sections.len(),
                output.display()
            );
        }
    }

    Ok(())
}

#[cfg(feature = "candle")]
fn load_model(dir: &Path) -> Result<Box<dyn EmbeddingModel>> {
    let model = adobe1b::embedder::BertEmbedder::from_dir(dir)
        .with_context(|| format!("Failed to load embedding model from {}", dir.display()))?;
    Ok(Box::new(model))
}

#[cfg(not(feature = "candle"))]
fn load_model(dir: &Path) -> Result<Box<dyn EmbeddingModel>> {
    anyhow::bail!(
        "cannot load {}: adobe1b was built without the `candle` feature",
        dir.display()
    )
}
