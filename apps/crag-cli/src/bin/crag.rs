use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;

use crag_core::config::{Config, Settings};
use crag_rag::{write_csv_file, Evaluator, RagEngine, EMPTY_QUESTION, SAMPLE_QUESTIONS};
use crag_vector::codec::read_header_from_path;
use crag_vector::MetadataStore;

#[derive(Parser)]
#[command(name = "crag")]
#[command(about = "Answer questions over indexed complaint narratives")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question and list its top sources
    Ask {
        question: Vec<String>,
        /// Number of chunks to retrieve
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Run the evaluation harness and write the review table
    Eval {
        /// File with one question per line (defaults to the built-in sample set)
        #[arg(long)]
        questions: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Show the stored index and metadata and whether they line up
    Status,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Ask { question, k } => {
            let question = question.join(" ");
            if question.trim().is_empty() {
                println!("{}", EMPTY_QUESTION);
                return Ok(());
            }
            let settings = load_settings(&cli.config_dir)?;
            let engine = RagEngine::from_settings(&settings)?;
            let k = k.unwrap_or(engine.default_k());
            match engine.answer(&question, k) {
                Ok(answer) => {
                    println!("Answer:\n{}\n", answer.text);
                    println!("Sources:\n{}", answer.format_sources(3).join("\n\n"));
                }
                Err(e) => {
                    if !e.is_input() {
                        error!(error = %e, "answer failed");
                    }
                    println!("{}", e.user_message());
                    if !e.is_input() {
                        std::process::exit(1);
                    }
                }
            }
        }
        Commands::Eval { questions, output, k, workers } => {
            let settings = load_settings(&cli.config_dir)?;
            let questions = match questions {
                Some(path) => read_questions(&path)?,
                None => SAMPLE_QUESTIONS.iter().map(|q| q.to_string()).collect(),
            };
            let engine = RagEngine::from_settings(&settings)?;
            let mut evaluator = Evaluator::from_settings(&engine, &settings.evaluation);
            if let Some(w) = workers {
                evaluator = evaluator.with_workers(w);
            }
            let records = evaluator.evaluate(&questions, k.unwrap_or(engine.default_k()));
            for r in &records {
                println!("{}\n[Question]: {}", "=".repeat(80), r.question);
                println!("[Generated Answer]: {}", r.generated_answer);
                for s in &r.top_sources {
                    println!("- {}", s);
                }
            }
            let output = output.unwrap_or_else(|| settings.evaluation_output_path());
            write_csv_file(&records, &output)?;
            let failed = records.iter().filter(|r| r.failed).count();
            println!("\n{} questions, {} failed. Table saved to {}", records.len(), failed, output.display());
        }
        Commands::Status => {
            let settings = load_settings(&cli.config_dir)?;
            let (index_path, metadata_path) = (settings.index_path(), settings.metadata_path());
            let header = read_header_from_path(&index_path);
            let metadata = MetadataStore::load(&metadata_path);
            match &header {
                Ok(h) => println!(
                    "Index:    {} (metric {}, dim {}, {} vectors)",
                    index_path.display(),
                    h.metric,
                    h.dim,
                    h.count
                ),
                Err(e) => println!("Index:    {} ({})", index_path.display(), e),
            }
            match &metadata {
                Ok(m) => println!("Metadata: {} ({} chunks)", metadata_path.display(), m.len()),
                Err(e) => println!("Metadata: {} ({})", metadata_path.display(), e),
            }
            if let (Ok(h), Ok(m)) = (&header, &metadata) {
                let aligned = if h.count == m.len() { "yes" } else { "NO" };
                println!("Aligned:  {}", aligned);
            }
        }
    }
    Ok(())
}

fn load_settings(dir: &Path) -> anyhow::Result<Settings> {
    let config = Config::load_from(dir).context("loading configuration")?;
    Ok(config.settings()?)
}

fn read_questions(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect())
}
