use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::warn;

use crag_core::config::Config;
use crag_core::data_processor::DataProcessor;
use crag_embed::get_default_embedder;
use crag_vector::{build_store, validate_store, BuildOptions, MetadataStore};

/// Prepare complaint chunks, embed them and write the index and metadata files.
#[derive(Parser)]
#[command(name = "crag-indexer")]
#[command(version)]
struct Args {
    /// Complaints CSV export to clean, sample and chunk
    #[arg(long, conflicts_with = "chunks", required_unless_present = "chunks")]
    complaints: Option<PathBuf>,
    /// Pre-chunked JSON array of chunks
    #[arg(long)]
    chunks: Option<PathBuf>,
    /// Stratified sample size (overrides chunking.sample_size)
    #[arg(long)]
    sample: Option<usize>,
    /// Index every complaint instead of a sample
    #[arg(long)]
    no_sample: bool,
    /// Number of stored vectors to probe after the build
    #[arg(long, default_value_t = 20)]
    validate: usize,
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let settings = Config::load_from(&args.config_dir).context("loading configuration")?.settings()?;

    let chunks = match (&args.complaints, &args.chunks) {
        (Some(csv), _) => {
            let mut chunking = settings.chunking.clone();
            if let Some(n) = args.sample {
                chunking.sample_size = n;
            }
            DataProcessor::new(chunking).process_file(csv, !args.no_sample)?
        }
        (None, Some(json)) => MetadataStore::load(json)?.chunks().to_vec(),
        (None, None) => anyhow::bail!("pass --complaints or --chunks"),
    };
    println!("Prepared {} chunks", chunks.len());

    let embedder = get_default_embedder(&settings)?;
    let options = BuildOptions::from_settings(&settings).with_progress(true);
    let store = build_store(chunks, embedder.as_ref(), &options)?;

    if args.validate > 0 {
        let report = validate_store(&store, settings.retrieval.default_k, args.validate)?;
        println!("Validation: {}/{} probes found themselves in the top {}", report.self_hits, report.probed, report.k);
        if !report.is_clean() {
            warn!(hit_rate = report.hit_rate(), "some stored vectors are not retrievable by themselves");
        }
    }

    let (index_path, metadata_path) = (settings.index_path(), settings.metadata_path());
    store.save(&index_path, &metadata_path)?;
    println!(
        "Saved {} vectors (dim {}, {}) to {} and {}",
        store.len(),
        store.dim(),
        store.metric(),
        index_path.display(),
        metadata_path.display()
    );
    Ok(())
}
