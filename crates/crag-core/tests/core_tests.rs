use std::fs;
use tempfile::TempDir;

use crag_core::config::{resolve_with_base, Config};
use crag_core::data_processor::{ChunkingConfig, ComplaintRecord, DataProcessor};
use crag_core::{Chunk, Error, Metric};

fn processor(chunk_size: usize, chunk_overlap: usize) -> DataProcessor {
    DataProcessor::new(ChunkingConfig { chunk_size, chunk_overlap, ..ChunkingConfig::default() })
}

fn record(id: &str, product: &str, narrative: &str) -> ComplaintRecord {
    ComplaintRecord { complaint_id: id.to_string(), product: product.to_string(), narrative: narrative.to_string() }
}

#[test]
fn clean_text_strips_urls_punctuation_and_boilerplate() {
    let p = DataProcessor::default();
    let cleaned = p.clean_text("I am writing to file a complaint!  See https://bank.example/x   NOW.");
    assert_eq!(cleaned, "see now");
    assert_eq!(p.clean_text("   "), "");
}

#[test]
fn short_text_is_a_single_chunk() {
    let p = DataProcessor::default();
    let pieces = p.split_text("my card was charged twice");
    assert_eq!(pieces, vec!["my card was charged twice".to_string()]);
}

#[test]
fn long_text_respects_chunk_size_and_overlaps() {
    let p = processor(40, 10);
    let words: Vec<String> = (0..60).map(|i| format!("w{:02}", i)).collect();
    let text = words.join(" ");
    let pieces = p.split_text(&text);

    assert!(pieces.len() > 1, "long narrative is split");
    for piece in &pieces {
        assert!(piece.chars().count() <= 40, "piece too long: {piece:?}");
    }
    // Neighbouring chunks share their boundary word.
    for pair in pieces.windows(2) {
        let last_word = pair[0].split(' ').last().expect("word");
        assert!(pair[1].starts_with(last_word) || pair[1].contains(last_word), "{pair:?}");
    }
    // Nothing is lost.
    for w in &words {
        assert!(pieces.iter().any(|p| p.split(' ').any(|x| x == w)), "missing {w}");
    }
}

#[test]
fn unbroken_text_falls_back_to_characters() {
    let p = processor(10, 2);
    let pieces = p.split_text(&"x".repeat(35));
    assert!(pieces.len() >= 4);
    assert!(pieces.iter().all(|s| s.chars().count() <= 10));
}

#[test]
fn chunk_records_carries_complaint_metadata() {
    let p = processor(20, 5);
    let chunks = p.chunk_records(&[record("101", "Credit card", "late fee charged after payment was made on time")]);
    assert!(chunks.len() > 1);
    for c in &chunks {
        assert_eq!(c.field("complaint_id"), Some("101"));
        assert_eq!(c.field("product"), Some("Credit card"));
    }
}

#[test]
fn stratified_sample_is_proportional_and_deterministic() {
    let p = DataProcessor::default();
    let mut records = Vec::new();
    for i in 0..80 { records.push(record(&format!("a{i}"), "Credit card", "text")); }
    for i in 0..20 { records.push(record(&format!("b{i}"), "Mortgage", "text")); }

    let sample = p.stratified_sample(&records, 10, 42);
    let cards = sample.iter().filter(|r| r.product == "Credit card").count();
    let mortgages = sample.iter().filter(|r| r.product == "Mortgage").count();
    assert_eq!((cards, mortgages), (8, 2));

    let again = p.stratified_sample(&records, 10, 42);
    assert_eq!(sample, again, "same seed, same sample");
}

#[test]
fn load_complaints_skips_blank_narratives() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("complaints.csv");
    fs::write(
        &path,
        "Complaint ID,Product,Consumer complaint narrative\n\
         1,Credit card,\"Charged twice, no refund\"\n\
         2,Mortgage,\n\
         3,Mortgage,Escrow miscalculated\n",
    )
    .unwrap();

    let records = DataProcessor::default().load_complaints(&path).expect("load");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].narrative, "Charged twice, no refund");
    assert_eq!(records[1].complaint_id, "3");
}

#[test]
fn load_complaints_reports_missing_column() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.csv");
    fs::write(&path, "id,text\n1,hello\n").unwrap();
    let err = DataProcessor::default().load_complaints(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "{err}");
}

#[test]
fn chunk_render_flattens_metadata() {
    let plain = Chunk::new("raw passage");
    assert_eq!(plain.render(), "raw passage");

    let structured = Chunk::new("fee dispute").with_field("product", "Credit card").with_field("complaint_id", "7");
    assert_eq!(structured.render(), "complaint_id: 7, product: Credit card, text: fee dispute");
}

#[test]
fn metric_parsing_and_codes() {
    assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
    assert_eq!("L2".parse::<Metric>().unwrap(), Metric::L2);
    assert!("manhattan".parse::<Metric>().is_err());
    for m in [Metric::Cosine, Metric::L2] {
        assert_eq!(Metric::from_code(m.code()), Some(m));
    }
    assert_eq!(Metric::from_code(0), None);
}

#[test]
fn settings_defaults_and_file_overrides() {
    let tmp = TempDir::new().unwrap();
    let defaults = Config::load_for_env(tmp.path(), "test").unwrap().settings().unwrap();
    assert_eq!(defaults.retrieval.default_k, 5);
    assert_eq!(defaults.prompt.answer_cue, "Answer:");
    assert_eq!(defaults.index_path(), tmp.path().join("vector_store/chunks.idx"));

    fs::write(
        tmp.path().join("config.toml"),
        "[retrieval]\ndefault_k = 3\nmetric = \"l2\"\n\n[data]\nindex_path = \"/abs/index.idx\"\n",
    )
    .unwrap();
    fs::write(tmp.path().join("config.test.toml"), "[evaluation]\nworkers = 4\n").unwrap();

    let config = Config::load_for_env(tmp.path(), "test").unwrap();
    let settings = config.settings().unwrap();
    assert_eq!(settings.retrieval.default_k, 3);
    assert_eq!(settings.retrieval.metric, Metric::L2);
    assert_eq!(settings.evaluation.workers, 4);
    assert_eq!(settings.index_path(), std::path::PathBuf::from("/abs/index.idx"));
    assert_eq!(config.get::<usize>("retrieval.default_k").unwrap(), 3);
}

#[test]
fn invalid_settings_are_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[chunking]\nchunk_size = 50\nchunk_overlap = 50\n").unwrap();
    let err = Config::load_for_env(tmp.path(), "test").unwrap().settings().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "{err}");

    fs::write(tmp.path().join("config.toml"), "[retrieval]\ndefault_k = 0\n").unwrap();
    assert!(Config::load_for_env(tmp.path(), "test").unwrap().settings().is_err());
}

#[test]
fn resolve_with_base_keeps_absolute_paths() {
    let base = std::path::Path::new("/srv/crag");
    assert_eq!(resolve_with_base(base, "data/x.idx"), base.join("data/x.idx"));
    assert_eq!(resolve_with_base(base, "/tmp/x.idx"), std::path::PathBuf::from("/tmp/x.idx"));
}

#[test]
fn user_message_hides_provider_details() {
    let input = Error::InvalidInput("Please enter a question.".into());
    assert!(input.is_input());
    assert_eq!(input.user_message(), "Please enter a question.");

    let provider = Error::Generation("model exploded".into());
    assert!(provider.is_provider());
    assert!(!provider.user_message().contains("exploded"));
}
