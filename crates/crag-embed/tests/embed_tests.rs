use crag_core::config::Settings;
use crag_core::traits::Embedder;
use crag_core::types::is_unit_norm;
use crag_embed::{get_default_embedder, resolve_model_dir, FakeEmbedder};

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::new(64);
    let texts = vec!["late fee on my card".to_string(), "late fee on my card".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    assert_eq!(embs.len(), 2);
    assert_eq!(embs[0].len(), 64);
    assert!(is_unit_norm(&embs[0]), "vector is L2-normalized");
    assert_eq!(embs[0], embs[1]);
}

#[test]
fn fake_embedder_handles_blank_text() {
    let embedder = FakeEmbedder::new(8);
    let v = embedder.embed_query("   ").expect("embed");
    assert!(is_unit_norm(&v));
}

#[test]
fn fake_embedder_ranks_overlapping_text_closer() {
    let embedder = FakeEmbedder::new(256);
    let q = embedder.embed_query("credit card late fee").unwrap();
    let near = embedder.embed_query("late fee charged on credit card").unwrap();
    let far = embedder.embed_query("mortgage escrow shortage notice").unwrap();
    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    assert!(dot(&q, &near) > dot(&q, &far));
}

#[test]
fn default_embedder_honours_fake_flag() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let mut settings = Settings::default();
    settings.embedding.dim = 32;
    let embedder = get_default_embedder(&settings).expect("embedder");
    assert_eq!(embedder.dim(), 32);
    assert_eq!(embedder.id(), "fake-xxhash");
}

#[test]
fn missing_model_dir_is_an_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let missing = tmp.path().join("nope");
    assert!(resolve_model_dir(&missing).is_err());
    assert_eq!(resolve_model_dir(tmp.path()).unwrap(), tmp.path());
}
