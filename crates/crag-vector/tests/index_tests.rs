use crag_core::types::Metric;
use crag_core::{Chunk, Error};
use crag_vector::{FlatIndex, MetadataStore, VectorStore};

fn unit(x: f32, y: f32) -> Vec<f32> {
    let n = (x * x + y * y).sqrt();
    vec![x / n, y / n]
}

#[test]
fn search_is_sorted_ascending_and_clamped() {
    let vectors: Vec<Vec<f32>> = (0..6).map(|i| vec![i as f32, 0.0]).collect();
    let index = FlatIndex::build(Metric::L2, 2, &vectors).unwrap();

    let hits = index.search(&[2.2, 0.0], 3).unwrap();
    let positions: Vec<usize> = hits.iter().map(|n| n.position).collect();
    assert_eq!(positions, vec![2, 3, 1]);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

    for k in [1, 5, 6, 50] {
        assert_eq!(index.search(&[0.0, 0.0], k).unwrap().len(), k.min(6));
    }
}

#[test]
fn ties_are_broken_by_position() {
    let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 0.0]];
    let index = FlatIndex::build(Metric::Cosine, 2, &vectors).unwrap();
    let hits = index.search(&[1.0, 0.0], 3).unwrap();
    assert_eq!(hits.iter().map(|n| n.position).collect::<Vec<_>>(), vec![0, 2, 3]);
    assert_eq!(hits[0].distance, 0.0);
}

#[test]
fn zero_k_is_an_input_error() {
    let index = FlatIndex::build(Metric::L2, 2, &[vec![0.0, 1.0]]).unwrap();
    assert!(matches!(index.search(&[0.0, 1.0], 0), Err(Error::InvalidInput(_))));
}

#[test]
fn query_dimension_mismatch_is_a_config_error() {
    let index = FlatIndex::build(Metric::L2, 2, &[vec![0.0, 1.0]]).unwrap();
    assert!(matches!(index.search(&[0.0, 1.0, 0.0], 1), Err(Error::InvalidConfig(_))));
}

#[test]
fn cosine_index_rejects_unnormalized_vectors() {
    let err = FlatIndex::build(Metric::Cosine, 2, &[vec![3.0, 4.0]]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "{err}");
    let index = FlatIndex::build(Metric::Cosine, 2, &[unit(3.0, 4.0)]).unwrap();
    assert!(index.search(&[3.0, 4.0], 1).is_err());
}

#[test]
fn ragged_vectors_are_rejected() {
    let err = FlatIndex::build(Metric::L2, 2, &[vec![0.0, 1.0], vec![1.0]]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn closest_of_three_chunks_is_returned_first() {
    let index = FlatIndex::build(Metric::Cosine, 2, &[unit(1.0, 0.0), unit(1.0, 1.0), unit(0.0, 1.0)]).unwrap();
    let metadata = MetadataStore::new(vec![
        Chunk::new("card fee").with_field("complaint_id", "1"),
        Chunk::new("loan servicing").with_field("complaint_id", "2"),
        Chunk::new("mortgage escrow").with_field("complaint_id", "3"),
    ]);
    let store = VectorStore::new(index, metadata).unwrap();
    let query = unit(1.0, 1.2);

    let top = store.search(&query, 1).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].chunk.field("complaint_id"), Some("2"));

    let all = store.search(&query, 3).unwrap();
    assert!(all.iter().all(|s| top[0].distance <= s.distance));
    assert_eq!(all, store.search(&query, 3).unwrap(), "repeat searches agree");
}

#[test]
fn store_refuses_misaligned_metadata() {
    let index = FlatIndex::build(Metric::L2, 1, &[vec![0.0], vec![1.0]]).unwrap();
    let err = VectorStore::new(index, MetadataStore::new(vec![Chunk::new("only one")])).unwrap_err();
    assert!(matches!(err, Error::Integrity(_)), "{err}");
}
