mod common;

use std::sync::Arc;

use crag_core::traits::Generator;
use crag_embed::FakeEmbedder;
use crag_generate::ExtractiveGenerator;
use crag_rag::eval::ERROR_MARKER;
use crag_rag::{summarize_source, write_csv, write_csv_file, EvaluationRecord, Evaluator, SAMPLE_QUESTIONS};
use tempfile::TempDir;

use common::{engine, ScriptedGenerator, DIM};

fn questions() -> Vec<String> {
    vec![
        "late fee on credit card".to_string(),
        "please explode now".to_string(),
        "mortgage escrow".to_string(),
        "debt collector calls".to_string(),
    ]
}

#[test]
fn one_failing_question_does_not_abort_the_batch() {
    let generator = Arc::new(ScriptedGenerator::replying("Answer: fine").failing_on("explode"));
    let engine = engine(Arc::new(FakeEmbedder::new(DIM)), generator);
    let records = Evaluator::new(&engine).evaluate(&questions(), 3);

    assert_eq!(records.len(), 4);
    for (record, q) in records.iter().zip(questions()) {
        assert_eq!(record.question, q);
    }
    assert!(records[1].failed);
    assert!(records[1].generated_answer.starts_with(ERROR_MARKER));
    assert!(records[1].top_sources.is_empty());
    for i in [0, 2, 3] {
        assert!(!records[i].failed);
        assert_eq!(records[i].generated_answer, "fine");
        assert_eq!(records[i].top_sources.len(), 2);
        assert_eq!(records[i].quality_score, None);
        assert_eq!(records[i].comments, None);
    }
}

#[test]
fn blank_question_is_recorded_as_failed() {
    let engine = engine(Arc::new(FakeEmbedder::new(DIM)), Arc::new(ScriptedGenerator::replying("x")));
    let records = Evaluator::new(&engine).evaluate(&["", "late fee"], 2);
    assert!(records[0].failed);
    assert!(!records[1].failed);
}

#[test]
fn parallel_workers_keep_input_order() {
    let generator: Arc<dyn Generator> = Arc::new(ExtractiveGenerator::new(&Default::default()));
    let engine = engine(Arc::new(FakeEmbedder::new(DIM)), generator);
    let many: Vec<String> = (0..12).map(|i| format!("{} {}", questions()[i % 4], i)).collect();

    let sequential = Evaluator::new(&engine).evaluate(&many, 2);
    let parallel = Evaluator::new(&engine).with_workers(4).evaluate(&many, 2);
    assert_eq!(sequential, parallel);
    assert!(parallel.iter().zip(&many).all(|(r, q)| &r.question == q));
}

#[test]
fn sources_are_flattened_and_truncated() {
    let chunk = crag_core::Chunk::new("line one\nline two\n\nline three");
    assert_eq!(summarize_source(&chunk, 200), "line one line two line three");
    assert_eq!(summarize_source(&chunk, 8), "line one");

    let engine = engine(Arc::new(FakeEmbedder::new(DIM)), Arc::new(ScriptedGenerator::replying("ok")));
    let records = Evaluator::new(&engine).with_top_sources(1).with_source_chars(10).evaluate(&["late fee"], 4);
    assert_eq!(records[0].top_sources.len(), 1);
    assert_eq!(records[0].top_sources[0].chars().count(), 10);
}

#[test]
fn csv_has_review_columns_and_joined_sources() {
    let records = vec![
        EvaluationRecord {
            question: "Why, exactly?".into(),
            generated_answer: "fees".into(),
            top_sources: vec!["first source".into(), "second source".into()],
            quality_score: None,
            comments: None,
            failed: false,
        },
        EvaluationRecord {
            question: "broken".into(),
            generated_answer: format!("{}timeout", ERROR_MARKER),
            top_sources: vec![],
            quality_score: Some("2".into()),
            comments: None,
            failed: true,
        },
    ];
    let mut buf = Vec::new();
    write_csv(&records, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Question,Generated Answer,Retrieved Sources,Quality Score,Comments/Analysis"));
    assert_eq!(lines.next(), Some("\"Why, exactly?\",fees,first source | second source,,"));
    assert_eq!(lines.next(), Some("broken,[error] timeout,,2,"));

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out/rag_evaluation.csv");
    write_csv_file(&records, &path).unwrap();
    let mut reader = csv::Reader::from_path(&path).unwrap();
    assert_eq!(reader.records().count(), 2);
}

#[test]
fn panicking_provider_fails_only_its_question() {
    for workers in [1, 3] {
        let generator = Arc::new(ScriptedGenerator::replying("Answer: fine").panicking_on("explode"));
        let engine = engine(Arc::new(FakeEmbedder::new(DIM)), generator);
        let records = Evaluator::new(&engine).with_workers(workers).evaluate(&questions(), 2);

        assert_eq!(records.len(), 4, "workers = {workers}");
        assert!(records[1].failed);
        assert!(records[1].generated_answer.starts_with(ERROR_MARKER));
        assert!(records[1].generated_answer.contains("panicked"));
        for i in [0, 2, 3] {
            assert!(!records[i].failed, "workers = {workers}, record {i}");
            assert_eq!(records[i].generated_answer, "fine");
            assert_eq!(records[i].question, questions()[i]);
        }
    }
}

#[test]
fn sample_questions_are_available() {
    assert_eq!(SAMPLE_QUESTIONS.len(), 5);
    assert!(SAMPLE_QUESTIONS.iter().all(|q| q.ends_with('?')));
}
