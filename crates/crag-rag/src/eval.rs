//! Batch evaluation over a question list, written out as a review table.

use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crag_core::config::EvaluationSettings;
use crag_core::{Chunk, Error, Result};
use crag_vector::store::write_atomic;

use crate::engine::RagEngine;

pub const ERROR_MARKER: &str = "[error] ";

pub const SAMPLE_QUESTIONS: [&str; 5] = [
    "What are common reasons for customer complaints?",
    "Which complaint category receives the highest severity score?",
    "How many customers reported delayed payments?",
    "What actions were taken to resolve complaints?",
    "Are there trends in complaints over the past year?",
];

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub question: String,
    pub generated_answer: String,
    pub top_sources: Vec<String>,
    pub quality_score: Option<String>,
    pub comments: Option<String>,
    pub failed: bool,
}

pub struct Evaluator<'a> {
    engine: &'a RagEngine,
    top_sources: usize,
    source_chars: usize,
    workers: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(engine: &'a RagEngine) -> Self {
        Self::from_settings(engine, &EvaluationSettings::default())
    }

    pub fn from_settings(engine: &'a RagEngine, settings: &EvaluationSettings) -> Self {
        Self {
            engine,
            top_sources: settings.top_sources,
            source_chars: settings.source_chars,
            workers: settings.workers.max(1),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_top_sources(mut self, n: usize) -> Self {
        self.top_sources = n;
        self
    }

    pub fn with_source_chars(mut self, chars: usize) -> Self {
        self.source_chars = chars;
        self
    }

    /// One record per question, in input order. A failing question yields a
    /// marked record and the batch carries on.
    pub fn evaluate<S: AsRef<str> + Sync>(&self, questions: &[S], k: usize) -> Vec<EvaluationRecord> {
        info!(questions = questions.len(), k, workers = self.workers, "evaluating");
        let records: Vec<EvaluationRecord> = if self.workers <= 1 || questions.len() <= 1 {
            questions.iter().map(|q| self.evaluate_one(q.as_ref(), k)).collect()
        } else {
            self.evaluate_parallel(questions, k)
        };
        let failed = records.iter().filter(|r| r.failed).count();
        info!(total = records.len(), failed, "evaluation finished");
        records
    }

    fn evaluate_parallel<S: AsRef<str> + Sync>(&self, questions: &[S], k: usize) -> Vec<EvaluationRecord> {
        match rayon::ThreadPoolBuilder::new().num_threads(self.workers).build() {
            Ok(pool) => pool.install(|| questions.par_iter().map(|q| self.evaluate_one(q.as_ref(), k)).collect()),
            Err(e) => {
                warn!(error = %e, "evaluation pool unavailable, running sequentially");
                questions.iter().map(|q| self.evaluate_one(q.as_ref(), k)).collect()
            }
        }
    }

    fn evaluate_one(&self, question: &str, k: usize) -> EvaluationRecord {
        let outcome = match catch_unwind(AssertUnwindSafe(|| self.engine.answer(question, k))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(question, panic = %message, "provider panicked");
                return failed_record(question, &format!("provider panicked: {}", message));
            }
        };
        match outcome {
            Ok(answer) => EvaluationRecord {
                question: question.to_string(),
                generated_answer: answer.text,
                top_sources: answer
                    .sources
                    .iter()
                    .take(self.top_sources)
                    .map(|s| summarize_source(&s.chunk, self.source_chars))
                    .collect(),
                quality_score: None,
                comments: None,
                failed: false,
            },
            Err(e) => {
                warn!(question, error = %e, "question failed");
                failed_record(question, &e.to_string())
            }
        }
    }
}

fn failed_record(question: &str, message: &str) -> EvaluationRecord {
    EvaluationRecord {
        question: question.to_string(),
        generated_answer: format!("{}{}", ERROR_MARKER, message),
        top_sources: Vec::new(),
        quality_score: None,
        comments: None,
        failed: true,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Rendered chunk on one line, cut to `max_chars` characters.
pub fn summarize_source(chunk: &Chunk, max_chars: usize) -> String {
    let flat = chunk.render().split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => flat[..cut].to_string(),
        None => flat,
    }
}

/// One table row. Sources are joined with ` | ` into a single column.
#[derive(Serialize)]
struct CsvRow<'r> {
    #[serde(rename = "Question")]
    question: &'r str,
    #[serde(rename = "Generated Answer")]
    generated_answer: &'r str,
    #[serde(rename = "Retrieved Sources")]
    sources: String,
    #[serde(rename = "Quality Score")]
    quality_score: &'r str,
    #[serde(rename = "Comments/Analysis")]
    comments: &'r str,
}

impl<'r> From<&'r EvaluationRecord> for CsvRow<'r> {
    fn from(r: &'r EvaluationRecord) -> Self {
        Self {
            question: &r.question,
            generated_answer: &r.generated_answer,
            sources: r.top_sources.join(" | "),
            quality_score: r.quality_score.as_deref().unwrap_or(""),
            comments: r.comments.as_deref().unwrap_or(""),
        }
    }
}

pub fn write_csv<W: Write>(records: &[EvaluationRecord], writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    if records.is_empty() {
        out.write_record(["Question", "Generated Answer", "Retrieved Sources", "Quality Score", "Comments/Analysis"])
            .map_err(csv_err)?;
    }
    for r in records {
        out.serialize(CsvRow::from(r)).map_err(csv_err)?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_csv_file(records: &[EvaluationRecord], path: &Path) -> Result<()> {
    let mut buf = Vec::new();
    write_csv(records, &mut buf)?;
    write_atomic(path, &buf)?;
    info!(rows = records.len(), path = %path.display(), "evaluation table saved");
    Ok(())
}

fn csv_err(e: csv::Error) -> Error {
    Error::Io(std::io::Error::other(e))
}
