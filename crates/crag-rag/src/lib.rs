//! Retrieval-augmented answering over complaint chunks: retriever, prompt
//! assembly, the engine that composes them with a generator, and the batch
//! evaluation harness.

pub mod engine;
pub mod eval;
pub mod prompt;
pub mod retriever;
pub mod timeout;

pub use engine::{format_source, Answer, RagEngine, EMPTY_QUESTION};
pub use eval::{summarize_source, write_csv, write_csv_file, EvaluationRecord, Evaluator, SAMPLE_QUESTIONS};
pub use prompt::PromptAssembler;
pub use retriever::Retriever;
pub use timeout::generate_with_timeout;
