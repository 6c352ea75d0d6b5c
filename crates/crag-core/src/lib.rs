#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Shared building blocks for the complaint RAG workspace: domain types,
//! capability traits, the error type, configuration and corpus preparation.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{Chunk, Meta, Metric, ScoredChunk};
