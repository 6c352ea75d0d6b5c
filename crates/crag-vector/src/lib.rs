//! Vector storage: exact flat index, binary codec, positional metadata store,
//! and the offline build that ties them to an embedder.

pub mod codec;
pub mod corpus;
pub mod index;
pub mod index_build;
pub mod store;

pub use corpus::{SharedStore, VectorStore};
pub use index::{FlatIndex, Neighbor};
pub use index_build::{build_store, validate_store, BuildOptions, ValidationReport};
pub use store::MetadataStore;
