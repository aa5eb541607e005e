// Experience Corpus Loader: read-only access to a candidate's ground-truth role blocks.

pub mod loader;
pub mod store;

pub use loader::load_corpus;
pub use store::{CorpusError, CorpusStore, PgCorpusStore};
#[cfg(test)]
pub use store::InMemoryCorpusStore;
