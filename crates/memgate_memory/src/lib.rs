//! memgate_memory
//!
//! The two-table (`documents`, `user_facts`) vector store and its hybrid
//! semantic+lexical search, grounded on the flat JSON + append-then-reindex
//! pattern the wider workspace uses for small local stores.

mod lexical;
mod manifest;
mod record;
mod repository;
mod table;

pub use lexical::{detect_personal_intent, matches_intent_shape, PersonalIntent};
pub use manifest::{IngestManifest, ManifestEntry, ManifestError, SerializedManifestWriter};
pub use record::{MemoryRecord, Source};
pub use repository::{MemoryRepository, RepositoryError, SearchScope};
pub use table::{cosine_distance, TableError, VectorTable};
