//! Annotation stores
//!
//! The codebook lives in an annotation service. `AnnotationStore` is the
//! seam every manager talks through; `SqliteStore` keeps a local copy on
//! disk and `MemoryStore` backs tests and scratch sessions.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AnnotationFilter, AnnotationStore, OpenStore, StoreError, StoreResult};
