//! Codebook: classification schemes for collaborative literature reviews
//!
//! Reviewers highlight passages of papers and classify them with codes from
//! a shared codebook. The codebook itself lives in an annotation store as
//! plain annotations; this crate rebuilds the code tree from those records,
//! keeps it colored, persists edits back, re-anchors highlights in changed
//! documents and measures how far coders agree.
//!
//! # Core Concepts
//!
//! - **Scheme**: the forest of codes; top-level codes are facets with a hue
//!   of their own, descendants share it at increasing opacity
//! - **Records**: code, linking, classifying and assessing annotations
//! - **Anchoring**: redundant selectors that survive document changes
//! - **Consensus**: per-document, per-facet agreement between coders
//!
//! # Example
//!
//! ```
//! use codebook::{ClassificationScheme, CodeId, Code};
//!
//! let mut scheme = ClassificationScheme::default();
//! scheme.insert_code(Code::new(CodeId::from("1"), "Method"), None);
//! scheme.insert_code(Code::new(CodeId::from("2"), "Qualitative"), Some(&CodeId::from("1")));
//!
//! let method = scheme.get(&CodeId::from("1")).unwrap();
//! let qualitative = scheme.get(&CodeId::from("2")).unwrap();
//! assert!(qualitative.element.color.a > method.element.color.a);
//! ```

pub mod anchor;
pub mod annotation;
pub mod codebook;
pub mod coding;
pub mod config;
pub mod context;
pub mod schedule;
pub mod scheme;
pub mod store;

pub use anchor::{describe, resolve, AnchorError, Document, DocumentKind, TextRange};
pub use annotation::{Annotation, Motivation, Selector};
pub use codebook::{CodebookError, CodebookManager, CodebookResult, PendingSync, SyncReport};
pub use coding::{aggregate, consensus, CodingManager, Codings, SheetMirror, SlotStatus};
pub use config::{Config, ConfigError};
pub use context::AppContext;
pub use schedule::CancellationToken;
pub use scheme::{
    ClassificationScheme, Code, CodeId, ColorSettings, HuePalette, MoveOutcome, Palette, Rgba,
};
pub use store::{
    AnnotationFilter, AnnotationStore, MemoryStore, OpenStore, SqliteStore, StoreError,
    StoreResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
