//! # extgen-base
//!
//! Core library for compiling declarative data-processor descriptions into
//! platform artifact trees, and for reconciling edited exports back into
//! the declarative source.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! generator  → forward-path orchestration (load → weave → validate → emit)
//! sync       → reverse path (extract, diff, map, confirm, patch, report)
//!   ↓
//! emit       → id allocation, element preparation, artifact writing
//! snapshot   → post-emit ground truth for the reverse path
//!   ↓
//! config     → schema-validated YAML load, alias + element schema tables
//! handlers   → handler-language lexer, splitter, weaver, differ, patcher
//! validate   → model rules (naming, reservations, qualifiers, pictures)
//! ydoc       → comment-preserving YAML document (parse, patch, emit)
//!   ↓
//! model      → the processor data model
//! xmltree    → namespace-tolerant XML DOM over quick-xml
//! driver     → platform driver contract (consumed, never implemented)
//! ```

/// The processor data model: attributes, sections, forms, elements.
pub mod model;

/// Declarative source loading and normalization.
pub mod config;

/// Handler-language toolchain: split, weave, diff, patch.
pub mod handlers;

/// Model validation rules.
pub mod validate;

/// Id allocation, element preparation, module assembly, artifact writing.
pub mod emit;

/// Snapshot store: the reverse path's ground truth.
pub mod snapshot;

/// Comment-preserving YAML documents.
pub mod ydoc;

/// XML DOM for descriptor reading.
pub mod xmltree;

/// The reverse path: diff, map, confirm, patch, report.
pub mod sync;

/// Platform driver contract.
pub mod driver;

/// Forward-path orchestration.
pub mod generator;

mod error;
mod suggest;

pub use error::{Error, Result};
pub use generator::{GenerateOptions, GenerateOutcome, generate, generate_with_options};
pub use model::Processor;
pub use suggest::closest_match;
