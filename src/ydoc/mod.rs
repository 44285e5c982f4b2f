//! Comment-preserving YAML documents.
//!
//! The reverse path's whole value is round-tripping the declarative source
//! without disturbing comments, key order, or quoting style. A line-based
//! rewrite cannot do that — nested structural edits move comment anchors —
//! so this module keeps an AST in which every entry owns its comments.
//!
//! ```text
//! parse ──> Document { leading, body: YamlValue, trailing }
//!                         │
//!           patch: set / insert / delete_named (comment hoisting)
//!                         │
//! emit  <── stable re-rendering (2-space indent, dash offset 0)
//! ```

mod emit;
mod node;
mod parse;
mod patch;
mod path;

pub use emit::emit;
pub use node::{Document, MapEntry, Mapping, Scalar, ScalarStyle, SeqItem, Sequence, YamlValue};
pub use parse::{YdocError, parse};
pub use patch::{PatchError, delete_named, insert, set};
pub use path::{Path, PathError, Seg, resolve, resolve_mut};
