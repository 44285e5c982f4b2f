//! The reverse path: reconcile a user-edited artifact export back into the
//! declarative source.
//!
//! ```text
//! (snapshot, modified export)
//!        │
//!        ├── extract + tree_diff      form element trees
//!        ├── scalar_diff              name-keyed collections
//!        └── handlers::diff           procedure identities
//!        │
//!        ▼
//!      mapper ──> Patch values ──> refs check ──> coordinator
//!                                       │             │
//!                                  citations      backup, apply
//!                                                 (ydoc + handler
//!                                                  patcher), rollback
//! ```

mod changes;
mod coordinator;
mod extract;
mod mapper;
mod refs;
mod report;
mod scalar_diff;
mod tree_diff;

pub use changes::{
    ChangeKind, ElementChange, EntityKind, Patch, ScalarPatch, StructuralOp, StructuralPatch,
};
pub use coordinator::{AutoApprove, ConflictResolver, Decision, SyncCoordinator, SyncOptions};
pub use extract::{ElementNode, extract_form_tree, find_path, flatten};
pub use mapper::ChangeMapper;
pub use refs::ReferenceChecker;
pub use report::{ChangesApplied, SyncReport, SyncStatus};
pub use scalar_diff::{DescriptorSet, detect_changes};
pub use tree_diff::{
    ModifiedEntry, MovedEntry, NodeRef, PropertyDelta, RenameEntry, TreeDelta, diff_trees,
};
