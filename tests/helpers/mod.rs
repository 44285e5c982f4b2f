//! Shared fixtures for the end-to-end scenarios.
//!
//! Each scenario binary uses a different slice of these helpers.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Minimal project: one string attribute, one form, one bound input field.
pub const MINIMAL_CONFIG: &str = r#"# Minimal processor
processor:
  name: MyProc
  synonym: "Мой процессор|Мій процесор|My processor"
attributes:
# The note text
- name: Note
  type: string
  length: 100
forms:
- name: F
  default: true
  elements:
  - type: InputField
    name: NoteField
    attribute: Note
"#;

/// Like the minimal project, plus a form event wired to a handler file.
pub const EVENT_CONFIG: &str = r#"processor:
  name: MyProc
attributes:
- name: Note
  type: string
  length: 100
forms:
- name: F
  default: true
  handlers_file: handlers.bsl
  events:
    OnOpen: FormOnOpen
  elements:
  - type: InputField
    name: NoteField
    attribute: Note
"#;

pub const EVENT_HANDLERS: &str = "\
Procedure FormOnOpen(Cancel)
\tA = 1;
EndProcedure
";

/// A scratch project directory with config (and optional handlers) on disk.
pub struct Project {
    pub dir: tempfile::TempDir,
    pub config_path: PathBuf,
    pub handlers_path: PathBuf,
    pub output_dir: PathBuf,
}

impl Project {
    pub fn new(config: &str, handlers: Option<&str>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config_path = dir.path().join("processor.yaml");
        std::fs::write(&config_path, config).expect("write config");
        let handlers_path = dir.path().join("handlers.bsl");
        if let Some(text) = handlers {
            std::fs::write(&handlers_path, text).expect("write handlers");
        }
        let output_dir = dir.path().join("out");
        std::fs::create_dir_all(&output_dir).expect("output dir");
        Self {
            dir,
            config_path,
            handlers_path,
            output_dir,
        }
    }

    pub fn generate(&self) -> extgen::GenerateOutcome {
        extgen::generate(&self.config_path, &self.output_dir).expect("generation")
    }

    /// Copy the emitted artifact tree into an `export/` directory that
    /// stands in for a platform round-trip the user then edited.
    pub fn export_copy(&self, processor_name: &str) -> PathBuf {
        let export = self.dir.path().join("export");
        copy_tree(&self.output_dir.join(processor_name), &export);
        export
    }

    pub fn config_text(&self) -> String {
        std::fs::read_to_string(&self.config_path).expect("read config")
    }
}

pub fn copy_tree(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).expect("create target");
    for entry in walkdir::WalkDir::new(from) {
        let entry = entry.expect("walk");
        let rel = entry.path().strip_prefix(from).expect("prefix");
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).expect("mkdir");
        } else {
            std::fs::copy(entry.path(), &target).expect("copy");
        }
    }
}

/// Edit a file in place with a textual replacement, asserting it matched.
pub fn patch_file(path: &Path, from: &str, to: &str) {
    let text = std::fs::read_to_string(path).expect("read");
    assert!(text.contains(from), "pattern {from:?} not found in {path:?}");
    std::fs::write(path, text.replace(from, to)).expect("write");
}

/// Remove the span between two markers, inclusive.
pub fn remove_span(path: &Path, start_marker: &str, end_marker: &str) {
    let text = std::fs::read_to_string(path).expect("read");
    let start = text.find(start_marker).expect("start marker");
    let end_rel = text[start..].find(end_marker).expect("end marker");
    let end = start + end_rel + end_marker.len();
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..start]);
    out.push_str(&text[end..]);
    std::fs::write(path, out).expect("write");
}
