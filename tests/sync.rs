//! Reverse-path scenarios: empty round-trip, rename propagation, blocked
//! delete, nested structural add, handler modification.

mod helpers;

use helpers::{EVENT_CONFIG, EVENT_HANDLERS, MINIMAL_CONFIG, Project, patch_file, remove_span};

use extgen::sync::{AutoApprove, SyncCoordinator, SyncOptions, SyncStatus};

fn run_sync(project: &Project, snapshot_dir: &std::path::Path, export: &std::path::Path) -> extgen::sync::SyncReport {
    let mut resolver = AutoApprove;
    let mut coordinator = SyncCoordinator {
        snapshot_dir: snapshot_dir.to_path_buf(),
        modified_xml: export.join("MyProc.xml"),
        config_path: project.config_path.clone(),
        handlers_path: project.handlers_path.clone(),
        options: SyncOptions {
            auto_approve: true,
            force: false,
        },
        resolver: &mut resolver,
    };
    coordinator.run()
}

#[test]
fn untouched_export_syncs_to_an_empty_change_set() {
    let project = Project::new(MINIMAL_CONFIG, None);
    let outcome = project.generate();
    let export = project.export_copy("MyProc");

    let config_before = project.config_text();
    let report = run_sync(&project, outcome.snapshot_dir.as_ref().unwrap(), &export);

    assert_eq!(report.status, SyncStatus::Success);
    assert_eq!(report.changes_applied.yaml_updates, 0);
    assert_eq!(report.changes_applied.structural_updates, 0);
    assert_eq!(report.changes_applied.handler_updates, 0);
    assert!(report.backup_dir.is_none(), "no backup without changes");
    assert_eq!(project.config_text(), config_before);
}

#[test]
fn attribute_rename_propagates_to_config_and_bindings() {
    let project = Project::new(MINIMAL_CONFIG, None);
    let outcome = project.generate();
    let export = project.export_copy("MyProc");

    patch_file(
        &export.join("MyProc.xml"),
        "<Name>Note</Name>",
        "<Name>Comment</Name>",
    );

    let comments_before = extgen::ydoc::parse(&project.config_text())
        .unwrap()
        .comments();

    let report = run_sync(&project, outcome.snapshot_dir.as_ref().unwrap(), &export);
    assert_eq!(report.status, SyncStatus::Success, "{report:?}");
    assert_eq!(report.changes_applied.yaml_updates, 2, "{report:?}");
    assert_eq!(report.changes_applied.structural_updates, 0);
    assert!(report.backup_dir.is_some());

    let config = project.config_text();
    assert!(config.contains("- name: Comment"), "{config}");
    assert!(config.contains("attribute: Comment"), "{config}");
    assert!(!config.contains("- name: Note"), "{config}");

    // every comment survives at its anchor
    let comments_after = extgen::ydoc::parse(&config).unwrap().comments();
    assert_eq!(comments_before, comments_after);

    // the backup holds the pre-sync state
    let backup = std::path::PathBuf::from(report.backup_dir.unwrap());
    let backed_up = std::fs::read_to_string(backup.join("processor.yaml")).unwrap();
    assert!(backed_up.contains("name: Note"));
}

#[test]
fn referenced_attribute_delete_is_blocked_without_force() {
    let project = Project::new(MINIMAL_CONFIG, None);
    let outcome = project.generate();
    let export = project.export_copy("MyProc");

    // remove the attribute from the root descriptor, keep the bound field
    remove_span(&export.join("MyProc.xml"), "<Attribute", "</Attribute>");

    let report = run_sync(&project, outcome.snapshot_dir.as_ref().unwrap(), &export);
    assert_eq!(report.status, SyncStatus::Success, "{report:?}");
    assert_eq!(report.changes_applied.structural_updates, 0);
    assert!(
        report
            .details
            .iter()
            .any(|d| d.contains("conflict") && d.contains("NoteField")),
        "{:?}",
        report.details
    );
    // the declarative source still carries the attribute
    assert!(project.config_text().contains("- name: Note"));
}

#[test]
fn forced_delete_applies_and_enumerates_citations() {
    let project = Project::new(MINIMAL_CONFIG, None);
    let outcome = project.generate();
    let export = project.export_copy("MyProc");
    remove_span(&export.join("MyProc.xml"), "<Attribute", "</Attribute>");

    let mut resolver = AutoApprove;
    let mut coordinator = SyncCoordinator {
        snapshot_dir: outcome.snapshot_dir.clone().unwrap(),
        modified_xml: export.join("MyProc.xml"),
        config_path: project.config_path.clone(),
        handlers_path: project.handlers_path.clone(),
        options: SyncOptions {
            auto_approve: true,
            force: true,
        },
        resolver: &mut resolver,
    };
    let report = coordinator.run();
    assert_eq!(report.status, SyncStatus::Success, "{report:?}");
    assert_eq!(report.changes_applied.structural_updates, 1);
    assert!(
        report.details.iter().any(|d| d.contains("forced delete")),
        "{:?}",
        report.details
    );
    assert!(!project.config_text().contains("- name: Note"));
}

#[test]
fn nested_group_add_becomes_one_structural_patch() {
    let project = Project::new(MINIMAL_CONFIG, None);
    let outcome = project.generate();
    let export = project.export_copy("MyProc");

    patch_file(
        &export.join("MyProc/Forms/F/Ext/Form.xml"),
        "</InputField>\n</ChildItems>",
        "</InputField>\n<ButtonGroup name=\"BG\" id=\"90\">\n<ChildItems>\n\
         <Button name=\"B1\" id=\"91\"/>\n<Button name=\"B2\" id=\"93\"/>\n\
         </ChildItems>\n</ButtonGroup>\n</ChildItems>",
    );

    let report = run_sync(&project, outcome.snapshot_dir.as_ref().unwrap(), &export);
    assert_eq!(report.status, SyncStatus::Success, "{report:?}");
    assert_eq!(
        report.changes_applied.structural_updates, 1,
        "children ride inside the group's patch: {report:?}"
    );

    let doc = extgen::ydoc::parse(&project.config_text()).unwrap();
    let path = extgen::ydoc::Path::parse("forms[0].elements[1]").unwrap();
    let group = extgen::ydoc::resolve(&doc.body, &path).expect("inserted group");
    assert_eq!(group.name(), Some("BG"));
    let children = group
        .as_mapping()
        .unwrap()
        .get("child_items")
        .unwrap()
        .as_sequence()
        .unwrap();
    assert_eq!(children.items.len(), 2);
    assert_eq!(children.items[0].value.name(), Some("B1"));
}

#[test]
fn handler_body_modification_round_trips() {
    let project = Project::new(EVENT_CONFIG, Some(EVENT_HANDLERS));
    let outcome = project.generate();
    let export = project.export_copy("MyProc");

    patch_file(
        &export.join("MyProc/Forms/F/Ext/Form/Module.bsl"),
        "A = 1;",
        "A = 2;",
    );

    let names_before: Vec<String> = extgen::handlers::split_source(
        &std::fs::read_to_string(&project.handlers_path).unwrap(),
    )
    .procedures
    .keys()
    .cloned()
    .collect();

    let report = run_sync(&project, outcome.snapshot_dir.as_ref().unwrap(), &export);
    assert_eq!(report.status, SyncStatus::Success, "{report:?}");
    assert_eq!(report.changes_applied.handler_updates, 1, "{report:?}");

    let patched = std::fs::read_to_string(&project.handlers_path).unwrap();
    assert!(patched.contains("A = 2;"));
    assert!(!patched.contains("A = 1;"));
    // the file still parses into the same procedure set
    let names_after: Vec<String> = extgen::handlers::split_source(&patched)
        .procedures
        .keys()
        .cloned()
        .collect();
    assert_eq!(names_before, names_after);
}

#[test]
fn quit_decision_aborts_before_any_mutation() {
    struct AlwaysQuit;
    impl extgen::sync::ConflictResolver for AlwaysQuit {
        fn resolve(&mut self, _preview: &str, _refs: &[String]) -> extgen::sync::Decision {
            extgen::sync::Decision::Quit
        }
    }

    let project = Project::new(MINIMAL_CONFIG, None);
    let outcome = project.generate();
    let export = project.export_copy("MyProc");
    patch_file(
        &export.join("MyProc.xml"),
        "<Name>Note</Name>",
        "<Name>Comment</Name>",
    );

    let config_before = project.config_text();
    let mut resolver = AlwaysQuit;
    let mut coordinator = SyncCoordinator {
        snapshot_dir: outcome.snapshot_dir.clone().unwrap(),
        modified_xml: export.join("MyProc.xml"),
        config_path: project.config_path.clone(),
        handlers_path: project.handlers_path.clone(),
        options: SyncOptions::default(),
        resolver: &mut resolver,
    };
    let report = coordinator.run();

    assert_eq!(report.status, SyncStatus::Cancelled);
    assert!(report.backup_dir.is_none());
    assert_eq!(project.config_text(), config_before);
    // no backup directory appeared next to the config
    let backups: Vec<_> = std::fs::read_dir(project.dir.path())
        .unwrap()
        .flatten()
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with(".sync_backup_")
        })
        .collect();
    assert!(backups.is_empty());
}
