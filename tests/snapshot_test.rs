//! Snapshot loading and the full compare pipeline over snapshot files

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use treemerge::application::services::MergeService;
use treemerge::application::MatchOptions;
use treemerge::config::Settings;
use treemerge::domain::{EntityId, EntityKind};
use treemerge::infrastructure::di::ServiceContainer;
use treemerge::infrastructure::traits::{NoProgress, RealFileSystem};
use treemerge::infrastructure::{InfraError, ProjectLoader, TomlProjectLoader};
use treemerge::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

const LEFT: &str = r#"
name = "stack-a"

[[entity]]
id = 1
kind = "treeline"
title = "axon"
[[entity.node]]
x = 0.0
y = 0.0
tags = ["soma"]
[[entity.node]]
x = 1.0
y = 0.0
parent = 0
[[entity.node]]
x = 2.0
y = 0.0
parent = 1

[[entity]]
id = 2
kind = "areatree"
title = "membrane"
[[entity.node]]
x = 50.0
y = 50.0

[[entity]]
id = 3
kind = "treeline"
title = "stub"
"#;

const RIGHT: &str = r#"
name = "stack-b"

[[entity]]
id = 11
kind = "treeline"
title = "axon"
transform = [1.0, 0.0, 0.0, 1.0, 10.0, 0.0]
[[entity.node]]
x = -10.0
y = 0.0
tags = ["soma", "checked"]
[[entity.node]]
x = -9.0
y = 0.0
parent = 0
[[entity.node]]
x = -7.0
y = 0.0
parent = 1

[[entity]]
id = 12
kind = "connector"
title = "synapse"
[[entity.node]]
x = 3.0
y = 3.0

[[entity]]
id = 13
kind = "ball"
[[entity.node]]
x = 0.0
y = 0.0
"#;

fn write_snapshots(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let left = dir.join("a.toml");
    let right = dir.join("b.toml");
    fs::write(&left, LEFT).unwrap();
    fs::write(&right, RIGHT).unwrap();
    (left, right)
}

fn loader() -> TomlProjectLoader {
    TomlProjectLoader::new(Arc::new(RealFileSystem))
}

#[test]
fn given_snapshot_file_when_loading_then_entities_built() {
    let dir = TempDir::new().unwrap();
    let (left, _) = write_snapshots(dir.path());

    let project = loader().load(&left).unwrap();

    assert_eq!(project.name, "stack-a");
    assert_eq!(project.entities.len(), 3);
    assert_eq!(project.find(EntityId(1)).unwrap().node_count(), 3);
    assert!(project.find(EntityId(3)).unwrap().is_deletable());
}

#[test]
fn given_missing_file_when_loading_then_io_error() {
    let dir = TempDir::new().unwrap();

    let err = loader().load(&dir.path().join("absent.toml")).unwrap_err();

    assert!(matches!(err, InfraError::Io { .. }), "{err}");
}

#[test]
fn given_unknown_parent_when_loading_then_snapshot_entity_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        "[[entity]]\nid = 4\nkind = \"treeline\"\n[[entity.node]]\nx = 0.0\ny = 0.0\nparent = 9\n",
    )
    .unwrap();

    let err = loader().load(&path).unwrap_err();

    assert!(matches!(err, InfraError::SnapshotEntity { .. }), "{err}");
    assert!(err.to_string().contains("bad.toml"));
}

#[test]
fn given_two_snapshots_when_comparing_then_every_bucket_filled() {
    let dir = TempDir::new().unwrap();
    let (left, right) = write_snapshots(dir.path());
    let (p1, p2) = (loader().load(&left).unwrap(), loader().load(&right).unwrap());

    let result = MergeService::new(MatchOptions::default()).compare(&p1, &p2).unwrap();

    // axon: same world geometry, one node moved, soma tags differ, transform differs
    let change = result.primary(EntityId(1)).expect("axon matched");
    assert_eq!(change.right, EntityId(11));
    assert_eq!(change.common_nodes, 2);
    assert!(change.transform);
    assert!(!change.title);
    assert!(!change.root);
    assert_eq!(change.different_tags.len(), 1);
    assert_eq!(change.different_tags[0].to_string(), "[+]checked");
    assert_eq!(change.kind, EntityKind::Treeline);

    assert!(result.unmatched1.contains(&EntityId(2)));
    assert!(result.empty1.contains(&EntityId(3)));
    assert!(result.empty2.contains(&EntityId(12)));
    assert!(result.ignored2.contains(&EntityId(13)));
    assert!(result.unmatched2.is_empty());
    assert_eq!(result.summary().matched, 1);
}

#[test]
fn given_container_when_building_merge_service_then_settings_applied() {
    let mut settings = Settings::default();
    settings.matching.threads = 3;
    settings.matching.accepted_kinds = vec!["ball".to_string()];
    let fs = Arc::new(RealFileSystem);
    let container = ServiceContainer::with_deps(
        settings,
        fs.clone(),
        Arc::new(TomlProjectLoader::new(fs)),
        Arc::new(NoProgress),
    );

    let service = container.merge_service().unwrap();

    assert_eq!(service.options().threads, 3);
    assert_eq!(
        service.options().accepted.iter().copied().collect::<Vec<_>>(),
        vec![EntityKind::Ball]
    );
}
