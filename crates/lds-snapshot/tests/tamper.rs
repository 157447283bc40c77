//! End-to-end snapshot tests: seal, store on disk, read back, verify.

use lds_core::{Node, NodeType, Uri};
use lds_snapshot::{
    Blake3Checksum, FileSnapshotStore, Snapshot, SnapshotError, SnapshotStore,
};

fn registry() -> Node {
    Node::new(Uri::parse("A").unwrap(), NodeType::Authority).with_child(
        Node::new(Uri::parse("A/E1").unwrap(), NodeType::Entity)
            .with_property("color", "red")
            .with_ttl(0),
    )
}

#[test]
fn stored_snapshot_verifies_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path()).unwrap();

    let sealed = Snapshot::seal(registry(), &Blake3Checksum).unwrap();
    store.save("registry", &sealed.encode().unwrap()).unwrap();

    let text = store.load("registry").unwrap().unwrap();
    let restored = Snapshot::decode(&text, &Blake3Checksum).unwrap();
    assert_eq!(restored.graph, registry());
}

#[test]
fn edited_file_fails_integrity_check() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path()).unwrap();

    let sealed = Snapshot::seal(registry(), &Blake3Checksum).unwrap();
    store.save("registry", &sealed.encode().unwrap()).unwrap();

    let path = store.snapshot_path("registry").unwrap();
    let edited = std::fs::read_to_string(&path)
        .unwrap()
        .replace("\"red\"", "\"blue\"");
    std::fs::write(&path, edited).unwrap();

    let text = store.load("registry").unwrap().unwrap();
    assert!(matches!(
        Snapshot::decode(&text, &Blake3Checksum),
        Err(SnapshotError::IntegrityViolation { .. })
    ));
}

#[test]
fn truncated_file_fails_to_parse() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path()).unwrap();

    let text = Snapshot::seal(registry(), &Blake3Checksum)
        .unwrap()
        .encode()
        .unwrap();
    store.save("registry", &text[..text.len() / 2]).unwrap();

    let text = store.load("registry").unwrap().unwrap();
    assert!(matches!(
        Snapshot::decode(&text, &Blake3Checksum),
        Err(SnapshotError::Serialization(_))
    ));
}
