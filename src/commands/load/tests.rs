use std::fs;

use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::cli::IntegrityModeArg;

fn write_batch_file(dir: &TempDir) -> std::path::PathBuf {
    let input = dir.path().join("batch.json");
    let payload = json!({
        "nodes": [
            {"id": "a", "label": "Person", "properties": {"name": "Ada"}},
            {"id": "b", "label": "Person", "properties": {"name": "Brin"}},
            {"id": "c", "label": "Person", "properties": {"name": "Cleo"}}
        ],
        "edges": [
            {
                "id": "k1", "label": "KNOWS",
                "start_id": "a", "start_label": "Person",
                "end_id": "b", "end_label": "Person",
                "properties": {"weight": 1}
            },
            {
                "id": "k2", "label": "KNOWS",
                "start_id": "b", "start_label": "Person",
                "end_id": "c", "end_label": "Person",
                "properties": {"weight": 2}
            }
        ]
    });
    fs::write(&input, payload.to_string()).expect("write batch file");
    input
}

#[test]
fn load_command_round_trips_a_batch_file() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_batch_file(&dir);
    let manifest_path = dir.path().join("manifest.json");

    let args = LoadArgs {
        cache_root: dir.path().join("cache"),
        db_path: None,
        manifest_path: Some(manifest_path.clone()),
        graph: "main".to_string(),
        input,
        batch_size: None,
        integrity: IntegrityModeArg::Abort,
    };

    run(args.clone()).expect("first run");

    let db_path = dir.path().join("cache").join("graph.sqlite");
    {
        let store = GraphStore::open(&db_path).expect("open store");
        assert_eq!(store.count_nodes("main").expect("nodes"), 3);
        assert_eq!(store.count_edges("main").expect("edges"), 2);
    }
    assert!(manifest_path.exists());

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&manifest_path).expect("read manifest"))
            .expect("parse manifest");
    assert_eq!(manifest["status"], "completed");
    assert_eq!(manifest["counts"]["nodes_inserted"], 3);
    assert_eq!(manifest["counts"]["edges_inserted"], 2);

    // a second run over the same file only produces skips
    run(args).expect("second run");
    let store = GraphStore::open(&db_path).expect("reopen store");
    assert_eq!(store.count_nodes("main").expect("nodes"), 3);
    assert_eq!(store.count_edges("main").expect("edges"), 2);
}

#[test]
fn load_command_chunks_batches() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_batch_file(&dir);

    let args = LoadArgs {
        cache_root: dir.path().join("cache"),
        db_path: None,
        manifest_path: Some(dir.path().join("manifest.json")),
        graph: "main".to_string(),
        input,
        batch_size: Some(2),
        integrity: IntegrityModeArg::Abort,
    };
    run(args).expect("chunked run");

    let store = GraphStore::open(&dir.path().join("cache").join("graph.sqlite")).expect("open");
    assert_eq!(store.count_nodes("main").expect("nodes"), 3);
    assert_eq!(store.count_edges("main").expect("edges"), 2);
}

#[test]
fn file_level_duplicates_are_refused() {
    let batch_file = BatchFile {
        nodes: vec![
            NodeRecord {
                id: "a".to_string(),
                label: "Person".to_string(),
                properties: serde_json::Map::new(),
            },
            NodeRecord {
                id: "a".to_string(),
                label: "Person".to_string(),
                properties: serde_json::Map::new(),
            },
        ],
        edges: Vec::new(),
    };

    let err = check_file_duplicates(&batch_file).expect_err("duplicate ids");
    assert!(err.to_string().contains("duplicate node id 'a'"));
}

#[test]
fn chunks_cover_every_row() {
    let rows = [1, 2, 3, 4, 5];
    let sizes: Vec<usize> = chunks(&rows, Some(2)).map(<[i32]>::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);

    let sizes: Vec<usize> = chunks(&rows, None).map(<[i32]>::len).collect();
    assert_eq!(sizes, vec![5]);

    let empty: Vec<i32> = Vec::new();
    assert_eq!(chunks(&empty, Some(2)).count(), 0);
}
