use rusqlite::params;
use serde_json::{Map, Value};

use crate::error::LoadError;
use crate::graph::GraphStore;
use crate::graph::catalog::{GraphId, LabelKind};

use super::{DirectLoader, EdgeEntity, IntegrityMode, LoaderConfig, NodeEntity};

const GRAPH: &str = "g";

fn store() -> GraphStore {
    let store = GraphStore::open_in_memory().expect("open in-memory store");
    store.ensure_graph(GRAPH).expect("ensure graph");
    store
}

fn loader() -> DirectLoader {
    DirectLoader::default()
}

fn rejecting_loader() -> DirectLoader {
    DirectLoader::new(LoaderConfig {
        integrity: IntegrityMode::Reject,
        ..LoaderConfig::default()
    })
}

fn node(id: &str) -> NodeEntity {
    let mut properties = Map::new();
    properties.insert("name".to_string(), Value::String(format!("Node {id}")));
    NodeEntity {
        id: id.to_string(),
        properties,
    }
}

fn edge(id: &str, start: &str, end: &str) -> EdgeEntity {
    let mut properties = Map::new();
    properties.insert("weight".to_string(), Value::from(1));
    EdgeEntity {
        id: id.to_string(),
        start_id: start.to_string(),
        end_id: end.to_string(),
        properties,
    }
}

fn stored_graph_ids(store: &GraphStore, table: &str) -> Vec<GraphId> {
    let mut statement = store
        .conn
        .prepare(&format!("SELECT id FROM \"{table}\" ORDER BY id"))
        .expect("prepare");
    statement
        .query_map([], |row| row.get(0))
        .expect("query")
        .collect::<rusqlite::Result<Vec<GraphId>>>()
        .expect("collect")
}

fn stored_external_ids(store: &GraphStore, table: &str) -> Vec<String> {
    let mut statement = store
        .conn
        .prepare(&format!(
            "SELECT json_extract(properties, '$.id') FROM \"{table}\" ORDER BY id"
        ))
        .expect("prepare");
    statement
        .query_map([], |row| row.get(0))
        .expect("query")
        .collect::<rusqlite::Result<Vec<String>>>()
        .expect("collect")
}

fn person_graph_id(store: &GraphStore, external_id: &str) -> i64 {
    store
        .conn
        .query_row(
            "SELECT id FROM \"g.Person\" WHERE json_extract(properties, '$.id') = ?1",
            params![external_id],
            |row| row.get(0),
        )
        .expect("resolve person")
}

#[test]
fn reloading_a_batch_inserts_nothing_new() {
    let mut store = store();
    let loader = loader();
    loader
        .bootstrap_label(&mut store, GRAPH, "Person", LabelKind::Node)
        .expect("bootstrap");

    let batch = [node("a"), node("b"), node("c")];
    let first = loader
        .load_nodes(&mut store, GRAPH, "Person", &batch)
        .expect("first load");
    assert_eq!(first.staged, 3);
    assert_eq!(first.inserted, 3);
    assert_eq!(first.skipped, 0);

    let second = loader
        .load_nodes(&mut store, GRAPH, "Person", &batch)
        .expect("second load");
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 3);

    assert_eq!(store.count_nodes(GRAPH).expect("count"), 3);
    assert_eq!(
        stored_external_ids(&store, "g.Person"),
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );
}

#[test]
fn duplicate_ids_fail_the_whole_batch() {
    let mut store = store();
    let loader = loader();
    loader
        .bootstrap_label(&mut store, GRAPH, "Person", LabelKind::Node)
        .expect("bootstrap");

    let err = loader
        .load_nodes(&mut store, GRAPH, "Person", &[node("a"), node("b"), node("a")])
        .expect_err("duplicate batch");
    match err {
        LoadError::DuplicateExternalId { label, ids } => {
            assert_eq!(label, "Person");
            assert_eq!(ids, vec!["a".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    // not even the clean rows may land
    assert_eq!(store.count_nodes(GRAPH).expect("count"), 0);
}

#[test]
fn orphaned_endpoints_fail_the_whole_batch() {
    let mut store = store();
    let loader = loader();
    loader
        .bootstrap_label(&mut store, GRAPH, "Person", LabelKind::Node)
        .expect("bootstrap nodes");
    loader
        .load_nodes(&mut store, GRAPH, "Person", &[node("a"), node("b")])
        .expect("load nodes");
    loader
        .bootstrap_label(&mut store, GRAPH, "KNOWS", LabelKind::Edge)
        .expect("bootstrap edges");

    let err = loader
        .load_edges(
            &mut store,
            GRAPH,
            "KNOWS",
            &[edge("k1", "a", "b"), edge("k2", "b", "zzz")],
            "Person",
            "Person",
        )
        .expect_err("orphan batch");
    match err {
        LoadError::OrphanedEndpoint { label, ids } => {
            assert_eq!(label, "KNOWS");
            assert_eq!(ids, vec!["zzz".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(store.count_edges(GRAPH).expect("count"), 0);
}

#[test]
fn composite_ids_stay_unique_and_increasing_across_batches() {
    let mut store = store();
    let loader = loader();
    loader
        .bootstrap_label(&mut store, GRAPH, "Person", LabelKind::Node)
        .expect("bootstrap");

    loader
        .load_nodes(&mut store, GRAPH, "Person", &[node("a"), node("b"), node("c")])
        .expect("first batch");
    let first = stored_graph_ids(&store, "g.Person");

    loader
        .load_nodes(&mut store, GRAPH, "Person", &[node("d"), node("e")])
        .expect("second batch");
    let all = stored_graph_ids(&store, "g.Person");

    assert_eq!(all.len(), 5);
    for pair in all.windows(2) {
        assert!(pair[0] < pair[1], "ids must be strictly increasing");
        assert_eq!(pair[0].label_tag(), pair[1].label_tag());
    }
    let first_max = first.iter().map(|id| id.sequence()).max().expect("max");
    let second_min = all[first.len()..]
        .iter()
        .map(|id| id.sequence())
        .min()
        .expect("min");
    assert!(first_max < second_min);
}

#[test]
fn skipped_rows_do_not_consume_counter_values() {
    let mut store = store();
    let loader = loader();
    loader
        .bootstrap_label(&mut store, GRAPH, "Person", LabelKind::Node)
        .expect("bootstrap");

    loader
        .load_nodes(&mut store, GRAPH, "Person", &[node("a"), node("b")])
        .expect("first batch");
    loader
        .load_nodes(
            &mut store,
            GRAPH,
            "Person",
            &[node("a"), node("b"), node("c"), node("d")],
        )
        .expect("overlapping batch");

    let sequences: Vec<i64> = stored_graph_ids(&store, "g.Person")
        .iter()
        .map(|id| id.sequence())
        .collect();
    // the bootstrap seed drew value 1; the four stored rows follow without
    // gaps because the two skipped rows never drew a value
    assert_eq!(sequences, vec![2, 3, 4, 5]);
}

#[test]
fn delimiter_bytes_in_properties_round_trip() {
    let mut store = store();
    let loader = loader();
    loader
        .bootstrap_label(&mut store, GRAPH, "Blob", LabelKind::Node)
        .expect("bootstrap");

    let payload = "tab\there, line\nbreak, back\\slash, and a \\t literal";
    let mut properties = Map::new();
    properties.insert("payload".to_string(), Value::String(payload.to_string()));
    let entity = NodeEntity {
        id: "blob-1".to_string(),
        properties,
    };

    loader
        .load_nodes(&mut store, GRAPH, "Blob", &[entity])
        .expect("load");

    let stored: String = store
        .conn
        .query_row(
            "SELECT json_extract(properties, '$.payload') FROM \"g.Blob\"",
            [],
            |row| row.get(0),
        )
        .expect("read back");
    assert_eq!(stored, payload);
}

#[test]
fn person_knows_scenario_resolves_endpoints() {
    let mut store = store();
    let loader = loader();

    loader
        .bootstrap_label(&mut store, GRAPH, "Person", LabelKind::Node)
        .expect("bootstrap Person");
    let nodes = [node("a"), node("b"), node("c")];
    let report = loader
        .load_nodes(&mut store, GRAPH, "Person", &nodes)
        .expect("load nodes");
    assert_eq!(report.inserted, 3);

    loader
        .bootstrap_label(&mut store, GRAPH, "KNOWS", LabelKind::Edge)
        .expect("bootstrap KNOWS");
    let report = loader
        .load_edges(
            &mut store,
            GRAPH,
            "KNOWS",
            &[edge("k1", "a", "b"), edge("k2", "b", "c")],
            "Person",
            "Person",
        )
        .expect("load edges");
    assert_eq!(report.inserted, 2);

    assert_eq!(store.count_nodes(GRAPH).expect("count nodes"), 3);
    assert_eq!(store.count_edges(GRAPH).expect("count edges"), 2);

    let mut statement = store
        .conn
        .prepare("SELECT start_id, end_id FROM \"g.KNOWS\" ORDER BY id")
        .expect("prepare");
    let endpoints = statement
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))
        .expect("query")
        .collect::<rusqlite::Result<Vec<_>>>()
        .expect("collect");
    drop(statement);
    assert_eq!(
        endpoints,
        vec![
            (person_graph_id(&store, "a"), person_graph_id(&store, "b")),
            (person_graph_id(&store, "b"), person_graph_id(&store, "c")),
        ]
    );

    let resubmit = loader
        .load_nodes(&mut store, GRAPH, "Person", &nodes)
        .expect("resubmit");
    assert_eq!(resubmit.inserted, 0);
    assert_eq!(resubmit.skipped, 3);
    assert_eq!(store.count_nodes(GRAPH).expect("count nodes"), 3);
}

#[test]
fn unbootstrapped_label_is_refused() {
    let mut store = store();
    let loader = loader();

    let err = loader
        .load_nodes(&mut store, GRAPH, "Person", &[node("a")])
        .expect_err("missing label");
    assert!(matches!(err, LoadError::LabelNotBootstrapped(label) if label == "Person"));
}

#[test]
fn missing_endpoint_label_is_refused() {
    let mut store = store();
    let loader = loader();
    loader
        .bootstrap_label(&mut store, GRAPH, "KNOWS", LabelKind::Edge)
        .expect("bootstrap edges");

    let err = loader
        .load_edges(
            &mut store,
            GRAPH,
            "KNOWS",
            &[edge("k1", "a", "b")],
            "Person",
            "Person",
        )
        .expect_err("missing endpoint label");
    assert!(matches!(err, LoadError::LabelNotBootstrapped(label) if label == "Person"));
}

#[test]
fn unknown_graph_is_refused() {
    let mut store = store();
    let loader = loader();

    let err = loader
        .load_nodes(&mut store, "elsewhere", "Person", &[node("a")])
        .expect_err("unknown graph");
    assert!(matches!(err, LoadError::GraphNotFound(graph) if graph == "elsewhere"));
}

#[test]
fn batch_limit_is_enforced_before_any_store_work() {
    let mut store = store();
    let loader = DirectLoader::new(LoaderConfig {
        batch_limit: Some(2),
        ..LoaderConfig::default()
    });

    let err = loader
        .load_nodes(&mut store, GRAPH, "Person", &[node("a"), node("b"), node("c")])
        .expect_err("over limit");
    assert!(matches!(err, LoadError::BatchTooLarge { len: 3, limit: 2 }));
}

#[test]
fn hostile_label_names_are_rejected() {
    let mut store = store();
    let loader = loader();

    for label in [
        "Person\"; DROP TABLE graph_catalog; --",
        "Person name",
        "1Person",
        "",
    ] {
        let err = loader
            .load_nodes(&mut store, GRAPH, label, &[node("a")])
            .expect_err("hostile label");
        assert!(matches!(err, LoadError::InvalidIdentifier { .. }));
    }
}

#[test]
fn overlong_label_names_are_rejected() {
    let mut store = store();
    let loader = loader();

    let label = "L".repeat(64);
    let err = loader
        .load_nodes(&mut store, GRAPH, &label, &[node("a")])
        .expect_err("overlong label");
    assert!(matches!(err, LoadError::InvalidIdentifier { .. }));
}

#[test]
fn bootstrap_is_idempotent_and_leaves_no_rows() {
    let mut store = store();
    let loader = loader();

    let first = loader
        .bootstrap_label(&mut store, GRAPH, "Person", LabelKind::Node)
        .expect("first bootstrap");
    assert!(first.created);
    assert_eq!(store.label_rows(GRAPH, "Person").expect("rows"), 0);

    let second = loader
        .bootstrap_label(&mut store, GRAPH, "Person", LabelKind::Node)
        .expect("second bootstrap");
    assert!(!second.created);
    assert_eq!(first.tag, second.tag);

    let edge_label = loader
        .bootstrap_label(&mut store, GRAPH, "KNOWS", LabelKind::Edge)
        .expect("edge bootstrap");
    assert!(edge_label.created);
    assert_eq!(store.label_rows(GRAPH, "KNOWS").expect("rows"), 0);
}

#[test]
fn bootstrap_kind_clash_is_an_error() {
    let mut store = store();
    let loader = loader();
    loader
        .bootstrap_label(&mut store, GRAPH, "Person", LabelKind::Node)
        .expect("bootstrap");

    let err = loader
        .bootstrap_label(&mut store, GRAPH, "Person", LabelKind::Edge)
        .expect_err("kind clash");
    assert!(matches!(err, LoadError::KindMismatch { .. }));
}

#[test]
fn loading_nodes_into_an_edge_label_is_refused() {
    let mut store = store();
    let loader = loader();
    loader
        .bootstrap_label(&mut store, GRAPH, "KNOWS", LabelKind::Edge)
        .expect("bootstrap");

    let err = loader
        .load_nodes(&mut store, GRAPH, "KNOWS", &[node("a")])
        .expect_err("wrong kind");
    assert!(matches!(err, LoadError::KindMismatch { .. }));
}

#[test]
fn reject_mode_drops_duplicates_and_keeps_survivors() {
    let mut store = store();
    let loader = rejecting_loader();
    loader
        .bootstrap_label(&mut store, GRAPH, "Person", LabelKind::Node)
        .expect("bootstrap");

    let report = loader
        .load_nodes(&mut store, GRAPH, "Person", &[node("a"), node("b"), node("a")])
        .expect("reject load");
    assert_eq!(report.staged, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.rejected, vec!["a".to_string()]);
    assert_eq!(stored_external_ids(&store, "g.Person"), vec!["b".to_string()]);
}

#[test]
fn reject_mode_drops_orphans_and_keeps_survivors() {
    let mut store = store();
    let loader = rejecting_loader();
    loader
        .bootstrap_label(&mut store, GRAPH, "Person", LabelKind::Node)
        .expect("bootstrap nodes");
    loader
        .load_nodes(&mut store, GRAPH, "Person", &[node("a"), node("b")])
        .expect("load nodes");
    loader
        .bootstrap_label(&mut store, GRAPH, "KNOWS", LabelKind::Edge)
        .expect("bootstrap edges");

    let report = loader
        .load_edges(
            &mut store,
            GRAPH,
            "KNOWS",
            &[edge("k1", "a", "b"), edge("k2", "a", "zzz")],
            "Person",
            "Person",
        )
        .expect("reject load");
    assert_eq!(report.staged, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.rejected, vec!["k2".to_string()]);
    assert_eq!(store.count_edges(GRAPH).expect("count"), 1);
}

#[test]
fn empty_batches_are_a_no_op() {
    let mut store = store();
    let loader = loader();

    let report = loader
        .load_nodes(&mut store, GRAPH, "Person", &[])
        .expect("empty load");
    assert_eq!(report.staged, 0);
    assert_eq!(report.inserted, 0);
    assert_eq!(report.skipped, 0);
    assert!(report.rejected.is_empty());
}
