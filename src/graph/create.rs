//! Native single-entity create path. This is the slow, per-row route into the
//! store; it is also the only route that materializes a label's storage table
//! and catalog metadata on first touch.

use rusqlite::{Connection, params};
use serde_json::{Map, Value};

use crate::error::{LoadError, Result};

use super::catalog::{self, GraphId, LabelInfo, LabelKind, quoted};

pub(crate) fn lookup_or_create_label(
    conn: &Connection,
    graph_id: i64,
    graph_name: &str,
    label: &str,
    kind: LabelKind,
) -> Result<LabelInfo> {
    if let Some(info) = catalog::lookup_label(conn, graph_id, label)? {
        if info.kind != kind {
            return Err(LoadError::KindMismatch {
                label: label.to_string(),
                expected: kind,
                actual: info.kind,
            });
        }
        return Ok(info);
    }
    catalog::create_label(conn, graph_id, graph_name, label, kind)
}

pub fn create_node(
    conn: &Connection,
    graph_id: i64,
    graph_name: &str,
    label: &str,
    properties: &Map<String, Value>,
) -> Result<GraphId> {
    let info = lookup_or_create_label(conn, graph_id, graph_name, label, LabelKind::Node)?;
    let seq = catalog::nextval(conn, &info.seq_name)?;
    let id = GraphId::compose(info.tag, seq);
    conn.execute(
        &format!(
            "INSERT INTO {} (id, properties) VALUES (?1, ?2)",
            quoted(&info.table_name)
        ),
        params![id, serde_json::to_string(properties)?],
    )?;
    Ok(id)
}

pub fn create_edge(
    conn: &Connection,
    graph_id: i64,
    graph_name: &str,
    label: &str,
    start: GraphId,
    end: GraphId,
    properties: &Map<String, Value>,
) -> Result<GraphId> {
    let info = lookup_or_create_label(conn, graph_id, graph_name, label, LabelKind::Edge)?;
    let seq = catalog::nextval(conn, &info.seq_name)?;
    let id = GraphId::compose(info.tag, seq);
    conn.execute(
        &format!(
            "INSERT INTO {} (id, start_id, end_id, properties) VALUES (?1, ?2, ?3, ?4)",
            quoted(&info.table_name)
        ),
        params![id, start, end, serde_json::to_string(properties)?],
    )?;
    Ok(id)
}

pub(crate) fn delete_entity(conn: &Connection, table_name: &str, id: GraphId) -> Result<usize> {
    let deleted = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1", quoted(table_name)),
        params![id],
    )?;
    Ok(deleted)
}
