//! Holding-area lifecycle. Staging tables are TEMP tables created inside the
//! load transaction: dropped explicitly on success, undone by rollback on
//! failure, and gone with the connection in every other case.

use rusqlite::Connection;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::graph::copy::{self, CopyBuffer};

use super::{EdgeEntity, LoaderConfig, NodeEntity};

pub(crate) fn node_table(config: &LoaderConfig) -> String {
    format!("{}_nodes", config.staging_prefix)
}

pub(crate) fn edge_table(config: &LoaderConfig) -> String {
    format!("{}_edges", config.staging_prefix)
}

pub(crate) fn create_node_staging(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS \"{table}\";
         CREATE TEMP TABLE \"{table}\" (
           id TEXT NOT NULL,
           properties TEXT NOT NULL
         );"
    ))?;
    Ok(())
}

pub(crate) fn create_edge_staging(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS \"{table}\";
         CREATE TEMP TABLE \"{table}\" (
           id TEXT NOT NULL,
           start_id TEXT NOT NULL,
           end_id TEXT NOT NULL,
           start_gid INTEGER,
           end_gid INTEGER,
           properties TEXT NOT NULL
         );"
    ))?;
    Ok(())
}

pub(crate) fn drop_staging(conn: &Connection, table: &str) -> Result<()> {
    conn.execute(&format!("DROP TABLE IF EXISTS \"{table}\""), [])?;
    Ok(())
}

pub(crate) fn stage_nodes(conn: &Connection, table: &str, rows: &[&NodeEntity]) -> Result<usize> {
    let mut buffer = CopyBuffer::new();
    for row in rows {
        let payload = property_payload(&row.id, &row.properties)?;
        buffer.push_row(&[&row.id, &payload]);
    }
    copy::copy_into(conn, table, &["id", "properties"], buffer.payload())
}

pub(crate) fn stage_edges(conn: &Connection, table: &str, rows: &[&EdgeEntity]) -> Result<usize> {
    let mut buffer = CopyBuffer::new();
    for row in rows {
        let payload = property_payload(&row.id, &row.properties)?;
        buffer.push_row(&[&row.id, &row.start_id, &row.end_id, &payload]);
    }
    copy::copy_into(
        conn,
        table,
        &["id", "start_id", "end_id", "properties"],
        buffer.payload(),
    )
}

/// The stored property bag carries the external id under "id"; the caller's
/// value for that key is replaced.
fn property_payload(id: &str, properties: &Map<String, Value>) -> Result<String> {
    let mut bag = properties.clone();
    bag.insert("id".to_string(), Value::String(id.to_string()));
    Ok(serde_json::to_string(&bag)?)
}
