use std::collections::BTreeSet;

use rusqlite::{Connection, params};

use crate::error::{LoadError, Result};
use crate::graph::GraphStore;
use crate::graph::catalog::{self, LabelInfo, LabelKind, quoted};
use crate::ident;

use super::{EdgeEntity, IntegrityMode, LoadReport, LoaderConfig, staging};

pub(crate) fn load_edges(
    config: &LoaderConfig,
    store: &mut GraphStore,
    graph: &str,
    label: &str,
    batch: &[EdgeEntity],
    source_label: &str,
    target_label: &str,
) -> Result<LoadReport> {
    ident::validate_graph_name(graph)?;
    ident::validate(&config.label_pattern, "label", label)?;
    ident::validate(&config.label_pattern, "source label", source_label)?;
    ident::validate(&config.label_pattern, "target label", target_label)?;
    let staging_table = staging::edge_table(config);
    ident::validate(ident::default_pattern(), "staging table name", &staging_table)?;
    super::enforce_batch_limit(config, batch.len())?;

    if batch.is_empty() {
        return Ok(LoadReport::default());
    }

    let mut rejected = Vec::new();
    let mut rows: Vec<&EdgeEntity> = batch.iter().collect();
    let duplicates = super::duplicate_ids(batch.iter().map(|e| e.id.as_str()));
    if !duplicates.is_empty() {
        match config.integrity {
            IntegrityMode::Abort => {
                return Err(LoadError::DuplicateExternalId {
                    label: label.to_string(),
                    ids: duplicates,
                });
            }
            IntegrityMode::Reject => {
                rows.retain(|e| !duplicates.contains(&e.id));
                rejected = duplicates;
            }
        }
    }

    let tx = store.conn.transaction()?;
    let graph_id =
        catalog::graph_id(&tx, graph)?.ok_or_else(|| LoadError::GraphNotFound(graph.to_string()))?;
    let info = require_label(&tx, graph_id, label, LabelKind::Edge)?;
    let source = require_label(&tx, graph_id, source_label, LabelKind::Node)?;
    let target = require_label(&tx, graph_id, target_label, LabelKind::Node)?;

    staging::create_edge_staging(&tx, &staging_table)?;
    let staged = staging::stage_edges(&tx, &staging_table, &rows)?;

    let table = quoted(&info.table_name);
    let staging_ref = quoted(&staging_table);

    // Two separate resolution passes keep the join per endpoint table.
    tx.execute(
        &format!(
            "UPDATE {staging_ref} AS s
             SET start_gid = v.id
             FROM {} AS v
             WHERE json_extract(v.properties, '$.id') = s.start_id",
            quoted(&source.table_name)
        ),
        [],
    )?;
    tx.execute(
        &format!(
            "UPDATE {staging_ref} AS s
             SET end_gid = v.id
             FROM {} AS v
             WHERE json_extract(v.properties, '$.id') = s.end_id",
            quoted(&target.table_name)
        ),
        [],
    )?;

    let (orphan_rows, missing) = unresolved_endpoints(&tx, &staging_ref)?;
    if !orphan_rows.is_empty() {
        match config.integrity {
            IntegrityMode::Abort => {
                return Err(LoadError::OrphanedEndpoint {
                    label: label.to_string(),
                    ids: missing.into_iter().collect(),
                });
            }
            IntegrityMode::Reject => {
                tx.execute(
                    &format!(
                        "DELETE FROM {staging_ref}
                         WHERE start_gid IS NULL OR end_gid IS NULL"
                    ),
                    [],
                )?;
                rejected.extend(orphan_rows);
            }
        }
    }

    let skipped: i64 = tx.query_row(
        &format!(
            "SELECT COUNT(*) FROM {staging_ref} AS s
             WHERE EXISTS (
               SELECT 1 FROM {table} AS e
               WHERE json_extract(e.properties, '$.id') = s.id
             )"
        ),
        [],
        |row| row.get(0),
    )?;

    let base = catalog::sequence_base(&tx, &info.seq_name)?;
    let inserted = tx.execute(
        &format!(
            "INSERT INTO {table} (id, start_id, end_id, properties)
             SELECT graph_id(?1, ?2 + ROW_NUMBER() OVER ()), s.start_gid, s.end_gid, s.properties
             FROM {staging_ref} AS s
             WHERE NOT EXISTS (
               SELECT 1 FROM {table} AS e
               WHERE json_extract(e.properties, '$.id') = s.id
             )"
        ),
        params![info.tag, base],
    )?;
    catalog::advance_sequence(&tx, &info.seq_name, inserted as i64)?;

    staging::drop_staging(&tx, &staging_table)?;
    tx.commit()?;

    Ok(LoadReport {
        staged,
        inserted,
        skipped: skipped as usize,
        rejected,
    })
}

fn require_label(
    conn: &Connection,
    graph_id: i64,
    label: &str,
    kind: LabelKind,
) -> Result<LabelInfo> {
    let info = catalog::lookup_label(conn, graph_id, label)?
        .ok_or_else(|| LoadError::LabelNotBootstrapped(label.to_string()))?;
    if info.kind != kind {
        return Err(LoadError::KindMismatch {
            label: label.to_string(),
            expected: kind,
            actual: info.kind,
        });
    }
    Ok(info)
}

/// Edge ids of rows with an unresolved endpoint, plus the endpoint ids that
/// failed to resolve.
fn unresolved_endpoints(
    conn: &Connection,
    staging_ref: &str,
) -> Result<(Vec<String>, BTreeSet<String>)> {
    let mut statement = conn.prepare(&format!(
        "SELECT id, start_id, end_id, start_gid IS NULL, end_gid IS NULL
         FROM {staging_ref}
         WHERE start_gid IS NULL OR end_gid IS NULL"
    ))?;
    let mut rows = statement.query([])?;

    let mut orphan_rows = Vec::new();
    let mut missing = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let edge_id: String = row.get(0)?;
        let start_id: String = row.get(1)?;
        let end_id: String = row.get(2)?;
        let start_missing: bool = row.get(3)?;
        let end_missing: bool = row.get(4)?;
        if start_missing {
            missing.insert(start_id);
        }
        if end_missing {
            missing.insert(end_id);
        }
        orphan_rows.push(edge_id);
    }
    Ok((orphan_rows, missing))
}
