use rusqlite::params;

use crate::error::{LoadError, Result};
use crate::graph::GraphStore;
use crate::graph::catalog::{self, LabelKind, quoted};
use crate::ident;

use super::{IntegrityMode, LoadReport, LoaderConfig, NodeEntity, staging};

pub(crate) fn load_nodes(
    config: &LoaderConfig,
    store: &mut GraphStore,
    graph: &str,
    label: &str,
    batch: &[NodeEntity],
) -> Result<LoadReport> {
    ident::validate_graph_name(graph)?;
    ident::validate(&config.label_pattern, "label", label)?;
    let staging_table = staging::node_table(config);
    ident::validate(ident::default_pattern(), "staging table name", &staging_table)?;
    super::enforce_batch_limit(config, batch.len())?;

    if batch.is_empty() {
        return Ok(LoadReport::default());
    }

    let mut rejected = Vec::new();
    let mut rows: Vec<&NodeEntity> = batch.iter().collect();
    let duplicates = super::duplicate_ids(batch.iter().map(|n| n.id.as_str()));
    if !duplicates.is_empty() {
        match config.integrity {
            IntegrityMode::Abort => {
                return Err(LoadError::DuplicateExternalId {
                    label: label.to_string(),
                    ids: duplicates,
                });
            }
            // No copy of a duplicated id is authoritative; drop them all.
            IntegrityMode::Reject => {
                rows.retain(|n| !duplicates.contains(&n.id));
                rejected = duplicates;
            }
        }
    }

    let tx = store.conn.transaction()?;
    let graph_id =
        catalog::graph_id(&tx, graph)?.ok_or_else(|| LoadError::GraphNotFound(graph.to_string()))?;
    let info = catalog::lookup_label(&tx, graph_id, label)?
        .ok_or_else(|| LoadError::LabelNotBootstrapped(label.to_string()))?;
    if info.kind != LabelKind::Node {
        return Err(LoadError::KindMismatch {
            label: label.to_string(),
            expected: LabelKind::Node,
            actual: info.kind,
        });
    }

    staging::create_node_staging(&tx, &staging_table)?;
    let staged = staging::stage_nodes(&tx, &staging_table, &rows)?;

    let table = quoted(&info.table_name);
    let staging_ref = quoted(&staging_table);

    let skipped: i64 = tx.query_row(
        &format!(
            "SELECT COUNT(*) FROM {staging_ref} AS s
             WHERE EXISTS (
               SELECT 1 FROM {table} AS t
               WHERE json_extract(t.properties, '$.id') = s.id
             )"
        ),
        [],
        |row| row.get(0),
    )?;

    // Counter values are assigned to surviving rows only, inside the insert
    // itself; rows skipped by the filter never consume one.
    let base = catalog::sequence_base(&tx, &info.seq_name)?;
    let inserted = tx.execute(
        &format!(
            "INSERT INTO {table} (id, properties)
             SELECT graph_id(?1, ?2 + ROW_NUMBER() OVER ()), s.properties
             FROM {staging_ref} AS s
             WHERE NOT EXISTS (
               SELECT 1 FROM {table} AS t
               WHERE json_extract(t.properties, '$.id') = s.id
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
