//! Direct bulk loading: batches are moved into a transient holding area with
//! the store's bulk-load entry point, filtered set-wise against the target
//! tables, and inserted with freshly assigned composite identifiers, all
//! inside one transaction per load call.

use std::collections::HashSet;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{LoadError, Result};
use crate::graph::GraphStore;
use crate::graph::catalog::{self, GraphId, LabelKind};
use crate::graph::create;
use crate::ident;

mod edges;
mod nodes;
mod staging;
#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityMode {
    /// Duplicate ids or unresolved endpoints fail the whole batch.
    Abort,
    /// Offending rows are dropped and reported; survivors commit.
    Reject,
}

impl IntegrityMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Upper bound on rows per load call; `None` accepts any batch size.
    pub batch_limit: Option<usize>,
    /// Name prefix for holding-area tables.
    pub staging_prefix: String,
    /// Allow-list for label names. Every label is matched against this before
    /// it is interpolated into a generated statement.
    pub label_pattern: Regex,
    pub integrity: IntegrityMode,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_limit: None,
            staging_prefix: "_staging".to_string(),
            label_pattern: ident::default_pattern().clone(),
            integrity: IntegrityMode::Abort,
        }
    }
}

/// One node candidate. The external id must be unique within its label.
#[derive(Debug, Clone)]
pub struct NodeEntity {
    pub id: String,
    pub properties: Map<String, Value>,
}

/// One edge candidate. Endpoint ids are external ids of already-committed
/// nodes under the labels named in the load call.
#[derive(Debug, Clone)]
pub struct EdgeEntity {
    pub id: String,
    pub start_id: String,
    pub end_id: String,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Rows that reached the holding area.
    pub staged: usize,
    /// Rows inserted with fresh composite identifiers.
    pub inserted: usize,
    /// Rows whose external id was already stored (idempotent re-load).
    pub skipped: usize,
    /// External ids dropped in reject mode; empty in abort mode.
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub created: bool,
    pub tag: i64,
}

pub struct DirectLoader {
    config: LoaderConfig,
}

impl DirectLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Ensures the label's storage table, tag and counter exist, creating
    /// them through the store's native path if needed. Idempotent; a failed
    /// load never un-bootstraps a label.
    pub fn bootstrap_label(
        &self,
        store: &mut GraphStore,
        graph: &str,
        label: &str,
        kind: LabelKind,
    ) -> Result<BootstrapOutcome> {
        ident::validate_graph_name(graph)?;
        ident::validate(&self.config.label_pattern, "label", label)?;

        let tx = store.conn.transaction()?;
        let graph_id = catalog::graph_id(&tx, graph)?
            .ok_or_else(|| LoadError::GraphNotFound(graph.to_string()))?;

        if let Some(info) = catalog::lookup_label(&tx, graph_id, label)? {
            if info.kind != kind {
                return Err(LoadError::KindMismatch {
                    label: label.to_string(),
                    expected: kind,
                    actual: info.kind,
                });
            }
            return Ok(BootstrapOutcome {
                created: false,
                tag: info.tag,
            });
        }

        let outcome =
            seed_label(&tx, graph_id, graph, label, kind).map_err(|source| LoadError::Bootstrap {
                label: label.to_string(),
                source: Box::new(source),
            })?;
        tx.commit()?;
        Ok(outcome)
    }

    pub fn load_nodes(
        &self,
        store: &mut GraphStore,
        graph: &str,
        label: &str,
        batch: &[NodeEntity],
    ) -> Result<LoadReport> {
        nodes::load_nodes(&self.config, store, graph, label, batch)
    }

    pub fn load_edges(
        &self,
        store: &mut GraphStore,
        graph: &str,
        label: &str,
        batch: &[EdgeEntity],
        source_label: &str,
        target_label: &str,
    ) -> Result<LoadReport> {
        edges::load_edges(
            &self.config,
            store,
            graph,
            label,
            batch,
            source_label,
            target_label,
        )
    }
}

impl Default for DirectLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

/// Creates one seed entity through the native path to force lazy table
/// materialization and tag/counter assignment, then removes the seed row.
/// The seed's drawn counter value stays consumed.
fn seed_label(
    conn: &rusqlite::Connection,
    graph_id: i64,
    graph: &str,
    label: &str,
    kind: LabelKind,
) -> Result<BootstrapOutcome> {
    let seed = Map::new();
    let id = match kind {
        LabelKind::Node => create::create_node(conn, graph_id, graph, label, &seed)?,
        // Endpoint identifiers of the seed edge resolve to nothing; the store
        // keeps no foreign keys and the row is gone before commit.
        LabelKind::Edge => create::create_edge(
            conn,
            graph_id,
            graph,
            label,
            GraphId::compose(0, 0),
            GraphId::compose(0, 0),
            &seed,
        )?,
    };
    let info = catalog::lookup_label(conn, graph_id, label)?
        .ok_or_else(|| LoadError::LabelNotBootstrapped(label.to_string()))?;
    create::delete_entity(conn, &info.table_name, id)?;
    Ok(BootstrapOutcome {
        created: true,
        tag: info.tag,
    })
}

/// External ids that occur more than once, in first-occurrence order.
pub(crate) fn duplicate_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for id in ids {
        if !seen.insert(id) && !duplicates.iter().any(|d| d == id) {
            duplicates.push(id.to_string());
        }
    }
    duplicates
}

pub(crate) fn enforce_batch_limit(config: &LoaderConfig, len: usize) -> Result<()> {
    if let Some(limit) = config.batch_limit {
        if len > limit {
            return Err(LoadError::BatchTooLarge { len, limit });
        }
    }
    Ok(())
}
