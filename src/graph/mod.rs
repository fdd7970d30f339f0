//! Embedded property-graph store: per-label storage tables plus a catalog of
//! labels, tags and counters. The loader only touches storage through the
//! primitives exposed here.

use std::path::Path;

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, params};

use crate::error::{LoadError, Result};
use crate::ident;
use crate::model::LabelStatus;
use crate::util::now_utc_string;

pub mod catalog;
pub mod copy;
pub mod create;

use catalog::{GraphId, LabelKind, quoted};

pub struct GraphStore {
    pub(crate) conn: Connection,
}

impl GraphStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        register_functions(&conn)?;
        ensure_catalog(&conn)?;
        Ok(Self { conn })
    }

    /// Creates the graph's catalog entry if missing. Idempotent.
    pub fn ensure_graph(&self, name: &str) -> Result<i64> {
        ident::validate_graph_name(name)?;
        if let Some(id) = catalog::graph_id(&self.conn, name)? {
            return Ok(id);
        }
        catalog::create_graph(&self.conn, name, &now_utc_string())
    }

    pub fn graph_id(&self, name: &str) -> Result<Option<i64>> {
        catalog::graph_id(&self.conn, name)
    }

    pub fn graph_names(&self) -> Result<Vec<String>> {
        catalog::graph_names(&self.conn)
    }

    /// Removes the graph with all its label tables, counters and catalog rows.
    pub fn drop_graph(&mut self, name: &str) -> Result<()> {
        ident::validate_graph_name(name)?;
        let tx = self.conn.transaction()?;
        let Some(graph_id) = catalog::graph_id(&tx, name)? else {
            return Ok(());
        };
        for info in catalog::graph_labels(&tx, graph_id)? {
            tx.execute(
                &format!("DROP TABLE IF EXISTS {}", quoted(&info.table_name)),
                [],
            )?;
            tx.execute(
                "DELETE FROM label_sequences WHERE seq_name = ?1",
                params![info.seq_name],
            )?;
        }
        tx.execute(
            "DELETE FROM label_catalog WHERE graph_id = ?1",
            params![graph_id],
        )?;
        tx.execute(
            "DELETE FROM graph_catalog WHERE graph_id = ?1",
            params![graph_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn label_rows(&self, graph: &str, label: &str) -> Result<i64> {
        let graph_id = self.require_graph(graph)?;
        let Some(info) = catalog::lookup_label(&self.conn, graph_id, label)? else {
            return Err(LoadError::LabelNotBootstrapped(label.to_string()));
        };
        let rows = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quoted(&info.table_name)),
            [],
            |row| row.get(0),
        )?;
        Ok(rows)
    }

    pub fn count_nodes(&self, graph: &str) -> Result<i64> {
        self.count_kind(graph, LabelKind::Node)
    }

    pub fn count_edges(&self, graph: &str) -> Result<i64> {
        self.count_kind(graph, LabelKind::Edge)
    }

    fn count_kind(&self, graph: &str, kind: LabelKind) -> Result<i64> {
        let graph_id = self.require_graph(graph)?;
        let mut total = 0_i64;
        for info in catalog::graph_labels(&self.conn, graph_id)? {
            if info.kind != kind {
                continue;
            }
            let rows: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", quoted(&info.table_name)),
                [],
                |row| row.get(0),
            )?;
            total += rows;
        }
        Ok(total)
    }

    pub fn label_statuses(&self, graph: &str) -> Result<Vec<LabelStatus>> {
        let graph_id = self.require_graph(graph)?;
        let mut statuses = Vec::new();
        for info in catalog::graph_labels(&self.conn, graph_id)? {
            let rows: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", quoted(&info.table_name)),
                [],
                |row| row.get(0),
            )?;
            statuses.push(LabelStatus {
                graph: graph.to_string(),
                label: info.name,
                kind: info.kind.as_str().to_string(),
                tag: info.tag,
                rows,
            });
        }
        Ok(statuses)
    }

    fn require_graph(&self, graph: &str) -> Result<i64> {
        ident::validate_graph_name(graph)?;
        catalog::graph_id(&self.conn, graph)?
            .ok_or_else(|| LoadError::GraphNotFound(graph.to_string()))
    }
}

/// The composite-identifier constructor, exposed to generated statements so
/// identifier assembly stays inside the store.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "graph_id",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let tag = ctx.get::<i64>(0)?;
            let seq = ctx.get::<i64>(1)?;
            Ok(GraphId::compose(tag, seq).0)
        },
    )?;
    Ok(())
}

fn ensure_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS graph_catalog (
          graph_id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL UNIQUE,
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS label_catalog (
          graph_id INTEGER NOT NULL,
          name TEXT NOT NULL,
          label_tag INTEGER NOT NULL,
          kind TEXT NOT NULL CHECK (kind IN ('node', 'edge')),
          seq_name TEXT NOT NULL UNIQUE,
          table_name TEXT NOT NULL UNIQUE,
          PRIMARY KEY (graph_id, name),
          UNIQUE (graph_id, label_tag),
          FOREIGN KEY (graph_id) REFERENCES graph_catalog(graph_id)
        );

        CREATE TABLE IF NOT EXISTS label_sequences (
          seq_name TEXT PRIMARY KEY,
          last_value INTEGER NOT NULL DEFAULT 0
        );
        ",
    )?;
    Ok(())
}
