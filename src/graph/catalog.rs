use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, ToSql, params};

use crate::error::{LoadError, Result};

/// Low bits of a composite identifier hold the per-label sequence value,
/// high bits the label tag.
pub const SEQUENCE_BITS: u32 = 48;
const SEQUENCE_MASK: i64 = (1_i64 << SEQUENCE_BITS) - 1;

/// Store-native identity of a stored row: (label tag, sequence value) packed
/// into a single integer. Never reused; the backing counter only advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub i64);

impl GraphId {
    pub fn compose(tag: i64, seq: i64) -> Self {
        GraphId((tag << SEQUENCE_BITS) | (seq & SEQUENCE_MASK))
    }

    pub fn label_tag(self) -> i64 {
        self.0 >> SEQUENCE_BITS
    }

    pub fn sequence(self) -> i64 {
        self.0 & SEQUENCE_MASK
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.label_tag(), self.sequence())
    }
}

impl ToSql for GraphId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.0.into())
    }
}

impl FromSql for GraphId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(GraphId(i64::column_result(value)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Node,
    Edge,
}

impl LabelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Edge => "edge",
        }
    }
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromSql for LabelKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "node" => Ok(LabelKind::Node),
            "edge" => Ok(LabelKind::Edge),
            other => Err(FromSqlError::Other(
                format!("unknown label kind '{other}' in catalog").into(),
            )),
        }
    }
}

/// Catalog entry for one bootstrapped label.
#[derive(Debug, Clone)]
pub struct LabelInfo {
    pub name: String,
    pub tag: i64,
    pub kind: LabelKind,
    pub seq_name: String,
    pub table_name: String,
}

pub fn quoted(name: &str) -> String {
    format!("\"{name}\"")
}

pub fn graph_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT graph_id FROM graph_catalog WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn create_graph(conn: &Connection, name: &str, created_at: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO graph_catalog (name, created_at) VALUES (?1, ?2)",
        params![name, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn graph_names(conn: &Connection) -> Result<Vec<String>> {
    let mut statement = conn.prepare("SELECT name FROM graph_catalog ORDER BY name")?;
    let names = statement
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

pub fn lookup_label(conn: &Connection, graph_id: i64, label: &str) -> Result<Option<LabelInfo>> {
    let info = conn
        .query_row(
            "SELECT name, label_tag, kind, seq_name, table_name
             FROM label_catalog
             WHERE graph_id = ?1 AND name = ?2",
            params![graph_id, label],
            label_info_from_row,
        )
        .optional()?;
    Ok(info)
}

pub fn graph_labels(conn: &Connection, graph_id: i64) -> Result<Vec<LabelInfo>> {
    let mut statement = conn.prepare(
        "SELECT name, label_tag, kind, seq_name, table_name
         FROM label_catalog
         WHERE graph_id = ?1
         ORDER BY label_tag",
    )?;
    let labels = statement
        .query_map(params![graph_id], label_info_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(labels)
}

fn label_info_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LabelInfo> {
    Ok(LabelInfo {
        name: row.get(0)?,
        tag: row.get(1)?,
        kind: row.get(2)?,
        seq_name: row.get(3)?,
        table_name: row.get(4)?,
    })
}

/// Materializes a label: catalog row, counter row and storage table, with the
/// next free tag for the graph. Caller has already validated both names.
pub fn create_label(
    conn: &Connection,
    graph_id: i64,
    graph_name: &str,
    label: &str,
    kind: LabelKind,
) -> Result<LabelInfo> {
    let tag: i64 = conn.query_row(
        "SELECT COALESCE(MAX(label_tag), 0) + 1 FROM label_catalog WHERE graph_id = ?1",
        params![graph_id],
        |row| row.get(0),
    )?;
    let table_name = format!("{graph_name}.{label}");
    let seq_name = format!("{graph_name}.{label}_id_seq");

    conn.execute(
        "INSERT INTO label_catalog (graph_id, name, label_tag, kind, seq_name, table_name)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![graph_id, label, tag, kind.as_str(), seq_name, table_name],
    )?;
    conn.execute(
        "INSERT INTO label_sequences (seq_name, last_value) VALUES (?1, 0)",
        params![seq_name],
    )?;

    let ddl = match kind {
        LabelKind::Node => format!(
            "CREATE TABLE {} (
               id INTEGER PRIMARY KEY,
               properties TEXT NOT NULL
             )",
            quoted(&table_name)
        ),
        LabelKind::Edge => format!(
            "CREATE TABLE {} (
               id INTEGER PRIMARY KEY,
               start_id INTEGER NOT NULL,
               end_id INTEGER NOT NULL,
               properties TEXT NOT NULL
             )",
            quoted(&table_name)
        ),
    };
    conn.execute(&ddl, [])?;

    Ok(LabelInfo {
        name: label.to_string(),
        tag,
        kind,
        seq_name,
        table_name,
    })
}

/// Draws the next counter value. The draw is part of the surrounding
/// transaction; the counter never moves backwards within a committed history.
pub fn nextval(conn: &Connection, seq_name: &str) -> Result<i64> {
    let value = conn.query_row(
        "UPDATE label_sequences SET last_value = last_value + 1
         WHERE seq_name = ?1
         RETURNING last_value",
        params![seq_name],
        |row| row.get(0),
    )?;
    Ok(value)
}

pub fn sequence_base(conn: &Connection, seq_name: &str) -> Result<i64> {
    let value = conn.query_row(
        "SELECT last_value FROM label_sequences WHERE seq_name = ?1",
        params![seq_name],
        |row| row.get(0),
    )?;
    Ok(value)
}

pub fn advance_sequence(conn: &Connection, seq_name: &str, by: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE label_sequences SET last_value = last_value + ?2 WHERE seq_name = ?1",
        params![seq_name, by],
    )?;
    if updated != 1 {
        return Err(LoadError::Store(rusqlite::Error::QueryReturnedNoRows));
    }
    Ok(())
}
