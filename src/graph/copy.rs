//! Bulk-load entry point: a tab/newline-delimited byte stream with backslash
//! escaping, decoded into a target table with an ordered column list.

use rusqlite::Connection;

use crate::error::{LoadError, Result};

use super::catalog::quoted;

pub fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn unescape_field(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some(other) => {
                return Err(LoadError::Transfer(format!(
                    "unknown escape sequence '\\{other}' in bulk stream"
                )));
            }
            None => {
                return Err(LoadError::Transfer(
                    "dangling escape at end of field".to_string(),
                ));
            }
        }
    }
    Ok(out)
}

/// Accumulates rows in wire form. Fields are escaped on push, so raw tab and
/// newline bytes in the payload are always delimiters.
#[derive(Debug, Default)]
pub struct CopyBuffer {
    payload: String,
    rows: usize,
}

impl CopyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_row(&mut self, fields: &[&str]) {
        for (idx, field) in fields.iter().enumerate() {
            if idx > 0 {
                self.payload.push('\t');
            }
            self.payload.push_str(&escape_field(field));
        }
        self.payload.push('\n');
        self.rows += 1;
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

/// Decodes a payload produced by [`CopyBuffer`] into `table`, one insert per
/// row. Every row must carry exactly one field per column.
pub fn copy_into(conn: &Connection, table: &str, columns: &[&str], payload: &str) -> Result<usize> {
    let body = match payload.strip_suffix('\n') {
        Some(body) => body,
        None if payload.is_empty() => return Ok(0),
        None => {
            return Err(LoadError::Transfer(
                "payload does not end with a row delimiter".to_string(),
            ));
        }
    };

    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted(table),
        columns.join(", "),
        placeholders
    );
    let mut statement = conn.prepare(&sql)?;

    let mut rows = 0;
    for (line_no, line) in body.split('\n').enumerate() {
        let fields = line
            .split('\t')
            .map(unescape_field)
            .collect::<Result<Vec<_>>>()?;
        if fields.len() != columns.len() {
            return Err(LoadError::Transfer(format!(
                "row {}: expected {} fields, found {}",
                line_no + 1,
                columns.len(),
                fields.len()
            )));
        }
        statement.execute(rusqlite::params_from_iter(fields.iter()))?;
        rows += 1;
    }

    Ok(rows)
}
