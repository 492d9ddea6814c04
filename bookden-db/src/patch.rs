//! Field-level diff builder for change-tracked writes.
//!
//! A [`RowPatch`] collects `(column, value)` pairs for the attributes of
//! an entity that actually differ from its stored counterpart, then
//! renders either a full `INSERT` or a partial `UPDATE` restricted to the
//! changed columns. An empty patch issues no statement at all, which is
//! what makes re-saving an unchanged entity free.

use rusqlite::types::{ToSql, Value};
use rusqlite::Connection;

pub(crate) struct RowPatch {
    table: &'static str,
    columns: Vec<&'static str>,
    values: Vec<Value>,
}

impl RowPatch {
    pub fn new(table: &'static str) -> RowPatch {
        RowPatch {
            table,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Record a text column when the new value is present and differs.
    pub fn add_text(&mut self, column: &'static str, new: Option<&str>, old: Option<&str>) {
        if let Some(new) = new {
            if old != Some(new) {
                self.columns.push(column);
                self.values.push(Value::Text(new.to_string()));
            }
        }
    }

    /// Record a nullable integer column when the new value is present and
    /// differs. A `None` new value never overwrites a stored one.
    pub fn add_opt_int(&mut self, column: &'static str, new: Option<i64>, old: Option<i64>) {
        if let Some(new) = new {
            if old != Some(new) {
                self.columns.push(column);
                self.values.push(Value::Integer(new));
            }
        }
    }

    /// Record a plain integer column when it differs.
    pub fn add_int(&mut self, column: &'static str, new: i64, old: i64) {
        if new != old {
            self.columns.push(column);
            self.values.push(Value::Integer(new));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Execute the patch as an `INSERT`, returning the generated rowid.
    /// Callers must not invoke this on an empty patch.
    pub fn insert(&self, conn: &Connection) -> Result<i64, rusqlite::Error> {
        debug_assert!(!self.is_empty());
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            placeholders
        );
        log::debug!("executing {sql}");
        let params: Vec<&dyn ToSql> = self.values.iter().map(|v| v as &dyn ToSql).collect();
        conn.execute(&sql, params.as_slice())?;
        Ok(conn.last_insert_rowid())
    }

    /// Execute the patch as a partial `UPDATE` of the given row. Returns
    /// false without touching the database when nothing changed.
    pub fn update(&self, conn: &Connection, id: i64) -> Result<bool, rusqlite::Error> {
        if self.is_empty() {
            return Ok(false);
        }
        let assignments: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", col, i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            self.table,
            assignments.join(", "),
            self.columns.len() + 1
        );
        log::debug!("executing {sql}");
        let id_value = Value::Integer(id);
        let mut params: Vec<&dyn ToSql> = self.values.iter().map(|v| v as &dyn ToSql).collect();
        params.push(&id_value);
        conn.execute(&sql, params.as_slice())?;
        Ok(true)
    }
}
