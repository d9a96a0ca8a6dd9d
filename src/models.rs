use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rusqlite::types::{ToSql, ToSqlOutput};
use serde::Serialize;

/// A single CSV cell after type inference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Null => rusqlite::types::Null.to_sql(),
            Value::Int(i) => i.to_sql(),
            Value::Float(v) => v.to_sql(),
            Value::Text(s) => s.to_sql(),
        }
    }
}

pub type RawRecord = BTreeMap<String, Value>;

/// Extractor output: header columns in file order plus one record per data row.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    /// Header columns plus any key that only shows up in a record.
    pub fn observed_columns(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        for row in &self.rows {
            for key in row.keys() {
                if !seen.contains(&key.as_str()) {
                    seen.push(key);
                }
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A validated sale, ready for the `vendas` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sale {
    pub sale_id: i64,
    pub product: Option<String>,
    pub quantity: i64,
    pub price: f64,
    pub sale_date: NaiveDate,
    pub total: f64,
    /// Non-core input columns (`category`, `region`, ...) carried through as read.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Sale {
    pub fn field(&self, column: &str) -> Option<&Value> {
        self.extra.get(column)
    }
}
