use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const TABLE: &str = "vendas";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS vendas (
    sale_id INTEGER PRIMARY KEY,
    product VARCHAR(255),
    category VARCHAR(255),
    region VARCHAR(255),
    quantity INTEGER,
    price FLOAT,
    sale_date DATE,
    total FLOAT
);
";

pub const INSERT_SALE: &str = "
INSERT INTO vendas (sale_id, product, category, region, quantity, price, sale_date, total)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT (sale_id) DO NOTHING
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// Create the destination table if it is missing. Runs in autocommit mode,
/// so the DDL is committed on its own, ahead of any insert batch.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn table_exists(conn: &Connection) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    Ok(stmt.exists([TABLE])?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub rows: i64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub revenue: f64,
}

pub fn summarize(conn: &Connection) -> Result<TableSummary> {
    let summary = conn.query_row(
        "SELECT count(*), min(sale_date), max(sale_date), coalesce(sum(total), 0.0) FROM vendas",
        [],
        |row| {
            Ok(TableSummary {
                rows: row.get(0)?,
                first_date: row.get(1)?,
                last_date: row.get(2)?,
                revenue: row.get(3)?,
            })
        },
    )?;
    Ok(summary)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSale {
    pub sale_id: i64,
    pub product: Option<String>,
    pub category: Option<String>,
    pub region: Option<String>,
    pub quantity: Option<i64>,
    pub price: Option<f64>,
    pub sale_date: Option<String>,
    pub total: Option<f64>,
}

/// Most recent rows first (by date, then id).
pub fn recent_sales(conn: &Connection, limit: usize) -> Result<Vec<StoredSale>> {
    let mut stmt = conn.prepare(
        "SELECT sale_id, product, category, region, quantity, price, sale_date, total
         FROM vendas ORDER BY sale_date DESC, sale_id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(StoredSale {
                sale_id: row.get(0)?,
                product: row.get(1)?,
                category: row.get(2)?,
                region: row.get(3)?,
                quantity: row.get(4)?,
                price: row.get(5)?,
                sale_date: row.get(6)?,
                total: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
