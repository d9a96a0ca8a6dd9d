use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rusqlite::{params, Connection};
use tracing::info;

use crate::db::{ensure_schema, get_connection, INSERT_SALE};
use crate::error::{EtlError, Result};
use crate::models::{Sale, Value};

/// SQLite VM steps between deadline checks.
const PROGRESS_STEPS: i32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadReport {
    pub received: usize,
    pub prepared: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Positional insert parameters in `vendas` column order.
struct InsertRow<'a> {
    sale: &'a Sale,
    category: &'a Value,
    region: &'a Value,
    sale_date: String,
}

fn prepare_row(sale: &Sale) -> Result<InsertRow<'_>> {
    let lookup = |column: &str| {
        sale.field(column).ok_or_else(|| EtlError::MissingField {
            sale_id: sale.sale_id,
            column: column.to_string(),
        })
    };
    Ok(InsertRow {
        sale,
        category: lookup("category")?,
        region: lookup("region")?,
        sale_date: sale.sale_date.format("%Y-%m-%d").to_string(),
    })
}

fn insert_batch(conn: &mut Connection, rows: &[InsertRow<'_>]) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(INSERT_SALE)?;
        for row in rows {
            let s = row.sale;
            inserted += stmt.execute(params![
                s.sale_id,
                s.product,
                row.category,
                row.region,
                s.quantity,
                s.price,
                row.sale_date,
                s.total,
            ])?;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

/// Wall-clock budget for one load attempt.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    fn passed(&self) -> bool {
        self.started.elapsed() >= self.limit
    }
}

/// Run `f` on `conn`, interrupting any statement once the deadline has passed.
fn with_deadline<T>(
    conn: &mut Connection,
    deadline: Option<Deadline>,
    f: impl FnOnce(&mut Connection) -> Result<T>,
) -> Result<T> {
    let Some(deadline) = deadline else {
        return f(conn);
    };

    let expired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&expired);
    conn.progress_handler(
        PROGRESS_STEPS,
        Some(move || {
            let over = deadline.passed();
            if over {
                flag.store(true, Ordering::SeqCst);
            }
            over
        }),
    );

    let result = f(conn);
    conn.progress_handler(0, None::<fn() -> bool>);

    match result {
        Err(_) if expired.load(Ordering::SeqCst) => Err(EtlError::DeadlineExceeded(deadline.limit)),
        other => other,
    }
}

/// Logs the incoming batch size; false when there is nothing to load.
fn announce(sales: &[Sale]) -> bool {
    info!(rows = sales.len(), "received {} rows to load", sales.len());
    if sales.is_empty() {
        info!("no rows to load");
        return false;
    }
    true
}

fn write_sales(conn: &mut Connection, sales: &[Sale]) -> Result<LoadReport> {
    ensure_schema(conn)?;
    info!("table vendas created/verified");

    let rows = sales.iter().map(prepare_row).collect::<Result<Vec<_>>>()?;
    info!(rows = rows.len(), "prepared {} rows for insert", rows.len());

    let inserted = insert_batch(conn, &rows)?;
    let report = LoadReport {
        received: sales.len(),
        prepared: rows.len(),
        inserted,
        skipped: rows.len() - inserted,
    };
    info!(
        inserted = report.inserted,
        skipped = report.skipped,
        "loaded {} rows (duplicates ignored)",
        report.prepared
    );
    Ok(report)
}

/// Write validated sales into `vendas` over an open connection.
///
/// The table is created first and committed on its own. All inserts then run in
/// one transaction; rows whose `sale_id` already exists are skipped, and any
/// failure rolls the whole batch back. The deadline covers both steps.
pub fn load_into(conn: &mut Connection, sales: &[Sale], deadline: Option<Duration>) -> Result<LoadReport> {
    if !announce(sales) {
        return Ok(LoadReport::default());
    }
    with_deadline(conn, deadline.map(Deadline::start), |conn| write_sales(conn, sales))
}

/// Loader stage. An empty batch returns before the database is opened; otherwise
/// the deadline runs from before the connection is opened.
pub fn load(db_path: &Path, sales: &[Sale], deadline: Option<Duration>) -> Result<LoadReport> {
    if !announce(sales) {
        return Ok(LoadReport::default());
    }
    let deadline = deadline.map(Deadline::start);
    let mut conn = get_connection(db_path)?;
    if let Some(d) = deadline.filter(Deadline::passed) {
        return Err(EtlError::DeadlineExceeded(d.limit));
    }
    with_deadline(&mut conn, deadline, |conn| write_sales(conn, sales))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::db::{summarize, table_exists};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        (dir, conn)
    }

    fn sale(id: i64, product: &str, quantity: i64, price: f64) -> Sale {
        let mut extra = BTreeMap::new();
        extra.insert("category".to_string(), Value::Text("Roupas".into()));
        extra.insert("region".to_string(), Value::Text("Sul".into()));
        Sale {
            sale_id: id,
            product: Some(product.to_string()),
            quantity,
            price,
            sale_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            total: quantity as f64 * price,
            extra,
        }
    }

    fn products(conn: &Connection) -> Vec<(i64, String)> {
        conn.prepare("SELECT sale_id, product FROM vendas ORDER BY sale_id")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_load_inserts_rows() {
        let (_dir, mut conn) = test_db();
        let report = load_into(&mut conn, &[sale(1, "A", 2, 10.0), sale(2, "B", 1, 5.5)], None).unwrap();
        assert_eq!(report, LoadReport { received: 2, prepared: 2, inserted: 2, skipped: 0 });
        let (date, total, region): (String, f64, String) = conn
            .query_row("SELECT sale_date, total, region FROM vendas WHERE sale_id = 1", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .unwrap();
        assert_eq!(date, "2025-01-10");
        assert_eq!(total, 20.0);
        assert_eq!(region, "Sul");
    }

    #[test]
    fn test_load_twice_is_idempotent() {
        let (_dir, mut conn) = test_db();
        let batch = [sale(1, "A", 2, 10.0), sale(2, "B", 1, 5.5)];
        load_into(&mut conn, &batch, None).unwrap();
        let before = products(&conn);
        let second = load_into(&mut conn, &batch, None).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(products(&conn), before);
    }

    #[test]
    fn test_duplicate_ids_keep_original_row() {
        let (_dir, mut conn) = test_db();
        load_into(&mut conn, &[sale(1, "Original", 1, 1.0)], None).unwrap();
        let report = load_into(&mut conn, &[sale(1, "X", 9, 9.0), sale(2, "New", 1, 2.0)], None).unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            products(&conn),
            vec![(1, "Original".to_string()), (2, "New".to_string())]
        );
    }

    #[test]
    fn test_duplicate_ids_within_one_batch() {
        let (_dir, mut conn) = test_db();
        let report = load_into(&mut conn, &[sale(5, "First", 1, 1.0), sale(5, "Second", 1, 1.0)], None).unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(products(&conn), vec![(5, "First".to_string())]);
    }

    #[test]
    fn test_empty_batch_does_not_open_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.db");
        let report = load(&path, &[], None).unwrap();
        assert_eq!(report, LoadReport::default());
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_batch_issues_no_statements() {
        let (_dir, mut conn) = test_db();
        load_into(&mut conn, &[], None).unwrap();
        assert!(!table_exists(&conn).unwrap());
    }

    #[test]
    fn test_missing_region_fails_after_schema_commit() {
        let (_dir, mut conn) = test_db();
        let mut s = sale(1, "A", 1, 1.0);
        s.extra.remove("region");
        match load_into(&mut conn, &[sale(2, "B", 1, 1.0), s], None) {
            Err(EtlError::MissingField { sale_id, column }) => {
                assert_eq!(sale_id, 1);
                assert_eq!(column, "region");
            }
            other => panic!("expected MissingField, got {other:?}"),
        }
        assert!(table_exists(&conn).unwrap());
        assert_eq!(summarize(&conn).unwrap().rows, 0);
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let (_dir, mut conn) = test_db();
        ensure_schema(&conn).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_99 BEFORE INSERT ON vendas WHEN NEW.sale_id = 99
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();
        let result = load_into(&mut conn, &[sale(1, "A", 1, 1.0), sale(99, "B", 1, 1.0)], None);
        assert!(matches!(result, Err(EtlError::Db(_))));
        assert_eq!(summarize(&conn).unwrap().rows, 0);
    }

    #[test]
    fn test_deadline_interrupts_and_rolls_back() {
        let (_dir, mut conn) = test_db();
        ensure_schema(&conn).unwrap();
        let batch: Vec<Sale> = (1..=2000).map(|i| sale(i, "A", 1, 1.0)).collect();
        let result = load_into(&mut conn, &batch, Some(Duration::ZERO));
        assert!(matches!(result, Err(EtlError::DeadlineExceeded(_))), "got {result:?}");
        assert_eq!(summarize(&conn).unwrap().rows, 0);

        let report = load_into(&mut conn, &batch, Some(Duration::from_secs(3600))).unwrap();
        assert_eq!(report.inserted, 2000);
    }

    #[test]
    fn test_deadline_counts_connection_setup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.db");
        let result = load(&path, &[sale(1, "A", 1, 1.0)], Some(Duration::ZERO));
        assert!(matches!(result, Err(EtlError::DeadlineExceeded(_))), "got {result:?}");
        let conn = get_connection(&path).unwrap();
        assert!(!table_exists(&conn).unwrap());

        let report = load(&path, &[sale(1, "A", 1, 1.0)], Some(Duration::from_secs(3600))).unwrap();
        assert_eq!(report.inserted, 1);
    }

    #[test]
    fn test_null_product_and_numeric_labels() {
        let (_dir, mut conn) = test_db();
        let mut s = sale(1, "A", 1, 1.0);
        s.product = None;
        s.extra.insert("region".into(), Value::Int(42));
        load_into(&mut conn, &[s], None).unwrap();
        let (product, region): (Option<String>, String) = conn
            .query_row("SELECT product, region FROM vendas", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!(product, None);
        assert_eq!(region, "42");
    }
}
