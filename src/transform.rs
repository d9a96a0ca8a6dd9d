use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::info;

use crate::error::{EtlError, Result};
use crate::models::{RawRecord, RawTable, Sale, Value};

pub const REQUIRED_COLUMNS: &[&str] = &["sale_id", "product", "quantity", "price", "sale_date"];

/// Columns owned by `Sale` itself; everything else lands in `Sale::extra`.
const CORE_COLUMNS: &[&str] = &["sale_id", "product", "quantity", "price", "sale_date", "total"];

/// Month-first wins when both readings are valid; day-first only when the month would be out of range.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%m.%d.%Y", "%d.%m.%Y", "%Y%m%d",
];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub fn check_required_columns(table: &RawTable) -> Result<()> {
    let observed = table.observed_columns();
    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !observed.contains(*c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    missing.sort();
    Err(EtlError::MissingColumns(missing))
}

fn coercion_error(row: usize, column: &str, value: &Value, expected: &'static str) -> EtlError {
    EtlError::Coercion {
        row,
        column: column.to_string(),
        value: value.to_string(),
        expected,
    }
}

/// Integer cast: floats truncate toward zero, text must hold an integer literal.
pub fn coerce_int(value: &Value) -> Option<Option<i64>> {
    match value {
        Value::Null => Some(None),
        Value::Int(i) => Some(Some(*i)),
        Value::Float(f) if f.is_finite() => Some(Some(f.trunc() as i64)),
        Value::Float(_) => None,
        Value::Text(s) => s.trim().parse().ok().map(Some),
    }
}

/// NaN reads as null; any other unparseable value is rejected.
pub fn coerce_float(value: &Value) -> Option<Option<f64>> {
    let f = match value {
        Value::Null => return Some(None),
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Text(s) => s.trim().parse().ok()?,
    };
    Some((!f.is_nan()).then_some(f))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())
}

pub fn coerce_date(value: &Value) -> Option<Option<NaiveDate>> {
    match value {
        Value::Null => Some(None),
        Value::Int(i) => parse_date(&format!("{i:08}")).map(Some),
        Value::Float(_) => None,
        Value::Text(s) => parse_date(s).map(Some),
    }
}

static NULL_VALUE: Value = Value::Null;

fn cell<'a>(record: &'a RawRecord, column: &str) -> &'a Value {
    record.get(column).unwrap_or(&NULL_VALUE)
}

/// Coerce one record. `Ok(None)` means a required field is null and the row is dropped.
fn coerce_record(index: usize, record: &RawRecord) -> Result<Option<Sale>> {
    let row = index + 1;

    let raw_id = cell(record, "sale_id");
    let sale_id = coerce_int(raw_id).ok_or_else(|| coercion_error(row, "sale_id", raw_id, "integer"))?;

    let raw_qty = cell(record, "quantity");
    let quantity = coerce_int(raw_qty).ok_or_else(|| coercion_error(row, "quantity", raw_qty, "integer"))?;

    let raw_price = cell(record, "price");
    let price = coerce_float(raw_price).ok_or_else(|| coercion_error(row, "price", raw_price, "float"))?;

    let raw_date = cell(record, "sale_date");
    let sale_date = coerce_date(raw_date).ok_or_else(|| coercion_error(row, "sale_date", raw_date, "date"))?;

    let product = match cell(record, "product") {
        Value::Null => None,
        other => Some(other.to_string()),
    };

    let extra = record
        .iter()
        .filter(|(k, _)| !CORE_COLUMNS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let (Some(sale_id), Some(quantity), Some(price), Some(sale_date)) = (sale_id, quantity, price, sale_date)
    else {
        return Ok(None);
    };

    Ok(Some(Sale {
        sale_id,
        product,
        quantity,
        price,
        sale_date,
        total: quantity as f64 * price,
        extra,
    }))
}

/// Transformer stage: validate columns, coerce every record, derive `total`,
/// drop rows missing a required value. One bad value fails the whole batch.
pub fn transform(table: &RawTable) -> Result<Vec<Sale>> {
    check_required_columns(table)?;

    let coerced = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, record)| coerce_record(i, record))
        .collect::<Result<Vec<_>>>()?;

    let sales: Vec<Sale> = coerced.into_iter().flatten().collect();
    info!(
        valid = sales.len(),
        dropped = table.len() - sales.len(),
        "transformed {} valid rows",
        sales.len()
    );
    Ok(sales)
}
