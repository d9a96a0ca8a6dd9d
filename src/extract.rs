use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{EtlError, Result};
use crate::models::{RawRecord, RawTable, Value};

/// Cell contents read as missing values.
const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Int,
    Float,
    Text,
}

fn is_null_marker(raw: &str) -> bool {
    NULL_MARKERS.contains(&raw) || NULL_MARKERS.contains(&raw.trim())
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Repeated header names get a `.1`, `.2`, ... suffix so every column stays addressable.
fn dedupe_headers(headers: &csv::StringRecord) -> Vec<String> {
    let mut columns: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers.iter() {
        let mut name = header.to_string();
        let mut n = 0;
        while columns.contains(&name) {
            n += 1;
            name = format!("{header}.{n}");
        }
        columns.push(name);
    }
    columns
}

fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut kind = ColumnKind::Int;
    for cell in cells {
        if is_null_marker(cell) {
            continue;
        }
        let cell = cell.trim();
        if kind == ColumnKind::Int && cell.parse::<i64>().is_err() {
            kind = ColumnKind::Float;
        }
        if kind == ColumnKind::Float && cell.parse::<f64>().is_err() {
            return ColumnKind::Text;
        }
    }
    kind
}

fn to_value(cell: &str, kind: ColumnKind) -> Value {
    if is_null_marker(cell) {
        return Value::Null;
    }
    match kind {
        ColumnKind::Int => cell.trim().parse().map(Value::Int).unwrap_or(Value::Null),
        ColumnKind::Float => cell.trim().parse().map(Value::Float).unwrap_or(Value::Null),
        ColumnKind::Text => Value::Text(cell.to_string()),
    }
}

/// Parse delimited text with a header row into a `RawTable`.
pub fn parse_csv(data: &[u8]) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);
    let columns = dedupe_headers(rdr.headers()?);

    let mut records: Vec<csv::StringRecord> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.len() > columns.len() {
            return Err(EtlError::Parse {
                line: record.position().map_or(0, |p| p.line()),
                message: format!("expected {} fields, saw {}", columns.len(), record.len()),
            });
        }
        records.push(record);
    }

    let kinds: Vec<ColumnKind> = (0..columns.len())
        .map(|i| infer_kind(records.iter().map(|r| r.get(i).unwrap_or(""))))
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .zip(&kinds)
                .enumerate()
                .map(|(i, (name, kind))| {
                    let value = record.get(i).map_or(Value::Null, |cell| to_value(cell, *kind));
                    (name.clone(), value)
                })
                .collect::<RawRecord>()
        })
        .collect();

    Ok(RawTable { columns, rows })
}

/// Extractor stage: read the CSV at `csv_path` in full.
pub fn extract(csv_path: &Path) -> Result<RawTable> {
    if !csv_path.exists() {
        return Err(EtlError::NotFound(csv_path.to_path_buf()));
    }
    let data = std::fs::read(csv_path)?;
    let table = parse_csv(&data)?;
    info!(
        path = %csv_path.display(),
        sha256 = %compute_checksum(&data),
        rows = table.len(),
        "extracted {} rows from CSV",
        table.len()
    );
    if table.is_empty() {
        warn!(path = %csv_path.display(), "CSV has a header but no data rows");
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_extract_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        match extract(&missing) {
            Err(EtlError::NotFound(p)) => assert_eq!(p, missing),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_reads_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "vendas.csv",
            "sale_id,product,category,region,quantity,price,sale_date\n\
             1,Camiseta,Roupas,Sul,2,39.9,2025-01-10\n\
             2,Tenis,Calcados,Norte,1,199.0,2025-01-11\n",
        );
        let table = extract(&path).unwrap();
        assert_eq!(
            table.columns,
            vec!["sale_id", "product", "category", "region", "quantity", "price", "sale_date"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0]["sale_id"], Value::Int(1));
        assert_eq!(table.rows[0]["product"], Value::Text("Camiseta".into()));
        assert_eq!(table.rows[1]["price"], Value::Float(199.0));
        assert_eq!(table.rows[1]["sale_date"], Value::Text("2025-01-11".into()));
    }

    #[test]
    fn test_inference_is_per_column() {
        let table = parse_csv(b"a,b,c\n1,1,x\n2,2.5,3\n").unwrap();
        assert_eq!(table.rows[0]["a"], Value::Int(1));
        assert_eq!(table.rows[0]["b"], Value::Float(1.0));
        assert_eq!(table.rows[1]["c"], Value::Text("3".into()));
    }

    #[test]
    fn test_null_markers_and_short_rows() {
        let table = parse_csv(b"a,b,c\n1,,NA\n2\n").unwrap();
        assert_eq!(table.rows[0]["b"], Value::Null);
        assert_eq!(table.rows[0]["c"], Value::Null);
        assert_eq!(table.rows[1]["b"], Value::Null);
        assert_eq!(table.rows[1]["c"], Value::Null);
        assert_eq!(table.rows[1]["a"], Value::Int(2));
    }

    #[test]
    fn test_too_many_fields_is_an_error() {
        let err = parse_csv(b"a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, EtlError::Parse { line: 2, .. }), "got {err:?}");
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        let table = parse_csv(b"x,x,x\n1,2,3\n").unwrap();
        assert_eq!(table.columns, vec!["x", "x.1", "x.2"]);
        assert_eq!(table.rows[0]["x.2"], Value::Int(3));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let table = parse_csv(b"sale_id,product\n").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), 2);
    }

    #[test]
    fn test_quoted_fields() {
        let table = parse_csv(b"product,price\n\"Mesa, grande\",\"1500.50\"\n").unwrap();
        assert_eq!(table.rows[0]["product"], Value::Text("Mesa, grande".into()));
        assert_eq!(table.rows[0]["price"], Value::Float(1500.5));
    }

    #[test]
    fn test_compute_checksum() {
        assert_eq!(
            compute_checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
