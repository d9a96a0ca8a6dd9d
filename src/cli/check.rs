use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::error::Result;
use crate::extract::extract;
use crate::fmt::amount;
use crate::settings::{load_settings, RunConfig};
use crate::transform::transform;

pub fn run(csv: Option<PathBuf>, limit: usize) -> Result<()> {
    let config = RunConfig::from_env(&load_settings(), csv, None);
    let raw = extract(&config.csv_path)?;
    let sales = transform(&raw)?;

    let mut table = Table::new();
    table.set_header(vec!["Sale", "Date", "Product", "Category", "Region", "Qty", "Price", "Total"]);
    for s in sales.iter().take(limit) {
        let label = |col: &str| s.field(col).map(|v| v.to_string()).unwrap_or_default();
        table.add_row(vec![
            Cell::new(s.sale_id),
            Cell::new(s.sale_date),
            Cell::new(s.product.as_deref().unwrap_or("")),
            Cell::new(label("category")),
            Cell::new(label("region")),
            Cell::new(s.quantity).set_alignment(CellAlignment::Right),
            Cell::new(amount(s.price)).set_alignment(CellAlignment::Right),
            Cell::new(amount(s.total)).set_alignment(CellAlignment::Right),
        ]);
    }

    println!("{}", config.csv_path.display());
    println!("{table}");

    let dropped = raw.len() - sales.len();
    let revenue: f64 = sales.iter().map(|s| s.total).sum();
    println!("{} rows read, {} valid, {} dropped", raw.len(), sales.len(), dropped);
    println!("Revenue: {}", amount(revenue));
    if sales.iter().any(|s| s.field("category").is_none() || s.field("region").is_none()) {
        println!(
            "{}",
            "Warning: category/region columns are missing; the load step will reject this file."
                .yellow()
        );
    }
    Ok(())
}
