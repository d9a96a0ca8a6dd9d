use comfy_table::{Cell, CellAlignment, Table};

use crate::db::{get_connection, recent_sales, summarize, table_exists};
use crate::error::Result;
use crate::fmt::{amount, format_bytes};
use crate::settings::{load_settings, settings_path, RunConfig};

pub fn run(conn_id: Option<String>, limit: usize) -> Result<()> {
    let config = RunConfig::from_env(&load_settings(), None, conn_id);
    let db_path = &config.database;

    println!("Settings:   {}", settings_path().display());
    println!("CSV:        {}", config.csv_path.display());
    println!("Connection: {}", config.conn_id);
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `sales-etl run` to create it.");
        return Ok(());
    }

    let size = std::fs::metadata(db_path)?.len();
    println!("DB size:    {}", format_bytes(size));

    let conn = get_connection(db_path)?;
    if !table_exists(&conn)? {
        println!();
        println!("Table vendas does not exist yet.");
        return Ok(());
    }

    let summary = summarize(&conn)?;
    println!();
    println!("Sales:      {}", summary.rows);
    println!(
        "Dates:      {} .. {}",
        summary.first_date.as_deref().unwrap_or("-"),
        summary.last_date.as_deref().unwrap_or("-")
    );
    println!("Revenue:    {}", amount(summary.revenue));

    if summary.rows == 0 || limit == 0 {
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Sale", "Date", "Product", "Category", "Region", "Qty", "Price", "Total"]);
    for s in recent_sales(&conn, limit)? {
        table.add_row(vec![
            Cell::new(s.sale_id),
            Cell::new(s.sale_date.unwrap_or_default()),
            Cell::new(s.product.unwrap_or_default()),
            Cell::new(s.category.unwrap_or_default()),
            Cell::new(s.region.unwrap_or_default()),
            Cell::new(s.quantity.map(|q| q.to_string()).unwrap_or_default())
                .set_alignment(CellAlignment::Right),
            Cell::new(s.price.map(amount).unwrap_or_default()).set_alignment(CellAlignment::Right),
            Cell::new(s.total.map(amount).unwrap_or_default()).set_alignment(CellAlignment::Right),
        ]);
    }
    println!();
    println!("Most recent\n{table}");
    Ok(())
}
