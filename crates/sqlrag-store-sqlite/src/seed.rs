//! Demo relational store: a handful of customers and their orders.
//!
//! Seeding is safe to repeat. Customers are inserted with `INSERT OR IGNORE`
//! and orders are only generated while the `orders` table is empty.

use std::path::Path;

use chrono::{NaiveDate, TimeDelta};
use tracing::info;

use crate::Result;

const DEMO_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS customers (
    customer_id INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    state       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS orders (
    order_id    INTEGER PRIMARY KEY,
    customer_id INTEGER,
    order_date  TEXT NOT NULL,   -- YYYY-MM-DD
    amount      REAL NOT NULL,
    FOREIGN KEY (customer_id) REFERENCES customers(customer_id)
);
";

pub const CUSTOMERS: &[(i64, &str, &str)] = &[
  (1, "Alice Smith", "CA"),
  (2, "Bob Johnson", "NY"),
  (3, "Charlie Brown", "TX"),
  (4, "David Davis", "CA"),
  (5, "Eve Williams", "NY"),
];

pub const ORDER_COUNT: i64 = 20;

/// What a call to [`seed_demo`] inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
  pub customers: usize,
  pub orders:    usize,
}

/// One weekly order per step back from `today`, rotating through customers.
pub fn demo_orders(today: NaiveDate) -> Vec<(i64, String, f64)> {
  (0..ORDER_COUNT)
    .map(|i| {
      let customer_id = (i % 5) + 1;
      let date = today - TimeDelta::days(i * 7);
      let amount = 10.0 + i as f64 * 5.5 + customer_id as f64 * 2.0;
      let amount = (amount * 100.0).round() / 100.0;
      (customer_id, date.format("%Y-%m-%d").to_string(), amount)
    })
    .collect()
}

/// Create the demo tables at `path` and fill them, dating orders back from
/// `today`.
pub async fn seed_demo(path: impl AsRef<Path>, today: NaiveDate) -> Result<SeedReport> {
  let path = path.as_ref();
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }

  let orders = demo_orders(today);
  let conn = tokio_rusqlite::Connection::open(path).await?;
  let report = conn
    .call(move |conn| {
      conn.execute_batch(DEMO_SCHEMA)?;
      let tx = conn.transaction()?;
      let mut report = SeedReport::default();

      {
        let mut insert =
          tx.prepare("INSERT OR IGNORE INTO customers (customer_id, name, state) VALUES (?1, ?2, ?3)")?;
        for (id, name, state) in CUSTOMERS {
          report.customers += insert.execute(rusqlite::params![id, name, state])?;
        }
      }

      let existing: i64 = tx.query_row("SELECT COUNT(*) FROM orders", [], |r| r.get(0))?;
      if existing == 0 {
        let mut insert =
          tx.prepare("INSERT INTO orders (customer_id, order_date, amount) VALUES (?1, ?2, ?3)")?;
        for (customer_id, date, amount) in &orders {
          report.orders += insert.execute(rusqlite::params![customer_id, date, amount])?;
        }
      }

      tx.commit()?;
      Ok(report)
    })
    .await?;
  conn.close().await?;

  info!(
    path = %path.display(),
    customers = report.customers,
    orders = report.orders,
    "seeded demo database"
  );
  Ok(report)
}
