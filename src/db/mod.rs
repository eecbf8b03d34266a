use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::rusqlite::{self, params, OptionalExtension, TransactionBehavior};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::time::Duration;

use crate::numbering;

pub mod models;

use models::Receipt;

pub type DbPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = include_str!("../../migrations/init.sql");

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid stored denominations: {0}")]
    Denominations(#[from] serde_json::Error),

    #[error("invalid stored date: {0}")]
    Date(#[from] chrono::ParseError),

    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("receipt sequence for {0:?} is exhausted")]
    SequenceExhausted(String),
}

pub async fn init_pool(path: &Path, max_size: u32) -> anyhow::Result<DbPool> {
    // Writers queue behind BEGIN IMMEDIATE instead of failing with SQLITE_BUSY.
    let manager = SqliteConnectionManager::file(path)
        .with_init(|conn| conn.busy_timeout(Duration::from_secs(30)));

    let pool = Pool::builder()
        .max_size(max_size)
        .connection_timeout(Duration::from_secs(60))
        .build(manager)
        .map_err(|e| anyhow::anyhow!("Failed to create DB pool: {}", e))?;

    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    with_conn(pool, |conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    })
    .await
}

async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T, DbError>
where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> Result<T, DbError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

fn format_date(date: &DateTime<Utc>) -> String {
    // Fixed width so that lexical order in SQLite matches time order.
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Reserve the next receipt number under `prefix`.
///
/// The last receipt and the stored counter are read and the counter advanced
/// inside one immediate transaction, so concurrent callers are serialized by
/// SQLite's write lock and never see the same value.
pub async fn allocate_receipt_number(
    pool: &DbPool,
    prefix: &str,
    seed: u64,
) -> Result<String, DbError> {
    let prefix = prefix.to_string();
    with_conn(pool, move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let last_receipt: Option<String> = tx
            .query_row(
                "SELECT receipt_number FROM receipts
                 WHERE substr(receipt_number, 1, length(?1)) = ?1
                 ORDER BY date DESC, rowid DESC
                 LIMIT 1",
                params![prefix],
                |row| row.get(0),
            )
            .optional()?;

        let last_counter: Option<i64> = tx
            .query_row(
                "SELECT last_value FROM receipt_sequences WHERE prefix = ?1",
                params![prefix],
                |row| row.get(0),
            )
            .optional()?;

        let value = numbering::next_value(
            &prefix,
            last_receipt.as_deref(),
            last_counter.and_then(|v| u64::try_from(v).ok()),
            seed,
        )
        .ok_or_else(|| DbError::SequenceExhausted(prefix.clone()))?;
        // SQLite integers are signed 64-bit.
        let stored = i64::try_from(value).map_err(|_| DbError::SequenceExhausted(prefix.clone()))?;

        tx.execute(
            "INSERT INTO receipt_sequences (prefix, last_value) VALUES (?1, ?2)
             ON CONFLICT(prefix) DO UPDATE SET last_value = excluded.last_value",
            params![prefix, stored],
        )?;
        tx.commit()?;

        Ok(numbering::format_receipt_number(&prefix, value))
    })
    .await
}

pub async fn insert_receipt(pool: &DbPool, receipt: &Receipt) -> Result<(), DbError> {
    let receipt = receipt.clone();
    with_conn(pool, move |conn| {
        let denominations = serde_json::to_string(&receipt.denominations)?;
        conn.execute(
            "INSERT INTO receipts (
                id, receipt_number, volunteer_name, donor_name, donor_pan, email,
                mobile_no, address, denominations, total, date, pdf_path
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                receipt.id,
                receipt.receipt_number,
                receipt.volunteer_name,
                receipt.donor_name,
                receipt.donor_pan,
                receipt.email,
                receipt.mobile_no,
                receipt.address,
                denominations,
                receipt.total,
                format_date(&receipt.date),
                receipt.pdf_path,
            ],
        )?;
        Ok(())
    })
    .await
}

/// All receipts, oldest first.
pub async fn list_receipts(pool: &DbPool) -> Result<Vec<Receipt>, DbError> {
    with_conn(pool, |conn| {
        let mut stmt = conn.prepare(
            "SELECT id, receipt_number, volunteer_name, donor_name, donor_pan, email,
                    mobile_no, address, denominations, total, date, pdf_path
             FROM receipts
             ORDER BY date ASC, rowid ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ReceiptRow {
                    id: row.get(0)?,
                    receipt_number: row.get(1)?,
                    volunteer_name: row.get(2)?,
                    donor_name: row.get(3)?,
                    donor_pan: row.get(4)?,
                    email: row.get(5)?,
                    mobile_no: row.get(6)?,
                    address: row.get(7)?,
                    denominations: row.get(8)?,
                    total: row.get(9)?,
                    date: row.get(10)?,
                    pdf_path: row.get(11)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(Receipt::try_from).collect()
    })
    .await
}

struct ReceiptRow {
    id: String,
    receipt_number: String,
    volunteer_name: String,
    donor_name: String,
    donor_pan: String,
    email: String,
    mobile_no: String,
    address: String,
    denominations: String,
    total: f64,
    date: String,
    pdf_path: Option<String>,
}

impl TryFrom<ReceiptRow> for Receipt {
    type Error = DbError;

    fn try_from(row: ReceiptRow) -> Result<Self, Self::Error> {
        Ok(Receipt {
            id: row.id,
            volunteer_name: row.volunteer_name,
            donor_name: row.donor_name,
            donor_pan: row.donor_pan,
            email: row.email,
            mobile_no: row.mobile_no,
            address: row.address,
            denominations: serde_json::from_str(&row.denominations)?,
            total: row.total,
            receipt_number: row.receipt_number,
            date: DateTime::parse_from_rfc3339(&row.date)?.with_timezone(&Utc),
            pdf_path: row.pdf_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_pool() -> (DbPool, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let pool = init_pool(&dir.path().join("test.db"), 4).await.expect("init pool");
        run_migrations(&pool).await.expect("migrations");
        (pool, dir)
    }

    fn receipt(number: &str, date: DateTime<Utc>) -> Receipt {
        Receipt {
            id: uuid::Uuid::new_v4().to_string(),
            volunteer_name: "Asha".to_string(),
            donor_name: "Ravi".to_string(),
            donor_pan: "ABCDE1234F".to_string(),
            email: "ravi@example.org".to_string(),
            mobile_no: "9999999999".to_string(),
            address: "12 Park Street".to_string(),
            denominations: [("500".to_string(), serde_json::json!(2))].into_iter().collect(),
            total: 1000.0,
            receipt_number: number.to_string(),
            date,
            pdf_path: None,
        }
    }

    #[tokio::test]
    async fn first_allocation_uses_seed() {
        let (pool, _dir) = test_pool().await;
        let number = allocate_receipt_number(&pool, "#T/", 1).await.expect("allocate");
        assert_eq!(number, "#T/1");
    }

    #[tokio::test]
    async fn allocation_follows_last_receipt() {
        let (pool, _dir) = test_pool().await;
        insert_receipt(&pool, &receipt("#T/42", Utc::now())).await.expect("insert");

        let number = allocate_receipt_number(&pool, "#T/", 1).await.expect("allocate");
        assert!(number.ends_with("43"), "got {}", number);
    }

    #[tokio::test]
    async fn allocations_without_inserts_still_advance() {
        let (pool, _dir) = test_pool().await;
        let first = allocate_receipt_number(&pool, "#T/", 1).await.expect("allocate");
        let second = allocate_receipt_number(&pool, "#T/", 1).await.expect("allocate");
        assert_eq!(first, "#T/1");
        assert_eq!(second, "#T/2");
    }

    #[tokio::test]
    async fn other_prefixes_are_ignored() {
        let (pool, _dir) = test_pool().await;
        insert_receipt(&pool, &receipt("REC1700000000000", Utc::now())).await.expect("insert");

        let number = allocate_receipt_number(&pool, "#T/", 5).await.expect("allocate");
        assert_eq!(number, "#T/5");
    }

    #[tokio::test]
    async fn prefix_ending_in_digit_keeps_counting() {
        let (pool, _dir) = test_pool().await;
        let first = allocate_receipt_number(&pool, "#R2024", 1).await.expect("allocate");
        insert_receipt(&pool, &receipt(&first, Utc::now())).await.expect("insert");
        let second = allocate_receipt_number(&pool, "#R2024", 1).await.expect("allocate");

        assert_eq!(first, "#R20241");
        assert_eq!(second, "#R20242");
    }

    #[tokio::test]
    async fn exhausted_sequence_is_an_error() {
        let (pool, _dir) = test_pool().await;
        let last = format!("#T/{}", i64::MAX);
        insert_receipt(&pool, &receipt(&last, Utc::now())).await.expect("insert");

        let err = allocate_receipt_number(&pool, "#T/", 1).await.expect_err("overflow");
        assert!(matches!(err, DbError::SequenceExhausted(ref p) if p == "#T/"));

        let huge = format!("#U/{}", u64::MAX);
        insert_receipt(&pool, &receipt(&huge, Utc::now())).await.expect("insert");
        let err = allocate_receipt_number(&pool, "#U/", 1).await.expect_err("overflow");
        assert!(matches!(err, DbError::SequenceExhausted(_)));
    }

    #[tokio::test]
    async fn concurrent_allocations_are_distinct() {
        let (pool, _dir) = test_pool().await;
        let mut handles = Vec::new();
        for _ in 0..16 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                allocate_receipt_number(&pool, "#T/", 1).await.expect("allocate")
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.expect("join"));
        }
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 16);
    }

    #[tokio::test]
    async fn list_round_trips_fields_in_date_order() {
        let (pool, _dir) = test_pool().await;
        let older = receipt("#T/1", Utc::now() - chrono::Duration::minutes(5));
        let mut newer = receipt("#T/2", Utc::now());
        newer.pdf_path = Some("/tmp/-T-2.pdf".to_string());

        insert_receipt(&pool, &newer).await.expect("insert newer");
        insert_receipt(&pool, &older).await.expect("insert older");

        let listed = list_receipts(&pool).await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].receipt_number, "#T/1");
        assert_eq!(listed[1].receipt_number, "#T/2");
        assert_eq!(listed[1].pdf_path.as_deref(), Some("/tmp/-T-2.pdf"));
        assert_eq!(listed[0].denominations, older.denominations);
        assert_eq!(listed[0].donor_pan, "ABCDE1234F");
    }
}
