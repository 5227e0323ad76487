//! # Sequence Counters
//!
//! Atomic per-namespace counters backing the human-readable sequence
//! identifiers (`bill_no`, `order_no`, employee codes).
//!
//! ## Why a Counter Table?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ❌ RACY: scan for the highest existing identifier                  │
//! │     SELECT bill_no FROM bills ORDER BY id DESC LIMIT 1              │
//! │     → two workers read the same row, both compute "next",           │
//! │       both insert, one hits the UNIQUE constraint                   │
//! │                                                                     │
//! │  ✅ ATOMIC: one conditional upsert per namespace                    │
//! │     INSERT INTO sequences (namespace, value) VALUES (?, 1)          │
//! │     ON CONFLICT (namespace) DO UPDATE SET value = value + 1         │
//! │     RETURNING value                                                 │
//! │     → concurrent writers serialize on the namespace row             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter advance commits in its own short transaction, separate
//! from the insert that consumes the number, so an aborted sale leaves
//! a gap in the numbering rather than a rewound counter - gaps are
//! acceptable, collisions are not. The UNIQUE constraint on each
//! identifier column remains the safety net for rows that entered the
//! table outside this counter; a collision costs the caller one retry
//! with a freshly drawn number.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;

/// Increments the counter for `namespace` and returns the new value.
///
/// Call this on a plain pool connection, NOT inside the transaction
/// that inserts the resulting identifier: the advance must commit even
/// when that insert rolls back, otherwise a retry regenerates the very
/// number that just collided.
pub async fn next_in_namespace(conn: &mut SqliteConnection, namespace: &str) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sequences (namespace, value)
        VALUES (?1, 1)
        ON CONFLICT (namespace) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(namespace)
    .fetch_one(&mut *conn)
    .await?;

    debug!(namespace = %namespace, value = %value, "Sequence advanced");

    Ok(value)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_counter_starts_at_one_and_increments() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(next_in_namespace(&mut *conn, "bill:20260830").await.unwrap(), 1);
        assert_eq!(next_in_namespace(&mut *conn, "bill:20260830").await.unwrap(), 2);
        assert_eq!(next_in_namespace(&mut *conn, "bill:20260830").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_namespaces_are_independent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(next_in_namespace(&mut *conn, "bill:20260830").await.unwrap(), 1);
        assert_eq!(next_in_namespace(&mut *conn, "order:20260830").await.unwrap(), 1);
        assert_eq!(next_in_namespace(&mut *conn, "emp:BIL").await.unwrap(), 1);
        assert_eq!(next_in_namespace(&mut *conn, "bill:20260831").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_aborted_consumer_leaves_a_gap_not_a_rewind() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        // Draw a number on a plain connection, the way callers do, then
        // abort the transaction that would have consumed it.
        let drawn = {
            let mut conn = db.pool().acquire().await.unwrap();
            next_in_namespace(&mut *conn, "bill:20260830").await.unwrap()
        };
        assert_eq!(drawn, 1);

        let tx = db.pool().begin().await.unwrap();
        tx.rollback().await.unwrap();

        // The advance survived the abort; the next draw is fresh.
        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(next_in_namespace(&mut *conn, "bill:20260830").await.unwrap(), 2);
    }
}
