//! SQLite mirror of the transfer ledger
//!
//! Derived, eventually-consistent projection of the master sheet keyed by
//! transfer_id. Serves the query patterns the spreadsheet cannot: filtered,
//! paginated reads. Never required for a ledger write to succeed.

use std::sync::Arc;

use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use crate::errors::{DomainError, Result};
use crate::models::{Transfer, TransferFilter, TransferState};

#[derive(Clone)]
pub struct MirrorStore {
    conn: Arc<Mutex<Connection>>,
}

impl MirrorStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS transfers (
                transfer_id TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL,
                customer_name TEXT,
                ride_date_iso TEXT NOT NULL,
                ride_time TEXT NOT NULL,
                pickup TEXT NOT NULL,
                dropoff TEXT NOT NULL,
                room_or_name TEXT,
                vehicle TEXT,
                amount_eur REAL,
                payment TEXT,
                driver_id TEXT,
                driver_name TEXT,
                state TEXT NOT NULL,
                requested_at_iso TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transfers_customer_date
             ON transfers(customer_id, ride_date_iso)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transfers_state_date
             ON transfers(state, ride_date_iso)",
            [],
        )?;
        Ok(())
    }

    /// Strict insert; duplicate key is a conflict (distinct from `upsert`).
    pub async fn create(&self, t: &Transfer) -> Result<()> {
        let conn = self.conn.lock().await;
        let result = conn.execute(
            "INSERT INTO transfers (
                transfer_id, customer_id, customer_name, ride_date_iso, ride_time,
                pickup, dropoff, room_or_name, vehicle, amount_eur,
                payment, driver_id, driver_name, state, requested_at_iso
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                t.transfer_id,
                t.customer_id,
                t.customer_name,
                t.ride_date_iso,
                t.ride_time,
                t.pickup,
                t.dropoff,
                t.room_or_name,
                t.vehicle,
                t.amount_eur,
                t.payment,
                t.driver_id,
                t.driver_name,
                t.state.as_str(),
                t.requested_at_iso
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(DomainError::Conflict(format!(
                    "transfer {} already mirrored",
                    t.transfer_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert-or-replace keyed by transfer_id.
    pub async fn upsert(&self, t: &Transfer) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO transfers (
                transfer_id, customer_id, customer_name, ride_date_iso, ride_time,
                pickup, dropoff, room_or_name, vehicle, amount_eur,
                payment, driver_id, driver_name, state, requested_at_iso
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(transfer_id) DO UPDATE SET
                customer_id = excluded.customer_id,
                customer_name = excluded.customer_name,
                ride_date_iso = excluded.ride_date_iso,
                ride_time = excluded.ride_time,
                pickup = excluded.pickup,
                dropoff = excluded.dropoff,
                room_or_name = excluded.room_or_name,
                vehicle = excluded.vehicle,
                amount_eur = excluded.amount_eur,
                payment = excluded.payment,
                driver_id = excluded.driver_id,
                driver_name = excluded.driver_name,
                state = excluded.state,
                requested_at_iso = excluded.requested_at_iso",
            params![
                t.transfer_id,
                t.customer_id,
                t.customer_name,
                t.ride_date_iso,
                t.ride_time,
                t.pickup,
                t.dropoff,
                t.room_or_name,
                t.vehicle,
                t.amount_eur,
                t.payment,
                t.driver_id,
                t.driver_name,
                t.state.as_str(),
                t.requested_at_iso
            ],
        )?;
        Ok(())
    }

    pub async fn get(&self, transfer_id: &str) -> Result<Option<Transfer>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT transfer_id, customer_id, customer_name, ride_date_iso, ride_time,
                    pickup, dropoff, room_or_name, vehicle, amount_eur,
                    payment, driver_id, driver_name, state, requested_at_iso
             FROM transfers WHERE transfer_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![transfer_id], Self::map_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Filtered, paginated read ordered by ride date then time.
    pub async fn query(
        &self,
        filter: &TransferFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Transfer>> {
        // Lock before assembling the parameter list: `dyn ToSql` is not
        // `Send`, so it must not be held across an await point.
        let conn = self.conn.lock().await;

        let mut sql = String::from(
            "SELECT transfer_id, customer_id, customer_name, ride_date_iso, ride_time,
                    pickup, dropoff, room_or_name, vehicle, amount_eur,
                    payment, driver_id, driver_name, state, requested_at_iso
             FROM transfers WHERE 1=1",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(state) = filter.state {
            sql.push_str(" AND state = ?");
            args.push(Box::new(state.as_str().to_string()));
        }
        if let Some(customer) = &filter.customer_id {
            sql.push_str(" AND customer_id = ?");
            args.push(Box::new(customer.clone()));
        }
        if let Some(driver) = &filter.driver_id {
            sql.push_str(" AND driver_id = ?");
            args.push(Box::new(driver.clone()));
        }
        if let Some(from) = &filter.date_from {
            sql.push_str(" AND ride_date_iso >= ?");
            args.push(Box::new(from.clone()));
        }
        if let Some(to) = &filter.date_to {
            sql.push_str(" AND ride_date_iso <= ?");
            args.push(Box::new(to.clone()));
        }
        sql.push_str(" ORDER BY ride_date_iso, ride_time LIMIT ? OFFSET ?");
        args.push(Box::new(i64::from(limit)));
        args.push(Box::new(i64::from(offset)));

        let mut stmt = conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_ref.as_slice(), Self::map_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transfer> {
        let state_raw: String = row.get(13)?;
        let state = TransferState::parse(&state_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                13,
                rusqlite::types::Type::Text,
                format!("unknown state {}", state_raw).into(),
            )
        })?;
        Ok(Transfer {
            transfer_id: row.get(0)?,
            customer_id: row.get(1)?,
            customer_name: row.get(2)?,
            ride_date_iso: row.get(3)?,
            ride_time: row.get(4)?,
            pickup: row.get(5)?,
            dropoff: row.get(6)?,
            room_or_name: row.get(7)?,
            vehicle: row.get(8)?,
            amount_eur: row.get(9)?,
            payment: row.get(10)?,
            driver_id: row.get(11)?,
            driver_name: row.get(12)?,
            state,
            requested_at_iso: row.get(14)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(id: &str, customer: &str, date: &str, time: &str) -> Transfer {
        Transfer {
            transfer_id: id.to_string(),
            customer_id: customer.to_string(),
            customer_name: None,
            ride_date_iso: date.to_string(),
            ride_time: time.to_string(),
            pickup: "Hotel X".into(),
            dropoff: "Airport".into(),
            room_or_name: None,
            vehicle: None,
            amount_eur: Some(40.0),
            payment: None,
            driver_id: None,
            driver_name: None,
            state: TransferState::Pending,
            requested_at_iso: "2025-03-01T08:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn query_future_is_send() {
        fn require_send<F: std::future::Future + Send>(f: F) -> F {
            f
        }
        let store = MirrorStore::in_memory().unwrap();
        let rows = require_send(store.query(&TransferFilter::default(), 10, 0))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.db");
        {
            let store = MirrorStore::new(path.to_str().unwrap()).unwrap();
            store
                .create(&transfer("t1", "u1", "2025-03-10", "14:30"))
                .await
                .unwrap();
        }
        let store = MirrorStore::new(path.to_str().unwrap()).unwrap();
        let got = store.get("t1").await.unwrap().unwrap();
        assert_eq!(got.customer_id, "u1");
    }

    #[tokio::test]
    async fn create_then_duplicate_conflicts() {
        let store = MirrorStore::in_memory().unwrap();
        let t = transfer("t1", "u1", "2025-03-10", "14:30");
        store.create(&t).await.unwrap();
        assert!(matches!(
            store.create(&t).await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn upsert_overwrites() {
        let store = MirrorStore::in_memory().unwrap();
        let mut t = transfer("t1", "u1", "2025-03-10", "14:30");
        store.upsert(&t).await.unwrap();
        t.state = TransferState::Confirmed;
        store.upsert(&t).await.unwrap();

        let got = store.get("t1").await.unwrap().unwrap();
        assert_eq!(got.state, TransferState::Confirmed);
    }

    #[tokio::test]
    async fn query_filters_and_orders_by_date_then_time() {
        let store = MirrorStore::in_memory().unwrap();
        store
            .upsert(&transfer("t1", "u1", "2025-03-11", "09:00"))
            .await
            .unwrap();
        store
            .upsert(&transfer("t2", "u1", "2025-03-10", "16:00"))
            .await
            .unwrap();
        store
            .upsert(&transfer("t3", "u1", "2025-03-10", "08:15"))
            .await
            .unwrap();
        store
            .upsert(&transfer("t4", "u2", "2025-03-09", "12:00"))
            .await
            .unwrap();

        let filter = TransferFilter {
            customer_id: Some("u1".into()),
            ..Default::default()
        };
        let rows = store.query(&filter, 10, 0).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|t| t.transfer_id.as_str()).collect();
        assert_eq!(ids, ["t3", "t2", "t1"]);
    }

    #[tokio::test]
    async fn query_paginates() {
        let store = MirrorStore::in_memory().unwrap();
        for (id, time) in [("a", "08:00"), ("b", "09:00"), ("c", "10:00")] {
            store
                .upsert(&transfer(id, "u1", "2025-03-10", time))
                .await
                .unwrap();
        }
        let page = store
            .query(&TransferFilter::default(), 1, 1)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].transfer_id, "b");
    }

    #[tokio::test]
    async fn date_range_filter() {
        let store = MirrorStore::in_memory().unwrap();
        store
            .upsert(&transfer("t1", "u1", "2025-02-28", "10:00"))
            .await
            .unwrap();
        store
            .upsert(&transfer("t2", "u1", "2025-03-05", "10:00"))
            .await
            .unwrap();
        store
            .upsert(&transfer("t3", "u1", "2025-04-01", "10:00"))
            .await
            .unwrap();

        let filter = TransferFilter {
            date_from: Some("2025-03-01".into()),
            date_to: Some("2025-03-31".into()),
            ..Default::default()
        };
        let rows = store.query(&filter, 10, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].transfer_id, "t2");
    }
}
