//! Ledger row codec
//!
//! Maps between a 15-column master row and a `Transfer`, and patches the
//! legacy header layout in place on first use.

use serde_json::Value;

use crate::errors::{DomainError, Result};
use crate::models::{Transfer, TransferState};
use crate::sheets::types::{Request, ValueInputMode};
use crate::sheets::{a1, SheetsApi};

/// Tab holding one row per transfer; the source of truth.
pub const MASTER_SHEET: &str = "Master";

/// Canonical column order of the master sheet.
pub const MASTER_HEADER: [&str; 15] = [
    "transferId",
    "customerId",
    "customerName",
    "rideDateISO",
    "rideTime",
    "pickup",
    "dropoff",
    "roomOrName",
    "vehicle",
    "amountEUR",
    "payment",
    "driverId",
    "driverName",
    "state",
    "requestedAtISO",
];

/// Pre-migration layout: renamed customer/driver id columns, no driverName.
const LEGACY_HEADER: [&str; 14] = [
    "transferId",
    "userId",
    "customerName",
    "rideDateISO",
    "rideTime",
    "pickup",
    "dropoff",
    "roomOrName",
    "vehicle",
    "amountEUR",
    "payment",
    "driver",
    "state",
    "requestedAtISO",
];

pub const COL_TRANSFER_ID: usize = 0;
pub const COL_DRIVER_NAME: usize = 12;
pub const COL_STATE: usize = 13;

/// A1 range of the master row at 1-based `row`.
pub fn master_row_range(row: usize) -> String {
    a1::row_range(MASTER_SHEET, row, MASTER_HEADER.len())
}

/// A1 range of the identity column.
pub fn master_id_column() -> String {
    a1::col_range(MASTER_SHEET, COL_TRANSFER_ID)
}

fn cell_str(row: &[Value], i: usize) -> String {
    match row.get(i) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn cell_opt(row: &[Value], i: usize) -> Option<String> {
    let s = cell_str(row, i);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn cell_amount(row: &[Value], i: usize) -> Option<f64> {
    match row.get(i) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if !s.is_empty() => s.replace(',', ".").parse().ok(),
        _ => None,
    }
}

/// Decodes a raw master row. Short rows and rows with no id or an
/// unrecognized state decode to `None` (not found), never an error.
pub fn decode(row: &[Value]) -> Option<Transfer> {
    if row.len() < MASTER_HEADER.len() {
        return None;
    }
    let transfer_id = cell_str(row, COL_TRANSFER_ID);
    if transfer_id.is_empty() {
        return None;
    }
    let state = TransferState::parse(&cell_str(row, COL_STATE))?;

    Some(Transfer {
        transfer_id,
        customer_id: cell_str(row, 1),
        customer_name: cell_opt(row, 2),
        ride_date_iso: cell_str(row, 3),
        ride_time: cell_str(row, 4),
        pickup: cell_str(row, 5),
        dropoff: cell_str(row, 6),
        room_or_name: cell_opt(row, 7),
        vehicle: cell_opt(row, 8),
        amount_eur: cell_amount(row, 9),
        payment: cell_opt(row, 10),
        driver_id: cell_opt(row, 11),
        driver_name: cell_opt(row, COL_DRIVER_NAME),
        state,
        requested_at_iso: cell_str(row, 14),
    })
}

/// Encodes a transfer as a full master row. Absent optionals become empty
/// strings; the amount stays a number.
pub fn encode(t: &Transfer) -> Vec<Value> {
    let opt = |v: &Option<String>| Value::String(v.clone().unwrap_or_default());
    let amount = t
        .amount_eur
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(String::new()));

    vec![
        Value::String(t.transfer_id.clone()),
        Value::String(t.customer_id.clone()),
        opt(&t.customer_name),
        Value::String(t.ride_date_iso.clone()),
        Value::String(t.ride_time.clone()),
        Value::String(t.pickup.clone()),
        Value::String(t.dropoff.clone()),
        opt(&t.room_or_name),
        opt(&t.vehicle),
        amount,
        opt(&t.payment),
        opt(&t.driver_id),
        opt(&t.driver_name),
        Value::String(t.state.as_str().to_string()),
        Value::String(t.requested_at_iso.clone()),
    ]
}

#[derive(Debug, PartialEq, Eq)]
enum HeaderLayout {
    Canonical,
    Legacy,
    Missing,
    Unrecognized,
}

fn classify(header: &[String]) -> HeaderLayout {
    if header.is_empty() || header.iter().all(|c| c.is_empty()) {
        return HeaderLayout::Missing;
    }
    if header.len() >= MASTER_HEADER.len()
        && header
            .iter()
            .zip(MASTER_HEADER.iter())
            .all(|(a, b)| a == b)
    {
        return HeaderLayout::Canonical;
    }
    if header.len() >= LEGACY_HEADER.len()
        && header
            .iter()
            .zip(LEGACY_HEADER.iter())
            .all(|(a, b)| a == b)
    {
        return HeaderLayout::Legacy;
    }
    HeaderLayout::Unrecognized
}

fn canonical_header_row() -> Vec<Vec<Value>> {
    vec![MASTER_HEADER
        .iter()
        .map(|h| Value::String((*h).to_string()))
        .collect()]
}

/// One-time structural patch of a legacy master header: inserts the missing
/// driverName column and rewrites the header row to the canonical layout.
/// Idempotent; returns whether anything changed.
pub async fn migrate_legacy_header(sheets: &dyn SheetsApi) -> Result<bool> {
    let header_range = a1::row_range(MASTER_SHEET, 1, MASTER_HEADER.len());
    let rows = sheets.values_get(&header_range).await?;
    let header: Vec<String> = rows
        .first()
        .map(|r| {
            r.iter()
                .map(|c| c.as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default();

    match classify(&header) {
        HeaderLayout::Canonical => Ok(false),
        HeaderLayout::Missing => {
            sheets
                .values_update(&header_range, canonical_header_row(), ValueInputMode::Raw)
                .await?;
            Ok(true)
        }
        HeaderLayout::Legacy => {
            let sheet_id = sheets
                .sheet_id(MASTER_SHEET)
                .await?
                .ok_or_else(|| DomainError::NotFound("Master sheet not found".to_string()))?;
            sheets
                .batch_update(vec![Request::insert_columns(
                    sheet_id,
                    COL_DRIVER_NAME as i64,
                    1,
                )])
                .await?;
            sheets
                .values_update(&header_range, canonical_header_row(), ValueInputMode::Raw)
                .await?;
            Ok(true)
        }
        HeaderLayout::Unrecognized => Err(DomainError::InvalidInput(format!(
            "unrecognized master header layout: {:?}",
            header
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransferState;
    use serde_json::json;

    fn sample() -> Transfer {
        Transfer {
            transfer_id: "1709890000000-a4f2".into(),
            customer_id: "u1".into(),
            customer_name: Some("Hotel X Rezeption".into()),
            ride_date_iso: "2025-03-10".into(),
            ride_time: "14:30".into(),
            pickup: "Hotel X".into(),
            dropoff: "Airport".into(),
            room_or_name: None,
            vehicle: Some("Van".into()),
            amount_eur: Some(58.5),
            payment: None,
            driver_id: None,
            driver_name: None,
            state: TransferState::Pending,
            requested_at_iso: "2025-03-01T08:00:00Z".into(),
        }
    }

    #[test]
    fn round_trip_preserves_record() {
        let original = sample();
        let decoded = decode(&encode(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn absent_optionals_decode_as_none_not_empty() {
        let decoded = decode(&encode(&sample())).unwrap();
        assert_eq!(decoded.room_or_name, None);
        assert_eq!(decoded.payment, None);
        assert_eq!(decoded.driver_id, None);
    }

    #[test]
    fn short_row_is_not_found() {
        assert_eq!(decode(&[json!("id"), json!("u1")]), None);
        assert_eq!(decode(&[]), None);
    }

    #[test]
    fn missing_id_is_not_found() {
        let mut row = encode(&sample());
        row[COL_TRANSFER_ID] = json!("");
        assert_eq!(decode(&row), None);
    }

    #[test]
    fn amount_decodes_from_string_cells() {
        let mut row = encode(&sample());
        row[9] = json!("58,50");
        assert_eq!(decode(&row).unwrap().amount_eur, Some(58.5));
    }

    #[test]
    fn classify_detects_layouts() {
        let canonical: Vec<String> = MASTER_HEADER.iter().map(|s| (*s).to_string()).collect();
        let legacy: Vec<String> = LEGACY_HEADER.iter().map(|s| (*s).to_string()).collect();
        assert_eq!(classify(&canonical), HeaderLayout::Canonical);
        assert_eq!(classify(&legacy), HeaderLayout::Legacy);
        assert_eq!(classify(&[]), HeaderLayout::Missing);
        assert_eq!(
            classify(&["foo".to_string(), "bar".to_string()]),
            HeaderLayout::Unrecognized
        );
    }
}
