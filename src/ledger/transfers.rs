//! Transfer lifecycle operations
//!
//! Guard table:
//!   create            — none; new row, state=pending
//!   assign_driver     — transfer exists; state unchanged
//!   mark_confirmed    — pending -> confirmed
//!   cancel_transfer   — pending and caller owns it -> canceled
//!   terminate_transfer— any non-complete -> terminated
//!   mark_completed    — pending|confirmed -> complete, statement append
//!
//! Every transition re-reads the current row by scanning the id column. The
//! ledger write is authoritative; mirror, metadata, and hook writes after it
//! are best-effort and never fail the operation. A statement failure after
//! the state write does surface (no rollback; recover via syncMonthlySheet).

use chrono::{NaiveDate, NaiveTime, SecondsFormat, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::context::RequestContext;
use crate::errors::{DomainError, Result};
use crate::ledger::{codec, statement};
use crate::models::{CreateTransferInput, Transfer, TransferState};
use crate::sheets::types::ValueInputMode;
use crate::sheets::SheetsApi;

/// Opaque, globally unique, never reused: creation timestamp plus a random
/// suffix.
fn new_transfer_id() -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("{}-{:08x}", Utc::now().timestamp_millis(), suffix)
}

/// Scans the identity column for `transfer_id` and re-reads the full row.
/// Returns the 1-based sheet row and the decoded record.
pub async fn find(sheets: &dyn SheetsApi, transfer_id: &str) -> Result<(usize, Transfer)> {
    let ids = sheets.values_get(&codec::master_id_column()).await?;
    let row = ids
        .iter()
        .position(|r| r.first().and_then(|v| v.as_str()) == Some(transfer_id))
        .map(|i| i + 1)
        .ok_or_else(|| DomainError::NotFound(format!("Transfer {} not found", transfer_id)))?;

    let cells = sheets.values_get(&codec::master_row_range(row)).await?;
    let transfer = cells
        .first()
        .and_then(|r| codec::decode(r))
        .ok_or_else(|| DomainError::NotFound(format!("Transfer {} not found", transfer_id)))?;
    Ok((row, transfer))
}

pub async fn get(sheets: &dyn SheetsApi, transfer_id: &str) -> Result<Transfer> {
    Ok(find(sheets, transfer_id).await?.1)
}

async fn write_row(sheets: &dyn SheetsApi, row: usize, t: &Transfer) -> Result<()> {
    sheets
        .values_update(
            &codec::master_row_range(row),
            vec![codec::encode(t)],
            ValueInputMode::Raw,
        )
        .await
}

/// Mirror write after a transition; opportunistic by design.
async fn mirror_upsert(ctx: &RequestContext, t: &Transfer) {
    if let Err(e) = ctx.mirror.upsert(t).await {
        debug!(transfer_id = %t.transfer_id, error = %e, "mirror upsert skipped");
    }
}

fn validate(input: &CreateTransferInput) -> Result<()> {
    if input.customer_id.trim().is_empty() {
        return Err(DomainError::InvalidInput("customerId must not be empty".into()));
    }
    if input.pickup.trim().is_empty() || input.dropoff.trim().is_empty() {
        return Err(DomainError::InvalidInput(
            "pickup and dropoff must not be empty".into(),
        ));
    }
    if NaiveDate::parse_from_str(&input.ride_date_iso, "%Y-%m-%d").is_err() {
        return Err(DomainError::InvalidInput(format!(
            "rideDateISO {} is not a calendar date",
            input.ride_date_iso
        )));
    }
    if NaiveTime::parse_from_str(&input.ride_time, "%H:%M").is_err() {
        return Err(DomainError::InvalidInput(format!(
            "rideTime {} is not HH:mm",
            input.ride_time
        )));
    }
    Ok(())
}

/// Appends a new pending transfer to the ledger. Append-only on purpose: two
/// concurrent creations never clobber each other.
pub async fn create(ctx: &RequestContext, input: CreateTransferInput) -> Result<Transfer> {
    validate(&input)?;

    let customer_name = ctx
        .identity
        .display_name(&ctx.cache, &input.customer_id)
        .await;
    let transfer = Transfer {
        transfer_id: new_transfer_id(),
        customer_id: input.customer_id,
        customer_name,
        ride_date_iso: input.ride_date_iso,
        ride_time: input.ride_time,
        pickup: input.pickup,
        dropoff: input.dropoff,
        room_or_name: input.room_or_name,
        vehicle: input.vehicle,
        amount_eur: input.amount_eur,
        payment: input.payment,
        driver_id: None,
        driver_name: None,
        state: TransferState::Pending,
        requested_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };

    ctx.sheets
        .values_append(
            &format!("{}!A:O", codec::MASTER_SHEET),
            vec![codec::encode(&transfer)],
        )
        .await?;
    info!(transfer_id = %transfer.transfer_id, customer = %transfer.customer_id, "transfer created");

    if let Err(e) = ctx.mirror.create(&transfer).await {
        warn!(transfer_id = %transfer.transfer_id, error = %e, "mirror create failed");
    }
    Ok(transfer)
}

/// Sets the driver; does not change state.
pub async fn assign_driver(
    ctx: &RequestContext,
    transfer_id: &str,
    driver_id: &str,
) -> Result<Transfer> {
    if driver_id.trim().is_empty() {
        return Err(DomainError::InvalidInput("driverId must not be empty".into()));
    }
    let (row, mut transfer) = find(ctx.sheets.as_ref(), transfer_id).await?;

    transfer.driver_id = Some(driver_id.to_string());
    transfer.driver_name = ctx.identity.display_name(&ctx.cache, driver_id).await;
    write_row(ctx.sheets.as_ref(), row, &transfer).await?;
    info!(transfer_id, driver_id, "driver assigned");

    mirror_upsert(ctx, &transfer).await;
    Ok(transfer)
}

pub async fn mark_confirmed(ctx: &RequestContext, transfer_id: &str) -> Result<Transfer> {
    let (row, mut transfer) = find(ctx.sheets.as_ref(), transfer_id).await?;
    if transfer.state != TransferState::Pending {
        return Err(DomainError::Conflict(
            "Only pending transfers can be confirmed".into(),
        ));
    }

    transfer.state = TransferState::Confirmed;
    write_row(ctx.sheets.as_ref(), row, &transfer).await?;
    info!(transfer_id, "transfer confirmed");

    mirror_upsert(ctx, &transfer).await;
    Ok(transfer)
}

/// Customer-initiated cancellation; only the owner may cancel, and only
/// while pending.
pub async fn cancel_transfer(
    ctx: &RequestContext,
    transfer_id: &str,
    caller_id: &str,
) -> Result<Transfer> {
    let (row, mut transfer) = find(ctx.sheets.as_ref(), transfer_id).await?;
    if transfer.customer_id != caller_id {
        return Err(DomainError::Conflict(
            "Only the requesting customer can cancel a transfer".into(),
        ));
    }
    if transfer.state != TransferState::Pending {
        return Err(DomainError::Conflict(
            "Only pending transfers can be canceled".into(),
        ));
    }

    transfer.state = TransferState::Canceled;
    write_row(ctx.sheets.as_ref(), row, &transfer).await?;
    info!(transfer_id, caller_id, "transfer canceled");

    mirror_upsert(ctx, &transfer).await;
    Ok(transfer)
}

/// Forced administrative close of anything not yet complete.
pub async fn terminate_transfer(ctx: &RequestContext, transfer_id: &str) -> Result<Transfer> {
    let (row, mut transfer) = find(ctx.sheets.as_ref(), transfer_id).await?;
    if transfer.state == TransferState::Complete {
        return Err(DomainError::Conflict(
            "Completed transfers cannot be terminated".into(),
        ));
    }

    transfer.state = TransferState::Terminated;
    write_row(ctx.sheets.as_ref(), row, &transfer).await?;
    info!(transfer_id, "transfer terminated");

    mirror_upsert(ctx, &transfer).await;
    Ok(transfer)
}

/// Completes a transfer and extends the customer's monthly statement. The
/// statement write happens after the state write and its failure surfaces to
/// the caller; everything after it is best-effort.
pub async fn mark_completed(ctx: &RequestContext, transfer_id: &str) -> Result<Transfer> {
    let (row, mut transfer) = find(ctx.sheets.as_ref(), transfer_id).await?;
    if !matches!(
        transfer.state,
        TransferState::Pending | TransferState::Confirmed
    ) {
        return Err(DomainError::Conflict(
            "Only pending or confirmed transfers can be completed".into(),
        ));
    }

    transfer.state = TransferState::Complete;
    write_row(ctx.sheets.as_ref(), row, &transfer).await?;
    info!(transfer_id, "transfer completed");

    let delegate = ctx.hook.is_some();
    statement::append_completed(ctx.sheets.as_ref(), &transfer, delegate).await?;
    if let Some(hook) = &ctx.hook {
        hook.notify(&transfer.customer_id, transfer.ride_month()).await;
    }

    mirror_upsert(ctx, &transfer).await;
    if let Some(amount) = transfer.amount_eur {
        let route = format!("{} -> {}", transfer.pickup, transfer.dropoff);
        let month = transfer.ride_month().to_string();
        if let Err(e) = ctx
            .identity
            .record_completion(&transfer.customer_id, &month, amount, &route)
            .await
        {
            warn!(transfer_id, error = %e, "completion metadata not recorded");
        }
    }
    Ok(transfer)
}
