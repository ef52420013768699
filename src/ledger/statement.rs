//! Monthly statement builder
//!
//! Maintains one derived sheet per (customer, month). Data rows carry live
//! lookup formulas against the master ledger keyed by the hidden transferId
//! column, so later edits to the master propagate without rewriting the
//! statement. `sync_monthly_sheet` wipes and regenerates a sheet from the
//! master for disaster recovery or backfill.

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::{DomainError, Result};
use crate::ledger::codec::{self, MASTER_SHEET};
use crate::models::{Transfer, TransferState, VOUCHER_PAYMENT};
use crate::sheets::types::{GridRange, Request, SortSpec, ValueInputMode};
use crate::sheets::{a1, SheetsApi};

/// Fixed VAT on passenger transport.
pub const VAT_RATE: f64 = 0.10;
/// Contractual early-settlement discount.
pub const DISCOUNT_RATE: f64 = 0.04;

/// Statement layout: 3 header rows, then data; column I is the hidden key.
const HEADER_ROWS: usize = 3;
const STMT_COLS: usize = 9;
const KEY_COL: usize = 8;

const COLUMN_TITLES: [&str; STMT_COLS] = [
    "Nr",
    "Datum",
    "Uhrzeit",
    "Von",
    "Nach",
    "Zimmer/Name",
    "Betrag (EUR)",
    "Zahlung",
    "transferId",
];

/// Deterministic tab title for one customer and month.
pub fn sheet_title(customer_id: &str, month: &str) -> String {
    format!("Abrechnung {} {}", customer_id, month)
}

/// Formula argument separator for the spreadsheet locale: comma-decimal
/// locales use semicolons.
pub fn arg_separator(locale: &str) -> char {
    let lang = locale
        .split(['_', '-'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    const SEMICOLON_LANGS: [&str; 18] = [
        "de", "fr", "it", "es", "pt", "nl", "fi", "sv", "da", "nb", "no", "pl", "cs", "sk", "hu",
        "ru", "tr", "sl",
    ];
    if SEMICOLON_LANGS.contains(&lang.as_str()) {
        ';'
    } else {
        ','
    }
}

/// Exact-match lookup of one master column for the key in this row's hidden
/// key cell.
fn lookup(master_col: char, row: usize, sep: char) -> String {
    format!(
        "INDEX({m}!{c}:{c}{s}MATCH($I{r}{s}{m}!A:A{s}0))",
        m = MASTER_SHEET,
        c = master_col,
        r = row,
        s = sep
    )
}

/// The formula-driven cells of one data row at 1-based sheet `row`.
fn data_row(nr: usize, transfer_id: &str, row: usize, sep: char) -> Vec<Value> {
    vec![
        json!(nr),
        json!(format!("=DATEVALUE({})", lookup('D', row, sep))),
        json!(format!("=TIMEVALUE({})", lookup('E', row, sep))),
        json!(format!("={}", lookup('F', row, sep))),
        json!(format!("={}", lookup('G', row, sep))),
        json!(format!("={}", lookup('H', row, sep))),
        json!(format!("=IFERROR(VALUE({}){}0)", lookup('J', row, sep), sep)),
        json!(format!("={}", lookup('K', row, sep))),
        json!(transfer_id),
    ]
}

/// Number of populated data rows, by scanning the hidden key column.
async fn populated_rows(sheets: &dyn SheetsApi, title: &str) -> Result<usize> {
    let range = format!(
        "{}!{c}{r}:{c}",
        a1::sheet_prefix(title),
        c = a1::col_letter(KEY_COL),
        r = HEADER_ROWS + 1
    );
    let rows = sheets.values_get(&range).await?;
    Ok(rows
        .iter()
        .filter(|r| r.first().and_then(Value::as_str).is_some_and(|s| !s.is_empty()))
        .count())
}

/// Ensures the statement sheet exists, returning its id. On first use writes
/// the 3-row header block and applies the fixed visual style.
pub async fn ensure_sheet(
    sheets: &dyn SheetsApi,
    customer_id: &str,
    customer_name: Option<&str>,
    month: &str,
) -> Result<i64> {
    let title = sheet_title(customer_id, month);
    if let Some(id) = sheets.sheet_id(&title).await? {
        return Ok(id);
    }

    info!(customer_id, month, "creating statement sheet");
    sheets
        .batch_update(vec![Request::add_sheet(&title)])
        .await?;
    sheets.invalidate_metadata().await;
    let sheet_id = sheets
        .sheet_id(&title)
        .await?
        .ok_or_else(|| DomainError::Io(format!("created sheet {} not visible", title)))?;

    let header_range = format!("{}!A1:I{}", a1::sheet_prefix(&title), HEADER_ROWS);
    let display = customer_name.unwrap_or(customer_id);
    let header_rows = vec![
        vec![json!(format!("Monatsabrechnung {}", month))],
        vec![json!(display), json!(customer_id)],
        COLUMN_TITLES.iter().map(|t| json!(t)).collect(),
    ];
    sheets
        .values_update(&header_range, header_rows, ValueInputMode::Raw)
        .await?;

    let style = vec![
        Request::freeze_rows(sheet_id, HEADER_ROWS as i64),
        Request::bold(GridRange::new(sheet_id, 0..HEADER_ROWS as i64, 0..STMT_COLS as i64)),
        Request::number_format(
            GridRange::new(sheet_id, HEADER_ROWS as i64..1000, 1..2),
            "DATE",
            "dd.mm.yyyy",
        ),
        Request::number_format(
            GridRange::new(sheet_id, HEADER_ROWS as i64..1000, 2..3),
            "TIME",
            "hh:mm",
        ),
        Request::number_format(
            GridRange::new(sheet_id, HEADER_ROWS as i64..1000, 6..7),
            "CURRENCY",
            "#,##0.00 €",
        ),
        Request::column_width(sheet_id, 0, 40),
        Request::column_width(sheet_id, 1, 90),
        Request::column_width(sheet_id, 2, 70),
        Request::column_width(sheet_id, 3, 160),
        Request::column_width(sheet_id, 4, 160),
        Request::column_width(sheet_id, 5, 120),
        Request::column_width(sheet_id, 6, 100),
        Request::hide_column(sheet_id, KEY_COL as i64),
    ];
    sheets.batch_update(style).await?;
    Ok(sheet_id)
}

/// Incremental path: called once per newly completed transfer. Inserts one
/// data row, then delegates finalization to the post-processing hook when
/// one is configured (the caller passes `delegate = true` in that case).
pub async fn append_completed(
    sheets: &dyn SheetsApi,
    transfer: &Transfer,
    delegate: bool,
) -> Result<()> {
    let month = transfer.ride_month().to_string();
    let title = sheet_title(&transfer.customer_id, &month);
    let sheet_id = ensure_sheet(
        sheets,
        &transfer.customer_id,
        transfer.customer_name.as_deref(),
        &month,
    )
    .await?;

    let sep = arg_separator(&sheets.locale().await?);
    let existing = populated_rows(sheets, &title).await?;
    let row = HEADER_ROWS + existing + 1;

    sheets
        .batch_update(vec![Request::insert_rows(
            sheet_id,
            (row - 1) as i64,
            1,
        )])
        .await?;
    let range = a1::row_range(&title, row, STMT_COLS);
    let cells = data_row(existing + 1, &transfer.transfer_id, row, sep);
    sheets
        .values_update(&range, vec![cells], ValueInputMode::UserEntered)
        .await?;
    debug!(
        transfer_id = %transfer.transfer_id,
        title, row, "statement row appended"
    );

    if !delegate {
        finalize(sheets, sheet_id, &title, sep).await?;
    }
    Ok(())
}

/// Totals block two rows below the data: gross, voucher deduction, net, net
/// incl. VAT, discounted incl. VAT. Rate factors are written as integer
/// percent fractions, never as decimal literals: comma-decimal locales would
/// reject `1.1` inside a `USER_ENTERED` formula.
fn totals_block(first: usize, last: usize, t1: usize, sep: char) -> Vec<Vec<Value>> {
    let vat_pct = (VAT_RATE * 100.0).round() as i64;
    let disc_pct = (DISCOUNT_RATE * 100.0).round() as i64;
    vec![
        vec![
            json!("Summe brutto"),
            json!(format!("=SUM(G{}:G{})", first, last)),
        ],
        vec![
            json!("davon Gutschein"),
            json!(format!(
                "=-SUMIF(H{f}:H{l}{s}\"{v}\"{s}G{f}:G{l})",
                f = first,
                l = last,
                s = sep,
                v = VOUCHER_PAYMENT
            )),
        ],
        vec![
            json!("Summe netto"),
            json!(format!("=G{}+G{}", t1, t1 + 1)),
        ],
        vec![
            json!(format!("inkl. {}% USt", vat_pct)),
            json!(format!("=G{}*{}/100", t1 + 2, 100 + vat_pct)),
        ],
        vec![
            json!(format!("abzgl. {}% Rabatt, inkl. USt", disc_pct)),
            json!(format!(
                "=G{}*{}/100*{}/100",
                t1 + 2,
                100 - disc_pct,
                100 + vat_pct
            )),
        ],
    ]
}

/// Sort, renumber, totals, borders. Shared by the incremental path (when no
/// hook is configured) and the full resync.
async fn finalize(sheets: &dyn SheetsApi, sheet_id: i64, title: &str, sep: char) -> Result<()> {
    let count = populated_rows(sheets, title).await?;
    if count == 0 {
        return Ok(());
    }
    let first = HEADER_ROWS + 1; // 1-based first data row
    let last = HEADER_ROWS + count;

    sheets
        .batch_update(vec![Request::sort(
            GridRange::new(
                sheet_id,
                HEADER_ROWS as i64..last as i64,
                0..STMT_COLS as i64,
            ),
            vec![SortSpec::ascending(1), SortSpec::ascending(2)],
        )])
        .await?;

    let numbers: Vec<Vec<Value>> = (1..=count).map(|n| vec![json!(n)]).collect();
    let number_range = format!("{}!A{}:A{}", a1::sheet_prefix(title), first, last);
    sheets
        .values_update(&number_range, numbers, ValueInputMode::Raw)
        .await?;

    let t1 = last + 2;
    let totals_range = format!("{}!F{}:G{}", a1::sheet_prefix(title), t1, t1 + 4);
    sheets
        .values_update(
            &totals_range,
            totals_block(first, last, t1, sep),
            ValueInputMode::UserEntered,
        )
        .await?;

    sheets
        .batch_update(vec![Request::border_top(GridRange::new(
            sheet_id,
            (t1 - 1) as i64..t1 as i64,
            5..7,
        ))])
        .await?;
    Ok(())
}

/// Full resync: wipes and regenerates the derived sheet for one customer and
/// month from the master ledger. Returns the number of statement rows.
pub async fn sync_monthly_sheet(
    sheets: &dyn SheetsApi,
    customer_id: &str,
    customer_name: Option<&str>,
    month: &str,
) -> Result<usize> {
    let title = sheet_title(customer_id, month);

    // Collect completed transfers for the customer+month from the master.
    let raw = sheets
        .values_get(&format!("{}!A2:O", MASTER_SHEET))
        .await?;
    let mut transfers: Vec<Transfer> = raw
        .iter()
        .filter_map(|row| codec::decode(row))
        .filter(|t| {
            t.state == TransferState::Complete
                && t.customer_id == customer_id
                && t.ride_month() == month
        })
        .collect();
    transfers.sort_by(|a, b| {
        (a.ride_date_iso.as_str(), a.ride_time.as_str())
            .cmp(&(b.ride_date_iso.as_str(), b.ride_time.as_str()))
    });

    if let Some(old_id) = sheets.sheet_id(&title).await? {
        sheets
            .batch_update(vec![Request::delete_sheet(old_id)])
            .await?;
        sheets.invalidate_metadata().await;
    }
    let sheet_id = ensure_sheet(sheets, customer_id, customer_name, month).await?;

    let sep = arg_separator(&sheets.locale().await?);
    if !transfers.is_empty() {
        let rows: Vec<Vec<Value>> = transfers
            .iter()
            .enumerate()
            .map(|(i, t)| data_row(i + 1, &t.transfer_id, HEADER_ROWS + 1 + i, sep))
            .collect();
        let range = format!(
            "{}!A{}:I{}",
            a1::sheet_prefix(&title),
            HEADER_ROWS + 1,
            HEADER_ROWS + transfers.len()
        );
        sheets
            .values_update(&range, rows, ValueInputMode::UserEntered)
            .await?;
    }

    finalize(sheets, sheet_id, &title, sep).await?;
    info!(customer_id, month, rows = transfers.len(), "statement resynced");
    Ok(transfers.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_follows_locale() {
        assert_eq!(arg_separator("de_AT"), ';');
        assert_eq!(arg_separator("de"), ';');
        assert_eq!(arg_separator("fr_FR"), ';');
        assert_eq!(arg_separator("en_US"), ',');
        assert_eq!(arg_separator("en_GB"), ',');
        assert_eq!(arg_separator(""), ',');
    }

    #[test]
    fn data_row_uses_hidden_key_lookup() {
        let cells = data_row(2, "1709-a4f2", 5, ';');
        assert_eq!(cells[0], json!(2));
        assert_eq!(
            cells[1],
            json!("=DATEVALUE(INDEX(Master!D:D;MATCH($I5;Master!A:A;0)))")
        );
        assert_eq!(
            cells[6],
            json!("=IFERROR(VALUE(INDEX(Master!J:J;MATCH($I5;Master!A:A;0)));0)")
        );
        assert_eq!(cells[8], json!("1709-a4f2"));
    }

    #[test]
    fn data_row_respects_comma_locale() {
        let cells = data_row(1, "x", 4, ',');
        assert_eq!(
            cells[3],
            json!("=INDEX(Master!F:F,MATCH($I4,Master!A:A,0))")
        );
    }

    #[test]
    fn totals_avoid_decimal_literals() {
        let rows = totals_block(4, 5, 7, ';');
        assert_eq!(rows[0][1], json!("=SUM(G4:G5)"));
        assert_eq!(
            rows[1][1],
            json!("=-SUMIF(H4:H5;\"Gutschein\";G4:G5)")
        );
        assert_eq!(rows[2][1], json!("=G7+G8"));
        assert_eq!(rows[3], vec![json!("inkl. 10% USt"), json!("=G9*110/100")]);
        assert_eq!(
            rows[4],
            vec![
                json!("abzgl. 4% Rabatt, inkl. USt"),
                json!("=G9*96/100*110/100")
            ]
        );
        // Comma-decimal locales reject dot literals in USER_ENTERED formulas.
        for row in &rows {
            let formula = row[1].as_str().unwrap();
            assert!(!formula.contains('.'), "decimal literal in {}", formula);
        }
    }

    #[test]
    fn title_is_deterministic() {
        assert_eq!(sheet_title("u1", "2025-03"), "Abrechnung u1 2025-03");
    }
}
