//! CSV lead import.
//!
//! Rows are processed strictly in file order so that duplicate detection sees
//! every lead created by an earlier row of the same file. Each row either
//! creates one lead (plus its "imported" note), is skipped as a duplicate, or
//! is reported as a row error. A failing row never stops the import.
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::errors::{AppError, FieldError};
use crate::models::{ImportRowError, ImportSummary, LeadStatus, LeadType, NewLead};
use crate::store::LeadStore;
use crate::validation::check_new_lead;

/// Description of the note attached to every imported lead.
pub const IMPORT_NOTE: &str = "Lead imported from CSV";

/// Name given to rows without one.
pub const UNKNOWN_NAME: &str = "Unknown";

/// The header row is row 1, so the first data row is row 2.
const FIRST_DATA_ROW: usize = 2;

/// Parses a spreadsheet amount such as `$1,250.50`, `45%` or ` 300 000 `.
///
/// Returns `None` for blank or unparsable text; imports never fail on amounts
/// that cannot be read.
pub fn parse_currency(raw: &str) -> Option<BigDecimal> {
    let cleaned: String = raw
        .chars()
        .filter(|&c| !matches!(c, '$' | '€' | '£' | '¥' | '%' | ',') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    BigDecimal::from_str(&cleaned).ok()
}

/// Reads the `leadType` form value of an import request.
pub fn parse_import_lead_type(raw: Option<&str>) -> Result<LeadType, AppError> {
    raw.map(str::trim)
        .and_then(|raw| raw.parse::<LeadType>().ok())
        .ok_or_else(|| AppError::BadRequest("Invalid lead type".to_string()))
}

/// Positions of the recognised columns in the header row.
#[derive(Debug, Default)]
struct Columns {
    name: Option<usize>,
    phone: Option<usize>,
    email: Option<usize>,
    address: Option<usize>,
    city: Option<usize>,
    state: Option<usize>,
    zip_code: Vec<usize>,
    notes: Option<usize>,
    call_recording: Option<usize>,
    estimate: Option<usize>,
    mao: Option<usize>,
    offer_price: Vec<usize>,
    equity: Option<usize>,
    status: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let find_any = |names: &[&str]| -> Vec<usize> {
            names.iter().filter_map(|&n| find(n)).collect()
        };

        Self {
            name: find("Name"),
            phone: find("Phone"),
            email: find("Email"),
            address: find("Address"),
            city: find("City"),
            state: find("State"),
            zip_code: find_any(&["Zip Code", "ZipCode"]),
            notes: find("Notes"),
            call_recording: find("Call Recording"),
            estimate: find("Estimate"),
            mao: find("MAO"),
            offer_price: find_any(&["Offer Price", "OfferPrice"]),
            equity: find("Equity"),
            status: find("Status"),
        }
    }
}

/// Non-blank value of column `idx` in `record`.
fn cell(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// First non-blank value among fallback columns.
fn first_cell(record: &StringRecord, indices: &[usize]) -> Option<String> {
    indices.iter().find_map(|&i| cell(record, Some(i)))
}

fn amount(record: &StringRecord, idx: Option<usize>) -> Option<BigDecimal> {
    cell(record, idx).and_then(|raw| parse_currency(&raw))
}

/// Maps one data row onto a lead payload and runs the shared lead checks.
fn lead_from_record(
    lead_type: LeadType,
    columns: &Columns,
    record: &StringRecord,
) -> Result<NewLead, AppError> {
    let mut errors: Vec<FieldError> = Vec::new();

    let status = match cell(record, columns.status) {
        None => LeadStatus::default(),
        Some(raw) => raw.parse::<LeadStatus>().unwrap_or_else(|e| {
            errors.push(FieldError::new("status", e.to_string()));
            LeadStatus::default()
        }),
    };

    let call_recording = match lead_type {
        LeadType::Diamond => cell(record, columns.call_recording),
        LeadType::Dollar => None,
    };

    let lead = NewLead {
        lead_type,
        name: cell(record, columns.name).unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        phone: cell(record, columns.phone),
        email: cell(record, columns.email),
        address: cell(record, columns.address),
        city: cell(record, columns.city),
        state: cell(record, columns.state),
        zip_code: first_cell(record, &columns.zip_code),
        notes: cell(record, columns.notes),
        call_recording,
        estimate: amount(record, columns.estimate),
        mao: amount(record, columns.mao),
        offer_price: first_cell(record, &columns.offer_price).and_then(|raw| parse_currency(&raw)),
        equity: amount(record, columns.equity),
        status,
    };

    errors.extend(check_new_lead(&lead));
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    Ok(lead)
}

enum RowOutcome {
    Imported,
    Duplicate,
}

async fn import_record(
    store: &dyn LeadStore,
    lead_type: LeadType,
    columns: &Columns,
    record: &StringRecord,
    imported_at: DateTime<Utc>,
) -> Result<RowOutcome, AppError> {
    if let Some(phone) = cell(record, columns.phone) {
        if store.find_lead_by_phone(&phone).await?.is_some() {
            return Ok(RowOutcome::Duplicate);
        }
    }

    let lead = lead_from_record(lead_type, columns, record)?;
    store.create_lead(lead, Some(imported_at), IMPORT_NOTE).await?;
    Ok(RowOutcome::Imported)
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

/// Imports every data row of `csv_text` as a lead of `lead_type`.
pub async fn import_csv(
    store: &dyn LeadStore,
    lead_type: LeadType,
    csv_text: &str,
) -> Result<ImportSummary, AppError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(csv_text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::BadRequest(format!("Unreadable CSV header: {}", e)))?
        .clone();
    let columns = Columns::from_headers(&headers);
    let imported_at = Utc::now();

    let mut summary = ImportSummary::default();
    let mut index = 0usize;

    for result in reader.records() {
        let row = index + FIRST_DATA_ROW;

        let outcome = match result {
            Ok(record) if is_blank(&record) => continue,
            Ok(record) => import_record(store, lead_type, &columns, &record, imported_at).await,
            Err(e) => Err(AppError::BadRequest(format!("Malformed CSV record: {}", e))),
        };
        index += 1;

        match outcome {
            Ok(RowOutcome::Imported) => summary.success_count += 1,
            Ok(RowOutcome::Duplicate) => summary.duplicate_count += 1,
            Err(e) => {
                tracing::warn!("Import row {} failed: {}", row, e);
                summary.errors.push(ImportRowError {
                    row,
                    error: e.public_message(),
                });
            }
        }
    }

    tracing::info!(
        "Imported {} {} lead(s): {} duplicate(s), {} error(s)",
        summary.success_count,
        lead_type,
        summary.duplicate_count,
        summary.errors.len()
    );

    Ok(summary)
}
