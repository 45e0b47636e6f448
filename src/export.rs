use bigdecimal::BigDecimal;
use chrono::{NaiveDate, SecondsFormat};

use crate::errors::AppError;
use crate::models::Lead;
use crate::query::{LeadFilter, LeadSort, SortField, SortOrder};
use crate::store::LeadStore;

/// Column order of an export file.
pub const EXPORT_HEADERS: [&str; 16] = [
    "Lead Type",
    "Name",
    "Phone",
    "Email",
    "Address",
    "City",
    "State",
    "Zip Code",
    "Notes",
    "Call Recording",
    "Estimate",
    "MAO",
    "Offer Price",
    "Equity",
    "Status",
    "Created At",
];

/// `leads_export_<YYYY-MM-DD>.csv`
pub fn export_filename(date: NaiveDate) -> String {
    format!("leads_export_{}.csv", date.format("%Y-%m-%d"))
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn decimal(value: &Option<BigDecimal>) -> String {
    value
        .as_ref()
        .map(BigDecimal::to_plain_string)
        .unwrap_or_default()
}

fn export_record(lead: &Lead) -> [String; 16] {
    [
        lead.lead_type.to_string(),
        lead.name.clone(),
        text(&lead.phone),
        text(&lead.email),
        text(&lead.address),
        text(&lead.city),
        text(&lead.state),
        text(&lead.zip_code),
        text(&lead.notes),
        text(&lead.call_recording),
        decimal(&lead.estimate),
        decimal(&lead.mao),
        decimal(&lead.offer_price),
        decimal(&lead.equity),
        lead.status.to_string(),
        lead.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    ]
}

/// Writes `leads` as CSV, header row first.
pub fn write_csv(leads: &[Lead]) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(EXPORT_HEADERS)?;
    for lead in leads {
        writer.write_record(export_record(lead))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::InternalError(format!("Failed to flush CSV export: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::InternalError(format!("CSV export is not UTF-8: {}", e)))
}

/// Every lead matching `filter`, newest first, rendered as CSV.
pub async fn export_csv(store: &dyn LeadStore, filter: &LeadFilter) -> Result<String, AppError> {
    let sort = LeadSort::new(SortField::CreatedAt, SortOrder::Desc);
    let leads = store.find_leads(filter, sort, None).await?;

    tracing::info!("Exporting {} lead(s)", leads.len());
    write_csv(&leads)
}
