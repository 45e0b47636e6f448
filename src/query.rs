//! Filter, sort and pagination for lead listings.
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::errors::{AppError, FieldError};
use crate::models::{Lead, LeadPage, LeadStatus, LeadType};
use crate::store::LeadStore;
use crate::validation::non_blank;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 50;

/// Column a listing can be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    Name,
    #[default]
    CreatedAt,
    Estimate,
    Mao,
    Status,
}

impl SortField {
    pub const ALL: [SortField; 5] = [
        SortField::Name,
        SortField::CreatedAt,
        SortField::Estimate,
        SortField::Mao,
        SortField::Status,
    ];

    /// Name used in query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::CreatedAt => "createdAt",
            SortField::Estimate => "estimate",
            SortField::Mao => "mao",
            SortField::Status => "status",
        }
    }

    /// Backing column in the `leads` table.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::CreatedAt => "created_at",
            SortField::Estimate => "estimate",
            SortField::Mao => "mao",
            SortField::Status => "status",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("Invalid sort field '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("Invalid sort order '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeadSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl LeadSort {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Orders two leads the way PostgreSQL does: absent values sort after
    /// every present value in ascending order.
    pub fn compare(&self, a: &Lead, b: &Lead) -> Ordering {
        fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
            match (a, b) {
                (Some(a), Some(b)) => a.cmp(&b),
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
            }
        }

        let ordering = match self.field {
            SortField::Name => a.name.cmp(&b.name),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Estimate => nulls_last(a.estimate.as_ref(), b.estimate.as_ref()),
            SortField::Mao => nulls_last(a.mao.as_ref(), b.mao.as_ref()),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        };

        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Conditions a lead must satisfy to be listed, exported or counted.
///
/// All present conditions are AND'd; `search` is an OR across name, phone,
/// address, city and email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFilter {
    pub lead_type: Option<LeadType>,
    pub status: Option<LeadStatus>,
    pub search: Option<String>,
    /// Only leads created at or after this instant.
    pub created_since: Option<DateTime<Utc>>,
}

impl LeadFilter {
    pub fn by_type(lead_type: LeadType) -> Self {
        Self {
            lead_type: Some(lead_type),
            ..Self::default()
        }
    }

    pub fn by_status(status: LeadStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn created_since(since: DateTime<Utc>) -> Self {
        Self {
            created_since: Some(since),
            ..Self::default()
        }
    }

    /// Builds a filter from raw request values; blank values are ignored.
    pub fn from_params(params: &FilterParams) -> Result<Self, AppError> {
        let mut errors = Vec::new();

        let lead_type = non_blank(params.lead_type.clone()).and_then(|raw| {
            raw.parse::<LeadType>()
                .map_err(|e| errors.push(FieldError::new("type", e.to_string())))
                .ok()
        });
        let status = non_blank(params.status.clone()).and_then(|raw| {
            raw.parse::<LeadStatus>()
                .map_err(|e| errors.push(FieldError::new("status", e.to_string())))
                .ok()
        });

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok(Self {
            lead_type,
            status,
            search: non_blank(params.search.clone()),
            created_since: None,
        })
    }

    /// In-process evaluation of the filter.
    pub fn matches(&self, lead: &Lead) -> bool {
        if self.lead_type.is_some_and(|t| t != lead.lead_type) {
            return false;
        }
        if self.status.is_some_and(|s| s != lead.status) {
            return false;
        }
        if self.created_since.is_some_and(|since| lead.created_at < since) {
            return false;
        }

        match &self.search {
            None => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                let contains = |haystack: Option<&str>| {
                    haystack.is_some_and(|h| h.to_lowercase().contains(&needle))
                };
                contains(Some(&lead.name))
                    || contains(lead.phone.as_deref())
                    || contains(lead.address.as_deref())
                    || contains(lead.city.as_deref())
                    || contains(lead.email.as_deref())
            }
        }
    }
}

/// Filter fields shared by the listing and export endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    #[serde(rename = "type")]
    pub lead_type: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

/// Raw listing query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadQueryParams {
    #[serde(rename = "type")]
    pub lead_type: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Slice of an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub skip: u64,
    pub take: u64,
}

/// A validated listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadQuery {
    pub filter: LeadFilter,
    pub sort: LeadSort,
    pub page: u64,
    pub limit: u64,
}

impl Default for LeadQuery {
    fn default() -> Self {
        Self {
            filter: LeadFilter::default(),
            sort: LeadSort::default(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn positive_int(
    field: &str,
    raw: Option<String>,
    default: u64,
    errors: &mut Vec<FieldError>,
) -> u64 {
    let Some(raw) = non_blank(raw) else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value >= 1 => value,
        _ => {
            errors.push(FieldError::new(field, "Must be a positive integer"));
            default
        }
    }
}

impl LeadQuery {
    pub fn from_params(params: LeadQueryParams) -> Result<Self, AppError> {
        let mut errors = Vec::new();

        let filter = match LeadFilter::from_params(&FilterParams {
            lead_type: params.lead_type,
            status: params.status,
            search: params.search,
        }) {
            Ok(filter) => filter,
            Err(AppError::Validation(filter_errors)) => {
                errors.extend(filter_errors);
                LeadFilter::default()
            }
            Err(other) => return Err(other),
        };

        let page = positive_int("page", params.page, DEFAULT_PAGE, &mut errors);
        let limit = positive_int("limit", params.limit, DEFAULT_LIMIT, &mut errors);

        let field = match non_blank(params.sort_by) {
            Some(raw) => raw.parse::<SortField>().unwrap_or_else(|e| {
                errors.push(FieldError::new("sortBy", e));
                SortField::default()
            }),
            None => SortField::default(),
        };
        let order = match non_blank(params.sort_order) {
            Some(raw) => raw.parse::<SortOrder>().unwrap_or_else(|e| {
                errors.push(FieldError::new("sortOrder", e));
                SortOrder::default()
            }),
            None => SortOrder::default(),
        };

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok(Self {
            filter,
            sort: LeadSort::new(field, order),
            page,
            limit,
        })
    }

    pub fn window(&self) -> PageWindow {
        PageWindow {
            skip: (self.page - 1).saturating_mul(self.limit),
            take: self.limit,
        }
    }
}

/// `ceil(total / limit)`; zero when nothing matched.
pub fn total_pages(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit)
}

/// Runs a listing: one page of leads plus the count across all pages.
pub async fn list_leads(store: &dyn LeadStore, query: &LeadQuery) -> Result<LeadPage, AppError> {
    let (leads, total) = tokio::try_join!(
        store.find_leads(&query.filter, query.sort, Some(query.window())),
        store.count_leads(&query.filter),
    )?;

    tracing::debug!(
        "Listed {} of {} lead(s) (page {}, limit {})",
        leads.len(),
        total,
        query.page,
        query.limit
    );

    Ok(LeadPage {
        leads,
        total,
        page: query.page,
        limit: query.limit,
        total_pages: total_pages(total, query.limit),
    })
}
