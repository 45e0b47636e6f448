//! Data-access layer.
//!
//! Everything above this module talks to the lead store through the
//! [`LeadStore`] trait. `PgLeadStore` is the production backend;
//! `MemoryStore` keeps everything in process and backs the test suite.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Activity, Lead, LeadPatch, LeadStatus, NewActivity, NewLead};
use crate::query::{LeadFilter, LeadSort, PageWindow};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgLeadStore;

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Persists a lead together with its first timeline note, as one unit.
    ///
    /// The store assigns `id` and `created_at`.
    async fn create_lead(
        &self,
        lead: NewLead,
        imported_at: Option<DateTime<Utc>>,
        note: &str,
    ) -> Result<Lead, AppError>;

    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError>;

    /// First lead whose phone equals `phone` exactly.
    async fn find_lead_by_phone(&self, phone: &str) -> Result<Option<Lead>, AppError>;

    /// Matching leads in `sort` order; `window` of `None` returns all of them.
    async fn find_leads(
        &self,
        filter: &LeadFilter,
        sort: LeadSort,
        window: Option<PageWindow>,
    ) -> Result<Vec<Lead>, AppError>;

    async fn count_leads(&self, filter: &LeadFilter) -> Result<u64, AppError>;

    /// Lead counts grouped by status. Statuses without leads are omitted.
    async fn count_by_status(&self) -> Result<Vec<(LeadStatus, u64)>, AppError>;

    /// Applies `patch` and returns the updated lead, or `None` if it does not exist.
    async fn update_lead(&self, id: Uuid, patch: &LeadPatch) -> Result<Option<Lead>, AppError>;

    /// Removes the lead row only. Returns whether a row was deleted.
    async fn delete_lead(&self, id: Uuid) -> Result<bool, AppError>;

    async fn create_activity(&self, activity: NewActivity) -> Result<Activity, AppError>;

    /// Activities of one lead, newest first.
    async fn find_activities(&self, lead_id: Uuid) -> Result<Vec<Activity>, AppError>;

    async fn delete_activities(&self, lead_id: Uuid) -> Result<u64, AppError>;
}
