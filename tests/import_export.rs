/// CSV import/export workflows against the in-memory store.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use wholesale_crm::errors::AppError;
use wholesale_crm::export::export_csv;
use wholesale_crm::import::import_csv;
use wholesale_crm::models::{
    Activity, Lead, LeadPatch, LeadStatus, LeadType, NewActivity, NewLead,
};
use wholesale_crm::query::{LeadFilter, LeadSort, PageWindow};
use wholesale_crm::store::{LeadStore, MemoryStore};

async fn seed(store: &MemoryStore, name: &str, phone: Option<&str>) -> Lead {
    let lead = NewLead {
        phone: phone.map(str::to_string),
        ..NewLead::named(LeadType::Dollar, name)
    };
    store.create_lead(lead, None, "Lead created").await.unwrap()
}

#[tokio::test]
async fn rows_matching_an_existing_phone_are_duplicates() {
    let store = MemoryStore::new();
    seed(&store, "Existing", Some("555-0100")).await;

    let csv = "Name,Phone\nFirst copy,555-0100\nSecond copy,555-0100\n";
    let summary = import_csv(&store, LeadType::Dollar, csv).await.unwrap();

    assert_eq!(summary.duplicate_count, 2);
    assert_eq!(summary.success_count, 0);
    assert!(summary.errors.is_empty());
    assert_eq!(store.lead_count().await, 1);
}

#[tokio::test]
async fn invalid_third_row_is_reported_as_row_four() {
    let store = MemoryStore::new();
    let csv = "Name,Email,Estimate\n\
               One,one@example.com,\"$100,000\"\n\
               Two,,\n\
               Three,not-an-email,\n\
               Four,,12%\n";

    let summary = import_csv(&store, LeadType::Diamond, csv).await.unwrap();

    assert_eq!(summary.success_count, 3);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].row, 4);
    assert_eq!(store.lead_count().await, 3);
}

#[tokio::test]
async fn exported_leads_reimport_as_duplicates() {
    let store = MemoryStore::new();
    seed(&store, "Jane Smith", Some("555-0100")).await;
    seed(&store, "John Smith", Some("555-0101")).await;
    seed(&store, "Sam Smith", None).await;
    seed(&store, "Ann Lee", Some("555-0102")).await;

    let filter = LeadFilter {
        search: Some("Smith".to_string()),
        ..LeadFilter::default()
    };
    let csv = export_csv(&store, &filter).await.unwrap();
    assert_eq!(csv.lines().count(), 4);

    let summary = import_csv(&store, LeadType::Dollar, &csv).await.unwrap();
    assert_eq!(summary.duplicate_count, 2);
    // The phoneless row has nothing to match on and is imported again.
    assert_eq!(summary.success_count, 1);
    assert!(summary.errors.is_empty());
}

#[tokio::test]
async fn export_round_trips_amounts_and_status() {
    let store = MemoryStore::new();
    let lead = NewLead {
        mao: "175000.25".parse().ok(),
        equity: "-4.5".parse().ok(),
        status: LeadStatus::FollowUp,
        ..NewLead::named(LeadType::Dollar, "Jane")
    };
    store.create_lead(lead, None, "Lead created").await.unwrap();

    let csv = export_csv(&store, &LeadFilter::default()).await.unwrap();
    let target = MemoryStore::new();
    let summary = import_csv(&target, LeadType::Dollar, &csv).await.unwrap();
    assert_eq!(summary.success_count, 1);

    let imported = target
        .find_leads(&LeadFilter::default(), LeadSort::default(), None)
        .await
        .unwrap();
    assert_eq!(imported[0].mao, "175000.25".parse().ok());
    assert_eq!(imported[0].equity, "-4.5".parse().ok());
    assert_eq!(imported[0].status, LeadStatus::FollowUp);
}

/// Store whose inserts fail for one lead name.
struct FailingStore {
    inner: MemoryStore,
    poisoned_name: &'static str,
}

#[async_trait]
impl LeadStore for FailingStore {
    async fn create_lead(
        &self,
        lead: NewLead,
        imported_at: Option<DateTime<Utc>>,
        note: &str,
    ) -> Result<Lead, AppError> {
        if lead.name == self.poisoned_name {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        self.inner.create_lead(lead, imported_at, note).await
    }

    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        self.inner.find_lead(id).await
    }

    async fn find_lead_by_phone(&self, phone: &str) -> Result<Option<Lead>, AppError> {
        self.inner.find_lead_by_phone(phone).await
    }

    async fn find_leads(
        &self,
        filter: &LeadFilter,
        sort: LeadSort,
        window: Option<PageWindow>,
    ) -> Result<Vec<Lead>, AppError> {
        self.inner.find_leads(filter, sort, window).await
    }

    async fn count_leads(&self, filter: &LeadFilter) -> Result<u64, AppError> {
        self.inner.count_leads(filter).await
    }

    async fn count_by_status(&self) -> Result<Vec<(LeadStatus, u64)>, AppError> {
        self.inner.count_by_status().await
    }

    async fn update_lead(&self, id: Uuid, patch: &LeadPatch) -> Result<Option<Lead>, AppError> {
        self.inner.update_lead(id, patch).await
    }

    async fn delete_lead(&self, id: Uuid) -> Result<bool, AppError> {
        self.inner.delete_lead(id).await
    }

    async fn create_activity(&self, activity: NewActivity) -> Result<Activity, AppError> {
        self.inner.create_activity(activity).await
    }

    async fn find_activities(&self, lead_id: Uuid) -> Result<Vec<Activity>, AppError> {
        self.inner.find_activities(lead_id).await
    }

    async fn delete_activities(&self, lead_id: Uuid) -> Result<u64, AppError> {
        self.inner.delete_activities(lead_id).await
    }
}

#[tokio::test]
async fn store_failure_fails_only_its_row_without_leaking_details() {
    let store = Arc::new(FailingStore {
        inner: MemoryStore::new(),
        poisoned_name: "Broken",
    });
    let csv = "Name,Phone\nFine,555-0100\nBroken,555-0101\nAlso fine,555-0102\n";

    let summary = import_csv(store.as_ref(), LeadType::Dollar, csv).await.unwrap();

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].row, 3);
    assert_eq!(summary.errors[0].error, "Database error");
    assert_eq!(store.inner.lead_count().await, 2);
    assert_eq!(store.inner.activity_count().await, 2);
}
