use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::LeadStore;
use crate::errors::AppError;
use crate::models::{Activity, Lead, LeadPatch, LeadStatus, NewActivity, NewLead};
use crate::query::{LeadFilter, LeadSort, PageWindow};

#[derive(Debug, Default)]
struct Tables {
    /// Insertion order doubles as the tie-breaker for equal sort keys.
    leads: Vec<Lead>,
    /// Append-only; newest last.
    activities: Vec<Activity>,
}

/// In-process store with the same observable behavior as the PostgreSQL one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lead_count(&self) -> usize {
        self.tables.read().await.leads.len()
    }

    pub async fn activity_count(&self) -> usize {
        self.tables.read().await.activities.len()
    }
}

fn activity_record(activity: NewActivity, created_at: DateTime<Utc>) -> Activity {
    Activity {
        id: Uuid::new_v4(),
        lead_id: activity.lead_id,
        activity_type: activity.activity_type,
        description: activity.description,
        created_at,
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn create_lead(
        &self,
        lead: NewLead,
        imported_at: Option<DateTime<Utc>>,
        note: &str,
    ) -> Result<Lead, AppError> {
        let now = Utc::now();
        let lead = Lead::from_new(Uuid::new_v4(), lead, now, imported_at);

        let mut tables = self.tables.write().await;
        tables.activities.push(activity_record(
            NewActivity::note(lead.id, note),
            now,
        ));
        tables.leads.push(lead.clone());
        Ok(lead)
    }

    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.leads.iter().find(|l| l.id == id).cloned())
    }

    async fn find_lead_by_phone(&self, phone: &str) -> Result<Option<Lead>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .leads
            .iter()
            .find(|l| l.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn find_leads(
        &self,
        filter: &LeadFilter,
        sort: LeadSort,
        window: Option<PageWindow>,
    ) -> Result<Vec<Lead>, AppError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<Lead> = tables
            .leads
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        matching.sort_by(|a, b| sort.compare(a, b));

        Ok(match window {
            Some(window) => matching
                .into_iter()
                .skip(usize::try_from(window.skip).unwrap_or(usize::MAX))
                .take(usize::try_from(window.take).unwrap_or(usize::MAX))
                .collect(),
            None => matching,
        })
    }

    async fn count_leads(&self, filter: &LeadFilter) -> Result<u64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.leads.iter().filter(|l| filter.matches(l)).count() as u64)
    }

    async fn count_by_status(&self) -> Result<Vec<(LeadStatus, u64)>, AppError> {
        let tables = self.tables.read().await;
        let mut counts: BTreeMap<LeadStatus, u64> = BTreeMap::new();
        for lead in &tables.leads {
            *counts.entry(lead.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn update_lead(&self, id: Uuid, patch: &LeadPatch) -> Result<Option<Lead>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.leads.iter_mut().find(|l| l.id == id).map(|lead| {
            lead.apply(patch);
            lead.clone()
        }))
    }

    async fn delete_lead(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.activities.iter().any(|a| a.lead_id == id) {
            // Same outcome as the foreign key on `activities.lead_id`.
            return Err(AppError::InternalError(format!(
                "lead {} still has activities",
                id
            )));
        }
        let before = tables.leads.len();
        tables.leads.retain(|l| l.id != id);
        Ok(tables.leads.len() != before)
    }

    async fn create_activity(&self, activity: NewActivity) -> Result<Activity, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.leads.iter().any(|l| l.id == activity.lead_id) {
            return Err(AppError::NotFound(format!(
                "Lead with id {} not found",
                activity.lead_id
            )));
        }
        let record = activity_record(activity, Utc::now());
        tables.activities.push(record.clone());
        Ok(record)
    }

    async fn find_activities(&self, lead_id: Uuid) -> Result<Vec<Activity>, AppError> {
        let tables = self.tables.read().await;
        // Newest first; reversing insertion order keeps same-instant entries stable.
        let mut activities: Vec<Activity> = tables
            .activities
            .iter()
            .rev()
            .filter(|a| a.lead_id == lead_id)
            .cloned()
            .collect();
        activities.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(activities)
    }

    async fn delete_activities(&self, lead_id: Uuid) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.activities.len();
        tables.activities.retain(|a| a.lead_id != lead_id);
        Ok((before - tables.activities.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityType, LeadType};

    #[tokio::test]
    async fn create_lead_records_its_note() {
        let store = MemoryStore::new();
        let lead = store
            .create_lead(NewLead::named(LeadType::Diamond, "Jane"), None, "Lead created")
            .await
            .unwrap();

        let activities = store.find_activities(lead.id).await.unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].activity_type, ActivityType::Note);
        assert_eq!(activities[0].description, "Lead created");
    }

    #[tokio::test]
    async fn lead_with_activities_cannot_be_deleted_first() {
        let store = MemoryStore::new();
        let lead = store
            .create_lead(NewLead::named(LeadType::Dollar, "Jane"), None, "Lead created")
            .await
            .unwrap();

        assert!(store.delete_lead(lead.id).await.is_err());
        assert_eq!(store.delete_activities(lead.id).await.unwrap(), 1);
        assert!(store.delete_lead(lead.id).await.unwrap());
        assert!(!store.delete_lead(lead.id).await.unwrap());
    }

    #[tokio::test]
    async fn activity_for_unknown_lead_is_rejected() {
        let store = MemoryStore::new();
        let err = store
            .create_activity(NewActivity::note(Uuid::new_v4(), "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn groups_by_status() {
        let store = MemoryStore::new();
        for status in [LeadStatus::New, LeadStatus::Closed, LeadStatus::New] {
            let lead = NewLead {
                status,
                ..NewLead::named(LeadType::Dollar, "x")
            };
            store.create_lead(lead, None, "Lead created").await.unwrap();
        }
        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts, vec![(LeadStatus::New, 2), (LeadStatus::Closed, 1)]);
    }
}
