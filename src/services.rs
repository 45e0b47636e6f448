use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::export;
use crate::import;
use crate::models::*;
use crate::query::{self, LeadFilter, LeadQuery};
use crate::stats;
use crate::store::LeadStore;
use crate::validation::{
    validate_lead_patch, validate_new_activity, validate_new_lead, ActivityInput, LeadInput,
    LeadUpdateInput,
};

/// Description of the note attached to leads entered directly.
pub const CREATED_NOTE: &str = "Lead created";

fn lead_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Lead with id {} not found", id))
}

/// Lead and activity operations on top of a [`LeadStore`].
///
/// Validation happens here, before any store call, so the store only ever
/// sees well-formed payloads.
#[derive(Clone)]
pub struct LeadService {
    store: Arc<dyn LeadStore>,
}

impl LeadService {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn LeadStore {
        self.store.as_ref()
    }

    pub async fn list(&self, query: &LeadQuery) -> Result<LeadPage, AppError> {
        query::list_leads(self.store(), query).await
    }

    /// A lead with its timeline, newest entry first.
    pub async fn get(&self, id: Uuid) -> Result<LeadWithActivities, AppError> {
        let lead = self
            .store
            .find_lead(id)
            .await?
            .ok_or_else(|| lead_not_found(id))?;
        let activities = self.store.find_activities(id).await?;

        Ok(LeadWithActivities { lead, activities })
    }

    pub async fn create(&self, input: LeadInput) -> Result<Lead, AppError> {
        let new_lead = validate_new_lead(input)?;
        let lead = self.store.create_lead(new_lead, None, CREATED_NOTE).await?;

        tracing::info!("Created {} lead {}", lead.lead_type, lead.id);
        Ok(lead)
    }

    /// Applies a partial update.
    ///
    /// When the update moves the lead to a different status, a `status_change`
    /// activity naming the old and new status is appended afterwards.
    pub async fn update(&self, id: Uuid, input: LeadUpdateInput) -> Result<Lead, AppError> {
        let patch = validate_lead_patch(input)?;

        let previous = self
            .store
            .find_lead(id)
            .await?
            .ok_or_else(|| lead_not_found(id))?;

        let updated = self
            .store
            .update_lead(id, &patch)
            .await?
            .ok_or_else(|| lead_not_found(id))?;

        if let Some(status) = patch.status {
            if status != previous.status {
                self.store
                    .create_activity(NewActivity::status_change(id, previous.status, status))
                    .await?;
                tracing::info!("Lead {} moved from {} to {}", id, previous.status, status);
            }
        }

        Ok(updated)
    }

    /// Deletes a lead and its activities.
    ///
    /// Activities go first because they reference the lead. The two deletes are
    /// separate store calls; a failure between them leaves the lead without
    /// its timeline.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if self.store.find_lead(id).await?.is_none() {
            return Err(lead_not_found(id));
        }

        let removed = self.store.delete_activities(id).await?;
        if !self.store.delete_lead(id).await? {
            return Err(lead_not_found(id));
        }

        tracing::info!("Deleted lead {} and {} activity(ies)", id, removed);
        Ok(())
    }

    pub async fn list_activities(&self, lead_id: Uuid) -> Result<Vec<Activity>, AppError> {
        self.store.find_activities(lead_id).await
    }

    pub async fn create_activity(&self, input: ActivityInput) -> Result<Activity, AppError> {
        let activity = validate_new_activity(input)?;

        if self.store.find_lead(activity.lead_id).await?.is_none() {
            return Err(lead_not_found(activity.lead_id));
        }

        self.store.create_activity(activity).await
    }

    pub async fn import(
        &self,
        lead_type: LeadType,
        csv_text: &str,
    ) -> Result<ImportSummary, AppError> {
        import::import_csv(self.store(), lead_type, csv_text).await
    }

    pub async fn export(&self, filter: &LeadFilter) -> Result<String, AppError> {
        export::export_csv(self.store(), filter).await
    }

    pub async fn stats(&self) -> Result<DashboardStats, AppError> {
        stats::compute_stats(self.store(), Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn service() -> (LeadService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (LeadService::new(store.clone()), store)
    }

    fn input(value: serde_json::Value) -> LeadInput {
        serde_json::from_value(value).unwrap()
    }

    fn patch(value: serde_json::Value) -> LeadUpdateInput {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn status_change_appends_one_activity() {
        let (service, _) = service();
        let lead = service
            .create(input(json!({"leadType": "Dollar", "name": "Jane"})))
            .await
            .unwrap();

        service
            .update(lead.id, patch(json!({"status": "Contacted"})))
            .await
            .unwrap();
        // Same status again: no new entry.
        service
            .update(lead.id, patch(json!({"status": "Contacted"})))
            .await
            .unwrap();

        let detail = service.get(lead.id).await.unwrap();
        let changes: Vec<&Activity> = detail
            .activities
            .iter()
            .filter(|a| a.activity_type == ActivityType::StatusChange)
            .collect();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].description, "Status changed from New to Contacted");
    }

    #[tokio::test]
    async fn update_validates_before_looking_up_the_lead() {
        let (service, _) = service();
        let err = service
            .update(Uuid::new_v4(), patch(json!({"email": "nope"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .update(Uuid::new_v4(), patch(json!({"name": "Valid"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_lead_and_timeline() {
        let (service, store) = service();
        let lead = service
            .create(input(json!({"leadType": "Diamond", "name": "Jane"})))
            .await
            .unwrap();

        service.delete(lead.id).await.unwrap();
        assert_eq!(store.lead_count().await, 0);
        assert_eq!(store.activity_count().await, 0);
        assert!(matches!(
            service.delete(lead.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn activity_for_missing_lead_is_not_found() {
        let (service, _) = service();
        let err = service
            .create_activity(
                serde_json::from_value(json!({
                    "leadId": Uuid::new_v4().to_string(),
                    "activityType": "call",
                    "description": "Left voicemail"
                }))
                .unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
