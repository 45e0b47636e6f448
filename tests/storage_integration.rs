use std::env;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use uuid::Uuid;

use wholesale_crm::config::Config;
use wholesale_crm::db::Database;
use wholesale_crm::models::{LeadPatch, LeadStatus, LeadType, NewLead};
use wholesale_crm::query::{LeadFilter, LeadSort, PageWindow, SortField, SortOrder};
use wholesale_crm::store::{LeadStore, PgLeadStore};

/// Integration smoke test for the PostgreSQL lead store.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn pg_lead_store_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;

    let config = Config {
        database_url: db_url,
        run_migrations: true,
        ..Config::for_tests()
    };
    let db = Database::new(&config).await?;
    let store = PgLeadStore::new(db.pool.clone());

    // Unique phone and name so repeated runs do not collide.
    let marker = Uuid::new_v4().simple().to_string();
    let phone = format!("555-{}", &marker[..8]);
    let name = format!("Smoke {}", marker);

    let lead = NewLead {
        phone: Some(phone.clone()),
        estimate: Some(BigDecimal::from_str("123456.78")?),
        ..NewLead::named(LeadType::Diamond, name.clone())
    };
    let created = store
        .create_lead(lead, None, "Lead created")
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(created.estimate, Some(BigDecimal::from_str("123456.78")?));

    let by_phone = store
        .find_lead_by_phone(&phone)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(by_phone.map(|l| l.id), Some(created.id));

    let filter = LeadFilter {
        search: Some(marker.clone()),
        ..LeadFilter::default()
    };
    let sort = LeadSort::new(SortField::Name, SortOrder::Asc);
    let found = store
        .find_leads(&filter, sort, Some(PageWindow { skip: 0, take: 10 }))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(found.len(), 1);
    assert_eq!(
        store
            .count_leads(&filter)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?,
        1
    );

    let patch = LeadPatch {
        status: Some(LeadStatus::Contacted),
        phone: Some(None),
        ..LeadPatch::default()
    };
    let updated = store
        .update_lead(created.id, &patch)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("lead vanished"))?;
    assert_eq!(updated.status, LeadStatus::Contacted);
    assert_eq!(updated.phone, None);

    let activities = store
        .find_activities(created.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(activities.len(), 1);

    // Foreign key: the lead cannot go while its activities remain.
    assert!(store.delete_lead(created.id).await.is_err());
    store
        .delete_activities(created.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(store
        .delete_lead(created.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?);

    Ok(())
}
