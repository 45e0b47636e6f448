use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::LeadStore;
use crate::errors::{AppError, ResultExt};
use crate::models::{Activity, Lead, LeadPatch, LeadStatus, NewActivity, NewLead};
use crate::query::{LeadFilter, LeadSort, PageWindow};

const LEAD_COLUMNS: &str = "id, lead_type, name, phone, email, address, city, state, zip_code, \
     notes, call_recording, estimate, mao, offer_price, equity, status, created_at, imported_at";

const ACTIVITY_COLUMNS: &str = "id, lead_id, activity_type, description, created_at";

/// Row shape of the `leads` table. Enum columns are stored as text.
#[derive(Debug, FromRow)]
struct LeadRow {
    id: Uuid,
    lead_type: String,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    notes: Option<String>,
    call_recording: Option<String>,
    estimate: Option<BigDecimal>,
    mao: Option<BigDecimal>,
    offer_price: Option<BigDecimal>,
    equity: Option<BigDecimal>,
    status: String,
    created_at: DateTime<Utc>,
    imported_at: Option<DateTime<Utc>>,
}

impl TryFrom<LeadRow> for Lead {
    type Error = AppError;

    fn try_from(row: LeadRow) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::models::UnknownVariant| {
            AppError::InternalError(format!("lead {} has {}", row.id, e))
        };

        Ok(Lead {
            id: row.id,
            lead_type: row.lead_type.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            name: row.name,
            phone: row.phone,
            email: row.email,
            address: row.address,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            notes: row.notes,
            call_recording: row.call_recording,
            estimate: row.estimate,
            mao: row.mao,
            offer_price: row.offer_price,
            equity: row.equity,
            created_at: row.created_at,
            imported_at: row.imported_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ActivityRow {
    id: Uuid,
    lead_id: Uuid,
    activity_type: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for Activity {
    type Error = AppError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        let activity_type = row
            .activity_type
            .parse()
            .map_err(|e| AppError::InternalError(format!("activity {} has {}", row.id, e)))?;

        Ok(Activity {
            id: row.id,
            lead_id: row.lead_id,
            activity_type,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

fn into_leads(rows: Vec<LeadRow>) -> Result<Vec<Lead>, AppError> {
    rows.into_iter().map(Lead::try_from).collect()
}

/// Escapes `%`, `_` and `\` so user text is matched literally by ILIKE.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a LeadFilter) {
    qb.push(" WHERE TRUE");

    if let Some(lead_type) = filter.lead_type {
        qb.push(" AND lead_type = ").push_bind(lead_type.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(since) = filter.created_since {
        qb.push(" AND created_at >= ").push_bind(since);
    }
    if let Some(search) = filter.search.as_deref() {
        let pattern = like_pattern(search);
        qb.push(" AND (");
        for (idx, column) in ["name", "phone", "address", "city", "email"].iter().enumerate() {
            if idx > 0 {
                qb.push(" OR ");
            }
            qb.push(*column).push(" ILIKE ").push_bind(pattern.clone());
        }
        qb.push(")");
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// PostgreSQL-backed lead store.
#[derive(Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn create_lead(
        &self,
        lead: NewLead,
        imported_at: Option<DateTime<Utc>>,
        note: &str,
    ) -> Result<Lead, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LeadRow>(&format!(
            r#"
            INSERT INTO leads (
                id, lead_type, name, phone, email, address, city, state, zip_code,
                notes, call_recording, estimate, mao, offer_price, equity, status,
                created_at, imported_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, now(), $17)
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(lead.lead_type.as_str())
        .bind(&lead.name)
        .bind(&lead.phone)
        .bind(&lead.email)
        .bind(&lead.address)
        .bind(&lead.city)
        .bind(&lead.state)
        .bind(&lead.zip_code)
        .bind(&lead.notes)
        .bind(&lead.call_recording)
        .bind(&lead.estimate)
        .bind(&lead.mao)
        .bind(&lead.offer_price)
        .bind(&lead.equity)
        .bind(lead.status.as_str())
        .bind(imported_at)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert lead")?;

        sqlx::query(
            "INSERT INTO activities (id, lead_id, activity_type, description, created_at) \
             VALUES ($1, $2, 'note', $3, now())",
        )
        .bind(Uuid::new_v4())
        .bind(row.id)
        .bind(note)
        .execute(&mut *tx)
        .await
        .context("Failed to insert lead note")?;

        tx.commit().await?;

        Lead::try_from(row)
    }

    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {} FROM leads WHERE id = $1",
            LEAD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Lead::try_from).transpose()
    }

    async fn find_lead_by_phone(&self, phone: &str) -> Result<Option<Lead>, AppError> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {} FROM leads WHERE phone = $1 LIMIT 1",
            LEAD_COLUMNS
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Lead::try_from).transpose()
    }

    async fn find_leads(
        &self,
        filter: &LeadFilter,
        sort: LeadSort,
        window: Option<PageWindow>,
    ) -> Result<Vec<Lead>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM leads", LEAD_COLUMNS));
        push_filter(&mut qb, filter);

        // Column and direction come from closed enums, never from request text.
        qb.push(format!(
            " ORDER BY {col} {dir}, id {dir}",
            col = sort.field.column(),
            dir = sort.order.as_sql()
        ));

        if let Some(window) = window {
            qb.push(" LIMIT ")
                .push_bind(to_i64(window.take))
                .push(" OFFSET ")
                .push_bind(to_i64(window.skip));
        }

        let rows = qb.build_query_as::<LeadRow>().fetch_all(&self.pool).await?;
        into_leads(rows)
    }

    async fn count_leads(&self, filter: &LeadFilter) -> Result<u64, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM leads");
        push_filter(&mut qb, filter);

        let count = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn count_by_status(&self) -> Result<Vec<(LeadStatus, u64)>, AppError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM leads GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| {
                let status = status
                    .parse::<LeadStatus>()
                    .map_err(|e| AppError::InternalError(format!("leads table has {}", e)))?;
                Ok((status, count.max(0) as u64))
            })
            .collect()
    }

    async fn update_lead(&self, id: Uuid, patch: &LeadPatch) -> Result<Option<Lead>, AppError> {
        if patch.is_empty() {
            return self.find_lead(id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE leads SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(lead_type) = patch.lead_type {
                set.push("lead_type = ").push_bind_unseparated(lead_type.as_str());
            }
            if let Some(name) = &patch.name {
                set.push("name = ").push_bind_unseparated(name.clone());
            }
            if let Some(status) = patch.status {
                set.push("status = ").push_bind_unseparated(status.as_str());
            }

            let text_fields = [
                ("phone", &patch.phone),
                ("email", &patch.email),
                ("address", &patch.address),
                ("city", &patch.city),
                ("state", &patch.state),
                ("zip_code", &patch.zip_code),
                ("notes", &patch.notes),
                ("call_recording", &patch.call_recording),
            ];
            for (column, value) in text_fields {
                if let Some(value) = value {
                    set.push(format!("{} = ", column))
                        .push_bind_unseparated(value.clone());
                }
            }

            let decimal_fields = [
                ("estimate", &patch.estimate),
                ("mao", &patch.mao),
                ("offer_price", &patch.offer_price),
                ("equity", &patch.equity),
            ];
            for (column, value) in decimal_fields {
                if let Some(value) = value {
                    set.push(format!("{} = ", column))
                        .push_bind_unseparated(value.clone());
                }
            }
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {}", LEAD_COLUMNS));

        let row = qb
            .build_query_as::<LeadRow>()
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to update lead {}", id))?;

        row.map(Lead::try_from).transpose()
    }

    async fn delete_lead(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete lead {}", id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_activity(&self, activity: NewActivity) -> Result<Activity, AppError> {
        let row = sqlx::query_as::<_, ActivityRow>(&format!(
            "INSERT INTO activities (id, lead_id, activity_type, description, created_at) \
             VALUES ($1, $2, $3, $4, now()) RETURNING {}",
            ACTIVITY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(activity.lead_id)
        .bind(activity.activity_type.as_str())
        .bind(&activity.description)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert activity")?;

        Activity::try_from(row)
    }

    async fn find_activities(&self, lead_id: Uuid) -> Result<Vec<Activity>, AppError> {
        let rows = sqlx::query_as::<_, ActivityRow>(&format!(
            "SELECT {} FROM activities WHERE lead_id = $1 ORDER BY created_at DESC, id DESC",
            ACTIVITY_COLUMNS
        ))
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Activity::try_from).collect()
    }

    async fn delete_activities(&self, lead_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM activities WHERE lead_id = $1")
            .bind(lead_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
