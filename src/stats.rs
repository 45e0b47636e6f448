use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};

use crate::errors::AppError;
use crate::models::{DashboardStats, LeadStatus, LeadType};
use crate::query::LeadFilter;
use crate::store::LeadStore;

/// Window counted as "recent" on the dashboard.
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Coarse grouping of a lead's equity percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquityBand {
    /// Above 70%.
    High,
    /// 40% to 70% inclusive.
    Mid,
    /// Below 40%, including negative equity.
    Low,
    /// No equity recorded.
    Neutral,
}

impl EquityBand {
    pub fn classify(equity: Option<&BigDecimal>) -> Self {
        let Some(equity) = equity else {
            return EquityBand::Neutral;
        };

        if *equity > BigDecimal::from(70) {
            EquityBand::High
        } else if *equity >= BigDecimal::from(40) {
            EquityBand::Mid
        } else {
            EquityBand::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EquityBand::High => "high",
            EquityBand::Mid => "mid",
            EquityBand::Low => "low",
            EquityBand::Neutral => "neutral",
        }
    }
}

/// Computes the dashboard counters relative to `now`.
///
/// Nothing is cached; every call hits the store. The six counts are independent
/// and run concurrently.
pub async fn compute_stats(
    store: &dyn LeadStore,
    now: DateTime<Utc>,
) -> Result<DashboardStats, AppError> {
    let all = LeadFilter::default();
    let diamond = LeadFilter::by_type(LeadType::Diamond);
    let dollar = LeadFilter::by_type(LeadType::Dollar);
    let recent = LeadFilter::created_since(now - Duration::days(RECENT_WINDOW_DAYS));
    let closed = LeadFilter::by_status(LeadStatus::Closed);

    let (total_leads, diamond_leads, dollar_leads, by_status, recent_leads, closed_deals) =
        tokio::try_join!(
            store.count_leads(&all),
            store.count_leads(&diamond),
            store.count_leads(&dollar),
            store.count_by_status(),
            store.count_leads(&recent),
            store.count_leads(&closed),
        )?;

    let status_breakdown = by_status
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), count))
        .collect();

    Ok(DashboardStats {
        total_leads,
        diamond_leads,
        dollar_leads,
        status_breakdown,
        recent_leads,
        closed_deals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewLead;
    use crate::store::MemoryStore;
    use std::str::FromStr;

    fn band(raw: &str) -> EquityBand {
        EquityBand::classify(Some(&BigDecimal::from_str(raw).unwrap()))
    }

    #[test]
    fn equity_band_boundaries() {
        assert_eq!(band("70.01"), EquityBand::High);
        assert_eq!(band("70"), EquityBand::Mid);
        assert_eq!(band("40"), EquityBand::Mid);
        assert_eq!(band("39.99"), EquityBand::Low);
        assert_eq!(band("-12"), EquityBand::Low);
        assert_eq!(EquityBand::classify(None), EquityBand::Neutral);
        assert_eq!(EquityBand::Mid.as_str(), "mid");
    }

    #[tokio::test]
    async fn counts_by_type_status_and_recency() {
        let store = MemoryStore::new();
        let seed = [
            (LeadType::Diamond, LeadStatus::New),
            (LeadType::Diamond, LeadStatus::Closed),
            (LeadType::Dollar, LeadStatus::Closed),
        ];
        for (lead_type, status) in seed {
            let lead = NewLead {
                status,
                ..NewLead::named(lead_type, "Seller")
            };
            store.create_lead(lead, None, "Lead created").await.unwrap();
        }

        let stats = compute_stats(&store, Utc::now()).await.unwrap();
        assert_eq!(stats.total_leads, 3);
        assert_eq!(stats.diamond_leads, 2);
        assert_eq!(stats.dollar_leads, 1);
        assert_eq!(stats.recent_leads, 3);
        assert_eq!(stats.closed_deals, 2);
        assert_eq!(stats.status_breakdown.get("Closed"), Some(&2));
        assert_eq!(stats.status_breakdown.get("New"), Some(&1));
        assert!(!stats.status_breakdown.contains_key("Dead"));

        let later = Utc::now() + Duration::days(RECENT_WINDOW_DAYS + 1);
        let stats = compute_stats(&store, later).await.unwrap();
        assert_eq!(stats.recent_leads, 0);
    }
}
