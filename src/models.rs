use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::stats::EquityBand;

// ============ Enumerations ============

/// Lead classification. Only `Diamond` leads carry a call recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LeadType {
    Diamond,
    Dollar,
}

impl LeadType {
    pub const ALL: [LeadType; 2] = [LeadType::Diamond, LeadType::Dollar];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadType::Diamond => "Diamond",
            LeadType::Dollar => "Dollar",
        }
    }
}

/// Pipeline status of a lead.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    #[serde(rename = "Follow-up")]
    FollowUp,
    Contracted,
    Closed,
    Dead,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 7] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::FollowUp,
        LeadStatus::Contracted,
        LeadStatus::Closed,
        LeadStatus::Dead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "New",
            LeadStatus::Contacted => "Contacted",
            LeadStatus::Qualified => "Qualified",
            LeadStatus::FollowUp => "Follow-up",
            LeadStatus::Contracted => "Contracted",
            LeadStatus::Closed => "Closed",
            LeadStatus::Dead => "Dead",
        }
    }
}

/// Kind of entry in a lead's activity timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Call,
    Email,
    Note,
    StatusChange,
}

impl ActivityType {
    pub const ALL: [ActivityType; 4] = [
        ActivityType::Call,
        ActivityType::Email,
        ActivityType::Note,
        ActivityType::StatusChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Call => "call",
            ActivityType::Email => "email",
            ActivityType::Note => "note",
            ActivityType::StatusChange => "status_change",
        }
    }
}

/// Error returned when a string is not part of one of the closed enum sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! closed_enum_str {
    ($ty:ty, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::ALL
                    .iter()
                    .copied()
                    .find(|variant| variant.as_str() == s)
                    .ok_or_else(|| UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

closed_enum_str!(LeadType, "lead type");
closed_enum_str!(LeadStatus, "status");
closed_enum_str!(ActivityType, "activity type");

/// Amounts always serialize as positional decimal strings, never exponent form.
pub mod plain_decimal {
    use bigdecimal::BigDecimal;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<BigDecimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(amount) => serializer.serialize_some(&amount.to_plain_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigDecimal>, D::Error> {
        Option::<BigDecimal>::deserialize(deserializer)
    }
}

// ============ Stored records ============

/// A prospective property acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// Server-assigned identifier.
    pub id: Uuid,
    pub lead_type: LeadType,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub notes: Option<String>,
    /// Link to a recorded call. Only meaningful for `Diamond` leads.
    pub call_recording: Option<String>,
    /// Estimated property value.
    #[serde(default, with = "plain_decimal")]
    pub estimate: Option<BigDecimal>,
    /// Maximum allowable offer.
    #[serde(default, with = "plain_decimal")]
    pub mao: Option<BigDecimal>,
    #[serde(default, with = "plain_decimal")]
    pub offer_price: Option<BigDecimal>,
    /// Deal margin as a percentage. May be negative.
    #[serde(default, with = "plain_decimal")]
    pub equity: Option<BigDecimal>,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    /// Set only for leads that came in through a CSV import.
    pub imported_at: Option<DateTime<Utc>>,
}

impl Lead {
    /// Builds a stored lead from a validated payload.
    pub fn from_new(
        id: Uuid,
        new: NewLead,
        created_at: DateTime<Utc>,
        imported_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            lead_type: new.lead_type,
            name: new.name,
            phone: new.phone,
            email: new.email,
            address: new.address,
            city: new.city,
            state: new.state,
            zip_code: new.zip_code,
            notes: new.notes,
            call_recording: new.call_recording,
            estimate: new.estimate,
            mao: new.mao,
            offer_price: new.offer_price,
            equity: new.equity,
            status: new.status,
            created_at,
            imported_at,
        }
    }

    /// Applies every field present in `patch`.
    pub fn apply(&mut self, patch: &LeadPatch) {
        if let Some(lead_type) = patch.lead_type {
            self.lead_type = lead_type;
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }

        fn set<T: Clone>(slot: &mut Option<T>, value: &Option<Option<T>>) {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }

        set(&mut self.phone, &patch.phone);
        set(&mut self.email, &patch.email);
        set(&mut self.address, &patch.address);
        set(&mut self.city, &patch.city);
        set(&mut self.state, &patch.state);
        set(&mut self.zip_code, &patch.zip_code);
        set(&mut self.notes, &patch.notes);
        set(&mut self.call_recording, &patch.call_recording);
        set(&mut self.estimate, &patch.estimate);
        set(&mut self.mao, &patch.mao);
        set(&mut self.offer_price, &patch.offer_price);
        set(&mut self.equity, &patch.equity);
    }

    pub fn equity_band(&self) -> EquityBand {
        EquityBand::classify(self.equity.as_ref())
    }
}

/// An immutable timeline entry attached to one lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub activity_type: ActivityType,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// ============ Validated payloads ============

/// A lead payload that passed the full (create) schema.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub lead_type: LeadType,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub notes: Option<String>,
    pub call_recording: Option<String>,
    pub estimate: Option<BigDecimal>,
    pub mao: Option<BigDecimal>,
    pub offer_price: Option<BigDecimal>,
    pub equity: Option<BigDecimal>,
    pub status: LeadStatus,
}

impl NewLead {
    /// A lead with only the required fields set and the default status.
    pub fn named(lead_type: LeadType, name: impl Into<String>) -> Self {
        Self {
            lead_type,
            name: name.into(),
            phone: None,
            email: None,
            address: None,
            city: None,
            state: None,
            zip_code: None,
            notes: None,
            call_recording: None,
            estimate: None,
            mao: None,
            offer_price: None,
            equity: None,
            status: LeadStatus::default(),
        }
    }
}

/// A partial update that passed the update schema.
///
/// Required fields are `Option<T>` (absent or set). Optional fields are
/// `Option<Option<T>>`: `None` leaves the stored value alone, `Some(None)`
/// clears it and `Some(Some(v))` overwrites it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadPatch {
    pub lead_type: Option<LeadType>,
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub city: Option<Option<String>>,
    pub state: Option<Option<String>>,
    pub zip_code: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub call_recording: Option<Option<String>>,
    pub estimate: Option<Option<BigDecimal>>,
    pub mao: Option<Option<BigDecimal>>,
    pub offer_price: Option<Option<BigDecimal>>,
    pub equity: Option<Option<BigDecimal>>,
    pub status: Option<LeadStatus>,
}

impl LeadPatch {
    pub fn is_empty(&self) -> bool {
        *self == LeadPatch::default()
    }
}

/// An activity payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub lead_id: Uuid,
    pub activity_type: ActivityType,
    pub description: String,
}

impl NewActivity {
    pub fn note(lead_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            lead_id,
            activity_type: ActivityType::Note,
            description: description.into(),
        }
    }

    /// Timeline entry recorded when an update moves a lead between statuses.
    pub fn status_change(lead_id: Uuid, from: LeadStatus, to: LeadStatus) -> Self {
        Self {
            lead_id,
            activity_type: ActivityType::StatusChange,
            description: format!("Status changed from {} to {}", from, to),
        }
    }
}

// ============ API Response Models ============

/// A lead together with its timeline, newest entry first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadWithActivities {
    #[serde(flatten)]
    pub lead: Lead,
    pub activities: Vec<Activity>,
}

/// One page of a lead listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPage {
    pub leads: Vec<Lead>,
    /// Number of matching leads across all pages.
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// A row that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRowError {
    /// Spreadsheet row number; the header is row 1.
    pub row: usize,
    pub error: String,
}

/// Outcome of a CSV import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub success_count: usize,
    pub duplicate_count: usize,
    pub errors: Vec<ImportRowError>,
}

/// Dashboard counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_leads: u64,
    pub diamond_leads: u64,
    pub dollar_leads: u64,
    /// Status name to count; statuses with no leads are omitted.
    pub status_breakdown: BTreeMap<String, u64>,
    /// Leads created in the trailing seven days.
    pub recent_leads: u64,
    pub closed_deals: u64,
}
