//! Canonical quote record shared by every provider.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One provider's priced offer, in canonical form.
///
/// Aggregation tags (`organization_id`, `priority`, `commission_rate`,
/// `responded_at`) are filled in by the orchestrator. Normalization tags
/// (`is_external`, `normalized_at`) are filled in by the ranker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub quote_id: String,
    pub provider_id: String,
    pub provider_name: String,
    pub monthly_premium: Decimal,
    pub annual_premium: Decimal,
    pub coverage_amount: Decimal,
    pub deductible: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_length: Option<u32>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub medical_exam_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_option: Option<bool>,
    /// Free-form provider data; `originalPayload` holds the raw item.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub is_external: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_at: Option<DateTime<Utc>>,
}

impl Quote {
    /// Builds an untagged quote with the required fields; the annual premium
    /// is derived from the monthly one.
    pub fn new(
        provider_id: impl Into<String>,
        provider_name: impl Into<String>,
        monthly_premium: Decimal,
        coverage_amount: Decimal,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            quote_id: uuid::Uuid::new_v4().to_string(),
            provider_id: provider_id.into(),
            provider_name: provider_name.into(),
            monthly_premium,
            annual_premium: monthly_premium * Decimal::from(12),
            coverage_amount,
            deductible: Decimal::ZERO,
            term_length: None,
            features: Vec::new(),
            rating: None,
            medical_exam_required: false,
            conversion_option: None,
            metadata: Map::new(),
            expires_at,
            application_url: None,
            organization_id: None,
            priority: None,
            commission_rate: None,
            responded_at: None,
            is_external: false,
            normalized_at: None,
        }
    }

    /// Priority used for ordering; untagged quotes sort last.
    pub fn effective_priority(&self) -> i32 {
        self.priority.unwrap_or(i32::MAX)
    }
}
