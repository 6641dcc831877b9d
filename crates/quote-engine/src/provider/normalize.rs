//! Tolerant response parsing.
//!
//! Provider payloads are detected by shape, then each item is mapped onto the
//! canonical [`Quote`] using ordered alias lists: the first alias present with
//! a usable value wins.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::QuoteEngineError;
use crate::models::{CoverageType, Quote, QuoteRequest};

/// Quotes without an expiry are valid for this many days.
const DEFAULT_VALIDITY_DAYS: i64 = 30;

// ============================================================================
// Field aliases
// ============================================================================

const QUOTE_ID: &[&str] = &["quote_id", "quoteId", "QuoteId", "id", "reference"];
const MONTHLY_PREMIUM: &[&str] = &[
    "monthly_premium",
    "monthlyPremium",
    "premium_monthly",
    "monthly_cost",
    "MonthlyPremium",
    "monthlyCost",
];
const ANNUAL_PREMIUM: &[&str] = &[
    "annual_premium",
    "annualPremium",
    "premium_annual",
    "annual_cost",
    "yearly_premium",
    "AnnualPremium",
];
const COVERAGE_AMOUNT: &[&str] = &[
    "coverage_amount",
    "coverageAmount",
    "face_amount",
    "faceAmount",
    "benefit_amount",
    "annualMaximum",
    "CoverageAmount",
    "DwellingCoverage",
];
const DEDUCTIBLE: &[&str] = &["deductible", "deductible_amount", "deductibleAmount", "Deductible"];
const TERM_LENGTH: &[&str] = &["term_length", "termLength", "term_years", "term", "TermLength"];
const FEATURES: &[&str] = &["features", "benefits", "coverage_features", "highlights", "Features"];
const RATING: &[&str] = &["rating", "carrier_rating", "carrierRating", "Rating"];
const MEDICAL_EXAM: &[&str] = &[
    "medical_exam_required",
    "medicalExamRequired",
    "exam_required",
    "requiresExam",
    "MedicalExamRequired",
];
const CONVERSION_OPTION: &[&str] = &["conversion_option", "conversionOption", "convertible"];
const EXPIRES_AT: &[&str] = &[
    "expires_at",
    "expiresAt",
    "valid_until",
    "validUntil",
    "expiration_date",
    "ExpirationDate",
];
const APPLICATION_URL: &[&str] = &[
    "application_url",
    "applicationUrl",
    "apply_url",
    "ApplyUrl",
    "url",
];
const PLAN_NAME: &[&str] = &["plan_name", "planName", "product_name", "name", "PlanName"];

/// Keys that hold the nested quote list inside a `.Data[]` group.
const GROUP_ITEMS: &[&str] = &["Quotes", "Options", "Plans", "Items"];

/// Recognized payload layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadShape {
    FlatArray,
    Quotes,
    Results,
    Plans,
    GroupedData,
    Single,
}

pub fn detect_shape(body: &Value) -> PayloadShape {
    if body.is_array() {
        return PayloadShape::FlatArray;
    }
    let is_array = |key: &str| body.get(key).is_some_and(Value::is_array);

    if is_array("quotes") {
        PayloadShape::Quotes
    } else if is_array("results") {
        PayloadShape::Results
    } else if is_array("plans") {
        PayloadShape::Plans
    } else if is_array("Data") {
        PayloadShape::GroupedData
    } else {
        PayloadShape::Single
    }
}

/// Flatten a payload into the list of raw quote items.
///
/// Items inside a `.Data[]` group inherit the group's scalar fields unless
/// they define their own.
pub fn extract_items(body: &Value) -> Vec<Value> {
    let array_at = |key: &str| {
        body.get(key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };

    match detect_shape(body) {
        PayloadShape::FlatArray => body.as_array().cloned().unwrap_or_default(),
        PayloadShape::Quotes => array_at("quotes"),
        PayloadShape::Results => array_at("results"),
        PayloadShape::Plans => array_at("plans"),
        PayloadShape::GroupedData => array_at("Data")
            .into_iter()
            .flat_map(flatten_group)
            .collect(),
        PayloadShape::Single => vec![body.clone()],
    }
}

fn flatten_group(group: Value) -> Vec<Value> {
    let fields = match group {
        Value::Object(fields) => fields,
        other => return vec![other],
    };

    let nested = GROUP_ITEMS
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_array));

    let Some(items) = nested else {
        return vec![Value::Object(fields)];
    };

    let inherited: Map<String, Value> = fields
        .iter()
        .filter(|(key, value)| !GROUP_ITEMS.contains(&key.as_str()) && !value.is_array())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    items
        .iter()
        .map(|item| match item {
            Value::Object(own) => {
                let mut merged = inherited.clone();
                for (key, value) in own {
                    merged.insert(key.clone(), value.clone());
                }
                Value::Object(merged)
            }
            other => other.clone(),
        })
        .collect()
}

/// Parse a provider response body into canonical quotes.
///
/// Items that carry no usable premium are skipped. A non-empty payload where
/// no item is usable is an [`QuoteEngineError::InvalidResponse`].
pub fn parse_quotes(
    provider_id: &str,
    provider_name: &str,
    body: &Value,
    request: &QuoteRequest,
    coverage: CoverageType,
) -> Result<Vec<Quote>, QuoteEngineError> {
    let items = extract_items(body);
    let shape = detect_shape(body);
    debug!(
        "{}: detected {:?} payload with {} item(s)",
        provider_id,
        shape,
        items.len()
    );

    if items.is_empty() {
        return Ok(Vec::new());
    }

    let total = items.len();
    let quotes: Vec<Quote> = items
        .iter()
        .filter_map(|item| {
            let quote = normalize_item(provider_id, provider_name, item, request, coverage);
            if quote.is_none() {
                warn!("{}: skipping quote item without a premium", provider_id);
            }
            quote
        })
        .collect();

    if quotes.is_empty() {
        return Err(QuoteEngineError::InvalidResponse {
            provider: provider_id.to_string(),
            message: format!("none of {} item(s) carried a recognizable premium", total),
        });
    }

    Ok(quotes)
}

/// Map one raw item onto a [`Quote`]. Returns `None` without a premium.
pub fn normalize_item(
    provider_id: &str,
    provider_name: &str,
    item: &Value,
    request: &QuoteRequest,
    coverage: CoverageType,
) -> Option<Quote> {
    let monthly = first_decimal(item, MONTHLY_PREMIUM);
    let annual = first_decimal(item, ANNUAL_PREMIUM);
    let twelve = Decimal::from(12);

    let (monthly_premium, annual_premium) = match (monthly, annual) {
        (Some(monthly), Some(annual)) => (monthly, annual),
        (Some(monthly), None) => (monthly, monthly * twelve),
        (None, Some(annual)) => ((annual / twelve).round_dp(2), annual),
        (None, None) => return None,
    };

    let expires_at = first_value(item, EXPIRES_AT)
        .and_then(parse_datetime)
        .unwrap_or_else(|| Utc::now() + Duration::days(DEFAULT_VALIDITY_DAYS));

    let mut quote = Quote::new(
        provider_id,
        provider_name,
        monthly_premium,
        first_decimal(item, COVERAGE_AMOUNT).unwrap_or(request.coverage_amount),
        expires_at,
    );
    quote.annual_premium = annual_premium;

    if let Some(id) = first_value(item, QUOTE_ID).and_then(value_to_string) {
        quote.quote_id = id;
    }
    quote.deductible = first_decimal(item, DEDUCTIBLE).unwrap_or(Decimal::ZERO);
    quote.term_length = first_value(item, TERM_LENGTH)
        .and_then(value_to_u32)
        .or(request.term_length);
    quote.features = first_value(item, FEATURES)
        .map(parse_features)
        .unwrap_or_default();
    quote.rating = first_value(item, RATING)
        .and_then(value_to_f64)
        .filter(|rating| (1.0..=5.0).contains(rating));
    quote.medical_exam_required = first_value(item, MEDICAL_EXAM)
        .and_then(value_to_bool)
        .unwrap_or(false);
    quote.conversion_option = first_value(item, CONVERSION_OPTION).and_then(value_to_bool);
    quote.application_url = first_value(item, APPLICATION_URL).and_then(value_to_string);

    let mut metadata = Map::new();
    metadata.insert("coverageType".into(), Value::String(coverage.as_str().into()));
    if let Some(plan) = first_value(item, PLAN_NAME).and_then(value_to_string) {
        metadata.insert("planName".into(), Value::String(plan));
    }
    metadata.insert("originalPayload".into(), item.clone());
    quote.metadata = metadata;

    Some(quote)
}

// ============================================================================
// Value helpers
// ============================================================================

fn first_value<'a>(item: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|alias| item.get(*alias))
        .find(|value| !value.is_null())
}

fn first_decimal(item: &Value, aliases: &[&str]) -> Option<Decimal> {
    aliases
        .iter()
        .filter_map(|alias| item.get(*alias))
        .find_map(value_to_decimal)
}

fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Some(Decimal::from(int))
            } else if let Some(uint) = number.as_u64() {
                Some(Decimal::from(uint))
            } else {
                number.as_f64().and_then(Decimal::from_f64).map(|d| d.round_dp(2))
            }
        }
        Value::String(text) => {
            let cleaned: String = text
                .trim()
                .chars()
                .filter(|c| *c != '$' && *c != ',')
                .collect();
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => value_to_bool(value).unwrap_or(!text.is_empty()),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(23, 59, 59))
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// Features arrive as strings, as objects with a label, or as an object of
/// flags whose truthy keys become title-cased labels.
fn parse_features(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.trim().to_string()),
                Value::Object(fields) => ["name", "label", "title", "description"]
                    .iter()
                    .find_map(|key| fields.get(*key).and_then(Value::as_str))
                    .map(|text| text.trim().to_string()),
                _ => None,
            })
            .filter(|label| !label.is_empty())
            .collect(),
        Value::Object(flags) => flags
            .iter()
            .filter(|(_, enabled)| is_truthy(enabled))
            .map(|(key, _)| title_case(key))
            .collect(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// `"accidental_death"` and `"waiverOfPremium"` become
/// `"Accidental Death"` and `"Waiver Of Premium"`.
fn title_case(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in key.chars() {
        if c == '_' || c == '-' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if c.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(c);
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn request() -> QuoteRequest {
        QuoteRequest::new("term_life", 35, "10001", dec!(250000)).with_term_length(20)
    }

    fn parse(body: Value) -> Result<Vec<Quote>, QuoteEngineError> {
        parse_quotes("TEST", "Test Carrier", &body, &request(), CoverageType::TermLife)
    }

    #[test]
    fn test_shape_detection() {
        assert_eq!(detect_shape(&json!([])), PayloadShape::FlatArray);
        assert_eq!(detect_shape(&json!({"quotes": []})), PayloadShape::Quotes);
        assert_eq!(detect_shape(&json!({"results": []})), PayloadShape::Results);
        assert_eq!(detect_shape(&json!({"plans": []})), PayloadShape::Plans);
        assert_eq!(detect_shape(&json!({"Data": []})), PayloadShape::GroupedData);
        assert_eq!(
            detect_shape(&json!({"monthly_premium": 10})),
            PayloadShape::Single
        );
        // A scalar under a known key is not a list
        assert_eq!(detect_shape(&json!({"quotes": 3})), PayloadShape::Single);
    }

    #[test]
    fn test_snake_case_quotes_payload() {
        let quotes = parse(json!({
            "quotes": [{
                "quote_id": "LS-1",
                "monthly_premium": 42.5,
                "face_amount": 250000,
                "term_years": 20,
                "features": ["Level premium", "Accelerated death benefit"],
                "rating": 4.5,
                "exam_required": true,
                "convertible": "yes",
                "valid_until": "2030-01-31"
            }]
        }))
        .unwrap();

        assert_eq!(quotes.len(), 1);
        let quote = &quotes[0];
        assert_eq!(quote.quote_id, "LS-1");
        assert_eq!(quote.provider_id, "TEST");
        assert_eq!(quote.monthly_premium, dec!(42.5));
        assert_eq!(quote.annual_premium, dec!(510));
        assert_eq!(quote.coverage_amount, dec!(250000));
        assert_eq!(quote.term_length, Some(20));
        assert_eq!(quote.features.len(), 2);
        assert_eq!(quote.rating, Some(4.5));
        assert!(quote.medical_exam_required);
        assert_eq!(quote.conversion_option, Some(true));
        assert_eq!(quote.expires_at.date_naive().to_string(), "2030-01-31");
        assert_eq!(quote.metadata["originalPayload"]["quote_id"], "LS-1");
    }

    #[test]
    fn test_monthly_derived_from_annual() {
        let quotes = parse(json!([{"annualPremium": "$1,200.00"}])).unwrap();

        assert_eq!(quotes[0].monthly_premium, dec!(100));
        assert_eq!(quotes[0].annual_premium, dec!(1200));
        // Missing fields fall back to the request
        assert_eq!(quotes[0].coverage_amount, dec!(250000));
        assert_eq!(quotes[0].term_length, Some(20));
        assert_eq!(quotes[0].deductible, Decimal::ZERO);
    }

    #[test]
    fn test_alias_order_prefers_first_match() {
        let quotes = parse(json!({
            "results": [{"monthly_premium": 30, "monthly_cost": 99}]
        }))
        .unwrap();
        assert_eq!(quotes[0].monthly_premium, dec!(30));
    }

    #[test]
    fn test_grouped_data_items_inherit_group_fields() {
        let quotes = parse(json!({
            "Data": [
                {
                    "PlanName": "HomeSafe Standard",
                    "Deductible": 1000,
                    "Quotes": [
                        {"MonthlyPremium": 80, "QuoteId": "HS-1"},
                        {"MonthlyPremium": 95, "QuoteId": "HS-2", "Deductible": 500}
                    ]
                },
                {"MonthlyPremium": 120, "QuoteId": "HS-3"}
            ]
        }))
        .unwrap();

        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[0].deductible, dec!(1000));
        assert_eq!(quotes[1].deductible, dec!(500));
        assert_eq!(quotes[0].metadata["planName"], "HomeSafe Standard");
        assert_eq!(quotes[2].quote_id, "HS-3");
    }

    #[test]
    fn test_whole_body_fallback() {
        let quotes = parse(json!({"premium_monthly": 19.99, "id": 77})).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].monthly_premium, dec!(19.99));
        assert_eq!(quotes[0].quote_id, "77");
    }

    #[test]
    fn test_feature_flags_object() {
        let quotes = parse(json!([{
            "monthly_premium": 10,
            "features": {
                "accidental_death": true,
                "waiverOfPremium": true,
                "child_rider": false
            }
        }]))
        .unwrap();

        let mut features = quotes[0].features.clone();
        features.sort();
        assert_eq!(features, vec!["Accidental Death", "Waiver Of Premium"]);
    }

    #[test]
    fn test_feature_objects_use_label() {
        let quotes = parse(json!([{
            "monthly_premium": 10,
            "benefits": [{"name": "Preventive 100%"}, {"label": "Orthodontia"}, 5]
        }]))
        .unwrap();

        assert_eq!(quotes[0].features, vec!["Preventive 100%", "Orthodontia"]);
    }

    #[test]
    fn test_out_of_range_rating_is_dropped() {
        let quotes = parse(json!([{"monthly_premium": 10, "rating": 9}])).unwrap();
        assert_eq!(quotes[0].rating, None);
    }

    #[test]
    fn test_items_without_premium() {
        let quotes = parse(json!([{"monthly_premium": 10}, {"note": "n/a"}])).unwrap();
        assert_eq!(quotes.len(), 1);

        let result = parse(json!({"quotes": [{"note": "n/a"}]}));
        assert!(matches!(
            result,
            Err(QuoteEngineError::InvalidResponse { .. })
        ));

        assert!(parse(json!({"quotes": []})).unwrap().is_empty());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("roadside_assistance"), "Roadside Assistance");
        assert_eq!(title_case("rentalCar"), "Rental Car");
        assert_eq!(title_case("glass"), "Glass");
    }
}
