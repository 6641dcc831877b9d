//! Synthetic quotes for providers running in mock mode.

use chrono::{Duration, Utc};
use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use crate::models::{CoverageType, ProviderConfig, Quote, QuoteRequest};

const TIERS: [&str; 3] = ["Essential", "Standard", "Premium"];
const MIN_MONTHLY_PREMIUM: f64 = 5.0;

fn features_for(coverage: CoverageType) -> &'static [&'static str] {
    match coverage {
        CoverageType::TermLife => &[
            "Level premiums",
            "Accelerated death benefit",
            "Conversion to permanent",
            "Waiver of premium rider",
        ],
        CoverageType::WholeLife => &[
            "Guaranteed cash value",
            "Dividend eligible",
            "Policy loans",
            "Lifetime coverage",
        ],
        CoverageType::Health => &[
            "Preventive care covered",
            "Prescription coverage",
            "Telehealth visits",
            "Nationwide network",
        ],
        CoverageType::Dental => &[
            "Preventive care 100%",
            "Basic procedures 80%",
            "Major procedures 50%",
            "No waiting period on cleanings",
        ],
        CoverageType::Vision => &[
            "Annual eye exam",
            "Frames allowance",
            "Contact lens allowance",
            "LASIK discount",
        ],
        CoverageType::Disability => &[
            "Own-occupation definition",
            "90-day elimination period",
            "Cost of living adjustment",
            "Residual benefits",
        ],
        CoverageType::Auto => &[
            "Roadside assistance",
            "Rental car reimbursement",
            "Accident forgiveness",
            "Glass coverage",
        ],
        CoverageType::Home => &[
            "Replacement cost dwelling",
            "Personal property",
            "Loss of use",
            "Liability protection",
        ],
        CoverageType::Renters => &[
            "Personal property",
            "Liability protection",
            "Additional living expenses",
            "Theft coverage",
        ],
        CoverageType::Pet => &[
            "Accident and illness",
            "Wellness add-on",
            "Any licensed vet",
            "Hereditary conditions",
        ],
    }
}

fn deductible_choices(coverage: CoverageType) -> &'static [u32] {
    match coverage {
        CoverageType::Health => &[500, 1_000, 2_500],
        CoverageType::Dental => &[50, 100],
        CoverageType::Vision => &[10, 25],
        CoverageType::Pet => &[100, 250, 500],
        _ => &[],
    }
}

/// Rough monthly price before randomization.
fn baseline_monthly(coverage: CoverageType, coverage_amount: f64, age: u8) -> f64 {
    let age_factor = 1.0 + (f64::from(age) - 30.0).max(0.0) * 0.04;
    let per_thousand = coverage_amount / 1_000.0;

    let baseline = match coverage {
        CoverageType::TermLife => per_thousand * 0.09 * age_factor,
        CoverageType::WholeLife => per_thousand * 0.85 * age_factor,
        CoverageType::Health => 320.0 * age_factor,
        CoverageType::Dental => 28.0 + per_thousand * 1.5,
        CoverageType::Vision => 12.0,
        CoverageType::Disability => per_thousand * 1.8,
        CoverageType::Auto => 95.0 + coverage_amount / 100_000.0 * 20.0,
        CoverageType::Home => per_thousand * 0.28,
        CoverageType::Renters => 15.0,
        CoverageType::Pet => 35.0,
    };
    baseline.max(MIN_MONTHLY_PREMIUM)
}

/// Generate 1-3 plausible quotes without touching the network.
///
/// Premiums vary by up to 20% around a randomized base; coverage amount
/// always matches the request.
pub fn generate_quotes(
    config: &ProviderConfig,
    request: &QuoteRequest,
    coverage: CoverageType,
) -> Vec<Quote> {
    let mut rng = rand::thread_rng();
    let count = rng.gen_range(1..=3);

    let amount = request.coverage_amount.to_f64().unwrap_or(0.0);
    let base = baseline_monthly(coverage, amount, request.applicant_age) * rng.gen_range(0.85..=1.15);
    let features = features_for(coverage);
    let deductibles = deductible_choices(coverage);
    let expires_at = Utc::now() + Duration::days(30);

    (0..count)
        .map(|index| {
            let monthly = (base * rng.gen_range(0.8..=1.2)).max(MIN_MONTHLY_PREMIUM);
            let monthly = Decimal::from_f64(monthly)
                .unwrap_or(Decimal::ONE)
                .round_dp(2);

            let mut quote = Quote::new(
                &config.id,
                &config.name,
                monthly,
                request.coverage_amount,
                expires_at,
            );

            if !deductibles.is_empty() {
                quote.deductible = Decimal::from(deductibles[rng.gen_range(0..deductibles.len())]);
            }

            let feature_count = rng.gen_range(2..=features.len());
            quote.features = features[..feature_count]
                .iter()
                .map(|feature| feature.to_string())
                .collect();

            quote.rating = Some((rng.gen_range(3.0..=5.0_f64) * 10.0).round() / 10.0);

            if coverage.is_life() {
                quote.term_length = request.term_length;
                quote.medical_exam_required = amount > 250_000.0;
            }
            if coverage == CoverageType::TermLife {
                quote.conversion_option = Some(rng.gen_bool(0.5));
            }

            quote.application_url = Some(config.endpoint(&format!("apply/{}", quote.quote_id)));

            let tier = TIERS[index % TIERS.len()];
            let mut metadata = Map::new();
            metadata.insert("mock".into(), Value::Bool(true));
            metadata.insert("coverageType".into(), json!(coverage.as_str()));
            metadata.insert("planName".into(), json!(format!("{} {}", config.name, tier)));
            quote.metadata = metadata;

            quote
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config(coverage: Vec<CoverageType>) -> ProviderConfig {
        let mut config = ProviderConfig::new("MOCKCO", "Mock Carrier", "https://mock.example", coverage);
        config.mock_mode = true;
        config
    }

    #[test]
    fn test_dental_mock_quotes() {
        let request = QuoteRequest::new("dental", 40, "33101", dec!(5000));

        for _ in 0..20 {
            let quotes = generate_quotes(
                &config(vec![CoverageType::Dental]),
                &request,
                CoverageType::Dental,
            );

            assert!((1..=3).contains(&quotes.len()));
            for quote in &quotes {
                assert_eq!(quote.provider_id, "MOCKCO");
                assert_eq!(quote.coverage_amount, dec!(5000));
                assert!(quote.deductible > Decimal::ZERO);
                assert!(quote.monthly_premium > Decimal::ZERO);
                assert_eq!(quote.annual_premium, quote.monthly_premium * dec!(12));
                let rating = quote.rating.unwrap();
                assert!((3.0..=5.0).contains(&rating));
                assert!(!quote.features.is_empty());
            }
        }
    }

    #[test]
    fn test_non_medical_coverage_has_no_deductible() {
        let request = QuoteRequest::new("term life", 30, "10001", dec!(500000)).with_term_length(20);
        let quotes = generate_quotes(
            &config(vec![CoverageType::TermLife]),
            &request,
            CoverageType::TermLife,
        );

        for quote in &quotes {
            assert_eq!(quote.deductible, Decimal::ZERO);
            assert_eq!(quote.term_length, Some(20));
            assert!(quote.medical_exam_required);
            assert!(quote.conversion_option.is_some());
        }
    }

    #[test]
    fn test_premiums_stay_within_variance_band() {
        let request = QuoteRequest::new("renters", 30, "10001", dec!(30000));
        let quotes = generate_quotes(
            &config(vec![CoverageType::Renters]),
            &request,
            CoverageType::Renters,
        );

        // 15 * [0.85, 1.15] * [0.8, 1.2]
        for quote in &quotes {
            assert!(quote.monthly_premium >= dec!(10.19));
            assert!(quote.monthly_premium <= dec!(20.71));
        }
    }
}
