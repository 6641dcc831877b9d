//! Presentation metrics for a ranked quote list.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Quote;

/// Quotes expiring within this many days are flagged.
const EXPIRING_SOON_DAYS: i64 = 2;
/// Only the cheapest few are eligible for a recommendation badge.
const RECOMMENDED_SLOTS: usize = 3;
const RECOMMENDED_SCORE_CEILING: f64 = 0.5;
const UNRATED_PENALTY: f64 = 0.5;
const MEDICAL_EXAM_PENALTY: f64 = 0.1;
const SECONDS_PER_DAY: i64 = 86_400;

/// A quote plus the derived fields a comparison view shows.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayQuote {
    #[serde(flatten)]
    pub quote: Quote,
    /// Annual premium per $1,000 of coverage, two decimal places.
    pub cost_per_thousand: Decimal,
    /// Lower is better.
    pub recommendation_score: f64,
    pub is_recommended: bool,
    pub is_expiring_soon: bool,
    pub days_until_expiry: i64,
}

/// Sorts by monthly premium and attaches display metrics, using the
/// current time for expiry.
pub fn enrich_quotes_for_display(quotes: Vec<Quote>) -> Vec<DisplayQuote> {
    enrich_quotes_at(quotes, Utc::now())
}

/// [`enrich_quotes_for_display`] against a fixed clock.
pub fn enrich_quotes_at(mut quotes: Vec<Quote>, now: DateTime<Utc>) -> Vec<DisplayQuote> {
    quotes.sort_by(|a, b| a.monthly_premium.cmp(&b.monthly_premium));
    let total = quotes.len();

    quotes
        .into_iter()
        .enumerate()
        .map(|(index, quote)| {
            let recommendation_score = recommendation_score(&quote, index, total);
            let days_until_expiry = days_until(quote.expires_at, now);
            DisplayQuote {
                cost_per_thousand: cost_per_thousand(&quote),
                recommendation_score,
                is_recommended: index < RECOMMENDED_SLOTS
                    && recommendation_score < RECOMMENDED_SCORE_CEILING,
                is_expiring_soon: days_until_expiry <= EXPIRING_SOON_DAYS,
                days_until_expiry,
                quote,
            }
        })
        .collect()
}

/// `(monthly * 12) / (coverage / 1000)`; zero when coverage is zero.
fn cost_per_thousand(quote: &Quote) -> Decimal {
    let thousands = quote.coverage_amount / Decimal::ONE_THOUSAND;
    (quote.monthly_premium * Decimal::from(12))
        .checked_div(thousands)
        .map(|cost| cost.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}

fn recommendation_score(quote: &Quote, index: usize, total: usize) -> f64 {
    let position = index as f64 / total.max(1) as f64;
    let rating = quote
        .rating
        .map(|rating| (5.0 - rating) / 5.0)
        .unwrap_or(UNRATED_PENALTY);
    let exam = if quote.medical_exam_required {
        MEDICAL_EXAM_PENALTY
    } else {
        0.0
    };
    position + rating + exam
}

/// Whole days until `expires_at`, rounded up.
fn days_until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (expires_at - now).num_seconds();
    (seconds as f64 / SECONDS_PER_DAY as f64).ceil() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn quote(monthly: Decimal, rating: Option<f64>, expires_in: Duration, now: DateTime<Utc>) -> Quote {
        let mut quote = Quote::new("LIFESHIELD", "LifeShield", monthly, dec!(250000), now + expires_in);
        quote.rating = rating;
        quote
    }

    #[test]
    fn test_cost_per_thousand() {
        let now = Utc::now();
        let enriched = enrich_quotes_at(vec![quote(dec!(25), None, Duration::days(30), now)], now);
        // 300 / 250
        assert_eq!(enriched[0].cost_per_thousand, dec!(1.20));
    }

    #[test]
    fn test_zero_coverage_does_not_divide() {
        let now = Utc::now();
        let mut q = quote(dec!(25), None, Duration::days(30), now);
        q.coverage_amount = Decimal::ZERO;
        let enriched = enrich_quotes_at(vec![q], now);
        assert_eq!(enriched[0].cost_per_thousand, Decimal::ZERO);
    }

    #[test]
    fn test_recommendation_scores_follow_price_order() {
        let now = Utc::now();
        let quotes = vec![
            quote(dec!(80), Some(5.0), Duration::days(30), now),
            quote(dec!(40), Some(5.0), Duration::days(30), now),
            quote(dec!(60), None, Duration::days(30), now),
            quote(dec!(100), Some(3.0), Duration::days(30), now),
        ];

        let enriched = enrich_quotes_at(quotes, now);
        let premiums: Vec<_> = enriched.iter().map(|d| d.quote.monthly_premium).collect();
        assert_eq!(premiums, vec![dec!(40), dec!(60), dec!(80), dec!(100)]);

        // index 0, rating 5: 0.0
        assert!(enriched[0].recommendation_score.abs() < 1e-9);
        assert!(enriched[0].is_recommended);
        // index 1, unrated: 0.25 + 0.5
        assert!((enriched[1].recommendation_score - 0.75).abs() < 1e-9);
        assert!(!enriched[1].is_recommended);
        // index 2, rating 5: 0.5, not strictly below the ceiling
        assert!(!enriched[2].is_recommended);
        // index 3 is never recommended
        assert!(!enriched[3].is_recommended);
    }

    #[test]
    fn test_medical_exam_penalty() {
        let now = Utc::now();
        let mut q = quote(dec!(40), Some(5.0), Duration::days(30), now);
        q.medical_exam_required = true;
        let enriched = enrich_quotes_at(vec![q], now);
        assert!((enriched[0].recommendation_score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_expiry_flags() {
        let now = Utc::now();
        let enriched = enrich_quotes_at(
            vec![
                quote(dec!(40), None, Duration::hours(36), now),
                quote(dec!(50), None, Duration::days(10), now),
            ],
            now,
        );
        assert_eq!(enriched[0].days_until_expiry, 2);
        assert!(enriched[0].is_expiring_soon);
        assert_eq!(enriched[1].days_until_expiry, 10);
        assert!(!enriched[1].is_expiring_soon);
    }

    #[test]
    fn test_serializes_flat() {
        let now = Utc::now();
        let enriched = enrich_quotes_at(vec![quote(dec!(25), None, Duration::days(30), now)], now);
        let json = serde_json::to_value(&enriched[0]).unwrap();
        assert!(json.get("providerId").is_some());
        assert!(json.get("costPerThousand").is_some());
        assert_eq!(json["isRecommended"], serde_json::Value::Bool(false));
    }
}
