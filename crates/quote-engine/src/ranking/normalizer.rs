//! Merging quotes from outside the aggregation path.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::models::Quote;

/// Tags quotes that arrived from an external source.
///
/// Re-normalizing only refreshes `normalized_at`; every other field is
/// left as it was.
pub fn normalize_external_quotes(quotes: Vec<Quote>) -> Vec<Quote> {
    let now = Utc::now();
    quotes
        .into_iter()
        .map(|mut quote| {
            if quote.annual_premium.is_zero() {
                quote.annual_premium = quote.monthly_premium * Decimal::from(12);
            }
            quote.is_external = true;
            quote.normalized_at = Some(now);
            quote
        })
        .collect()
}

/// Internal and external quotes in one list, cheapest first.
pub fn merge_quotes(external: Vec<Quote>, internal: Vec<Quote>) -> Vec<Quote> {
    let mut merged = normalize_external_quotes(external);
    merged.extend(internal);
    merged.sort_by(|a, b| a.monthly_premium.cmp(&b.monthly_premium));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn quote(provider: &str, monthly: Decimal) -> Quote {
        Quote::new(provider, provider, monthly, dec!(100000), Utc::now() + Duration::days(30))
    }

    #[test]
    fn test_external_quotes_are_tagged() {
        let normalized = normalize_external_quotes(vec![quote("PARTNER", dec!(20))]);
        assert!(normalized[0].is_external);
        assert!(normalized[0].normalized_at.is_some());
    }

    #[test]
    fn test_missing_annual_premium_is_derived() {
        let mut external = quote("PARTNER", dec!(20));
        external.annual_premium = Decimal::ZERO;
        let normalized = normalize_external_quotes(vec![external]);
        assert_eq!(normalized[0].annual_premium, dec!(240));
    }

    #[test]
    fn test_merge_sorts_by_monthly_premium() {
        let merged = merge_quotes(
            vec![quote("PARTNER", dec!(30))],
            vec![quote("LIFESHIELD", dec!(45)), quote("EVERGREEN", dec!(12))],
        );

        let order: Vec<_> = merged.iter().map(|q| q.provider_id.as_str()).collect();
        assert_eq!(order, vec!["EVERGREEN", "PARTNER", "LIFESHIELD"]);
        assert!(merged[1].is_external);
        assert!(!merged[0].is_external);
    }
}
