//! Caller-side filtering and near-duplicate removal.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Quote;

/// Premium band width used when deciding two quotes are the same offer.
const DEDUP_PREMIUM_BAND: Decimal = Decimal::TEN;

/// Criteria combined with AND. Unset fields do not filter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_monthly_premium: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_coverage_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_deductible: Option<Decimal>,
    /// Every entry must match some feature, case-insensitive substring.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_providers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
}

impl QuoteFilters {
    pub fn matches(&self, quote: &Quote) -> bool {
        if self
            .max_monthly_premium
            .is_some_and(|max| quote.monthly_premium > max)
        {
            return false;
        }
        if self
            .min_coverage_amount
            .is_some_and(|min| quote.coverage_amount < min)
        {
            return false;
        }
        if self.max_deductible.is_some_and(|max| quote.deductible > max) {
            return false;
        }
        if self.exclude_providers.contains(&quote.provider_id) {
            return false;
        }
        if let Some(min) = self.min_rating {
            // Unrated quotes cannot satisfy a rating floor.
            if !quote.rating.is_some_and(|rating| rating >= min) {
                return false;
            }
        }

        let features: Vec<String> = quote.features.iter().map(|f| f.to_lowercase()).collect();
        self.required_features.iter().all(|required| {
            let required = required.to_lowercase();
            features.iter().any(|feature| feature.contains(&required))
        })
    }
}

/// Applies `filters`, then drops near-duplicates.
pub fn filter_quotes(quotes: Vec<Quote>, filters: &QuoteFilters) -> Vec<Quote> {
    let kept = quotes.into_iter().filter(|q| filters.matches(q)).collect();
    deduplicate_quotes(kept)
}

/// Same provider, same coverage amount, premium within the same $10 band:
/// only the cheapest survives, at the position of the first occurrence.
pub fn deduplicate_quotes(quotes: Vec<Quote>) -> Vec<Quote> {
    let mut slots: HashMap<(String, Decimal, Decimal), usize> = HashMap::new();
    let mut kept: Vec<Quote> = Vec::with_capacity(quotes.len());

    for quote in quotes {
        let key = dedup_key(&quote);
        match slots.get(&key) {
            Some(&slot) => {
                if quote.monthly_premium < kept[slot].monthly_premium {
                    kept[slot] = quote;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(quote);
            }
        }
    }

    kept
}

fn dedup_key(quote: &Quote) -> (String, Decimal, Decimal) {
    let band = (quote.monthly_premium / DEDUP_PREMIUM_BAND).floor() * DEDUP_PREMIUM_BAND;
    (
        quote.provider_id.clone(),
        quote.coverage_amount.normalize(),
        band.normalize(),
    )
}
