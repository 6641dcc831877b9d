//! Side-by-side comparison summary.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Quote;

const TOP_FEATURES: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
    /// Mean monthly premium, two decimal places.
    pub average: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageRange {
    pub min: Decimal,
    pub max: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureCount {
    pub feature: String,
    pub count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub lowest_price: Option<Quote>,
    /// `None` when no quote carries a rating.
    pub highest_rating: Option<Quote>,
    /// Most coverage per premium dollar.
    pub best_value: Option<Quote>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub total_quotes: usize,
    pub provider_count: usize,
    pub price_range: Option<PriceRange>,
    pub coverage_range: Option<CoverageRange>,
    pub top_features: Vec<FeatureCount>,
    pub recommendations: Recommendations,
}

pub fn generate_comparison_summary(quotes: &[Quote]) -> ComparisonSummary {
    let providers: BTreeSet<&str> = quotes.iter().map(|q| q.provider_id.as_str()).collect();

    ComparisonSummary {
        total_quotes: quotes.len(),
        provider_count: providers.len(),
        price_range: price_range(quotes),
        coverage_range: coverage_range(quotes),
        top_features: top_features(quotes),
        recommendations: Recommendations {
            lowest_price: quotes.iter().min_by_key(|q| q.monthly_premium).cloned(),
            highest_rating: highest_rating(quotes),
            best_value: best_value(quotes),
        },
    }
}

fn price_range(quotes: &[Quote]) -> Option<PriceRange> {
    let min = quotes.iter().map(|q| q.monthly_premium).min()?;
    let max = quotes.iter().map(|q| q.monthly_premium).max()?;
    let sum: Decimal = quotes.iter().map(|q| q.monthly_premium).sum();
    let average = (sum / Decimal::from(quotes.len())).round_dp(2);
    Some(PriceRange { min, max, average })
}

fn coverage_range(quotes: &[Quote]) -> Option<CoverageRange> {
    Some(CoverageRange {
        min: quotes.iter().map(|q| q.coverage_amount).min()?,
        max: quotes.iter().map(|q| q.coverage_amount).max()?,
    })
}

/// Most frequent features, ties broken alphabetically.
fn top_features(quotes: &[Quote]) -> Vec<FeatureCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for feature in quotes.iter().flat_map(|q| q.features.iter()) {
        *counts.entry(feature.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<FeatureCount> = counts
        .into_iter()
        .map(|(feature, count)| FeatureCount {
            feature: feature.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.feature.cmp(&b.feature)));
    ranked.truncate(TOP_FEATURES);
    ranked
}

fn highest_rating(quotes: &[Quote]) -> Option<Quote> {
    quotes
        .iter()
        .filter_map(|q| q.rating.map(|rating| (rating, q)))
        .fold(None, |best: Option<(f64, &Quote)>, (rating, q)| match best {
            Some((top, _)) if top >= rating => best,
            _ => Some((rating, q)),
        })
        .map(|(_, q)| q.clone())
}

fn best_value(quotes: &[Quote]) -> Option<Quote> {
    quotes
        .iter()
        .filter_map(|q| {
            let value = (q.coverage_amount / Decimal::ONE_THOUSAND).checked_div(q.monthly_premium)?;
            Some((value, q))
        })
        .fold(None, |best: Option<(Decimal, &Quote)>, (value, q)| match best {
            Some((top, _)) if top >= value => best,
            _ => Some((value, q)),
        })
        .map(|(_, q)| q.clone())
}
