//! Post-aggregation ranking: external quote normalization, filtering,
//! deduplication, display enrichment and comparison summaries.

mod display;
mod filter;
mod normalizer;
mod summary;

pub use display::{enrich_quotes_at, enrich_quotes_for_display, DisplayQuote};
pub use filter::{deduplicate_quotes, filter_quotes, QuoteFilters};
pub use normalizer::{merge_quotes, normalize_external_quotes};
pub use summary::{
    generate_comparison_summary, ComparisonSummary, CoverageRange, FeatureCount, PriceRange,
    Recommendations,
};
