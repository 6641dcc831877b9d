use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use covermesh_quote_engine::ranking::{
    enrich_quotes_for_display, filter_quotes, generate_comparison_summary, ComparisonSummary,
    DisplayQuote, QuoteFilters,
};
use covermesh_quote_engine::{
    AggregationResult, ProviderOutcome, ProviderSummary, QuoteRequest, StoredQuoteSet,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use super::ORGANIZATION_HEADER;
use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBody {
    #[serde(flatten)]
    pub request: QuoteRequest,
    #[serde(default)]
    pub filters: Option<QuoteFilters>,
    /// Extra headers forwarded to every provider for this call.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResponse {
    pub request_id: String,
    pub cached: bool,
    pub providers: ProviderSummary,
    pub outcomes: Vec<ProviderOutcome>,
    pub quotes: Vec<DisplayQuote>,
    pub summary: ComparisonSummary,
}

fn organization_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ORGANIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

async fn aggregate(
    state: &AppState,
    headers: &HeaderMap,
    body: &QuoteBody,
) -> ApiResult<AggregationResult> {
    let organization = organization_id(headers);
    let call_headers = (!body.headers.is_empty()).then_some(&body.headers);

    let mut result = state
        .orchestrator
        .get_quotes(&body.request, organization.as_deref(), call_headers)
        .await?;

    if let Some(filters) = &body.filters {
        result.quotes = filter_quotes(result.quotes, filters);
    }
    Ok(result)
}

async fn get_quotes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<QuoteBody>,
) -> ApiResult<Json<AggregationResult>> {
    let result = aggregate(&state, &headers, &body).await?;
    Ok(Json(result))
}

async fn compare_quotes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<QuoteBody>,
) -> ApiResult<Json<CompareResponse>> {
    let result = aggregate(&state, &headers, &body).await?;
    let summary = generate_comparison_summary(&result.quotes);

    Ok(Json(CompareResponse {
        request_id: result.request_id,
        cached: result.cached,
        providers: result.providers,
        outcomes: result.outcomes,
        quotes: enrich_quotes_for_display(result.quotes),
        summary,
    }))
}

async fn get_quote_set(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> ApiResult<Json<StoredQuoteSet>> {
    state
        .quote_store
        .get_quote_set(&request_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = BroadcastStream::new(state.event_bus.subscribe());
    let stream = tokio_stream::StreamExt::filter_map(receiver, |event| match event {
        Ok(evt) => match SseEvent::default().json_data(&evt) {
            Ok(sse_event) => Some(Ok(sse_event)),
            Err(err) => {
                tracing::error!(
                    "Failed to serialize SSE payload for {}: {}",
                    evt.request_id(),
                    err
                );
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(_)) => None,
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quotes", post(get_quotes))
        .route("/quotes/compare", post(compare_quotes))
        .route("/quotes/events", get(stream_events))
        .route("/quotes/{request_id}", get(get_quote_set))
}
