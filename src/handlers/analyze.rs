use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::info;

use crate::analysis::{build_prompt, parse_analysis};
use crate::analytics::{AnalyticsEvent, hash_client};
use crate::error::{GatewayError, GatewayResult};
use crate::handlers::{ClientIp, enforce_rate_limit, remaining_header};
use crate::metrics::ANALYZE_REQUESTS;
use crate::models::{AnalyticsSource, AnalyzeRequest};
use crate::state::AppState;

pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> GatewayResult<Response> {
    ANALYZE_REQUESTS.inc();

    let remaining = enforce_rate_limit(&state, "analyze", &ip)?;

    let Json(request) = payload.map_err(|e| GatewayError::InvalidInput(e.body_text()))?;
    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| GatewayError::InvalidInput("Name is required".to_string()))?;

    let prompt = build_prompt(name, &request.context);
    let text = state.gemini.generate(&prompt).await?;
    let result = parse_analysis(name, &text, &request.context)?;

    info!(
        origin = result.detected_origin.as_deref().unwrap_or("unknown"),
        confidence = result.confidence.as_str(),
        "analyzed name"
    );

    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    // detached; the response does not wait on it
    state.analytics.log_analysis(AnalyticsEvent {
        source: AnalyticsSource::resolve(request.source.as_deref(), origin),
        detected_origin: result.detected_origin.clone(),
        confidence: Some(result.confidence.as_str().to_string()),
        client_hash: hash_client(&ip),
    });

    Ok((remaining_header(remaining), Json(result)).into_response())
}
