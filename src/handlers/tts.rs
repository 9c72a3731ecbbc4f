use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::info;

use crate::error::{GatewayError, GatewayResult};
use crate::handlers::{ClientIp, enforce_rate_limit, remaining_header};
use crate::metrics::TTS_REQUESTS;
use crate::models::{TtsRequest, TtsResponse};
use crate::state::AppState;
use crate::voice::{choose_voice, text_to_speak};

pub async fn tts_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> GatewayResult<Response> {
    TTS_REQUESTS.inc();

    let remaining = enforce_rate_limit(&state, "tts", &ip)?;

    let Json(request) = payload.map_err(|e| GatewayError::InvalidInput(e.body_text()))?;
    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| GatewayError::InvalidInput("Name is required".to_string()))?;

    let voice = choose_voice(
        request.tts_language.as_deref(),
        request.detected_origin.as_deref(),
    );
    let text = text_to_speak(name, request.native_script.as_deref(), &voice);

    let audio = timeout(state.tts_timeout, state.speech.synthesize(&text, &voice))
        .await
        .map_err(|_| GatewayError::Timeout)??;

    info!(voice = voice.name, bytes = audio.len(), "generated audio");

    let body = TtsResponse {
        audio_base64: STANDARD.encode(&audio),
    };
    Ok((remaining_header(remaining), Json(body)).into_response())
}
