mod analyze;
mod client_ip;
mod health;
mod metrics;
mod tts;

pub use analyze::analyze_handler;
pub use client_ip::ClientIp;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use tts::tts_handler;

use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;

use crate::cors::{MAX_AGE, cors_layer};
use crate::error::{GatewayError, GatewayResult};
use crate::metrics::RATE_LIMITED;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/analyze", post(analyze_handler).options(preflight_handler))
        .route("/tts", post(tts_handler).options(preflight_handler));

    // the extension and web page call the /api prefix
    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(state.clone(), cors_layer))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// CORS headers themselves are added by cors_layer
async fn preflight_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::ACCESS_CONTROL_MAX_AGE, MAX_AGE)],
        Json(serde_json::json!({})),
    )
}

// Separate budgets per route so fetching audio doesn't eat analysis quota
pub(crate) fn enforce_rate_limit(state: &AppState, scope: &str, ip: &str) -> GatewayResult<u32> {
    let decision = state
        .rate_limiter
        .check(&format!("{scope}:{ip}"), state.rate_limit, state.rate_window);

    if !decision.allowed {
        RATE_LIMITED.inc();
        tracing::warn!(client = ip, scope, "rate limit exceeded");
        return Err(GatewayError::RateLimited {
            retry_after: decision.retry_after.as_secs().max(1),
        });
    }
    Ok(decision.remaining)
}

pub(crate) fn remaining_header(remaining: u32) -> [(HeaderName, HeaderValue); 1] {
    [(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(remaining),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::AnalyticsLogger;
    use crate::rate_limit::RateLimiter;
    use crate::test_support::spawn_mock;
    use crate::upstream::{GeminiClient, SpeechClient};
    use axum::{
        body::{Body, to_bytes},
        extract::Json as JsonBody,
        http::{Method, Request},
        response::Response,
    };
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::util::ServiceExt;

    const NO_UPSTREAM: &str = "http://127.0.0.1:1";

    fn test_state(gemini_url: &str, tts_url: &str) -> AppState {
        let client = reqwest::Client::new();
        AppState {
            gemini: GeminiClient::new(
                client.clone(),
                gemini_url,
                "gemini-2.0-flash",
                Some("test-key".into()),
                Duration::from_secs(5),
            ),
            speech: SpeechClient::new(client.clone(), tts_url, Some("test-key".into())),
            // unreachable sink: every analytics insert fails in the background
            analytics: AnalyticsLogger::new(
                client,
                Some(NO_UPSTREAM.into()),
                Some("anon".into()),
                Duration::from_secs(1),
            ),
            rate_limiter: Arc::new(RateLimiter::new()),
            rate_limit: 15,
            rate_window: Duration::from_secs(60),
            tts_timeout: Duration::from_secs(5),
            trusted_proxy_hops: 1,
            allowed_origins: vec![],
        }
    }

    fn gemini_mock(answer: &'static str) -> Router {
        Router::new().route(
            "/v1beta/models/{call}",
            post(move || async move {
                JsonBody(json!({"candidates": [{"content": {"parts": [{"text": answer}]}}]}))
            }),
        )
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const WONG_QI_HAN: &str = r#"Here is the analysis:
{
  "confidence": "high",
  "detected_origin": "Southern Chinese",
  "sounds_like": "WONG chee HAHN",
  "native_script": "黄启汉",
  "has_english_name": false,
  "given_name": "Qi Han",
  "family_name": "Wong",
  "location": "Malaysia",
  "warnings": ["Family name is written first"],
  "cultural_note": "Hokkien/Cantonese romanization; read with an English voice.",
  "tts_language": "english"
}
Let me know if you need more."#;

    #[tokio::test]
    async fn test_preflight_returns_cors_headers() {
        let app = router(Arc::new(test_state(NO_UPSTREAM, NO_UPSTREAM)));
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/analyze")
            .header("origin", "chrome-extension://abc")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[tokio::test]
    async fn test_missing_name_is_bad_request() {
        let app = router(Arc::new(test_state(NO_UPSTREAM, NO_UPSTREAM)));

        let response = app
            .clone()
            .oneshot(post_json("/analyze", json!({"context": {}})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Name is required"}));

        let response = app
            .oneshot(post_json("/tts", json!({"name": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let app = router(Arc::new(test_state(NO_UPSTREAM, NO_UPSTREAM)));
        let request = Request::builder()
            .method(Method::POST)
            .uri("/analyze")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_foreign_origin_is_forbidden() {
        let mut state = test_state(NO_UPSTREAM, NO_UPSTREAM);
        state.allowed_origins = vec!["http://localhost:3000".into()];
        let app = router(Arc::new(state));

        let mut request = post_json("/analyze", json!({"name": "Li Na"}));
        request
            .headers_mut()
            .insert(header::ORIGIN, HeaderValue::from_static("https://evil.example"));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await, json!({"error": "Forbidden"}));
    }

    #[tokio::test]
    async fn test_analyze_then_tts_uses_english_voice_for_southern_chinese() {
        let gemini = spawn_mock(gemini_mock(WONG_QI_HAN)).await;
        let tts = spawn_mock(Router::new().route(
            "/v1/{call}",
            post(|JsonBody(body): JsonBody<Value>| async move {
                assert_eq!(body["voice"]["languageCode"], "en-US");
                assert_eq!(body["voice"]["name"], "en-US-Wavenet-D");
                assert_eq!(body["input"]["text"], "Wong Qi Han");
                JsonBody(json!({"audioContent": STANDARD.encode(b"mp3-bytes")}))
            }),
        ))
        .await;
        let app = router(Arc::new(test_state(&gemini, &tts)));

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/analyze",
                json!({"name": "Wong Qi Han", "context": {"location": "Kuala Lumpur"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "14");

        let analysis = body_json(response).await;
        assert_eq!(analysis["detected_origin"], "Southern Chinese");
        assert_eq!(analysis["tts_language"], "english");
        assert_eq!(analysis["has_english_name"], false);
        assert_eq!(analysis["native_script"], "黄启汉");
        assert_eq!(analysis["profile_location"], "Kuala Lumpur");
        assert_eq!(analysis["warnings"], json!(["Family name is written first"]));

        let response = app
            .oneshot(post_json(
                "/tts",
                json!({
                    "name": "Wong Qi Han",
                    "native_script": analysis["native_script"],
                    "tts_language": analysis["tts_language"],
                    "detected_origin": analysis["detected_origin"],
                    "cultural_note": analysis["cultural_note"],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let audio = body_json(response).await;
        assert_eq!(
            STANDARD.decode(audio["audio_base64"].as_str().unwrap()).unwrap(),
            b"mp3-bytes"
        );
    }

    #[tokio::test]
    async fn test_tts_speaks_native_script_for_native_voice() {
        let tts = spawn_mock(Router::new().route(
            "/v1/{call}",
            post(|JsonBody(body): JsonBody<Value>| async move {
                assert_eq!(body["voice"]["languageCode"], "ja-JP");
                assert_eq!(body["input"]["text"], "田中健二");
                JsonBody(json!({"audioContent": STANDARD.encode(b"ja")}))
            }),
        ))
        .await;
        let app = router(Arc::new(test_state(NO_UPSTREAM, &tts)));

        let response = app
            .oneshot(post_json(
                "/tts",
                json!({"name": "Kenji Tanaka", "native_script": "田中健二", "detected_origin": "Japanese"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unparseable_inference_output_is_generic_500() {
        let gemini = spawn_mock(gemini_mock("Sorry, I can't analyze that name.")).await;
        let app = router(Arc::new(test_state(&gemini, NO_UPSTREAM)));

        let response = app
            .oneshot(post_json("/analyze", json!({"name": "Li Na", "context": ""})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({"error": "Failed to analyze name"}));
    }

    #[tokio::test]
    async fn test_unreachable_inference_is_generic_500() {
        let app = router(Arc::new(test_state(NO_UPSTREAM, NO_UPSTREAM)));

        let response = app
            .oneshot(post_json("/analyze", json!({"name": "Li Na"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({"error": "Failed to analyze name"}));
    }

    #[tokio::test]
    async fn test_slow_speech_times_out() {
        let tts = spawn_mock(Router::new().route(
            "/v1/{call}",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                JsonBody(json!({"audioContent": STANDARD.encode(b"late")}))
            }),
        ))
        .await;
        let mut state = test_state(NO_UPSTREAM, &tts);
        state.tts_timeout = Duration::from_millis(100);
        let app = router(Arc::new(state));

        let response = app
            .oneshot(post_json("/tts", json!({"name": "Anna Nowak"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_json(response).await, json!({"error": "Audio generation timed out"}));
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_after_quota() {
        let gemini = spawn_mock(gemini_mock(r#"{"confidence": "low"}"#)).await;
        let mut state = test_state(&gemini, NO_UPSTREAM);
        state.rate_limit = 2;
        let app = router(Arc::new(state));

        for expected in ["1", "0"] {
            let response = app
                .clone()
                .oneshot(post_json("/analyze", json!({"name": "Duc Le"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["x-ratelimit-remaining"], expected);
        }

        let response = app
            .clone()
            .oneshot(post_json("/analyze", json!({"name": "Duc Le"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert!(response.headers().contains_key(header::RETRY_AFTER));

        // the tts budget is separate
        let response = app
            .oneshot(post_json("/tts", json!({"name": ""})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_forged_forwarded_prefix_shares_budget() {
        let gemini = spawn_mock(gemini_mock(r#"{"confidence": "low"}"#)).await;
        let mut state = test_state(&gemini, NO_UPSTREAM);
        state.rate_limit = 1;
        let app = router(Arc::new(state));

        let mut statuses = Vec::new();
        for forged in ["spoof-1, 10.0.0.1", "spoof-2, 10.0.0.1"] {
            let mut request = post_json("/analyze", json!({"name": "Duc Le"}));
            request
                .headers_mut()
                .insert("x-forwarded-for", HeaderValue::from_static(forged));
            let response = app.clone().oneshot(request).await.unwrap();
            statuses.push(response.status());
        }
        assert_eq!(statuses, [StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(Arc::new(test_state(NO_UPSTREAM, NO_UPSTREAM)));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }
}
