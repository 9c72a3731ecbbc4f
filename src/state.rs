use std::sync::Arc;
use std::time::Duration;

use crate::analytics::AnalyticsLogger;
use crate::config::Args;
use crate::rate_limit::RateLimiter;
use crate::upstream::{GeminiClient, SpeechClient};

// app's shared state, built once in main and handed to every handler

pub struct AppState {
    pub gemini: GeminiClient,
    pub speech: SpeechClient,
    pub analytics: AnalyticsLogger,
    pub rate_limiter: Arc<RateLimiter>,
    pub rate_limit: u32,       // max requests allowed per window
    pub rate_window: Duration, // length of a rate limit window
    pub tts_timeout: Duration, // deadline for one speech call
    pub trusted_proxy_hops: usize,
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn from_args(args: &Args, client: reqwest::Client) -> Self {
        Self {
            gemini: GeminiClient::new(
                client.clone(),
                &args.gemini_base_url,
                &args.gemini_model,
                args.gemini_api_key.clone(),
                args.inference_timeout(),
            ),
            speech: SpeechClient::new(client.clone(), &args.tts_base_url, args.tts_api_key.clone()),
            analytics: AnalyticsLogger::new(
                client,
                args.analytics_url.clone(),
                args.analytics_key.clone(),
                args.analytics_timeout(),
            ),
            rate_limiter: Arc::new(RateLimiter::new()),
            rate_limit: args.rate_limit,
            rate_window: args.rate_window(),
            tts_timeout: args.tts_timeout(),
            trusted_proxy_hops: args.trusted_proxy_hops,
            allowed_origins: args.allowed_origins(),
        }
    }
}
