use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::metrics::{UPSTREAM_FAILURES, UPSTREAM_LATENCY};
use crate::voice::Voice;

const SPEAKING_RATE: f32 = 0.9;

// text:synthesize request format
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeRequest<'a> {
    pub input: SynthesisInput<'a>,
    pub voice: VoiceSelection<'a>,
    pub audio_config: AudioConfig,
}

#[derive(Serialize, Debug)]
pub struct SynthesisInput<'a> {
    pub text: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSelection<'a> {
    pub language_code: &'a str,
    pub name: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    pub audio_encoding: &'static str,
    pub speaking_rate: f32,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeResponse {
    #[serde(default)]
    pub audio_content: String,
}

#[derive(Clone)]
pub struct SpeechClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SpeechClient {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Synthesizes `text` with `voice` and returns MP3 bytes.
    ///
    /// No deadline is applied here; the caller wraps this in its own timeout.
    pub async fn synthesize(&self, text: &str, voice: &Voice) -> GatewayResult<Vec<u8>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::speech("GOOGLE_TTS_API_KEY not configured"))?;

        let body = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: voice.language_code,
                name: voice.name,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: SPEAKING_RATE,
            },
        };

        let url = format!("{}/v1/text:synthesize?key={}", self.base_url, api_key);

        let start = Instant::now();
        let result = self.client.post(&url).json(&body).send().await;
        UPSTREAM_LATENCY.observe(start.elapsed().as_secs_f64());

        let res = result.map_err(|e| {
            UPSTREAM_FAILURES.inc();
            GatewayError::speech(e.without_url().to_string())
        })?;

        let status = res.status();
        if !status.is_success() {
            UPSTREAM_FAILURES.inc();
            let detail = res.text().await.unwrap_or_default();
            warn!(%status, voice = voice.name, "Text-to-Speech API returned an error");
            return Err(GatewayError::speech(format!("status {status}: {detail}")));
        }

        let parsed: SynthesizeResponse = res.json().await.map_err(|e| {
            UPSTREAM_FAILURES.inc();
            GatewayError::speech(format!("unreadable response: {}", e.without_url()))
        })?;

        if parsed.audio_content.is_empty() {
            UPSTREAM_FAILURES.inc();
            return Err(GatewayError::speech("No audio content returned"));
        }

        let audio = STANDARD
            .decode(parsed.audio_content.as_bytes())
            .map_err(|e| GatewayError::speech(format!("audio is not base64: {e}")))?;

        debug!(bytes = audio.len(), voice = voice.name, "synthesized speech");
        Ok(audio)
    }
}
