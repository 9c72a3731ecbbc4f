use serde::{Deserialize, Serialize};
use serde_json::Value;

// POST /analyze body
#[derive(Deserialize, Debug, Clone, Default)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub name: Option<String>,
    // object from the extension (location, headline, company, url) or a plain string
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub source: Option<String>,
}

// POST /tts body
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TtsRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub native_script: Option<String>,
    #[serde(default)]
    pub tts_language: Option<String>,
    #[serde(default)]
    pub detected_origin: Option<String>,
    #[serde(default)]
    pub cultural_note: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TtsResponse {
    pub audio_base64: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    // Unknown or missing values degrade to Low
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("high") => Confidence::High,
            Some("medium") => Confidence::Medium,
            _ => Confidence::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct NameComponents {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

// Stable shape handed to the extension and web page
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub confidence: Confidence,
    pub detected_origin: Option<String>,
    pub sounds_like: String,
    pub native_script: Option<String>,
    pub has_english_name: bool,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub profile_location: Option<String>,
    pub warnings: Vec<String>,
    pub cultural_note: Option<String>,
    pub tts_language: String,
    // The extension reads name parts from here
    pub components: NameComponents,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsSource {
    Extension,
    Webapp,
    Unknown,
}

impl AnalyticsSource {
    // Body `source` wins, then a chrome-extension Origin header
    pub fn resolve(body_source: Option<&str>, origin: Option<&str>) -> Self {
        match body_source.map(str::trim) {
            Some("webapp") => return AnalyticsSource::Webapp,
            Some("extension") => return AnalyticsSource::Extension,
            _ => {}
        }
        match origin {
            Some(o) if o.starts_with("chrome-extension://") => AnalyticsSource::Extension,
            _ => AnalyticsSource::Unknown,
        }
    }
}
