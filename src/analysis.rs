//! Prompt construction and reshaping of the model's answer.
//!
//! The model has been asked for several JSON layouts over time. Everything
//! it may send is read through [`UpstreamAnalysis`], whose fields are all
//! optional, and folded into the one [`AnalysisResult`] the clients render.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};
use crate::models::{AnalysisResult, Confidence, NameComponents};

pub const DEFAULT_TTS_LANGUAGE: &str = "english";

// Every field reads leniently: a value of the wrong type becomes None
// instead of failing the whole answer.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct UpstreamAnalysis {
    #[serde(deserialize_with = "lenient_text")]
    pub confidence: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub detected_origin: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub sounds_like: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub pronunciation: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub native_script: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub has_english_name: Option<bool>,
    #[serde(deserialize_with = "lenient_text")]
    pub given_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub family_name: Option<String>,
    #[serde(deserialize_with = "lenient_components")]
    pub components: Option<NameComponents>,
    #[serde(deserialize_with = "lenient_text")]
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub profile_location: Option<String>,
    // array in current prompts, a bare string in some older ones
    pub warnings: Value,
    #[serde(deserialize_with = "lenient_text")]
    pub formality_warning: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub cultural_note: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub tts_language: Option<String>,
}

// "Qi Han", ["Qi", "Han"], 0.9 -> text; objects and null -> None
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if parts.is_empty() { None } else { Some(parts.join(" ")) }
        }
        _ => None,
    }
}

fn value_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(value_text(&Value::deserialize(deserializer)?))
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(value_bool(&Value::deserialize(deserializer)?))
}

fn lenient_components<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NameComponents>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(Some(NameComponents {
        given_name: value.get("given_name").and_then(value_text),
        family_name: value.get("family_name").and_then(value_text),
    }))
}

/// Returns the first well-formed JSON object embedded in `text`.
pub fn extract_json_object(text: &str) -> Option<Value> {
    for (idx, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            if value.is_object() {
                return Some(value);
            }
        }
    }
    None
}

/// Parses the model's raw text into the stable result.
pub fn parse_analysis(name: &str, text: &str, context: &Value) -> GatewayResult<AnalysisResult> {
    let object = extract_json_object(text).ok_or_else(|| GatewayError::UpstreamFormat(snippet(text)))?;
    let upstream: UpstreamAnalysis = serde_json::from_value(object)
        .map_err(|e| GatewayError::UpstreamFormat(e.to_string()))?;
    Ok(normalize(name, upstream, context))
}

pub fn normalize(name: &str, raw: UpstreamAnalysis, context: &Value) -> AnalysisResult {
    let components = raw.components.unwrap_or_default();
    let given_name = non_empty(raw.given_name).or(components.given_name);
    let family_name = non_empty(raw.family_name).or(components.family_name);

    let has_english_name = raw.has_english_name.unwrap_or(false);
    let tts_language = if has_english_name {
        DEFAULT_TTS_LANGUAGE.to_string()
    } else {
        non_empty(raw.tts_language).unwrap_or_else(|| DEFAULT_TTS_LANGUAGE.to_string())
    };

    let mut warnings: Vec<String> = match raw.warnings {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|w| w.as_str().map(|s| s.trim().to_string()))
            .filter(|w| !w.is_empty())
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };
    if let Some(warning) = non_empty(raw.formality_warning) {
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }

    AnalysisResult {
        confidence: Confidence::parse(raw.confidence.as_deref()),
        detected_origin: non_empty(raw.detected_origin),
        sounds_like: non_empty(raw.sounds_like)
            .or_else(|| non_empty(raw.pronunciation))
            .unwrap_or_else(|| name.trim().to_string()),
        native_script: non_empty(raw.native_script),
        has_english_name,
        given_name: given_name.clone(),
        family_name: family_name.clone(),
        // what the caller observed beats what the model guessed
        profile_location: context_location(context)
            .or_else(|| non_empty(raw.profile_location))
            .or_else(|| non_empty(raw.location)),
        warnings,
        cultural_note: non_empty(raw.cultural_note),
        tts_language,
        components: NameComponents {
            given_name,
            family_name,
        },
    }
}

/// `context.location` when the caller sent an object carrying one.
pub fn context_location(context: &Value) -> Option<String> {
    context
        .get("location")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// Flatten whatever the client sent into prompt lines
pub fn render_context(context: &Value) -> Option<String> {
    match context {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => {
            let lines: Vec<String> = map
                .iter()
                .filter_map(|(key, value)| match value {
                    Value::String(s) if !s.trim().is_empty() => Some(format!("{key}: {}", s.trim())),
                    Value::Number(n) => Some(format!("{key}: {n}")),
                    Value::Bool(b) => Some(format!("{key}: {b}")),
                    _ => None,
                })
                .collect();
            if lines.is_empty() { None } else { Some(lines.join("\n")) }
        }
        _ => None,
    }
}

pub fn build_prompt(name: &str, context: &Value) -> String {
    let context_block = match render_context(context) {
        Some(ctx) => format!("Context:\n{ctx}\n"),
        None => String::new(),
    };

    format!(
        r#"You are an expert in names, their origins, and cultural context. Analyze this name and provide helpful information for someone meeting this person professionally.

Name: {name}
{context_block}
Respond in JSON format with these fields:
{{
    "confidence": "high" | "medium" | "low",
    "detected_origin": "most likely linguistic/cultural origin (e.g. 'Japanese', 'Southern Chinese', 'Mandarin Chinese')",
    "sounds_like": "phonetic pronunciation guide using simple English sounds (e.g. 'JEAN-pee-AIR' for Jean-Pierre)",
    "native_script": "the name in its native script if the origin uses one, otherwise null",
    "has_english_name": true if the given name is an English/Western name (e.g. 'Kevin Tan'), otherwise false,
    "given_name": "first/given name(s)",
    "family_name": "surname/family name",
    "location": "most likely country/region of origin",
    "warnings": ["brief formality notes, e.g. 'Do not use first name until invited'"],
    "cultural_note": "one helpful cultural context (e.g. name order conventions, common nicknames)",
    "tts_language": "language whose voice should read the name aloud, lowercase (e.g. 'japanese', 'mandarin', 'english')"
}}

Rules for tts_language:
- Hokkien, Cantonese, Teochew and Hakka romanizations (Southern Chinese, e.g. 'Wong', 'Tan', 'Ng') use "english".
- Pinyin names (Mandarin Chinese) use "mandarin".
- If has_english_name is true, use "english".
- Malay names (bin/binti) use "malay", not "arabic".

Be concise. Focus on practical pronunciation help and avoiding cultural missteps."#
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_object_from_prose() {
        let text = "Sure! Here you go:\n```json\n{\"confidence\": \"high\", \"detected_origin\": \"Korean\"}\n```\nHope that helps {really}.";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value, json!({"confidence": "high", "detected_origin": "Korean"}));
    }

    #[test]
    fn test_extract_skips_malformed_braces() {
        let text = "{not json} then {\"a\": {\"b\": 1}} and {\"c\": 2}";
        assert_eq!(extract_json_object(text).unwrap(), json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_extract_none() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{ broken").is_none());
        assert!(extract_json_object("").is_none());
    }

    #[test]
    fn test_parse_analysis_without_json_is_format_error() {
        let err = parse_analysis("Li Na", "I cannot help with that.", &Value::Null).unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamFormat(_)));
    }

    #[test]
    fn test_parse_analysis_southern_chinese() {
        let text = r#"{
            "confidence": "high",
            "detected_origin": "Southern Chinese",
            "sounds_like": "WONG chee HAHN",
            "native_script": "黄启汉",
            "has_english_name": false,
            "given_name": "Qi Han",
            "family_name": "Wong",
            "warnings": [],
            "cultural_note": "Family name comes first.",
            "tts_language": "english"
        }"#;
        let result = parse_analysis("Wong Qi Han", text, &json!({})).unwrap();
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.detected_origin.as_deref(), Some("Southern Chinese"));
        assert_eq!(result.tts_language, "english");
        assert!(!result.has_english_name);
        assert_eq!(result.native_script.as_deref(), Some("黄启汉"));
        assert_eq!(result.family_name.as_deref(), Some("Wong"));
        assert_eq!(result.components.given_name.as_deref(), Some("Qi Han"));
    }

    #[test]
    fn test_legacy_layout_is_normalized() {
        let raw: UpstreamAnalysis = serde_json::from_value(json!({
            "confidence": "medium",
            "pronunciation": "JEAN-pee-AIR",
            "components": {"given_name": "Jean-Pierre", "family_name": "Dubois"},
            "location": "France",
            "formality_warning": "Use Monsieur until invited otherwise",
            "cultural_note": "Hyphenated given names are common."
        }))
        .unwrap();
        let result = normalize("Jean-Pierre Dubois", raw, &Value::Null);
        assert_eq!(result.confidence, Confidence::Medium);
        assert_eq!(result.sounds_like, "JEAN-pee-AIR");
        assert_eq!(result.given_name.as_deref(), Some("Jean-Pierre"));
        assert_eq!(result.family_name.as_deref(), Some("Dubois"));
        assert_eq!(result.profile_location.as_deref(), Some("France"));
        assert_eq!(result.warnings, vec!["Use Monsieur until invited otherwise"]);
        assert_eq!(result.tts_language, DEFAULT_TTS_LANGUAGE);
    }

    #[test]
    fn test_warning_as_bare_string() {
        let raw: UpstreamAnalysis = serde_json::from_value(json!({
            "sounds_like": "AH-nah",
            "pronunciation": "ignored",
            "warnings": "Use family name with title"
        }))
        .unwrap();
        let result = normalize("Anna Nowak", raw, &Value::Null);
        assert_eq!(result.sounds_like, "AH-nah");
        assert_eq!(result.warnings, vec!["Use family name with title"]);
    }

    #[test]
    fn test_wrongly_typed_fields_do_not_discard_answer() {
        let text = r#"{
            "confidence": 0.9,
            "detected_origin": "Japanese",
            "sounds_like": "KEN-jee tah-NAH-kah",
            "has_english_name": "false",
            "given_name": ["Ken", "ji"],
            "family_name": {"romaji": "Tanaka"},
            "components": "n/a",
            "tts_language": "japanese"
        }"#;
        let result = parse_analysis("Kenji Tanaka", text, &Value::Null).unwrap();
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.detected_origin.as_deref(), Some("Japanese"));
        assert_eq!(result.sounds_like, "KEN-jee tah-NAH-kah");
        assert!(!result.has_english_name);
        assert_eq!(result.given_name.as_deref(), Some("Ken ji"));
        assert!(result.family_name.is_none());
        assert_eq!(result.tts_language, "japanese");
    }

    #[test]
    fn test_stringly_typed_english_name_flag() {
        let text = r#"{"has_english_name": " TRUE ", "tts_language": "korean"}"#;
        let result = parse_analysis("Justin Kim", text, &Value::Null).unwrap();
        assert!(result.has_english_name);
        assert_eq!(result.tts_language, "english");
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let result = normalize("Ana Santos", UpstreamAnalysis::default(), &Value::Null);
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.sounds_like, "Ana Santos");
        assert_eq!(result.tts_language, "english");
        assert!(!result.has_english_name);
        assert!(result.warnings.is_empty());
        assert!(result.detected_origin.is_none());
    }

    #[test]
    fn test_context_location_overrides_model_guess() {
        let raw = UpstreamAnalysis {
            location: Some("China".into()),
            ..Default::default()
        };
        let ctx = json!({"location": "Singapore", "headline": "Engineer"});
        let result = normalize("Tan Jia Hui", raw, &ctx);
        assert_eq!(result.profile_location.as_deref(), Some("Singapore"));
    }

    #[test]
    fn test_english_given_name_forces_english_voice() {
        let raw = UpstreamAnalysis {
            has_english_name: Some(true),
            tts_language: Some("korean".into()),
            ..Default::default()
        };
        let result = normalize("Justin Kim", raw, &Value::Null);
        assert_eq!(result.tts_language, "english");
    }

    #[test]
    fn test_render_context() {
        assert_eq!(render_context(&json!("")), None);
        assert_eq!(render_context(&json!("LinkedIn profile")).as_deref(), Some("LinkedIn profile"));
        let rendered = render_context(&json!({"location": "Seoul", "company": "", "extra": null})).unwrap();
        assert_eq!(rendered, "location: Seoul");
    }

    #[test]
    fn test_prompt_contains_name_and_context() {
        let prompt = build_prompt("Minh Hoang", &json!({"location": "Hanoi"}));
        assert!(prompt.contains("Name: Minh Hoang"));
        assert!(prompt.contains("location: Hanoi"));
        assert!(prompt.contains("\"tts_language\""));

        let prompt = build_prompt("Minh Hoang", &Value::Null);
        assert!(!prompt.contains("Context:"));
    }
}
