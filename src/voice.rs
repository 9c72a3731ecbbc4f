use crate::analysis::DEFAULT_TTS_LANGUAGE;

/// A Cloud Text-to-Speech voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voice {
    pub language_code: &'static str,
    pub name: &'static str,
}

pub const DEFAULT_VOICE: Voice = Voice {
    language_code: "en-US",
    name: "en-US-Wavenet-D",
};

// Checked in order: the first keyword found in the language source wins,
// so "chinese" must stay ahead of "cantonese".
const VOICES: &[(&str, Voice)] = &[
    ("chinese", Voice { language_code: "cmn-CN", name: "cmn-CN-Wavenet-A" }),
    ("mandarin", Voice { language_code: "cmn-CN", name: "cmn-CN-Wavenet-A" }),
    ("cantonese", Voice { language_code: "yue-HK", name: "yue-HK-Standard-A" }),
    ("japanese", Voice { language_code: "ja-JP", name: "ja-JP-Wavenet-A" }),
    ("korean", Voice { language_code: "ko-KR", name: "ko-KR-Wavenet-A" }),
    ("vietnamese", Voice { language_code: "vi-VN", name: "vi-VN-Wavenet-A" }),
    ("thai", Voice { language_code: "th-TH", name: "th-TH-Standard-A" }),
    ("hindi", Voice { language_code: "hi-IN", name: "hi-IN-Wavenet-A" }),
    ("tamil", Voice { language_code: "ta-IN", name: "ta-IN-Wavenet-A" }),
    ("arabic", Voice { language_code: "ar-XA", name: "ar-XA-Wavenet-A" }),
    ("russian", Voice { language_code: "ru-RU", name: "ru-RU-Wavenet-A" }),
    ("spanish", Voice { language_code: "es-ES", name: "es-ES-Wavenet-B" }),
    ("french", Voice { language_code: "fr-FR", name: "fr-FR-Wavenet-A" }),
    ("german", Voice { language_code: "de-DE", name: "de-DE-Wavenet-A" }),
    ("italian", Voice { language_code: "it-IT", name: "it-IT-Wavenet-A" }),
    ("portuguese", Voice { language_code: "pt-BR", name: "pt-BR-Wavenet-A" }),
    ("dutch", Voice { language_code: "nl-NL", name: "nl-NL-Wavenet-A" }),
    ("polish", Voice { language_code: "pl-PL", name: "pl-PL-Wavenet-A" }),
    ("turkish", Voice { language_code: "tr-TR", name: "tr-TR-Wavenet-A" }),
    ("indonesian", Voice { language_code: "id-ID", name: "id-ID-Wavenet-A" }),
    ("malay", Voice { language_code: "ms-MY", name: "ms-MY-Wavenet-A" }),
    ("filipino", Voice { language_code: "fil-PH", name: "fil-PH-Wavenet-A" }),
    ("greek", Voice { language_code: "el-GR", name: "el-GR-Wavenet-A" }),
    ("hebrew", Voice { language_code: "he-IL", name: "he-IL-Wavenet-A" }),
    ("swedish", Voice { language_code: "sv-SE", name: "sv-SE-Wavenet-A" }),
    ("norwegian", Voice { language_code: "nb-NO", name: "nb-NO-Wavenet-A" }),
    ("danish", Voice { language_code: "da-DK", name: "da-DK-Wavenet-A" }),
    ("finnish", Voice { language_code: "fi-FI", name: "fi-FI-Wavenet-A" }),
];

impl Voice {
    pub fn is_default(&self) -> bool {
        self.language_code == DEFAULT_VOICE.language_code
    }
}

/// Voice for a free-form language description ("Southern Chinese", "korean", ...).
pub fn detect_voice(source: &str) -> Voice {
    let source = source.to_lowercase();
    VOICES
        .iter()
        .find(|(keyword, _)| source.contains(keyword))
        .map(|(_, voice)| *voice)
        .unwrap_or(DEFAULT_VOICE)
}

/// Explicit tts language, then detected origin, then English.
pub fn choose_voice(tts_language: Option<&str>, detected_origin: Option<&str>) -> Voice {
    let source = [tts_language, detected_origin]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_TTS_LANGUAGE);
    detect_voice(source)
}

/// Text handed to the synthesizer for `voice`.
pub fn text_to_speak(name: &str, native_script: Option<&str>, voice: &Voice) -> String {
    match native_script.map(str::trim) {
        Some(script) if !script.is_empty() && !voice.is_default() => script.to_string(),
        _ => strip_annotations(name),
    }
}

// "Andy Lim (林志明)" -> "Andy Lim"
pub fn strip_annotations(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(open) = rest.find('(') {
        match rest[open..].find(')') {
            Some(close) => {
                out.push_str(rest[..open].trim_end());
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}
