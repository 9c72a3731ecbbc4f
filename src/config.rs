use clap::Parser;
use std::time::Duration;

use crate::rate_limit::MAX_WINDOW_SECS;

// CLI argument structure, secrets fall back to env vars
#[derive(Parser, Debug, Clone)]
#[command(name = "namewise-gateway")]
#[command(about = "Name pronunciation gateway: analysis and speech for the NameWise clients")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.0-flash")]
    pub gemini_model: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = "https://generativelanguage.googleapis.com")]
    pub gemini_base_url: String,

    // Google Cloud Text-to-Speech API key
    #[arg(long, env = "GOOGLE_TTS_API_KEY", hide_env_values = true)]
    pub tts_api_key: Option<String>,

    #[arg(long, env = "TTS_BASE_URL", default_value = "https://texttospeech.googleapis.com")]
    pub tts_base_url: String,

    // Analytics sink (Supabase project url + anon key)
    #[arg(long, env = "SUPABASE_URL")]
    pub analytics_url: Option<String>,

    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub analytics_key: Option<String>,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 15)]
    pub rate_limit: u32,

    // Rate limit window in seconds, at most one year
    #[arg(
        long,
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..=MAX_WINDOW_SECS)
    )]
    pub rate_window: u64,

    // How often expired rate limit entries are swept, in seconds
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    pub sweep_interval: u64,

    // Number of proxies in front of the gateway that append to X-Forwarded-For.
    // 0 ignores the header and keys clients by peer address.
    #[arg(long, env = "TRUSTED_PROXY_HOPS", default_value_t = 1)]
    pub trusted_proxy_hops: usize,

    // Deadline for a speech synthesis call, in seconds
    #[arg(long, default_value_t = 25)]
    pub tts_timeout: u64,

    // Deadline for an inference call, in seconds
    #[arg(long, default_value_t = 30)]
    pub inference_timeout: u64,

    // Deadline for an analytics insert, in seconds
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub analytics_timeout: u64,

    // Allowed browser origins (comma-separated). Empty admits every origin.
    // chrome-extension:// origins are always admitted.
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "")]
    pub allowed_origins: String,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    pub fn tts_timeout(&self) -> Duration {
        Duration::from_secs(self.tts_timeout)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout)
    }

    pub fn analytics_timeout(&self) -> Duration {
        Duration::from_secs(self.analytics_timeout)
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        parse_origins(&self.allowed_origins)
    }
}

// "https://a.example, http://localhost:3000" -> ["https://a.example", "http://localhost:3000"]
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}
