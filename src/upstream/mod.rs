//! Clients for the two external services the gateway fronts.

pub mod gemini;
pub mod speech;

pub use gemini::GeminiClient;
pub use speech::SpeechClient;
