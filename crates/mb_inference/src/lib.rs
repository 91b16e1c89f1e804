use std::fmt;

pub mod models;
pub mod prompt;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model_name: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Article body is cut to this many characters before prompting.
    pub max_input_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model_name: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: 2000,
            max_input_chars: 8000,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_input_chars", &self.max_input_chars)
            .finish()
    }
}

pub mod prelude {
    pub use super::models::{create_analyzer, dummy::DummyAnalyzer, openai::OpenAiAnalyzer, parse_verdict};
    pub use super::Config;
    pub use mb_core::{Analyzer, Error, Result, Verdict};
}

pub use models::create_analyzer;
