use async_trait::async_trait;
use mb_core::{AnalysisRequest, Analyzer, Error, Result, Verdict};
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{parse_verdict, ChatMessage, ChatRequest, ChatResponse, ResponseFormat};
use crate::prompt::{article_prompt, truncate_chars, SYSTEM_PROMPT};
use crate::{Config, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};

/// Chat-completions analyzer. Any OpenAI-compatible endpoint works through
/// `Config::base_url`.
pub struct OpenAiAnalyzer {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_input_chars: usize,
}

impl OpenAiAnalyzer {
    pub fn new(config: Config) -> Result<Self> {
        let api_key = config
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is required for the openai analyzer".to_string()))?;
        Ok(Self {
            client: Arc::new(Client::new()),
            api_key,
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model_name.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_input_chars: config.max_input_chars,
        })
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Arc::new(client);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_for(&self, request: &AnalysisRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: article_prompt(request, self.max_input_chars),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        }
    }
}

impl fmt::Debug for OpenAiAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiAnalyzer")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(url = %request.url, model = %self.model))]
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Verdict> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_for(request))
            .send()
            .await
            .map_err(|e| Error::AnalysisFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AnalysisFailed(format!(
                "model endpoint returned {}: {}",
                status,
                truncate_chars(&body, 200)
            )));
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::AnalysisFailed(format!("unreadable completion: {}", e)))?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::AnalysisFailed("completion has no content".to_string()))?;

        debug!(chars = content.len(), "Model replied");
        parse_verdict(&content)
    }
}
