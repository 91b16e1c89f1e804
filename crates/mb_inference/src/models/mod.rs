use mb_core::{Analyzer, Error, Result, Verdict, MAX_SCORE, MIN_SCORE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Config;

pub mod dummy;
pub mod openai;

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Message {
    pub content: Option<String>,
}

/// Models have been seen answering with either `"category": "x"` or
/// `"category": {"category": "x"}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoryField {
    Name(String),
    Nested { category: String },
}

impl CategoryField {
    fn into_name(self) -> String {
        match self {
            CategoryField::Name(name) | CategoryField::Nested { category: name } => name.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScoreField {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ScoreField {
    fn into_score(self) -> Result<u8> {
        let value = match self {
            ScoreField::Int(v) => v,
            ScoreField::Float(v) if v.fract() == 0.0 => v as i64,
            ScoreField::Float(v) => return Err(Error::AnalysisFailed(format!("non-integer score {}", v))),
            ScoreField::Text(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::AnalysisFailed(format!("unparseable score '{}'", raw)))?,
        };
        if value < MIN_SCORE as i64 || value > MAX_SCORE as i64 {
            return Err(Error::AnalysisFailed(format!(
                "score {} outside {}..={}",
                value, MIN_SCORE, MAX_SCORE
            )));
        }
        Ok(value as u8)
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    category: CategoryField,
    score: ScoreField,
    #[serde(alias = "should_publish", alias = "shouldPost", alias = "shouldPublish")]
    should_post: bool,
    #[serde(default, alias = "postTitle")]
    post_title: Option<String>,
    #[serde(default, alias = "post_body", alias = "postContent")]
    post_content: Option<String>,
    #[serde(default)]
    translation: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Parses a model reply into a validated [`Verdict`]. Tolerates markdown
/// code fences and prose around the JSON object.
pub fn parse_verdict(content: &str) -> Result<Verdict> {
    let json = extract_json_object(content)
        .ok_or_else(|| Error::AnalysisFailed("model reply contains no JSON object".to_string()))?;
    let raw: RawVerdict = serde_json::from_str(json)
        .map_err(|e| Error::AnalysisFailed(format!("malformed model JSON: {}", e)))?;

    Verdict {
        category: raw.category.into_name(),
        score: raw.score.into_score()?,
        should_publish: raw.should_post,
        post_title: raw.post_title.unwrap_or_default(),
        post_body: raw.post_content.unwrap_or_default(),
        translation: raw.translation.unwrap_or_default(),
        reason: raw.reason.unwrap_or_default(),
    }
    .validate()
}

fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Builds the analyzer named on the command line.
pub fn create_analyzer(name: &str, config: Config) -> Result<Arc<dyn Analyzer>> {
    match name.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(openai::OpenAiAnalyzer::new(config)?)),
        "dummy" => Ok(Arc::new(dummy::DummyAnalyzer::new())),
        other => Err(Error::Config(format!(
            "unknown analyzer '{}', expected 'openai' or 'dummy'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_verdict() {
        let verdict = parse_verdict(
            r#"{"category":"economy","score":8,"should_post":true,"post_title":"Инфляция","post_content":"Текст","translation":"Перевод","reason":"важно"}"#,
        )
        .unwrap();
        assert_eq!(verdict.category, "economy");
        assert_eq!(verdict.score, 8);
        assert!(verdict.should_publish);
        assert_eq!(verdict.post_title, "Инфляция");
        assert_eq!(verdict.post_body, "Текст");
    }

    #[test]
    fn test_parse_fenced_and_nested_category() {
        let reply = "Here you go:\n```json\n{\"category\": {\"category\": \" politics \"}, \"score\": \"6\", \"shouldPublish\": false}\n```";
        let verdict = parse_verdict(reply).unwrap();
        assert_eq!(verdict.category, "politics");
        assert_eq!(verdict.score, 6);
        assert!(!verdict.should_publish);
        assert_eq!(verdict.post_body, "");
    }

    #[test]
    fn test_out_of_range_score_is_failure() {
        let err = parse_verdict(r#"{"category":"sport","score":11,"should_post":true}"#).unwrap_err();
        assert!(matches!(err, Error::AnalysisFailed(_)));
        assert!(parse_verdict(r#"{"category":"sport","score":0,"should_post":true}"#).is_err());
        assert!(parse_verdict(r#"{"category":"sport","score":7.5,"should_post":true}"#).is_err());
    }

    #[test]
    fn test_malformed_replies_are_failures() {
        assert!(parse_verdict("I cannot help with that").is_err());
        assert!(parse_verdict(r#"{"category":"sport","score":5"#).is_err());
        assert!(parse_verdict(r#"{"score":5,"should_post":true}"#).is_err());
        assert!(parse_verdict(r#"{"category":"","score":5,"should_post":true}"#).is_err());
    }

    #[test]
    fn test_create_analyzer() {
        assert_eq!(create_analyzer("dummy", Config::default()).unwrap().name(), "dummy");
        assert!(matches!(create_analyzer("openai", Config::default()), Err(Error::Config(_))));
        assert!(create_analyzer("llama", Config::default()).is_err());
    }
}
