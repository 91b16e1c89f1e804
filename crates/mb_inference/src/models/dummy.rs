use async_trait::async_trait;
use mb_core::{AnalysisRequest, Analyzer, Result, Verdict, MAX_SCORE, MIN_SCORE};
use std::fmt;

/// Keyword buckets: (category, keywords). First bucket with a hit wins.
const TOPICS: &[(&str, &[&str])] = &[
    ("politics", &["milei", "congreso", "senado", "gobierno", "elecciones", "diputados"]),
    ("economy", &["inflación", "inflacion", "dólar", "dolar", "banco central", "fmi", "economía", "economia"]),
    ("sport", &["fútbol", "futbol", "boca", "river", "selección", "messi"]),
    ("society", &["salud", "educación", "educacion", "seguridad", "sociedad"]),
    ("culture", &["cultura", "cine", "música", "musica", "libro", "teatro"]),
];

/// Deterministic offline analyzer. Scores by keyword hits so the pipeline
/// can run without a model endpoint.
pub struct DummyAnalyzer;

impl fmt::Debug for DummyAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyAnalyzer").finish()
    }
}

impl DummyAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Analyzer for DummyAnalyzer {
    fn name(&self) -> &str {
        "dummy"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<Verdict> {
        let haystack = format!("{} {}", request.title, request.body).to_lowercase();

        let mut category = "other";
        let mut hits = 0usize;
        for (topic, keywords) in TOPICS {
            let topic_hits = keywords.iter().filter(|k| haystack.contains(*k)).count();
            if topic_hits > 0 && category == "other" {
                category = *topic;
            }
            hits += topic_hits;
        }

        let score = (MIN_SCORE as usize + hits * 2).min(MAX_SCORE as usize) as u8;
        // Take first 40 words as the post body
        let body: Vec<&str> = request.body.split_whitespace().take(40).collect();

        Ok(Verdict {
            category: category.to_string(),
            score,
            should_publish: score >= 6,
            post_title: request.title.clone(),
            post_body: body.join(" "),
            translation: String::new(),
            reason: format!("{} keyword hit(s)", hits),
        })
    }
}
