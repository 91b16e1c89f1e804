use mb_core::FeedQuery;

pub mod newsdata;

/// Outlets the "priority" query is restricted to.
pub const PRIORITY_DOMAINS: &[&str] = &[
    "infobae.com",
    "clarin.com",
    "batimes.com.ar",
    "lanacion.com.ar",
    "pagina12.com.ar",
];

const CATEGORIES: &[&str] = &["business", "politics", "lifestyle", "technology", "entertainment"];
const LANGUAGES: &[&str] = &["en", "es"];

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// The two query variants every fetch runs: major outlets on core topics,
/// then any Argentine source on the remaining topics.
pub fn default_queries(size: usize) -> Vec<FeedQuery> {
    vec![
        FeedQuery {
            name: "priority".to_string(),
            country: Some("ar".to_string()),
            languages: owned(LANGUAGES),
            categories: owned(CATEGORIES),
            query: Some("milei OR politica OR futbol OR economia OR sociedad".to_string()),
            domains: owned(PRIORITY_DOMAINS),
            size,
            page: None,
        },
        FeedQuery {
            name: "general".to_string(),
            country: Some("ar".to_string()),
            languages: owned(LANGUAGES),
            categories: owned(CATEGORIES),
            query: Some("deportes OR salud OR tecnologia OR cultura OR internacional".to_string()),
            domains: Vec::new(),
            size,
            page: None,
        },
    ]
}
