pub mod extract;
pub mod feed;

pub use extract::HtmlExtractor;
pub use feed::{default_queries, newsdata::NewsDataFeed};

/// Common HTML helpers for the extractor
pub(crate) mod utils {
    use mb_core::{Error, Result};
    use scraper::{ElementRef, Html, Selector};

    pub fn selector(css: &str) -> Result<Selector> {
        Selector::parse(css).map_err(|e| Error::ExtractFailed(format!("Invalid selector {}: {}", css, e)))
    }

    pub fn element_text(el: ElementRef<'_>) -> String {
        el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn first_text(document: &Html, css: &str) -> Result<Option<String>> {
        let selector = selector(css)?;
        Ok(document
            .select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty()))
    }

    pub fn texts(document: &Html, css: &str) -> Result<Vec<String>> {
        let selector = selector(css)?;
        Ok(document
            .select(&selector)
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect())
    }

    /// `content` attribute of the first matching `<meta>`.
    pub fn meta_content(document: &Html, css: &str) -> Result<Option<String>> {
        let selector = selector(css)?;
        Ok(document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(|content| content.trim().to_string())
            .find(|content| !content.is_empty()))
    }

}
