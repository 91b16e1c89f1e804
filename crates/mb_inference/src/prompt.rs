use mb_core::AnalysisRequest;

pub const SYSTEM_PROMPT: &str = "You are the editor of a Russian-language Telegram channel about \
Argentina. You read Argentine news and decide what is worth posting. Reply with a single JSON \
object and nothing else.";

/// User message for one article. The body is cut to `max_chars` characters.
pub fn article_prompt(request: &AnalysisRequest, max_chars: usize) -> String {
    let body = truncate_chars(&request.body, max_chars);
    format!(
        "Title: {title}\nURL: {url}\n\nContent:\n{body}\n\n\
Return JSON with these fields:\n\
- \"category\": short topic label (politics, economy, society, sport, culture, technology, other)\n\
- \"score\": integer 1-10, how interesting this is for Russian speakers living in Argentina\n\
- \"reason\": one sentence explaining the score\n\
- \"should_post\": true if the article deserves a post\n\
- \"post_title\": headline in Russian\n\
- \"post_content\": 2-4 sentence post in Russian\n\
- \"translation\": Russian translation of the article",
        title = request.title,
        url = request.url,
        body = body,
    )
}

pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
