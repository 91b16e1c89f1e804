use chrono::{DateTime, Utc};
use mb_core::{PostMessage, StoreStats};

/// Room left for the title and link inside Telegram's 4096-char limit.
pub const MAX_BODY_CHARS: usize = 3500;

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn truncate_body(body: &str, max_chars: usize) -> String {
    let body = body.trim();
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", body[..idx].trim_end()),
        None => body.to_string(),
    }
}

/// HTML post: bold title, body, then a link line naming the source.
pub fn post_html(message: &PostMessage) -> String {
    let source = message
        .source
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("источнике");
    format!(
        "<b>{}</b>\n\n{}\n\n🔗 <a href=\"{}\">Читать полностью в {}</a>",
        escape_html(message.title.trim()),
        escape_html(&truncate_body(&message.body, MAX_BODY_CHARS)),
        escape_html(&message.link),
        escape_html(source),
    )
}

pub fn stats_html(stats: &StoreStats, at: DateTime<Utc>) -> String {
    format!(
        "📊 <b>Статистика за сегодня</b>\n\n\
📰 Всего статей: {}\n\
🤖 Проанализировано: {}\n\
⭐ Интересных статей: {}\n\
📤 Опубликовано постов: {}\n\n\
🕐 Время: {}",
        stats.total,
        stats.analyzed,
        stats.interesting,
        stats.published,
        at.format("%Y-%m-%d %H:%M UTC"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(body: &str) -> PostMessage {
        PostMessage {
            title: "Милей & Конгресс".to_string(),
            body: body.to_string(),
            link: "https://www.clarin.com/politica/nota?a=1&b=2".to_string(),
            source: Some("Clarín".to_string()),
        }
    }

    #[test]
    fn test_post_html_escapes_and_links() {
        let html = post_html(&message("Текст <важный>"));
        assert!(html.starts_with("<b>Милей &amp; Конгресс</b>\n\n"));
        assert!(html.contains("Текст &lt;важный&gt;"));
        assert!(html.contains("href=\"https://www.clarin.com/politica/nota?a=1&amp;b=2\""));
        assert!(html.ends_with("Читать полностью в Clarín</a>"));
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "ж".repeat(MAX_BODY_CHARS + 100);
        let html = post_html(&message(&body));
        let expected = format!("{}...", "ж".repeat(MAX_BODY_CHARS));
        assert!(html.contains(&expected));
        assert!(!html.contains(&"ж".repeat(MAX_BODY_CHARS + 1)));
    }

    #[test]
    fn test_stats_html() {
        let stats = StoreStats { total: 12, extracted: 10, analyzed: 9, interesting: 4, published: 2 };
        let html = stats_html(&stats, Utc::now());
        assert!(html.contains("Всего статей: 12"));
        assert!(html.contains("Интересных статей: 4"));
        assert!(html.contains("Опубликовано постов: 2"));
    }
}
