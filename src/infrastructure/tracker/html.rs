use scraper::Html;

/// Text content of a rich-text tracker field, markup dropped.
pub fn html_to_text(raw_html: &str) -> String {
    if raw_html.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(raw_html);
    fragment
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string()
}
