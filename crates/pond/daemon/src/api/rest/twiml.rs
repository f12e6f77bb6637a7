//! Minimal TwiML rendering for webhook replies

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// A `<Response>` with one `<Message>`, or an empty one when there is
/// nothing to say.
pub fn render(message: Option<&str>) -> String {
    match message {
        Some(text) => format!(
            "{XML_DECLARATION}<Response><Message>{}</Message></Response>",
            escape(text)
        ),
        None => format!("{XML_DECLARATION}<Response/>"),
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
