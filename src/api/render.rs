//! HTML rendering for the question form and model answers.

use pulldown_cmark::{html, Event, Options, Parser};
use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::models::Answer;

const PAGE_TEMPLATE: &str = include_str!("../../static/index.html");

/// Heuristic for answers that are SQL or fenced code rather than prose.
pub fn looks_like_code(text: &str) -> bool {
    let t = text.trim();
    t.contains("```")
        || t.starts_with("/*")
        || t.get(..7)
            .is_some_and(|head| head.eq_ignore_ascii_case("CREATE "))
        || t.contains("DEFAULT_DATA_VALUE")
}

/// Render a model answer to an HTML fragment.
///
/// Code-like answers lose their fence markers and become an escaped
/// `<pre><code>` block; everything else is rendered as Markdown. Raw HTML
/// emitted by the model is escaped, never passed through.
pub fn render_answer(text: &str) -> String {
    if looks_like_code(text) {
        let cleaned = text.replace("```sql", "").replace("```", "");
        return format!(
            "<pre><code>{}</code></pre>",
            html_escape::encode_text(cleaned.trim())
        );
    }

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(text, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(text.len() * 2);
    html::push_html(&mut out, parser);
    out
}

/// What the page shows below the form.
#[derive(Debug, Default)]
pub struct PageView<'a> {
    pub query: &'a str,
    pub answer: Option<&'a Answer>,
    pub error: Option<&'a str>,
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("static regex is valid"))
}

/// Fill the page template in a single pass, so user text that happens to
/// contain `{{...}}` is never expanded.
pub fn render_page(view: &PageView<'_>) -> String {
    placeholder()
        .replace_all(PAGE_TEMPLATE, |caps: &Captures<'_>| match &caps[1] {
            "query" => html_escape::encode_text(view.query).into_owned(),
            "result" => view
                .answer
                .map(|a| format!("<section class=\"answer\">{}</section>", render_answer(&a.text)))
                .unwrap_or_default(),
            "sources" => view.answer.map(render_sources).unwrap_or_default(),
            "error" => view
                .error
                .map(|e| format!("<p class=\"error\">{}</p>", html_escape::encode_text(e)))
                .unwrap_or_default(),
            _ => String::new(),
        })
        .into_owned()
}

fn render_sources(answer: &Answer) -> String {
    if answer.sources.is_empty() {
        return String::new();
    }
    let items: String = answer
        .sources
        .iter()
        .map(|s| format!("<li>{}</li>", html_escape::encode_text(s)))
        .collect();
    format!("<div class=\"sources\"><h2>Sources</h2><ul>{items}</ul></div>")
}
