//! Markdown → HTML, heading slugs, and full-document assembly.
//!
//! `pulldown-cmark` does the parsing. The only thing added on top is heading
//! ids: every heading without an explicit `{#id}` receives a slug built by
//! [`slugify`], which keeps CJK text readable and collapses numbered
//! prefixes (`4.1 商务管理` → `41-商务管理`) the way the report templates
//! write their table-of-contents links.

use once_cell::sync::Lazy;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};
use regex::Regex;
use std::collections::HashSet;

use super::classify::DocumentType;

/// Separator used inside generated slugs.
pub const SLUG_SEPARATOR: char = '-';

static RE_NUMBERED_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\.(\d+)\s+").unwrap());
static RE_NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\x{4e00}-\x{9fff}\-]+").unwrap());
static RE_REPEATED_SEP: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// Build a link-safe slug from heading text.
///
/// Rules, in order: trim; `<major>.<minor><space>` becomes
/// `<major><minor>-`; every run of characters that are not word characters,
/// CJK ideographs or `-` becomes `-`; repeated separators collapse; leading
/// and trailing separators are removed. The result is lowercased only when
/// it is pure ASCII.
pub fn slugify(text: &str) -> String {
    let value = text.trim();
    let value = RE_NUMBERED_PREFIX.replace_all(value, "${1}${2}-");
    let value = RE_NON_SLUG.replace_all(&value, "-");
    let value = RE_REPEATED_SEP.replace_all(&value, "-");
    let value = value.trim_matches(SLUG_SEPARATOR);
    if value.is_ascii() {
        value.to_ascii_lowercase()
    } else {
        value.to_string()
    }
}

/// Make `slug` unique among `used` by appending `_1`, `_2`, …
fn unique_slug(slug: String, used: &mut HashSet<String>) -> String {
    let mut candidate = slug.clone();
    let mut n = 1;
    while used.contains(&candidate) {
        candidate = format!("{slug}_{n}");
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

/// Convert a Markdown body to an HTML fragment with slug ids on headings.
pub fn markdown_to_html(markdown: &str) -> String {
    let events: Vec<Event<'_>> = Parser::new_ext(markdown, parser_options()).collect();
    let mut used_ids: HashSet<String> = HashSet::new();

    // Explicit ids are reserved first so generated slugs never collide.
    for event in &events {
        if let Event::Start(Tag::Heading(_, Some(id), _)) = event {
            used_ids.insert((*id).to_string());
        }
    }

    let mut out_events: Vec<Event<'_>> = Vec::with_capacity(events.len());
    let mut iter = events.into_iter();

    while let Some(event) = iter.next() {
        let Event::Start(Tag::Heading(level, explicit_id, classes)) = event else {
            out_events.push(event);
            continue;
        };

        let mut inner: Vec<Event<'_>> = Vec::new();
        for e in iter.by_ref() {
            if matches!(e, Event::End(Tag::Heading(..))) {
                break;
            }
            inner.push(e);
        }

        let text = plain_text(&inner);
        let id = match explicit_id {
            Some(id) => Some(id.to_string()),
            None => {
                let slug = slugify(&text);
                (!slug.is_empty()).then(|| unique_slug(slug, &mut used_ids))
            }
        };

        let mut inner_html = String::new();
        html::push_html(&mut inner_html, inner.into_iter());

        let n = level as usize;
        let mut open = format!("<h{n}");
        if let Some(id) = id {
            open.push_str(&format!(" id=\"{}\"", escape_attr(&id)));
        }
        if !classes.is_empty() {
            open.push_str(&format!(" class=\"{}\"", escape_attr(&classes.join(" "))));
        }
        out_events.push(Event::Html(CowStr::from(format!(
            "{open}>{inner_html}</h{n}>\n"
        ))));
    }

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, out_events.into_iter());
    out
}

/// Concatenate the textual content of inline events.
fn plain_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for e in events {
        match e {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text
}

/// Inputs for the standalone HTML document handed to the renderer.
pub struct DocumentParts<'a> {
    pub title: &'a str,
    pub body_html: &'a str,
    pub theme_css: &'a str,
    pub print_css: &'a str,
    pub doc_type: DocumentType,
    /// Base URL for relative links and images, normally the source's directory.
    pub base_href: Option<&'a str>,
}

/// Wrap an HTML fragment in a complete document with theme and print CSS.
pub fn build_document(parts: &DocumentParts<'_>) -> String {
    format!(
        "<!DOCTYPE html>\n\
<html lang=\"zh-CN\">\n\
<head>\n\
<meta charset=\"UTF-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
{base}<title>{title}</title>\n\
<style>\n{theme}\n</style>\n\
<style>\n{print}\n</style>\n\
</head>\n\
<body class=\"doc-{doc_type}\">\n\
{body}\n\
</body>\n\
</html>\n",
        base = parts
            .base_href
            .map(|h| format!("<base href=\"{}\">\n", escape_attr(h)))
            .unwrap_or_default(),
        title = escape_text(parts.title),
        theme = parts.theme_css,
        print = parts.print_css,
        doc_type = parts.doc_type.tag(),
        body = parts.body_html,
    )
}

// ── Escaping helpers shared by the markup passes ─────────────────────────────

pub(crate) fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

/// Decode the handful of entities pulldown-cmark emits.
pub(crate) fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}
