//! Anchor resolution: make every intra-document link land somewhere.
//!
//! Report authors write table-of-contents links by hand, and the ids they
//! guess rarely match the slugs the markup stage generates. Each distinct
//! `href="#…"` target that is missing from the document is matched against
//! the rendered headings with an ordered list of strategies; the first
//! strategy that finds a heading wins and the target id is attached to it.
//!
//! ## Strategies
//!
//! 1. Direct: an element already carries the id. Nothing to do.
//! 2. Numeric reconstruction: `41-商务管理` was most likely slugged from
//!    `4.1 商务管理`; rebuild the plausible spellings and look for a heading
//!    whose text equals or starts with one of them, h1 through h6.
//! 3. Fuzzy: drop `-`, `_`, `.` and whitespace from both sides and accept
//!    the first heading (document order) where one contains the other.
//!
//! Running the resolver twice produces the same markup as running it once.
//!
//! ## Scanning
//!
//! Markup is scanned with regular expressions rather than parsed into a tree.
//! Attribute values may be single- or double-quoted and may contain `>`.
//! Headings nested inside headings, and tags inside HTML comments or
//! `<script>` blocks, are not special-cased.

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

use super::markup::{escape_attr, unescape};

/// A heading element found in rendered markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingRecord {
    /// 1 through 6.
    pub level: u8,
    pub id: Option<String>,
    /// Text content with tags stripped and entities decoded.
    pub text: String,
    /// Attribute text of the opening tag, leading whitespace included.
    pub attrs: String,
    /// Byte range of the opening tag.
    pub open_start: usize,
    pub open_end: usize,
}

/// An internal link found in rendered markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorLink {
    /// Decoded fragment (no leading `#`).
    pub target: String,
    /// Byte range of the `<a …>` opening tag.
    pub start: usize,
    pub end: usize,
}

// Attribute text may contain `>` inside quoted values.
static RE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<h([1-6])((?:\s(?:[^>"']|"[^"]*"|'[^']*')*)?)>(.*?)</h[1-6]>"#).unwrap()
});
static RE_ID_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\sid=(?:"([^"]*)"|'([^']*)')"#).unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r##"<a\s(?:[^>"']|"[^"]*"|'[^']*')*?href=(?:"#([^"]*)"|'#([^']*)')(?:[^>"']|"[^"]*"|'[^']*')*>"##)
        .unwrap()
});
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static RE_NUMERIC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d)(\d+)-(.+)$").unwrap());

/// All headings in document order.
pub fn collect_headings(html: &str) -> Vec<HeadingRecord> {
    RE_HEADING
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let attrs = caps.get(2).map_or("", |m| m.as_str());
            let inner = caps.get(3).map_or("", |m| m.as_str());
            Some(HeadingRecord {
                level: caps[1].parse().ok()?,
                id: RE_ID_ATTR.captures(attrs).map(|c| unescape(quoted_value(&c))),
                text: plain_text(inner),
                attrs: attrs.to_string(),
                open_start: whole.start(),
                open_end: whole.start() + 3 + attrs.len() + 1,
            })
        })
        .collect()
}

/// Internal links in document order, one per occurrence.
pub fn collect_links(html: &str) -> Vec<AnchorLink> {
    RE_LINK
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let target = decode_fragment(quoted_value(&caps));
            (!target.is_empty()).then(|| AnchorLink {
                target,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Every `id` attribute value in the markup.
pub fn collect_ids(html: &str) -> HashSet<String> {
    RE_ID_ATTR
        .captures_iter(html)
        .map(|c| unescape(quoted_value(&c)))
        .collect()
}

/// The double- or single-quoted alternative, whichever matched.
fn quoted_value<'h>(caps: &regex::Captures<'h>) -> &'h str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str())
}

fn decode_fragment(raw: &str) -> String {
    let unescaped = unescape(raw);
    percent_decode_str(&unescaped)
        .decode_utf8_lossy()
        .into_owned()
}

pub(crate) fn plain_text(inner_html: &str) -> String {
    unescape(&RE_TAG.replace_all(inner_html, "")).trim().to_string()
}

// ── Strategies ───────────────────────────────────────────────────────────────

/// A lookup that maps a missing target to a heading index.
type MatchStrategy = fn(&str, &[HeadingRecord]) -> Option<usize>;

const STRATEGIES: &[(&str, MatchStrategy)] = &[
    ("numeric", numeric_reconstruction),
    ("fuzzy", fuzzy_match),
];

/// `41-商务管理` → headings reading `4.1 商务管理`, `4.1商务管理` or
/// `4.1  商务管理` (exact or as a prefix), searched one level at a time.
pub fn numeric_reconstruction(target: &str, headings: &[HeadingRecord]) -> Option<usize> {
    let caps = RE_NUMERIC_ID.captures(target)?;
    let (major, minor, text) = (&caps[1], &caps[2], &caps[3]);
    let candidates = [
        format!("{major}.{minor} {text}"),
        format!("{major}.{minor}{text}"),
        format!("{major}.{minor}  {text}"),
    ];

    (1..=6u8).find_map(|level| {
        headings.iter().position(|h| {
            h.level == level
                && candidates
                    .iter()
                    .any(|c| h.text == *c || h.text.starts_with(c.as_str()))
        })
    })
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '-' | '_' | '.') && !c.is_whitespace())
        .collect()
}

/// Separator-insensitive containment in either direction.
pub fn fuzzy_match(target: &str, headings: &[HeadingRecord]) -> Option<usize> {
    let wanted = normalize(target);
    if wanted.is_empty() {
        return None;
    }
    headings.iter().position(|h| {
        let have = normalize(&h.text);
        !have.is_empty() && (have.contains(&wanted) || wanted.contains(&have))
    })
}

/// Run the non-direct strategies in order.
pub fn find_heading(target: &str, headings: &[HeadingRecord]) -> Option<usize> {
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let found = strategy(target, headings);
        if let Some(i) = found {
            debug!("Anchor '#{}' matched heading '{}' ({})", target, headings[i].text, name);
        }
        found
    })
}

// ── Resolution ───────────────────────────────────────────────────────────────

/// Attach `target` to `heading`: as its `id` when it has none, otherwise as
/// an empty `<a id>` marker placed first inside the heading.
fn attach_id(html: &str, heading: &HeadingRecord, target: &str) -> String {
    let id = escape_attr(target);
    let mut out = String::with_capacity(html.len() + id.len() + 16);
    match heading.id {
        None => {
            out.push_str(&html[..heading.open_start]);
            out.push_str(&format!("<h{} id=\"{}\"{}>", heading.level, id, heading.attrs));
            out.push_str(&html[heading.open_end..]);
        }
        Some(_) => {
            out.push_str(&html[..heading.open_end]);
            out.push_str(&format!("<a id=\"{id}\"></a>"));
            out.push_str(&html[heading.open_end..]);
        }
    }
    out
}

/// Ensure every internal link target exists in `html`.
///
/// Targets nothing can be matched to are left as they are.
pub fn resolve_anchors(html: &str) -> String {
    let mut seen = HashSet::new();
    let targets: Vec<String> = collect_links(html)
        .into_iter()
        .map(|l| l.target)
        .filter(|t| seen.insert(t.clone()))
        .collect();

    let mut out = html.to_string();
    let mut ids = collect_ids(&out);

    for target in targets {
        if ids.contains(&target) {
            continue;
        }
        let headings = collect_headings(&out);
        match find_heading(&target, &headings) {
            Some(i) => {
                out = attach_id(&out, &headings[i], &target);
                ids.insert(target);
            }
            None => debug!("Anchor '#{}' has no matching heading", target),
        }
    }

    out
}
