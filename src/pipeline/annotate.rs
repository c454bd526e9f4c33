//! Semantic annotation: layout-intent classes for the print stylesheets.
//!
//! Themes key page breaks and block spacing off a small class vocabulary:
//! meeting sections, action items, decision points, the first three
//! top-level sections, and `content-block` wrappers around lists and tables
//! so they are not split across pages. Annotating twice changes nothing.
//!
//! Headings come from the same regex scanner as anchor resolution and share
//! its limits (see [`super::anchors`]). Existing `class` attributes are
//! extended only when double-quoted, which is what the markup stage emits.

use once_cell::sync::Lazy;
use regex::Regex;

use super::anchors::collect_headings;

const MEETING_KEYWORDS: &[&str] = &["会议", "议程", "讨论", "决定", "行动", "任务", "问题"];
const ACTION_KEYWORDS: &[&str] = &["行动项目", "任务分配", "决策要点"];
const DECISION_KEYWORDS: &[&str] = &["决定", "决策", "结论"];

/// Classes for the first three `h2` sections, by position or by id `1`-`3`.
const SECTION_CLASSES: [&str; 3] = [
    "first-page-section",
    "second-page-section",
    "module-reports-section",
];

const BLOCK_OPEN: &str = r#"<div class="content-block">"#;
const BLOCK_CLOSE: &str = "</div>";
const BLOCK_TAGS: &[&str] = &["ul", "ol", "table"];

static RE_CLASS_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\sclass="([^"]*)""#).unwrap());

/// Apply every annotation rule to an HTML fragment.
pub fn annotate(html: &str) -> String {
    let s = annotate_headings(html);
    wrap_content_blocks(&s)
}

/// Classes a heading should carry; `h2_index` is its 0-based position among
/// `h2` elements.
fn heading_classes(level: u8, id: Option<&str>, text: &str, h2_index: usize) -> Vec<&'static str> {
    let mut classes = Vec::new();
    match level {
        2 => {
            if MEETING_KEYWORDS.iter().any(|k| text.contains(k)) {
                classes.push("meeting-section");
            }
            let by_id = match id {
                Some("1") => Some(0),
                Some("2") => Some(1),
                Some("3") => Some(2),
                _ => None,
            };
            let slot = match (by_id, h2_index) {
                (Some(0), _) | (_, 0) => Some(0),
                (Some(1), _) | (_, 1) => Some(1),
                (Some(2), _) | (_, 2) => Some(2),
                _ => None,
            };
            if let Some(slot) = slot {
                classes.push(SECTION_CLASSES[slot]);
            }
        }
        3 => {
            if ACTION_KEYWORDS.iter().any(|k| text.contains(k)) {
                classes.push("action-items");
            } else if DECISION_KEYWORDS.iter().any(|k| text.contains(k)) {
                classes.push("decision-points");
            }
        }
        _ => {}
    }
    classes
}

/// Add `classes` to an attribute string, keeping existing classes and
/// skipping ones already present.
pub fn merge_classes(attrs: &str, classes: &[&str]) -> String {
    if classes.is_empty() {
        return attrs.to_string();
    }
    match RE_CLASS_ATTR.captures(attrs) {
        Some(caps) => {
            let existing = &caps[1];
            let mut merged: Vec<&str> = existing.split_whitespace().collect();
            for c in classes {
                if !merged.contains(c) {
                    merged.push(c);
                }
            }
            let Some(range) = caps.get(0).map(|m| m.range()) else {
                return attrs.to_string();
            };
            format!(
                "{} class=\"{}\"{}",
                &attrs[..range.start],
                merged.join(" "),
                &attrs[range.end..]
            )
        }
        None => format!("{attrs} class=\"{}\"", classes.join(" ")),
    }
}

fn annotate_headings(html: &str) -> String {
    let headings = collect_headings(html);
    let mut out = String::with_capacity(html.len() + headings.len() * 24);
    let mut last = 0;
    let mut h2_index = 0;

    for h in &headings {
        let classes = heading_classes(h.level, h.id.as_deref(), &h.text, h2_index);
        if h.level == 2 {
            h2_index += 1;
        }
        if classes.is_empty() {
            continue;
        }
        out.push_str(&html[last..h.open_start]);
        out.push_str(&format!("<h{}{}>", h.level, merge_classes(&h.attrs, &classes)));
        last = h.open_end;
    }
    out.push_str(&html[last..]);
    out
}

// ── Content blocks ───────────────────────────────────────────────────────────

/// Byte offset just past the element whose opening tag starts at `open`,
/// accounting for nested elements of the same name.
fn element_end(html: &str, name: &str, open: usize) -> Option<usize> {
    let open_pat = format!("<{name}");
    let close_pat = format!("</{name}>");
    let mut depth = 0usize;
    let mut pos = open;

    loop {
        let next_open = find_open_tag(html, &open_pat, pos);
        let next_close = html[pos..].find(&close_pat).map(|i| i + pos)?;
        match next_open {
            Some(o) if o < next_close => {
                depth += 1;
                pos = o + open_pat.len();
            }
            _ => {
                depth = depth.checked_sub(1)?;
                pos = next_close + close_pat.len();
                if depth == 0 {
                    return Some(pos);
                }
            }
        }
    }
}

/// Next `<name` that is a real opening tag (followed by `>` or whitespace),
/// so `<ol` does not match `<old-tag>`.
fn find_open_tag(html: &str, open_pat: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(i) = html[pos..].find(open_pat) {
        let at = pos + i;
        let after = html[at + open_pat.len()..].chars().next();
        if matches!(after, Some(c) if c == '>' || c.is_whitespace()) {
            return Some(at);
        }
        pos = at + open_pat.len();
    }
    None
}

fn already_wrapped(html: &str, open: usize) -> bool {
    html[..open].trim_end().ends_with(BLOCK_OPEN)
}

/// Wrap every list and table not already directly wrapped in a
/// `content-block` div.
pub fn wrap_content_blocks(html: &str) -> String {
    // (position, is_open): closes sort before opens at the same offset.
    let mut inserts: Vec<(usize, bool)> = Vec::new();

    for name in BLOCK_TAGS {
        let open_pat = format!("<{name}");
        let mut pos = 0;
        while let Some(open) = find_open_tag(html, &open_pat, pos) {
            pos = open + open_pat.len();
            if already_wrapped(html, open) {
                continue;
            }
            if let Some(end) = element_end(html, name, open) {
                inserts.push((open, true));
                inserts.push((end, false));
            }
        }
    }

    if inserts.is_empty() {
        return html.to_string();
    }
    inserts.sort();

    let mut out = String::with_capacity(html.len() + inserts.len() * BLOCK_OPEN.len());
    let mut last = 0;
    for (at, is_open) in inserts {
        out.push_str(&html[last..at]);
        out.push_str(if is_open { BLOCK_OPEN } else { BLOCK_CLOSE });
        last = at;
    }
    out.push_str(&html[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::markup::markdown_to_html;

    #[test]
    fn test_meeting_section_class() {
        let out = annotate("<h2>会议议程</h2>");
        assert_eq!(out, r#"<h2 class="meeting-section first-page-section">会议议程</h2>"#);
    }

    #[test]
    fn test_action_items_beat_decisions() {
        let out = annotate("<h3>决策要点</h3><h3>最终结论</h3><h3>背景</h3>");
        assert!(out.contains(r#"<h3 class="action-items">决策要点</h3>"#));
        assert!(out.contains(r#"<h3 class="decision-points">最终结论</h3>"#));
        assert!(out.contains("<h3>背景</h3>"));
    }

    #[test]
    fn test_first_three_h2_sections() {
        let out = annotate("<h2>A</h2><h2>B</h2><h2>C</h2><h2>D</h2>");
        assert!(out.contains(r#"<h2 class="first-page-section">A</h2>"#));
        assert!(out.contains(r#"<h2 class="second-page-section">B</h2>"#));
        assert!(out.contains(r#"<h2 class="module-reports-section">C</h2>"#));
        assert!(out.contains("<h2>D</h2>"));
    }

    #[test]
    fn test_section_by_id() {
        let out = annotate(r#"<h2>A</h2><h2>B</h2><h2>C</h2><h2 id="2">D</h2>"#);
        assert!(out.contains(r#"<h2 id="2" class="second-page-section">D</h2>"#), "{out}");
    }

    #[test]
    fn test_existing_classes_merged() {
        assert_eq!(
            merge_classes(r#" id="x" class="lead""#, &["lead", "first-page-section"]),
            r#" id="x" class="lead first-page-section""#
        );
        assert_eq!(merge_classes("", &["a"]), r#" class="a""#);
    }

    #[test]
    fn test_lists_and_tables_wrapped() {
        let html = markdown_to_html("- a\n- b\n\n1. x\n\n| h |\n|---|\n| v |\n");
        let out = annotate(&html);
        assert!(out.contains("<div class=\"content-block\"><ul>"));
        assert!(out.contains("<div class=\"content-block\"><ol>"));
        assert!(out.contains("<div class=\"content-block\"><table>"));
        assert_eq!(out.matches(BLOCK_OPEN).count(), out.matches(BLOCK_CLOSE).count());
    }

    #[test]
    fn test_nested_lists_each_wrapped() {
        let html = "<ul><li>a<ul><li>b</li></ul></li></ul>";
        let out = wrap_content_blocks(html);
        assert_eq!(
            out,
            r#"<div class="content-block"><ul><li>a<div class="content-block"><ul><li>b</li></ul></div></li></ul></div>"#
        );
    }

    #[test]
    fn test_adjacent_blocks() {
        let out = wrap_content_blocks("<ul><li>a</li></ul><ol><li>b</li></ol>");
        assert_eq!(
            out,
            r#"<div class="content-block"><ul><li>a</li></ul></div><div class="content-block"><ol><li>b</li></ol></div>"#
        );
    }

    #[test]
    fn test_annotation_is_idempotent() {
        let md = "## 会议议程\n\n- a\n  - b\n\n### 行动项目\n\n| h |\n|---|\n| v |\n\n## 第二节\n";
        let once = annotate(&markdown_to_html(md));
        let twice = annotate(&once);
        assert_eq!(once, twice);
    }
}
