//! Type-specific Markdown rewrites applied before markup generation.
//!
//! Work summaries are the only type with authoring conventions that need
//! fixing up: numbered Chinese chapter headings (`## 一、版本发布`) that
//! should each start on a new page, table-of-contents links written without
//! the enumeration comma, and count columns with unit suffixes that widen
//! tables. Meeting minutes and generic documents pass through unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::classify::DocumentType;

/// Raw HTML inserted before chapters that must start a new page.
pub const PAGE_BREAK: &str = r#"<div style="page-break-before: always;"></div>"#;

/// Apply the rewrites for `doc_type`.
pub fn apply(doc_type: DocumentType, body: &str) -> String {
    match doc_type {
        DocumentType::WorkSummary => {
            let s = fix_chapter_links(body);
            let s = ensure_page_breaks(&s);
            let s = simplify_count_cells(&s);
            debug!("Applied work-summary transforms");
            s
        }
        DocumentType::MeetingMinutes | DocumentType::Generic => body.to_string(),
    }
}

// ── Rule 1: restore the enumeration comma in chapter links ───────────────────

static RE_CHAPTER_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(#([一二三四五六七八])([^)、]+)\)").unwrap());

/// `(#一版本发布)` → `(#一、版本发布)`.
fn fix_chapter_links(input: &str) -> String {
    RE_CHAPTER_LINK
        .replace_all(input, "(#${1}、${2})")
        .into_owned()
}

// ── Rule 2: page breaks before the TOC and numbered chapters ─────────────────

static RE_CHAPTER_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^## [一二三四五六七八]、").unwrap());

fn ensure_page_breaks(input: &str) -> String {
    let lines: Vec<&str> = input.split('\n').collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 8);

    for (i, line) in lines.iter().enumerate() {
        let wants_break = line.starts_with("## 目录") || RE_CHAPTER_HEADING.is_match(line);
        if wants_break && i > 0 && !has_break_before(&lines, i) {
            out.push(PAGE_BREAK);
            out.push("");
        }
        out.push(line);
    }

    out.join("\n")
}

/// Whether a page-break marker already precedes line `i`, skipping the
/// blank separator line the rewrite itself inserts.
fn has_break_before(lines: &[&str], i: usize) -> bool {
    lines[..i]
        .iter()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map_or(false, |l| l.trim().starts_with(r#"<div style="page-break"#))
}

// ── Rule 3: drop unit suffixes from count cells ──────────────────────────────

static RE_COUNT_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\| \d+)[个项次]( \|)").unwrap());

/// `| 4个 |` → `| 4 |`. Applied twice so adjacent count cells sharing a
/// pipe are both rewritten.
fn simplify_count_cells(input: &str) -> String {
    let once = RE_COUNT_CELL.replace_all(input, "${1}${2}");
    RE_COUNT_CELL.replace_all(&once, "${1}${2}").into_owned()
}
