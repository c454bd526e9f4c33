//! Front-matter extraction: split a document into metadata and body.
//!
//! The header block is a small subset of YAML: one
//! `key: value` pair per line, optional quotes, and `true/yes/false/no`
//! booleans (quoted or not). Report authors write these by hand, so the parser is forgiving:
//! lines it does not understand are skipped rather than rejected, and a
//! block without a closing `---` is treated as ordinary body text.

use serde::{Deserialize, Serialize};
use std::fmt;

const DELIMITER: &str = "---";

/// A scalar front-matter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Str(String),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s),
            MetaValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            MetaValue::Str(_) => None,
        }
    }

    /// Parse a raw (already trimmed) value the way the header block does.
    ///
    /// Quotes are stripped first, so `"yes"` is a boolean too.
    fn parse(raw: &str) -> Self {
        let value = raw.trim_matches(|c| c == '"' || c == '\'');
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" => MetaValue::Bool(true),
            "false" | "no" => MetaValue::Bool(false),
            _ => MetaValue::Str(value.to_string()),
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(b) => write!(f, "{b}"),
            MetaValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Str(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Str(s)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

/// Ordered front-matter key/value pairs.
///
/// Keys are unique. Re-inserting a key replaces its value but keeps the
/// position of the first insertion, so re-serialisation reproduces the
/// author's ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    entries: Vec<(String, MetaValue)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// String value for `key`, ignoring booleans and empty strings.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_str).filter(|s| !s.is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge caller-supplied overrides; `other` wins on conflicting keys.
    pub fn merge(&mut self, other: &Metadata) {
        for (k, v) in other.iter() {
            self.insert(k, v.clone());
        }
    }

    /// Serialise back to a delimited header block (including both `---`
    /// lines and a trailing newline). Empty metadata yields an empty string.
    pub fn to_front_matter(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut out = String::from("---\n");
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(": ");
            match value {
                MetaValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
                MetaValue::Str(s) if needs_quotes(s) => {
                    out.push('"');
                    out.push_str(s);
                    out.push('"');
                }
                MetaValue::Str(s) => out.push_str(s),
            }
            out.push('\n');
        }
        out.push_str("---\n");
        out
    }
}

/// A string value must be quoted when writing it bare would lose
/// whitespace. Boolean words read back as booleans either way, and the
/// parser never produces them as strings.
fn needs_quotes(s: &str) -> bool {
    s.is_empty() || s.trim() != s
}


/// A document split into its header block and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    pub metadata: Metadata,
    pub body: String,
}

/// Split `content` into metadata and body.
///
/// The header is recognised only when the very first line is `---` and a
/// later line is `---`; otherwise the whole input is body.
pub fn extract(content: &str) -> FrontMatter {
    let mut lines = content.split_inclusive('\n');

    let Some(first) = lines.next() else {
        return FrontMatter {
            metadata: Metadata::new(),
            body: String::new(),
        };
    };
    if !is_delimiter(first) {
        return whole_body(content);
    }

    let mut metadata = Metadata::new();
    let mut consumed = first.len();
    for line in lines {
        consumed += line.len();
        if is_delimiter(line) {
            return FrontMatter {
                metadata,
                body: content[consumed..].to_string(),
            };
        }
        parse_line(line, &mut metadata);
    }

    // No closing delimiter: not a header block after all.
    whole_body(content)
}

fn whole_body(content: &str) -> FrontMatter {
    FrontMatter {
        metadata: Metadata::new(),
        body: content.to_string(),
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

fn parse_line(line: &str, metadata: &mut Metadata) {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return;
    }
    let Some((key, value)) = line.split_once(':') else {
        return;
    };
    let key = key.trim();
    if key.is_empty() {
        return;
    }
    metadata.insert(key, MetaValue::parse(value.trim()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn is_bool_word(s: &str) -> bool {
        matches!(
            s.to_ascii_lowercase().as_str(),
            "true" | "yes" | "false" | "no"
        )
    }

    #[test]
    fn extracts_header_and_body() {
        let doc = "---\ntitle: \"周报\"\ndoc_type: meeting-minutes\ndraft: yes\n---\n# 标题\n正文\n";
        let fm = extract(doc);
        assert_eq!(fm.metadata.get_str("title"), Some("周报"));
        assert_eq!(fm.metadata.get_str("doc_type"), Some("meeting-minutes"));
        assert_eq!(fm.metadata.get("draft"), Some(&MetaValue::Bool(true)));
        assert_eq!(fm.body, "# 标题\n正文\n");
    }

    #[test]
    fn no_header_returns_whole_body() {
        let doc = "# Title\n---\nkey: value\n---\n";
        let fm = extract(doc);
        assert!(fm.metadata.is_empty());
        assert_eq!(fm.body, doc);
    }

    #[test]
    fn unclosed_header_is_body() {
        let doc = "---\ntitle: x\nno closing line\n";
        let fm = extract(doc);
        assert!(fm.metadata.is_empty());
        assert_eq!(fm.body, doc);
    }

    #[test]
    fn empty_header_block() {
        let fm = extract("---\n---\nbody");
        assert!(fm.metadata.is_empty());
        assert_eq!(fm.body, "body");
    }

    #[test]
    fn skips_comments_and_garbage_lines() {
        let fm = extract("---\n# a comment\n\nnot a pair\nkey: v: with colon\n---\n");
        assert_eq!(fm.metadata.len(), 1);
        assert_eq!(fm.metadata.get_str("key"), Some("v: with colon"));
    }

    #[test]
    fn boolean_words_are_case_insensitive() {
        let fm = extract("---\na: TRUE\nb: No\n---\n");
        assert_eq!(fm.metadata.get("a"), Some(&MetaValue::Bool(true)));
        assert_eq!(fm.metadata.get("b"), Some(&MetaValue::Bool(false)));
    }

    #[test]
    fn quoted_boolean_words_are_booleans() {
        let fm = extract("---\ndraft: \"yes\"\npublic: 'false'\nnote: \"yes please\"\n---\n");
        assert_eq!(fm.metadata.get("draft"), Some(&MetaValue::Bool(true)));
        assert_eq!(fm.metadata.get("public"), Some(&MetaValue::Bool(false)));
        assert_eq!(fm.metadata.get_str("note"), Some("yes please"));
    }

    #[test]
    fn parsed_values_never_hold_boolean_words_as_strings() {
        let fm = extract("---\na: 'Yes'\nb: \"NO\"\nc: true\n---\n");
        assert!(fm
            .metadata
            .iter()
            .all(|(_, v)| v.as_str().map_or(true, |s| !is_bool_word(s))));
    }

    #[test]
    fn crlf_delimiters_are_accepted() {
        let fm = extract("---\r\ntheme: enterprise\r\n---\r\nbody\r\n");
        assert_eq!(fm.metadata.get_str("theme"), Some("enterprise"));
        assert_eq!(fm.body, "body\r\n");
    }

    #[test]
    fn repeated_key_keeps_first_position() {
        let mut m = Metadata::new();
        m.insert("a", "1");
        m.insert("b", "2");
        m.insert("a", "3");
        let keys: Vec<&str> = m.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(m.get_str("a"), Some("3"));
    }

    #[test]
    fn merge_overrides_win() {
        let mut base = Metadata::new();
        base.insert("theme", "github");
        base.insert("title", "A");
        let mut overrides = Metadata::new();
        overrides.insert("theme", "enterprise");
        base.merge(&overrides);
        assert_eq!(base.get_str("theme"), Some("enterprise"));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn serialise_quotes_padded_strings() {
        let mut m = Metadata::new();
        m.insert("flag", true);
        m.insert("padded", " x ");
        m.insert("plain", "hello");
        assert_eq!(
            m.to_front_matter(),
            "---\nflag: true\npadded: \" x \"\nplain: hello\n---\n"
        );
        assert_eq!(extract(&m.to_front_matter()).metadata, m);
    }

    fn key_strategy() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,10}"
    }

    fn value_strategy() -> impl Strategy<Value = MetaValue> {
        prop_oneof![
            any::<bool>().prop_map(MetaValue::Bool),
            // No quote characters at the edges: the header format strips them.
            // Boolean words always parse as booleans.
            "[A-Za-z0-9一-龥][A-Za-z0-9一-龥 .:/-]{0,15}"
                .prop_filter("boolean word", |s| !is_bool_word(s))
                .prop_map(MetaValue::Str),
        ]
    }

    proptest! {
        #[test]
        fn front_matter_round_trips(
            pairs in proptest::collection::vec((key_strategy(), value_strategy()), 1..8),
            body in "[a-z# \n]{0,40}",
        ) {
            let mut metadata = Metadata::new();
            for (k, v) in pairs {
                metadata.insert(k, v);
            }
            let doc = format!("{}{}", metadata.to_front_matter(), body);
            let fm = extract(&doc);
            prop_assert_eq!(fm.metadata, metadata);
            prop_assert_eq!(fm.body, body);
        }
    }
}
