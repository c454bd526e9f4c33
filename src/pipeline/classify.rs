//! Rule-based document-type classification.
//!
//! Each known report type carries two pattern classes: *required* markers
//! that practically only occur in that type (a meeting's attendee list, a
//! summary's "年度成果概览" block) and *supporting* markers that are merely
//! typical. A document scores 3 per required and 1 per supporting pattern
//! found, each pattern counting at most once. Anything below the confidence
//! threshold falls back to [`DocumentType::Generic`], so a document with a
//! single supporting marker is never restyled by accident. Three distinct
//! supporting markers do reach the threshold on their own.
//!
//! The rule table is plain data compiled once; adding a type means adding a
//! row, not a new code path.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use super::frontmatter::Metadata;

/// Weight of a matched required pattern.
pub const REQUIRED_WEIGHT: u32 = 3;
/// Weight of a matched supporting pattern.
pub const SUPPORTING_WEIGHT: u32 = 1;
/// Minimum score a type needs to be selected.
pub const CONFIDENCE_THRESHOLD: u32 = 3;

/// Metadata key that declares the document type explicitly.
pub const DOC_TYPE_KEY: &str = "doc_type";

/// Semantic type of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    /// Periodic work summary / status report.
    WorkSummary,
    /// Meeting minutes.
    MeetingMinutes,
    /// Anything else.
    #[default]
    Generic,
}

impl DocumentType {
    /// The tag used in front matter and on the command line.
    pub fn tag(&self) -> &'static str {
        match self {
            DocumentType::WorkSummary => "work-summary",
            DocumentType::MeetingMinutes => "meeting-minutes",
            DocumentType::Generic => "generic",
        }
    }

    /// Look up a tag; `None` for tags outside the closed set.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "work-summary" => Some(DocumentType::WorkSummary),
            "meeting-minutes" => Some(DocumentType::MeetingMinutes),
            "generic" => Some(DocumentType::Generic),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Feature patterns for one document type.
pub struct FeatureRule {
    pub doc_type: DocumentType,
    pub required: Vec<Regex>,
    pub supporting: Vec<Regex>,
}

impl FeatureRule {
    fn new(doc_type: DocumentType, required: &[&str], supporting: &[&str]) -> Self {
        Self {
            doc_type,
            required: compile(required),
            supporting: compile(supporting),
        }
    }

    /// Score `text` against this rule. Each pattern contributes at most once.
    pub fn score(&self, text: &str) -> u32 {
        let required = self.required.iter().filter(|re| re.is_match(text)).count() as u32;
        let supporting = self.supporting.iter().filter(|re| re.is_match(text)).count() as u32;
        REQUIRED_WEIGHT * required + SUPPORTING_WEIGHT * supporting
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?m){p}")).expect("static feature pattern"))
        .collect()
}

/// The rule table, in declared (tie-breaking) order.
pub static FEATURE_RULES: Lazy<Vec<FeatureRule>> = Lazy::new(|| {
    vec![
        FeatureRule::new(
            DocumentType::WorkSummary,
            &["年度成果概览", "姓名："],
            &["^## [一二三四五六七八]、", "工作总结", "版本发布"],
        ),
        FeatureRule::new(
            DocumentType::MeetingMinutes,
            &["参会人员", "会议时间"],
            &["会议纪要", "决策事项", "行动计划"],
        ),
    ]
});

/// Per-type scores in declared order.
pub fn classify_scored(text: &str) -> Vec<(DocumentType, u32)> {
    FEATURE_RULES
        .iter()
        .map(|rule| (rule.doc_type, rule.score(text)))
        .collect()
}

/// Classify body text. Never fails; weak evidence yields `Generic`.
pub fn classify(text: &str) -> DocumentType {
    let scores = classify_scored(text);

    // First maximum wins ties, preserving declared order.
    let mut best: Option<(DocumentType, u32)> = None;
    for (doc_type, score) in scores {
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((doc_type, score));
        }
    }

    match best {
        Some((doc_type, score)) if score >= CONFIDENCE_THRESHOLD => {
            debug!("Classified as {} (score {})", doc_type, score);
            doc_type
        }
        _ => DocumentType::Generic,
    }
}

/// Which rule decided a document's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSource {
    Override,
    Metadata,
    Classifier,
}

/// Resolve a document's type: explicit override, then the metadata
/// declaration, then the classifier. The classifier only runs when neither
/// of the first two is present.
pub fn resolve_document_type(
    override_type: Option<DocumentType>,
    metadata: &Metadata,
    body: &str,
) -> (DocumentType, TypeSource) {
    if let Some(t) = override_type {
        return (t, TypeSource::Override);
    }

    if let Some(tag) = metadata.get_str(DOC_TYPE_KEY) {
        let t = DocumentType::from_tag(tag).unwrap_or_else(|| {
            warn!("Unknown doc_type '{}' in front matter; using generic", tag);
            DocumentType::Generic
        });
        return (t, TypeSource::Metadata);
    }

    (classify(body), TypeSource::Classifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn score_of(text: &str, t: DocumentType) -> u32 {
        classify_scored(text)
            .into_iter()
            .find(|(d, _)| *d == t)
            .map(|(_, s)| s)
            .unwrap()
    }

    #[test]
    fn work_summary_scenario_scores_eight() {
        // Two required markers plus two supporting ones (the numbered
        // heading and "版本发布").
        let body = "# 2024 年度总结\n\n年度成果概览\n\n姓名：张三\n\n## 一、版本发布\n\n上线三次";
        assert_eq!(score_of(body, DocumentType::WorkSummary), 8);
        assert_eq!(classify(body), DocumentType::WorkSummary);
    }

    #[test]
    fn repeated_pattern_counts_once() {
        let body = "参会人员 参会人员 参会人员";
        assert_eq!(score_of(body, DocumentType::MeetingMinutes), 3);
    }

    #[test]
    fn supporting_only_falls_back_to_generic() {
        let body = "会议纪要\n决策事项\n";
        assert_eq!(score_of(body, DocumentType::MeetingMinutes), 2);
        assert_eq!(classify(body), DocumentType::Generic);
    }

    #[test]
    fn one_required_is_enough() {
        assert_eq!(classify("会议时间：周一"), DocumentType::MeetingMinutes);
    }

    #[test]
    fn empty_text_is_generic() {
        assert_eq!(classify(""), DocumentType::Generic);
    }

    #[test]
    fn ties_resolve_to_declared_order() {
        // 3 each: one required marker per type.
        let body = "姓名：李四\n参会人员：全体";
        assert_eq!(classify(body), DocumentType::WorkSummary);
    }

    #[test]
    fn supporting_heading_pattern_is_line_anchored() {
        assert_eq!(score_of("## 二、研发", DocumentType::WorkSummary), 1);
        assert_eq!(score_of("text ## 二、研发", DocumentType::WorkSummary), 0);
    }

    #[test]
    fn metadata_type_skips_classifier() {
        let mut meta = Metadata::new();
        meta.insert("doc_type", "meeting-minutes");
        // Body looks like a work summary; the declaration must win.
        let (t, src) = resolve_document_type(None, &meta, "年度成果概览 姓名：");
        assert_eq!(t, DocumentType::MeetingMinutes);
        assert_eq!(src, TypeSource::Metadata);
    }

    #[test]
    fn override_beats_metadata() {
        let mut meta = Metadata::new();
        meta.insert("doc_type", "meeting-minutes");
        let (t, src) = resolve_document_type(Some(DocumentType::Generic), &meta, "");
        assert_eq!(t, DocumentType::Generic);
        assert_eq!(src, TypeSource::Override);
    }

    #[test]
    fn unknown_metadata_type_is_generic() {
        let mut meta = Metadata::new();
        meta.insert("doc_type", "invoice");
        let (t, src) = resolve_document_type(None, &meta, "参会人员");
        assert_eq!(t, DocumentType::Generic);
        assert_eq!(src, TypeSource::Metadata);
    }

    #[test]
    fn tags_round_trip() {
        for t in [
            DocumentType::WorkSummary,
            DocumentType::MeetingMinutes,
            DocumentType::Generic,
        ] {
            assert_eq!(DocumentType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(DocumentType::from_tag("Meeting-Minutes"), Some(DocumentType::MeetingMinutes));
        assert_eq!(DocumentType::from_tag("memo"), None);
    }

    #[test]
    fn three_supporting_patterns_reach_threshold() {
        // 3 × 1 meets the threshold without any required marker.
        let body = "会议纪要\n决策事项\n行动计划\n";
        assert_eq!(score_of(body, DocumentType::MeetingMinutes), CONFIDENCE_THRESHOLD);
        assert_eq!(classify(body), DocumentType::MeetingMinutes);
    }

    proptest! {
        #[test]
        fn two_distinct_supporting_patterns_stay_below_threshold(
            chosen in proptest::sample::subsequence(vec!["会议纪要", "决策事项", "行动计划"], 0..=2),
            reps in 1usize..4,
            filler in proptest::collection::vec(
                prop_oneof![Just("filler text"), Just("\n"), Just("## 章节")],
                0..10,
            ),
        ) {
            let mut body: String = filler.concat();
            for _ in 0..reps {
                for pattern in &chosen {
                    body.push_str(pattern);
                    body.push('\n');
                }
            }
            prop_assert!(score_of(&body, DocumentType::MeetingMinutes) < CONFIDENCE_THRESHOLD);
            prop_assert_ne!(classify(&body), DocumentType::MeetingMinutes);
        }
    }
}
