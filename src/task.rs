//! Conversion tasks and their results.
//!
//! A [`ConversionTask`] is read-only once submitted; everything learned
//! while running it (status, timing, resolved document type, artifact size)
//! is recorded on the immutable [`ConversionResult`] instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::pipeline::classify::DocumentType;
use crate::pipeline::frontmatter::Metadata;
use crate::pipeline::render::Margins;
use crate::theme::THEME_KEY;

/// Per-task overrides. `None` means "use the converter's configuration".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOptions {
    /// Skip metadata and classifier and use this type.
    pub doc_type: Option<DocumentType>,
    pub page_format: Option<String>,
    pub margins: Option<Margins>,
    pub scale: Option<f32>,
    pub print_background: Option<bool>,
    /// Merged over the document's front matter; these keys win.
    pub metadata: Metadata,
}

/// One document to convert.
///
/// `theme` applies unless the front matter names another one. To make it
/// stick regardless, pin it with [`ConversionTask::with_pinned_theme`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionTask {
    pub source: PathBuf,
    pub target: PathBuf,
    pub theme: String,
    #[serde(default)]
    pub options: TaskOptions,
}

impl ConversionTask {
    pub fn new(
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        theme: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            theme: theme.into(),
            options: TaskOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_doc_type(mut self, doc_type: DocumentType) -> Self {
        self.options.doc_type = Some(doc_type);
        self
    }

    /// Use `theme` even when the document's front matter asks for another.
    pub fn with_pinned_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self.options.metadata.insert(THEME_KEY, self.theme.as_str());
        self
    }
}

/// Lifecycle of a task. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether `self → next` is a legal transition.
    ///
    /// A task may fail before it starts running (validation), so
    /// `Pending → Failed` is allowed.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of one task.
///
/// `success` is true exactly when `output_path` is set and the artifact
/// existed when the result was recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub task: ConversionTask,
    pub status: TaskStatus,
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub error_message: Option<String>,
    /// Resolved document type, when the document got far enough to have one.
    pub doc_type: Option<DocumentType>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Artifact size in bytes; 0 on failure.
    pub file_size: u64,
}

impl ConversionResult {
    pub(crate) fn completed(
        task: ConversionTask,
        output_path: PathBuf,
        file_size: u64,
        doc_type: DocumentType,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        Self {
            task,
            status: TaskStatus::Completed,
            success: true,
            output_path: Some(output_path),
            error_message: None,
            doc_type: Some(doc_type),
            started_at,
            finished_at,
            duration_ms: elapsed_ms(started_at, finished_at),
            file_size,
        }
    }

    pub(crate) fn failed(
        task: ConversionTask,
        error: impl fmt::Display,
        doc_type: Option<DocumentType>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        Self {
            task,
            status: TaskStatus::Failed,
            success: false,
            output_path: None,
            error_message: Some(error.to_string()),
            doc_type,
            started_at,
            finished_at,
            duration_ms: elapsed_ms(started_at, finished_at),
            file_size: 0,
        }
    }

    pub fn source(&self) -> &Path {
        &self.task.source
    }
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

/// Tally over a batch of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sum of per-task durations.
    pub total_duration_ms: u64,
}

impl BatchSummary {
    pub fn from_results(results: &[ConversionResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            total_duration_ms: results.iter().map(|r| r.duration_ms).sum(),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} succeeded, {} failed ({} ms)",
            self.succeeded, self.total, self.failed, self.total_duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> ConversionTask {
        ConversionTask::new("a.md", "a.pdf", "github")
    }

    #[test]
    fn test_status_never_regresses() {
        use TaskStatus::*;
        let all = [Pending, Running, Completed, Failed];
        for from in all {
            for to in all {
                let ok = from.can_transition_to(to);
                if from.is_terminal() {
                    assert!(!ok, "{from} -> {to} must be rejected");
                }
                if to == Pending {
                    assert!(!ok);
                }
            }
        }
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn test_failed_result_shape() {
        let r = ConversionResult::failed(task(), "boom", None, Utc::now());
        assert_eq!(r.status, TaskStatus::Failed);
        assert!(!r.success);
        assert!(r.output_path.is_none());
        assert_eq!(r.error_message.as_deref(), Some("boom"));
        assert_eq!(r.file_size, 0);
        assert!(r.finished_at >= r.started_at);
    }

    #[test]
    fn test_completed_result_shape() {
        let r = ConversionResult::completed(
            task(),
            PathBuf::from("a.pdf"),
            1234,
            DocumentType::Generic,
            Utc::now(),
        );
        assert!(r.success);
        assert_eq!(r.status, TaskStatus::Completed);
        assert_eq!(r.output_path.as_deref(), Some(Path::new("a.pdf")));
        assert!(r.error_message.is_none());
    }

    #[test]
    fn test_summary_tally() {
        let now = Utc::now();
        let results = vec![
            ConversionResult::completed(task(), "a.pdf".into(), 1, DocumentType::Generic, now),
            ConversionResult::failed(task(), "x", None, now),
            ConversionResult::completed(task(), "a.pdf".into(), 1, DocumentType::Generic, now),
        ];
        let s = BatchSummary::from_results(&results);
        assert_eq!((s.total, s.succeeded, s.failed), (3, 2, 1));
        assert!(!s.all_succeeded());
        assert_eq!(BatchSummary::from_results(&[]), BatchSummary::default());
    }

    #[test]
    fn test_result_serialises_status_lowercase() {
        let r = ConversionResult::failed(task(), "x", Some(DocumentType::MeetingMinutes), Utc::now());
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains(r#""status":"failed""#));
        assert!(json.contains(r#""doc_type":"meeting-minutes""#));
    }

    #[test]
    fn test_pinned_theme_lands_in_metadata_overrides() {
        let t = task().with_pinned_theme("enterprise");
        assert_eq!(t.theme, "enterprise");
        assert_eq!(t.options.metadata.get_str(THEME_KEY), Some("enterprise"));
        assert!(task().options.metadata.is_empty());
    }

    #[test]
    fn test_options_metadata_defaults_when_absent() {
        let opts: TaskOptions = serde_json::from_str(r#"{"scale":0.9}"#).unwrap();
        assert!(opts.metadata.is_empty());
        assert_eq!(opts.scale, Some(0.9));
    }
}
