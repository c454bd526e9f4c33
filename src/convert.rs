//! Conversion orchestration: one document or a bounded-concurrency batch.
//!
//! ## Per-task chain
//!
//! ```text
//! validate ─▶ read ─▶ front matter ─▶ type ─▶ transform ─▶ markup
//!     ─▶ anchors ─▶ annotate ─▶ document ─▶ renderer ─▶ output check
//! ```
//!
//! Every stage error is caught at the task boundary and recorded as a
//! failed [`ConversionResult`]; nothing a single task does can abort its
//! siblings. Batches spawn each task on the runtime, so even a panic inside
//! a renderer is contained to the task that caused it.
//!
//! ## Ordering
//!
//! [`Converter::convert_batch`] returns results in submission order no
//! matter which task finishes first. Use [`Converter::convert_stream`] for
//! completion order.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ConverterConfig;
use crate::error::Md2PdfError;
use crate::pipeline::classify::{resolve_document_type, DocumentType, TypeSource};
use crate::pipeline::frontmatter::{self, FrontMatter, Metadata};
use crate::pipeline::markup::{self, DocumentParts};
use crate::pipeline::render::{dir_url, ChromiumRenderer, Renderer};
use crate::pipeline::{anchors, annotate, transform};
use crate::progress::{report_result, NoopProgressCallback, ProgressCallback};
use crate::task::{BatchSummary, ConversionResult, ConversionTask, TaskOptions};
use crate::theme::{ThemeRegistry, THEME_KEY};

/// Source extension accepted by validation (compared case-insensitively).
pub const SOURCE_EXTENSION: &str = "md";
/// Extension of generated artifacts.
pub const TARGET_EXTENSION: &str = "pdf";

/// A fully assembled HTML document, ready for a renderer.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub html: String,
    pub doc_type: DocumentType,
    pub type_source: TypeSource,
    /// Front matter after caller overrides were merged in.
    pub metadata: Metadata,
    /// Theme the document was styled with.
    pub theme: String,
}

/// Runs conversion tasks against a theme registry and a renderer.
///
/// Cloning is cheap; clones share the registry, renderer and callback.
#[derive(Clone)]
pub struct Converter {
    config: Arc<ConverterConfig>,
    themes: Arc<ThemeRegistry>,
    renderer: Arc<dyn Renderer>,
    progress: ProgressCallback,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("themes", &self.themes.names())
            .field("renderer", &self.renderer.name())
            .finish()
    }
}

impl Converter {
    pub fn new(
        config: ConverterConfig,
        themes: ThemeRegistry,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            themes: Arc::new(themes),
            renderer,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    /// Built-in themes plus an auto-detected headless browser.
    pub fn from_config(config: ConverterConfig) -> Result<Self, Md2PdfError> {
        let renderer = ChromiumRenderer::detect(config.browser_path.as_deref())
            .map_err(|e| Md2PdfError::from_render(e, Path::new("")))?;
        Ok(Self::new(
            config,
            ThemeRegistry::with_builtins(),
            Arc::new(renderer),
        ))
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = callback;
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn themes(&self) -> &ThemeRegistry {
        &self.themes
    }

    // ── Task construction ────────────────────────────────────────────────

    /// Where `source` is written when no destination is given: the
    /// configured output directory, else next to the source.
    pub fn default_target(&self, source: &Path) -> PathBuf {
        match (&self.config.output_dir, source.file_stem()) {
            (Some(dir), Some(stem)) => {
                dir.join(Path::new(stem).with_extension(TARGET_EXTENSION))
            }
            _ => source.with_extension(TARGET_EXTENSION),
        }
    }

    /// Build a task using configured defaults for anything not given.
    ///
    /// An explicit `theme` is pinned and beats the document's front matter;
    /// without one, front matter beats the configured default.
    pub fn task_for(
        &self,
        source: impl Into<PathBuf>,
        target: Option<PathBuf>,
        theme: Option<&str>,
        options: TaskOptions,
    ) -> ConversionTask {
        let source = source.into();
        let target = target.unwrap_or_else(|| self.default_target(&source));
        let task =
            ConversionTask::new(source, target, &self.config.theme).with_options(options);
        match theme {
            Some(theme) => task.with_pinned_theme(theme),
            None => task,
        }
    }

    // ── Validation ───────────────────────────────────────────────────────

    /// Check a task before anything is rendered.
    ///
    /// In order: the source exists, has the `.md` extension, the theme is
    /// registered, and the target's directory exists or can be created.
    pub async fn validate_task(&self, task: &ConversionTask) -> Result<(), Md2PdfError> {
        let is_file = tokio::fs::metadata(&task.source)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(Md2PdfError::FileNotFound {
                path: task.source.clone(),
            });
        }

        let ext_ok = task
            .source
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case(SOURCE_EXTENSION));
        if !ext_ok {
            return Err(Md2PdfError::InvalidFileFormat {
                path: task.source.clone(),
                expected: format!(".{SOURCE_EXTENSION}"),
            });
        }

        self.themes.get(&task.theme)?;

        if let Some(parent) = task.target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Md2PdfError::OutputDirUnavailable {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        Ok(())
    }

    // ── Document chain ───────────────────────────────────────────────────

    /// Run the chain up to the finished HTML document without rendering.
    ///
    /// `theme` is used unless the merged front matter names another one.
    pub async fn render_html(
        &self,
        source: &Path,
        theme: &str,
        options: &TaskOptions,
    ) -> Result<RenderedDocument, Md2PdfError> {
        let content = tokio::fs::read_to_string(source)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Md2PdfError::FileNotFound {
                    path: source.to_path_buf(),
                },
                _ => Md2PdfError::ReadFailed {
                    path: source.to_path_buf(),
                    source: e,
                },
            })?;

        let mut fm = frontmatter::extract(&content);
        fm.metadata.merge(&options.metadata);

        let theme = fm.metadata.get_str(THEME_KEY).unwrap_or(theme).to_string();
        let theme_css = self.themes.get(&theme)?.css.clone();

        // Relative images and links resolve against the source's directory.
        let base_href = tokio::fs::canonicalize(source)
            .await
            .ok()
            .and_then(|p| p.parent().map(dir_url));

        let print_css = self.config.render.merged(options).print_css();
        let fallback_title = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let override_type = options.doc_type;
        let path = source.to_path_buf();

        // Markup work is pure CPU; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            let inputs = DocumentInputs {
                fallback_title: &fallback_title,
                theme_css: &theme_css,
                print_css: &print_css,
                base_href: base_href.as_deref(),
            };
            build_document(fm, override_type, theme, &inputs)
        })
        .await
        .map_err(|e| Md2PdfError::MarkupGeneration {
            path,
            reason: e.to_string(),
        })
    }

    /// Render `task` and verify the artifact; returns its size in bytes.
    async fn write_pdf(&self, task: &ConversionTask, html: &str) -> Result<u64, Md2PdfError> {
        let options = self.config.render.merged(&task.options);
        self.renderer
            .render(html, &task.target, &options)
            .await
            .map_err(|e| Md2PdfError::from_render(e, &task.target))?;

        match tokio::fs::metadata(&task.target).await {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            _ => Err(Md2PdfError::MissingOutput {
                path: task.target.clone(),
            }),
        }
    }

    /// Convert one task. Never fails; errors are recorded on the result.
    pub async fn convert_single(&self, task: ConversionTask) -> ConversionResult {
        if let Err(e) = self.validate_task(&task).await {
            warn!("Validation failed for {}: {}", task.source.display(), e);
            return ConversionResult::failed(task, e, None, Utc::now());
        }

        let started_at = Utc::now();
        info!("Converting {} → {}", task.source.display(), task.target.display());

        let doc = match self.render_html(&task.source, &task.theme, &task.options).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("{} failed: {}", task.source.display(), e);
                return ConversionResult::failed(task, e, None, started_at);
            }
        };
        debug!(
            "{}: type {} via {:?}, theme {}",
            task.source.display(),
            doc.doc_type,
            doc.type_source,
            doc.theme
        );

        match self.write_pdf(&task, &doc.html).await {
            Ok(size) => {
                info!("Wrote {} ({} bytes)", task.target.display(), size);
                let target = task.target.clone();
                ConversionResult::completed(task, target, size, doc.doc_type, started_at)
            }
            Err(e) => {
                warn!("{} failed: {}", task.source.display(), e);
                ConversionResult::failed(task, e, Some(doc.doc_type), started_at)
            }
        }
    }

    // ── Batches ──────────────────────────────────────────────────────────

    /// Spawn one task on the runtime, reporting progress events.
    pub(crate) fn spawn_task(
        &self,
        index: usize,
        total: usize,
        task: ConversionTask,
        semaphore: Arc<Semaphore>,
    ) -> JoinHandle<ConversionResult> {
        let this = self.clone();
        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(e) => {
                    return ConversionResult::failed(
                        task,
                        Md2PdfError::Internal(e.to_string()),
                        None,
                        Utc::now(),
                    )
                }
            };
            this.progress.on_task_start(index, total, &task.source);
            let result = this.convert_single(task).await;
            report_result(this.progress.as_ref(), index, total, &result);
            result
        })
    }

    /// Turn a join failure (panic or cancellation) into a failed result.
    pub(crate) fn join_failure(
        &self,
        index: usize,
        total: usize,
        task: ConversionTask,
        err: tokio::task::JoinError,
    ) -> ConversionResult {
        let reason = if err.is_panic() {
            "conversion task panicked"
        } else {
            "conversion task was cancelled"
        };
        error!("{}: {}", task.source.display(), reason);
        let result =
            ConversionResult::failed(task, Md2PdfError::Internal(reason.into()), None, Utc::now());
        report_result(self.progress.as_ref(), index, total, &result);
        result
    }

    /// Convert many tasks with at most `concurrency` in flight (0 is
    /// treated as 1). Result `i` belongs to task `i`.
    pub async fn convert_batch(
        &self,
        tasks: Vec<ConversionTask>,
        concurrency: usize,
    ) -> Vec<ConversionResult> {
        let total = tasks.len();
        let limit = concurrency.max(1);
        info!("Starting batch: {} tasks, concurrency {}", total, limit);
        self.progress.on_batch_start(total);

        let semaphore = Arc::new(Semaphore::new(limit));
        let handles: Vec<_> = tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| {
                let handle = self.spawn_task(index, total, task.clone(), Arc::clone(&semaphore));
                (task, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(total);
        for (index, (task, handle)) in handles.into_iter().enumerate() {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => self.join_failure(index, total, task, e),
            };
            results.push(result);
        }

        let summary = Self::summarize(&results);
        info!("Batch complete: {}", summary);
        self.progress.on_batch_complete(&summary);
        results
    }

    /// Single invocation: `dest` defaults to the source stem with `.pdf`.
    pub async fn convert_file(
        &self,
        source: impl Into<PathBuf>,
        dest: Option<PathBuf>,
        theme: Option<&str>,
        options: TaskOptions,
    ) -> ConversionResult {
        let task = self.task_for(source, dest, theme, options);
        self.convert_single(task).await
    }

    /// Batch invocation over source paths with the configured concurrency.
    pub async fn convert_files(
        &self,
        sources: &[PathBuf],
        theme: Option<&str>,
        options: &TaskOptions,
    ) -> Vec<ConversionResult> {
        let tasks = sources
            .iter()
            .map(|s| self.task_for(s.clone(), None, theme, options.clone()))
            .collect();
        self.convert_batch(tasks, self.config.concurrency).await
    }

    pub fn summarize(results: &[ConversionResult]) -> BatchSummary {
        BatchSummary::from_results(results)
    }
}

/// Everything the document shell needs besides the converted body.
struct DocumentInputs<'a> {
    fallback_title: &'a str,
    theme_css: &'a str,
    print_css: &'a str,
    base_href: Option<&'a str>,
}

/// The synchronous part of the chain, from front matter to HTML document.
fn build_document(
    fm: FrontMatter,
    override_type: Option<DocumentType>,
    theme: String,
    inputs: &DocumentInputs<'_>,
) -> RenderedDocument {
    let (doc_type, type_source) = resolve_document_type(override_type, &fm.metadata, &fm.body);

    let body = transform::apply(doc_type, &fm.body);
    let fragment = markup::markdown_to_html(&body);
    let fragment = anchors::resolve_anchors(&fragment);
    let fragment = annotate::annotate(&fragment);

    let title = fm.metadata.get_str("title").unwrap_or(inputs.fallback_title);
    let html = markup::build_document(&DocumentParts {
        title,
        body_html: &fragment,
        theme_css: inputs.theme_css,
        print_css: inputs.print_css,
        doc_type,
        base_href: inputs.base_href,
    });

    RenderedDocument {
        html,
        doc_type,
        type_source,
        metadata: fm.metadata,
        theme,
    }
}
