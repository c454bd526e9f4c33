//! Error types for the md2pdf-report library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`Md2PdfError`]: everything that can stop a single document from
//!   becoming a PDF: a missing source, an unknown theme, a renderer crash.
//!   The orchestrator never lets one of these escape a task; it is turned
//!   into a failed [`crate::task::ConversionResult`] whose message is the
//!   error's `Display` text. Direct callers of [`crate::Converter::validate_task`]
//!   and [`crate::Converter::render_html`] receive it as `Err`.
//!
//! * [`RenderError`]: what a [`crate::pipeline::render::Renderer`] reports.
//!   Kept separate so third-party renderers do not need to know about
//!   validation or theme errors. Converted with `From`.

use std::path::PathBuf;
use thiserror::Error;

/// All errors a conversion task can end with.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source document was not found at the given path.
    #[error("Markdown file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Source has the wrong extension.
    #[error("Invalid file format: '{path}' (expected {expected})")]
    InvalidFileFormat { path: PathBuf, expected: String },

    /// Source exists but could not be read as UTF-8 text.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Configuration errors ──────────────────────────────────────────────
    /// The requested theme is not registered.
    #[error("Theme not found: '{name}'\nAvailable themes: {available}")]
    ThemeNotFound { name: String, available: String },

    /// A theme stylesheet could not be loaded.
    #[error("Failed to load theme '{name}': {reason}")]
    ThemeLoad { name: String, reason: String },

    /// The target directory does not exist and cannot be created.
    #[error("Cannot create output directory '{path}': {source}")]
    OutputDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read or written.
    #[error("Configuration file '{path}': {reason}")]
    ConfigIo { path: PathBuf, reason: String },

    // ── Structural errors ─────────────────────────────────────────────────
    /// Markup could not be generated from the document.
    #[error("Markup generation failed for '{path}': {reason}")]
    MarkupGeneration { path: PathBuf, reason: String },

    // ── Rendering / environment errors ────────────────────────────────────
    /// No Chromium-family browser could be located.
    #[error(
        "No Chromium, Chrome or Edge executable found.\n\
Install one of them, or point MD2PDF_BROWSER at an existing executable."
    )]
    BrowserNotFound,

    /// The browser process could not be started.
    #[error("Failed to launch browser '{path}': {reason}")]
    BrowserLaunch { path: PathBuf, reason: String },

    /// The browser ran but did not produce a PDF.
    #[error("PDF generation failed for '{path}': {reason}")]
    PdfGeneration { path: PathBuf, reason: String },

    /// Rendering reported success but the artifact is not on disk.
    #[error("Renderer reported success but '{path}' does not exist")]
    MissingOutput { path: PathBuf },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (panicked task, join failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors reported by a renderer implementation.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No browser executable available.
    #[error("no browser executable available")]
    BrowserNotFound,

    /// The browser process failed to start.
    #[error("failed to launch '{path}': {reason}")]
    Launch { path: PathBuf, reason: String },

    /// The browser exited unsuccessfully or produced nothing.
    #[error("{0}")]
    Failed(String),

    /// I/O while staging the HTML document or writing the artifact.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Md2PdfError {
    /// Attach the output path to a renderer failure.
    pub fn from_render(err: RenderError, output: &std::path::Path) -> Self {
        match err {
            RenderError::BrowserNotFound => Md2PdfError::BrowserNotFound,
            RenderError::Launch { path, reason } => Md2PdfError::BrowserLaunch { path, reason },
            RenderError::Failed(reason) => Md2PdfError::PdfGeneration {
                path: output.to_path_buf(),
                reason,
            },
            RenderError::Io(e) => Md2PdfError::PdfGeneration {
                path: output.to_path_buf(),
                reason: e.to_string(),
            },
        }
    }

    /// Whether this error was raised by task validation (before any
    /// rendering side effects).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Md2PdfError::FileNotFound { .. }
                | Md2PdfError::InvalidFileFormat { .. }
                | Md2PdfError::ThemeNotFound { .. }
                | Md2PdfError::OutputDirUnavailable { .. }
        )
    }
}
