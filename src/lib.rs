//! # md2pdf-report
//!
//! Convert annotated Markdown reports and meeting minutes into print-ready
//! PDF documents.
//!
//! ## What it adds over a plain Markdown renderer
//!
//! - **Document types.** Each document is classified as a work summary,
//!   meeting minutes, or generic, from an explicit override, its front
//!   matter, or weighted feature rules over the body. The type selects
//!   content rewrites and styling hooks.
//! - **Working cross-references.** Hand-written table-of-contents links
//!   rarely match generated heading ids; the anchor resolver attaches every
//!   missing target to the heading it most plausibly means.
//! - **Batch conversion.** Many documents run concurrently under a cap,
//!   each failure is isolated to its own result, and results come back in
//!   submission order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .md
//!  │
//!  ├─ 1. Validate   source, extension, theme, output directory
//!  ├─ 2. Parse      front matter + body
//!  ├─ 3. Classify   override → metadata → feature rules → generic
//!  ├─ 4. Transform  type-specific Markdown rewrites
//!  ├─ 5. Markup     HTML with slug ids, anchors resolved, classes added
//!  └─ 6. Render     headless Chromium --print-to-pdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf_report::{Converter, ConverterConfig, TaskOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::from_config(ConverterConfig::default())?;
//!     let result = converter
//!         .convert_file("weekly.md", None, Some("enterprise"), TaskOptions::default())
//!         .await;
//!     match result.output_path {
//!         Some(pdf) => println!("wrote {}", pdf.display()),
//!         None => eprintln!("failed: {}", result.error_message.unwrap_or_default()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! md2pdf-report = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod scan;
pub mod stream;
pub mod task;
pub mod theme;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterConfig, ConverterConfigBuilder, DEFAULT_CONFIG_FILE};
pub use convert::{Converter, RenderedDocument};
pub use error::{Md2PdfError, RenderError};
pub use pipeline::classify::{classify, resolve_document_type, DocumentType, TypeSource};
pub use pipeline::frontmatter::{FrontMatter, MetaValue, Metadata};
pub use pipeline::render::{ChromiumRenderer, Margins, RenderOptions, Renderer};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use scan::{scan_markdown_files, MarkdownFile};
pub use stream::ResultStream;
pub use task::{BatchSummary, ConversionResult, ConversionTask, TaskOptions, TaskStatus};
pub use theme::{Theme, ThemeRegistry, DEFAULT_THEME, THEME_KEY};
