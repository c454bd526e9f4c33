//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements one transformation step and is testable on
//! its own. All stages except [`render`] are pure string functions.
//!
//! ## Data Flow
//!
//! ```text
//! frontmatter ──▶ classify ──▶ transform ──▶ markup ──▶ anchors ──▶ annotate ──▶ render
//!  (metadata)     (doc type)   (rewrites)    (HTML)     (links)     (classes)    (PDF)
//! ```
//!
//! 1. [`frontmatter`]: split the `---` header block from the body
//! 2. [`classify`]: resolve the document type: override, metadata, or
//!    weighted feature rules
//! 3. [`transform`]: type-specific Markdown rewrites
//! 4. [`markup`]: Markdown → HTML with slug ids, and the final document
//! 5. [`anchors`]: attach missing link targets to headings
//! 6. [`annotate`]: layout-intent classes and content-block wrappers
//! 7. [`render`]: the renderer seam and the headless-browser default

pub mod anchors;
pub mod annotate;
pub mod classify;
pub mod frontmatter;
pub mod markup;
pub mod render;
pub mod transform;
