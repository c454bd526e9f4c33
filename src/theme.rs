//! Theme registry: named print stylesheets.
//!
//! Two themes ship inside the binary (`github`, `enterprise`). More can be
//! loaded from a directory of `.css` files, one theme per file, named after
//! the file stem. An unknown theme name is always an error; there is no
//! silent fallback to a default stylesheet.
//!
//! A document may ask for a theme through its front matter (`theme: name`).
//! That beats the configured default but loses to a theme the caller pinned
//! on the task, see [`Converter::task_for`](crate::Converter::task_for).

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Md2PdfError;

/// Theme used when neither the task nor the configuration names one.
pub const DEFAULT_THEME: &str = "github";

/// Front-matter key naming a document's preferred theme.
pub const THEME_KEY: &str = "theme";

const GITHUB_CSS: &str = include_str!("../themes/github.css");
const ENTERPRISE_CSS: &str = include_str!("../themes/enterprise.css");

/// A named stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub css: String,
}

impl Theme {
    pub fn new(name: impl Into<String>, css: impl Into<String>) -> Self {
        let name = name.into();
        let css = css.into();
        Self {
            display_name: display_name_for(&name),
            description: leading_comment(&css).unwrap_or_default(),
            name,
            css,
        }
    }
}

/// `enterprise-dark` → `Enterprise Dark`.
fn display_name_for(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of a `/* … */` comment at the very top of a stylesheet.
fn leading_comment(css: &str) -> Option<String> {
    let rest = css.trim_start().strip_prefix("/*")?;
    let end = rest.find("*/")?;
    let text = rest[..end].trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Registered themes, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ThemeRegistry {
    themes: BTreeMap<String, Theme>,
}

impl ThemeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in themes.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Theme::new("github", GITHUB_CSS));
        registry.register(Theme::new("enterprise", ENTERPRISE_CSS));
        registry
    }

    /// Add or replace a theme.
    pub fn register(&mut self, theme: Theme) {
        debug!("Registered theme '{}'", theme.name);
        self.themes.insert(theme.name.clone(), theme);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.themes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Theme, Md2PdfError> {
        self.themes
            .get(name)
            .ok_or_else(|| Md2PdfError::ThemeNotFound {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// Theme names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.themes.keys().map(String::as_str).collect()
    }

    pub fn themes(&self) -> impl Iterator<Item = &Theme> {
        self.themes.values()
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    /// Register every `*.css` file in `dir` (not recursive). Returns how many
    /// themes were loaded. A file that cannot be read fails the whole call.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, Md2PdfError> {
        let entries = std::fs::read_dir(dir).map_err(|e| Md2PdfError::ThemeLoad {
            name: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .map_or(false, |ext| ext.eq_ignore_ascii_case("css"))
            })
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!("Skipping theme with non-UTF-8 name: {}", path.display());
                continue;
            };
            let css = std::fs::read_to_string(&path).map_err(|e| Md2PdfError::ThemeLoad {
                name: name.to_string(),
                reason: format!("{}: {}", path.display(), e),
            })?;
            self.register(Theme::new(name, css));
            loaded += 1;
        }
        Ok(loaded)
    }
}
