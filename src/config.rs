//! Configuration for the Markdown-to-PDF converter.
//!
//! Every knob lives in [`ConverterConfig`], built through
//! [`ConverterConfigBuilder`]. The struct is plain data (serde derive), so
//! the same value can be persisted to `.md2pdf_config.json`, logged, or
//! shared across tasks.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Md2PdfError;
use crate::pipeline::render::{Margins, RenderOptions};
use crate::theme::DEFAULT_THEME;

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = ".md2pdf_config.json";

/// Hard ceiling on concurrent conversions. Each one holds a browser process.
pub const MAX_CONCURRENCY: usize = 32;

/// Converter configuration.
///
/// # Example
/// ```rust
/// use md2pdf_report::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .theme("enterprise")
///     .concurrency(4)
///     .page_format("Letter")
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Theme for tasks that do not name one. Default: `github`.
    pub theme: String,

    /// Page setup applied to every task unless the task overrides it.
    pub render: RenderOptions,

    /// Maximum tasks in flight in a batch. Default: 3.
    ///
    /// Every running task owns one browser process, so this bounds memory
    /// more than CPU. Range: 1–32.
    pub concurrency: usize,

    /// Directory for generated PDFs. `None` writes next to each source.
    pub output_dir: Option<PathBuf>,

    /// Explicit browser executable. `None` auto-detects.
    pub browser_path: Option<PathBuf>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
            render: RenderOptions::default(),
            concurrency: 3,
            output_dir: None,
            browser_path: None,
        }
    }
}

impl ConverterConfig {
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read a JSON configuration file.
    ///
    /// A missing file yields the defaults. A file that exists but does not
    /// parse also yields the defaults, with a warning, so a hand-edited typo
    /// never blocks a conversion run.
    pub fn load(path: &Path) -> Result<Self, Md2PdfError> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}; using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Md2PdfError::ConfigIo {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        match serde_json::from_str::<ConverterConfig>(&text) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                Ok(config.normalised())
            }
            Err(e) => {
                warn!(
                    "Config file {} is invalid ({}); using defaults",
                    path.display(),
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Write this configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), Md2PdfError> {
        let io_err = |reason: String| Md2PdfError::ConfigIo {
            path: path.to_path_buf(),
            reason,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| io_err(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(e.to_string()))?;
        }
        std::fs::write(path, json + "\n").map_err(|e| io_err(e.to_string()))
    }

    /// Clamp values a file may carry out of range.
    fn normalised(mut self) -> Self {
        self.concurrency = self.concurrency.clamp(1, MAX_CONCURRENCY);
        if self.theme.trim().is_empty() {
            self.theme = DEFAULT_THEME.to_string();
        }
        self
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from disk).
    pub fn from_config(config: ConverterConfig) -> Self {
        Self { config }
    }

    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.config.theme = theme.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn browser_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.browser_path = Some(path.into());
        self
    }

    pub fn render_options(mut self, options: RenderOptions) -> Self {
        self.config.render = options;
        self
    }

    pub fn page_format(mut self, format: impl Into<String>) -> Self {
        self.config.render.page_format = format.into();
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.config.render.margins = margins;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.config.render.scale = scale.clamp(0.1, 2.0);
        self
    }

    pub fn print_background(mut self, v: bool) -> Self {
        self.config.render.print_background = v;
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.render.settle_delay_ms = ms;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, Md2PdfError> {
        let c = &self.config;
        if c.theme.trim().is_empty() {
            return Err(Md2PdfError::InvalidConfig("Theme name must not be empty".into()));
        }
        if c.concurrency == 0 || c.concurrency > MAX_CONCURRENCY {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Concurrency must be 1–{}, got {}",
                MAX_CONCURRENCY, c.concurrency
            )));
        }
        if c.render.page_format.trim().is_empty() {
            return Err(Md2PdfError::InvalidConfig("Page format must not be empty".into()));
        }
        if !(c.render.scale > 0.0 && c.render.scale <= 2.0) {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Scale must be in (0, 2], got {}",
                c.render.scale
            )));
        }
        Ok(self.config)
    }
}
