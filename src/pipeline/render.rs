//! HTML → PDF rendering.
//!
//! The [`Renderer`] trait is the seam between the document pipeline and
//! whatever actually lays out pages. The default [`ChromiumRenderer`] drives
//! a headless Chromium-family browser (Chrome, Chromium or Edge) through its
//! `--print-to-pdf` command-line mode, so no browser automation protocol or
//! bundled browser is required.
//!
//! ## Page setup
//!
//! Paper size, margins, scale and background printing are expressed as
//! print CSS ([`RenderOptions::print_css`]) embedded in the document, which
//! Chromium honours when printing. The settle delay gives late layout work
//! (web fonts, images) time to finish and is passed to the browser as its
//! virtual-time budget.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::RenderError;
use crate::task::TaskOptions;

/// Environment variables checked for an explicit browser executable.
pub const BROWSER_ENV_VARS: &[&str] = &["MD2PDF_BROWSER", "PUPPETEER_EXECUTABLE_PATH"];

/// Executable names looked up on `PATH`, in order.
pub const BROWSER_NAMES: &[&str] = &[
    "google-chrome",
    "chrome",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
    "msedge",
];

#[cfg(target_os = "macos")]
const WELL_KNOWN_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(target_os = "windows")]
const WELL_KNOWN_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const WELL_KNOWN_PATHS: &[&str] = &[];

// ── Options ──────────────────────────────────────────────────────────────

/// Page margins as CSS lengths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: "20mm".into(),
            right: "15mm".into(),
            bottom: "20mm".into(),
            left: "15mm".into(),
        }
    }
}

impl Margins {
    /// Same length on every side.
    pub fn uniform(len: impl Into<String>) -> Self {
        let len = len.into();
        Self {
            top: len.clone(),
            right: len.clone(),
            bottom: len.clone(),
            left: len,
        }
    }

    /// CSS shorthand in `top right bottom left` order.
    pub fn to_css(&self) -> String {
        format!("{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}

/// Page setup for one rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// CSS page size keyword (`A4`, `Letter`, `A3`, …). Default: `A4`.
    pub page_format: String,
    pub margins: Margins,
    /// Content zoom factor. Default: 1.0.
    pub scale: f32,
    /// Print background colours and images. Default: true.
    pub print_background: bool,
    /// Time given to layout before printing, in milliseconds. Default: 3000.
    pub settle_delay_ms: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_format: "A4".into(),
            margins: Margins::default(),
            scale: 1.0,
            print_background: true,
            settle_delay_ms: 3000,
        }
    }
}

impl RenderOptions {
    /// Apply per-task overrides on top of these options.
    pub fn merged(&self, overrides: &TaskOptions) -> RenderOptions {
        RenderOptions {
            page_format: overrides
                .page_format
                .clone()
                .unwrap_or_else(|| self.page_format.clone()),
            margins: overrides
                .margins
                .clone()
                .unwrap_or_else(|| self.margins.clone()),
            scale: overrides.scale.unwrap_or(self.scale),
            print_background: overrides.print_background.unwrap_or(self.print_background),
            settle_delay_ms: self.settle_delay_ms,
        }
    }

    /// Print CSS that realises these options inside the document.
    pub fn print_css(&self) -> String {
        let mut css = format!(
            "@page {{ size: {}; margin: {}; }}\n",
            self.page_format,
            self.margins.to_css()
        );
        if self.print_background {
            css.push_str(
                "html { -webkit-print-color-adjust: exact; print-color-adjust: exact; }\n",
            );
        }
        if (self.scale - 1.0).abs() > f32::EPSILON {
            css.push_str(&format!("body {{ zoom: {}; }}\n", self.scale));
        }
        css
    }
}

// ── Renderer seam ────────────────────────────────────────────────────────

/// Turns a complete HTML document into a PDF file.
///
/// Implementations must write the artifact to `output` and return `Ok` only
/// once it is on disk. They are shared across concurrent tasks.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "renderer"
    }

    async fn render(
        &self,
        html: &str,
        output: &Path,
        options: &RenderOptions,
    ) -> Result<(), RenderError>;
}

// ── Browser discovery ────────────────────────────────────────────────────

/// Locate a Chromium-family browser.
///
/// Order: `configured` → [`BROWSER_ENV_VARS`] → well-known install paths →
/// [`BROWSER_NAMES`] on `PATH`.
pub fn detect_browser(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!("Configured browser '{}' does not exist; searching", path.display());
    }

    for var in BROWSER_ENV_VARS {
        if let Ok(value) = std::env::var(var) {
            let path = PathBuf::from(value.trim());
            if !value.trim().is_empty() && path.is_file() {
                debug!("Browser from {}: {}", var, path.display());
                return Some(path);
            }
        }
    }

    if let Some(path) = WELL_KNOWN_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
    {
        return Some(path);
    }

    BROWSER_NAMES.iter().find_map(|name| which::which(name).ok())
}

// ── Chromium renderer ────────────────────────────────────────────────────

/// Characters escaped when turning a filesystem path into a `file://` URL.
const PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub(crate) fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let raw = if raw.starts_with('/') {
        raw
    } else {
        format!("/{raw}")
    };
    format!("file://{}", utf8_percent_encode(&raw, PATH_ESCAPES))
}

/// `file://` URL of a directory, with the trailing slash a `<base>` needs.
pub(crate) fn dir_url(dir: &Path) -> String {
    let mut url = file_url(dir);
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Headless Chromium/Chrome/Edge driven through `--print-to-pdf`.
#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    executable: PathBuf,
    sandbox: bool,
    timeout: Duration,
}

impl ChromiumRenderer {
    /// Hard limit on one browser run, on top of the settle delay.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            sandbox: true,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Build a renderer around the first browser [`detect_browser`] finds.
    pub fn detect(configured: Option<&Path>) -> Result<Self, RenderError> {
        let exe = detect_browser(configured).ok_or(RenderError::BrowserNotFound)?;
        info!("Using browser: {}", exe.display());
        Ok(Self::new(exe))
    }

    /// Pass `--no-sandbox` (needed when running as root in containers).
    pub fn without_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn args(&self, page_url: &str, output: &Path, options: &RenderOptions) -> Vec<String> {
        let mut args = vec![
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-extensions".to_string(),
            "--run-all-compositor-stages-before-draw".to_string(),
            "--no-pdf-header-footer".to_string(),
            "--print-to-pdf-no-header".to_string(),
            format!("--virtual-time-budget={}", options.settle_delay_ms),
            format!("--print-to-pdf={}", output.display()),
        ];
        if !self.sandbox {
            args.push("--no-sandbox".to_string());
        }
        args.push(page_url.to_string());
        args
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn render(
        &self,
        html: &str,
        output: &Path,
        options: &RenderOptions,
    ) -> Result<(), RenderError> {
        let staged = tempfile::Builder::new()
            .prefix(".md2pdf_")
            .suffix(".html")
            .tempfile()?;
        tokio::fs::write(staged.path(), html).await?;

        // A stale artifact must not satisfy the output check below.
        if tokio::fs::metadata(output).await.is_ok() {
            tokio::fs::remove_file(output).await?;
        }

        let args = self.args(&file_url(staged.path()), output, options);
        debug!("{} {}", self.executable.display(), args.join(" "));

        let mut cmd = tokio::process::Command::new(&self.executable);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = cmd.output();

        let budget = self.timeout + Duration::from_millis(options.settle_delay_ms);
        let out = match tokio::time::timeout(budget, child).await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => {
                return Err(RenderError::Launch {
                    path: self.executable.clone(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(RenderError::Failed(format!(
                    "browser did not finish within {}s",
                    budget.as_secs()
                )))
            }
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let last = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(RenderError::Failed(format!(
                "browser exited with {}: {}",
                out.status, last
            )));
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(RenderError::Failed("browser produced no PDF".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let o = RenderOptions::default();
        assert_eq!(o.page_format, "A4");
        assert_eq!(o.margins.to_css(), "20mm 15mm 20mm 15mm");
        assert_eq!(o.scale, 1.0);
        assert!(o.print_background);
        assert_eq!(o.settle_delay_ms, 3000);
    }

    #[test]
    fn test_task_overrides_take_precedence() {
        let base = RenderOptions::default();
        let overrides = TaskOptions {
            page_format: Some("Letter".into()),
            scale: Some(0.8),
            ..TaskOptions::default()
        };
        let merged = base.merged(&overrides);
        assert_eq!(merged.page_format, "Letter");
        assert_eq!(merged.scale, 0.8);
        assert_eq!(merged.margins, base.margins);
        assert!(merged.print_background);
    }

    #[test]
    fn test_print_css() {
        let css = RenderOptions::default().print_css();
        assert!(css.contains("@page { size: A4; margin: 20mm 15mm 20mm 15mm; }"));
        assert!(css.contains("print-color-adjust: exact"));
        assert!(!css.contains("zoom"));

        let css = RenderOptions {
            scale: 0.9,
            print_background: false,
            margins: Margins::uniform("1in"),
            ..RenderOptions::default()
        }
        .print_css();
        assert!(css.contains("margin: 1in 1in 1in 1in"));
        assert!(css.contains("zoom: 0.9"));
        assert!(!css.contains("print-color-adjust"));
    }

    #[test]
    fn test_file_url_escapes_spaces() {
        let url = file_url(Path::new("/tmp/my reports/a#1.html"));
        assert_eq!(url, "file:///tmp/my%20reports/a%231.html");
    }

    #[test]
    fn test_dir_url_ends_with_slash() {
        assert_eq!(dir_url(Path::new("/docs/q3")), "file:///docs/q3/");
        assert_eq!(dir_url(Path::new("/docs/q3/")), "file:///docs/q3/");
    }

    #[test]
    fn test_detect_prefers_configured_path() {
        let fake = tempfile::NamedTempFile::new().unwrap();
        let found = detect_browser(Some(fake.path()));
        assert_eq!(found.as_deref(), Some(fake.path()));
    }

    #[test]
    fn test_args_include_output_and_budget() {
        let r = ChromiumRenderer::new("/usr/bin/chromium").without_sandbox();
        let args = r.args("file:///tmp/a.html", Path::new("/tmp/a.pdf"), &RenderOptions::default());
        assert!(args.contains(&"--print-to-pdf=/tmp/a.pdf".to_string()));
        assert!(args.contains(&"--virtual-time-budget=3000".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("file:///tmp/a.html"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let r = ChromiumRenderer::new(dir.path().join("no-such-browser"));
        let err = r
            .render("<html></html>", &dir.path().join("out.pdf"), &RenderOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Launch { .. }), "{err:?}");
    }
}
