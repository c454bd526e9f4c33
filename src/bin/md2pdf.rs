//! CLI binary for md2pdf-report.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConverterConfig` and `ConversionTask`s and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2pdf_report::pipeline::render::detect_browser;
use md2pdf_report::{
    scan_markdown_files, BatchSummary, ChromiumRenderer, ConversionProgressCallback,
    ConversionResult, ConversionTask, Converter, ConverterConfig, DocumentType, ProgressCallback,
    TaskOptions, ThemeRegistry, DEFAULT_CONFIG_FILE, THEME_KEY,
};
use md2pdf_report::config::ConverterConfigBuilder;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished document. Documents
/// finish out of order when the batch runs concurrently.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} files  \
                 ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total} document(s)…"))
        ));
    }

    fn on_task_start(&self, index: usize, _total: usize, source: &Path) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(file_name(source));
    }

    fn on_task_complete(&self, index: usize, _total: usize, result: &ConversionResult) {
        let secs = self.elapsed_secs(index);
        let kind = result.doc_type.map(|t| t.to_string()).unwrap_or_default();
        self.bar.println(format!(
            "  {} {:<32}  {:<16}  {}",
            green("✓"),
            file_name(result.source()),
            dim(&kind),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_task_error(&self, index: usize, _total: usize, source: &Path, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let first_line = error.lines().next().unwrap_or(error);
        let msg: String = if first_line.chars().count() > 80 {
            first_line.chars().take(79).chain(['…']).collect()
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            red("✗"),
            file_name(source),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _summary: &BatchSummary) {
        self.bar.finish_and_clear();
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one report next to its source
  md2pdf weekly.md

  # Choose theme and destination
  md2pdf weekly.md -t enterprise -o out/weekly.pdf

  # Convert every .md file in the current directory, 4 at a time
  md2pdf --all -c 4

  # Convert a folder tree into a separate output directory
  md2pdf docs/ --recursive -o pdf/

  # Force the document type instead of detecting it
  md2pdf notes.md --type meeting-minutes

  # Inspect the generated HTML instead of printing
  md2pdf weekly.md --html

  # Machine-readable results
  md2pdf --all --json > results.json

DOCUMENT TYPES:
  work-summary      Work summaries and status reports
  meeting-minutes   Meeting minutes
  generic           Everything else

  The type comes from --type, else a `doc_type:` front-matter key, else
  keyword rules over the body.

ENVIRONMENT VARIABLES:
  MD2PDF_BROWSER              Browser executable (Chrome, Chromium or Edge)
  PUPPETEER_EXECUTABLE_PATH   Also honoured as a browser path
  MD2PDF_THEME                Default theme
  MD2PDF_CONCURRENCY          Default concurrency
  RUST_LOG                    Log filter (overrides -v / -q)
"#;

/// Convert annotated Markdown reports to print-ready PDF.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert annotated Markdown reports and meeting minutes to PDF",
    long_about = "Convert Markdown work summaries, meeting minutes and other reports into \
print-ready PDF documents using a headless Chromium-family browser. Documents are classified, \
cross-references are repaired, and batches run concurrently.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown files or directories to convert.
    inputs: Vec<PathBuf>,

    /// Output file (single input) or directory (several inputs).
    #[arg(short, long, env = "MD2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Theme name (see --list-themes); beats `theme:` in front matter.
    #[arg(short, long, env = "MD2PDF_THEME")]
    theme: Option<String>,

    /// Force the document type instead of detecting it.
    #[arg(long = "type", value_enum)]
    doc_type: Option<DocTypeArg>,

    /// Convert every .md file in the given directory (default: current).
    #[arg(long)]
    all: bool,

    /// Descend into subdirectories when scanning.
    #[arg(long)]
    recursive: bool,

    /// Number of documents converted at once.
    #[arg(short, long, env = "MD2PDF_CONCURRENCY")]
    concurrency: Option<usize>,

    /// List available themes and exit.
    #[arg(long)]
    list_themes: bool,

    /// Load additional .css themes from this directory.
    #[arg(long, env = "MD2PDF_THEME_DIR")]
    theme_dir: Option<PathBuf>,

    /// Report the detected browser and exit.
    #[arg(long)]
    check: bool,

    /// Write the generated HTML instead of a PDF.
    #[arg(long)]
    html: bool,

    /// Configuration file (default: ./.md2pdf_config.json).
    #[arg(long, env = "MD2PDF_CONFIG")]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config file and exit.
    #[arg(long)]
    save_config: bool,

    /// Browser executable (overrides detection).
    #[arg(long)]
    browser: Option<PathBuf>,

    /// Run the browser without its sandbox (containers running as root).
    #[arg(long, env = "MD2PDF_NO_SANDBOX")]
    no_sandbox: bool,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DocTypeArg {
    WorkSummary,
    MeetingMinutes,
    Generic,
}

impl From<DocTypeArg> for DocumentType {
    fn from(v: DocTypeArg) -> Self {
        match v {
            DocTypeArg::WorkSummary => DocumentType::WorkSummary,
            DocTypeArg::MeetingMinutes => DocumentType::MeetingMinutes,
            DocTypeArg::Generic => DocumentType::Generic,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v brings them back.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Configuration ────────────────────────────────────────────────────
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let file_config = ConverterConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let config = build_config(&cli, file_config)?;

    if cli.save_config {
        config
            .save(&config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        if !cli.quiet {
            eprintln!("{} saved {}", green("✔"), config_path.display());
        }
        return Ok(());
    }

    let mut themes = ThemeRegistry::with_builtins();
    if let Some(ref dir) = cli.theme_dir {
        let n = themes
            .load_dir(dir)
            .with_context(|| format!("Failed to load themes from {}", dir.display()))?;
        tracing::info!("Loaded {} theme(s) from {}", n, dir.display());
    }

    // ── Informational modes ──────────────────────────────────────────────
    if cli.list_themes {
        for theme in themes.themes() {
            let marker = if theme.name == config.theme { "*" } else { " " };
            println!(
                "{marker} {:<14} {:<14} {}",
                theme.name,
                theme.display_name,
                dim(&theme.description)
            );
        }
        return Ok(());
    }

    if cli.check {
        match detect_browser(config.browser_path.as_deref()) {
            Some(path) => {
                println!("{} browser: {}", green("✔"), path.display());
                return Ok(());
            }
            None => {
                eprintln!(
                    "{} no Chromium, Chrome or Edge found; set MD2PDF_BROWSER",
                    red("✘")
                );
                std::process::exit(1);
            }
        }
    }

    // ── Collect sources ──────────────────────────────────────────────────
    let sources = collect_sources(&cli)?;
    if sources.is_empty() {
        bail!("No Markdown files to convert (pass files, a directory, or --all)");
    }

    let mut options = TaskOptions {
        doc_type: cli.doc_type.map(Into::into),
        ..TaskOptions::default()
    };
    // -t beats a theme named in front matter.
    if let Some(ref theme) = cli.theme {
        options.metadata.insert(THEME_KEY, theme.as_str());
    }

    // ── HTML-only mode ───────────────────────────────────────────────────
    if cli.html {
        let placeholder = config
            .browser_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("chromium"));
        let converter = Converter::new(
            config.clone(),
            themes,
            Arc::new(ChromiumRenderer::new(placeholder)),
        );
        let theme = config.theme.clone();
        for source in &sources {
            let dest = html_destination(&cli, &config, source, sources.len());
            let doc = converter
                .render_html(source, &theme, &options)
                .await
                .with_context(|| format!("Failed to build HTML for {}", source.display()))?;
            if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&dest, &doc.html)
                .await
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{} {} → {}  {}",
                    green("✓"),
                    source.display(),
                    bold(&dest.display().to_string()),
                    dim(&doc.doc_type.to_string())
                );
            }
        }
        return Ok(());
    }

    // ── Convert ──────────────────────────────────────────────────────────
    let mut renderer = ChromiumRenderer::detect(config.browser_path.as_deref())
        .context("No headless browser available (run with --check)")?;
    if cli.no_sandbox {
        renderer = renderer.without_sandbox();
    }

    let mut converter = Converter::new(config.clone(), themes, Arc::new(renderer));
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        converter = converter.with_progress(cb);
    }

    let tasks: Vec<ConversionTask> = sources
        .iter()
        .map(|s| {
            let dest = pdf_destination(&cli, sources.len());
            converter.task_for(s.clone(), dest, cli.theme.as_deref(), options.clone())
        })
        .collect();

    let results = converter.convert_batch(tasks, config.concurrency).await;
    let summary = Converter::summarize(&results);

    if cli.json {
        let out = serde_json::json!({ "summary": summary, "results": results });
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("Failed to serialise results")?
        );
    } else if !cli.quiet {
        print_report(&results, &summary, show_progress);
    }

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

/// Layer CLI flags over the loaded configuration file.
fn build_config(cli: &Cli, base: ConverterConfig) -> Result<ConverterConfig> {
    let mut builder = ConverterConfigBuilder::from_config(base);
    if let Some(ref theme) = cli.theme {
        builder = builder.theme(theme.clone());
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(ref browser) = cli.browser {
        builder = builder.browser_path(browser.clone());
    }
    // Several inputs: -o names the output directory.
    if let Some(ref out) = cli.output {
        if !names_single_file(cli, out) {
            builder = builder.output_dir(out.clone());
        }
    }
    builder.build().context("Invalid configuration")
}

/// Whether `-o` names a file rather than a directory: exactly one explicit
/// input and an output path with a file extension.
fn names_single_file(cli: &Cli, out: &Path) -> bool {
    !cli.all
        && cli.inputs.len() == 1
        && cli.inputs[0].extension().is_some()
        && out.extension().is_some()
        && !out.is_dir()
}

fn pdf_destination(cli: &Cli, count: usize) -> Option<PathBuf> {
    match cli.output {
        Some(ref out) if count == 1 && names_single_file(cli, out) => Some(out.clone()),
        _ => None,
    }
}

fn html_destination(cli: &Cli, config: &ConverterConfig, source: &Path, count: usize) -> PathBuf {
    if let Some(ref out) = cli.output {
        if count == 1 && names_single_file(cli, out) {
            return out.clone();
        }
    }
    let stem = source.file_stem().unwrap_or_default();
    match config.output_dir {
        Some(ref dir) => dir.join(Path::new(stem).with_extension("html")),
        None => source.with_extension("html"),
    }
}

/// Expand directories (and `--all`) into Markdown files; keep explicit
/// files as given so validation can report them.
fn collect_sources(cli: &Cli) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();

    if cli.all && cli.inputs.is_empty() {
        let cwd = std::env::current_dir().context("Cannot read current directory")?;
        sources.extend(scan(&cwd, cli.recursive)?);
    }

    for input in &cli.inputs {
        if input.is_dir() {
            sources.extend(scan(input, cli.recursive)?);
        } else {
            sources.push(input.clone());
        }
    }
    Ok(sources)
}

fn scan(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let files = scan_markdown_files(dir, recursive)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;
    Ok(files.into_iter().map(|f| f.path).collect())
}

fn print_report(results: &[ConversionResult], summary: &BatchSummary, progress_shown: bool) {
    // Without the bar nobody has seen per-file lines yet.
    if !progress_shown {
        for r in results {
            match (&r.output_path, &r.error_message) {
                (Some(out), _) => eprintln!(
                    "  {} {} → {}  {}",
                    green("✓"),
                    r.source().display(),
                    out.display(),
                    dim(&format!("{} ms", r.duration_ms))
                ),
                (None, msg) => eprintln!(
                    "  {} {}  {}",
                    red("✗"),
                    r.source().display(),
                    red(msg.as_deref().unwrap_or("failed"))
                ),
            }
        }
    }

    if summary.all_succeeded() {
        eprintln!(
            "{} {} document(s) converted  {}",
            green("✔"),
            bold(&summary.succeeded.to_string()),
            dim(&format!("{} ms", summary.total_duration_ms))
        );
    } else {
        eprintln!(
            "{} {}/{} document(s) converted  ({} failed)",
            if summary.succeeded == 0 { red("✘") } else { cyan("⚠") },
            bold(&summary.succeeded.to_string()),
            summary.total,
            red(&summary.failed.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_destination_only_names_a_single_file() {
        let cli = Cli::try_parse_from(["md2pdf", "weekly.md", "-o", "out/weekly.pdf"]).unwrap();
        assert_eq!(pdf_destination(&cli, 1), Some(PathBuf::from("out/weekly.pdf")));

        let cli = Cli::try_parse_from(["md2pdf", "a.md", "b.md", "-o", "pdf"]).unwrap();
        assert_eq!(pdf_destination(&cli, 2), None);
    }
}
