//! CLI binary for pdf2md-studio.
//!
//! Drives one conversion session from the terminal: select a PDF, convert it,
//! then save the Markdown and/or the styled Word document.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use pdf2md_studio::{
    ConversionOrchestrator, ConversionProgressCallback, Downloader, ExportTarget,
    ExtractionConfig, FileDescriptor, Locale, Localizer, ProgressCallback, SourceFile,
    StudioConfig, StudioError, StylePresetId,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
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

fn spinner(prefix: &'static str, message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS),
    );
    bar.set_prefix(prefix);
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

// ── Progress bar fed by the estimator ────────────────────────────────────────

/// Percentage bar driven by [`ConversionProgressCallback`].
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.set_draw_target(ProgressDrawTarget::hidden());
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, file: &FileDescriptor) {
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {} {}",
            cyan("◆"),
            bold(file.name.as_deref().unwrap_or("<unnamed>")),
            dim(&format!("({:.1} KiB)", file.size as f64 / 1024.0)),
        ));
    }

    fn on_progress(&self, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }

    fn on_conversion_complete(&self, markdown_len: usize) {
        self.bar.set_position(100);
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} chars of Markdown",
            green("✔"),
            bold(&markdown_len.to_string())
        );
    }

    fn on_conversion_error(&self, _error: &str) {
        self.bar.abandon();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert and save report.md + report.doc in the current directory
  pdf2md-studio report.pdf

  # Word document only, academic look, into ./out
  pdf2md-studio --format doc --preset academic -o out report.pdf

  # Markdown to stdout
  pdf2md-studio --stdout report.pdf > report.md

  # HTML preview of the converted Markdown
  pdf2md-studio --preview report.pdf > preview.html

  # List the export style presets
  pdf2md-studio --list-presets

LIMITS:
  Only application/pdf files up to 10 MiB are accepted.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_DYNAMIC_LIB_PATH Directory holding libpdfium
"#;

/// Convert a PDF to Markdown and export it as .md or a styled .doc.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md-studio",
    version,
    about = "Convert a PDF to Markdown and export it as .md or a styled Word document",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to convert.
    #[arg(required_unless_present = "list_presets")]
    input: Option<PathBuf>,

    /// What to save: md, doc or both.
    #[arg(short, long, env = "PDF2MD_STUDIO_FORMAT", value_enum, default_value = "both")]
    format: FormatArg,

    /// Style preset for the Word document.
    #[arg(long, env = "PDF2MD_STUDIO_PRESET", default_value = "classic")]
    preset: StylePresetId,

    /// Language of user-facing messages (en, zh-Hans, zh-Hant, de, fr, ...).
    #[arg(long, env = "PDF2MD_STUDIO_LOCALE", default_value = "en")]
    locale: Locale,

    /// Directory to save exports into.
    #[arg(short, long = "output-dir", env = "PDF2MD_STUDIO_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Print the Markdown to stdout instead of saving files.
    #[arg(long, conflicts_with = "preview")]
    stdout: bool,

    /// Print the HTML preview to stdout instead of saving files.
    #[arg(long)]
    preview: bool,

    /// List the style presets and exit.
    #[arg(long)]
    list_presets: bool,

    /// Print a JSON summary of the session and saved files on stdout.
    #[arg(long, env = "PDF2MD_STUDIO_JSON", conflicts_with_all = ["stdout", "preview"])]
    json: bool,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent VLM calls.
    #[arg(short, long, env = "PDF2MD_STUDIO_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Retries per page on LLM failure.
    #[arg(long, env = "PDF2MD_STUDIO_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Longest rendered page edge in pixels.
    #[arg(long, env = "PDF2MD_STUDIO_MAX_PIXELS", default_value_t = 2000,
          value_parser = clap::value_parser!(u32).range(100..=8000))]
    max_pixels: u32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2MD_STUDIO_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Directory holding libpdfium.
    #[arg(long, env = "PDFIUM_DYNAMIC_LIB_PATH")]
    pdfium_path: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "PDF2MD_STUDIO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2MD_STUDIO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2MD_STUDIO_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Md,
    Doc,
    Both,
}

impl FormatArg {
    fn targets(self) -> &'static [ExportTarget] {
        match self {
            FormatArg::Md => &[ExportTarget::MarkdownText],
            FormatArg::Doc => &[ExportTarget::WordDocument],
            FormatArg::Both => &[ExportTarget::MarkdownText, ExportTarget::WordDocument],
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let show_progress = !cli.quiet && !cli.no_progress;
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

    let l10n = Localizer::default();
    if let Err(err) = run(&cli, &l10n, show_progress).await {
        match err.downcast_ref::<StudioError>() {
            Some(studio) => eprintln!("{} {}", red("✘"), studio.user_message(&l10n)),
            None => eprintln!("{} {err:#}", red("✘")),
        }
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, l10n: &Localizer, show_progress: bool) -> Result<()> {
    if cli.list_presets {
        for id in StylePresetId::ALL {
            let preset = id.preset();
            println!(
                "{:<10} {:<10} {}",
                bold(id.as_str()),
                preset.page.size,
                dim(preset.description)
            );
        }
        return Ok(());
    }

    let Some(input) = cli.input.as_ref() else {
        anyhow::bail!("No input file given");
    };

    let progress: Option<Arc<CliProgressCallback>> = show_progress.then(CliProgressCallback::new);
    let config = build_config(cli, progress.clone().map(|p| p as ProgressCallback)).await?;
    l10n.set_locale(config.locale);
    if let Some(cb) = &progress {
        cb.bar.set_prefix(l10n.t("converting").into_owned());
    }
    let downloader = Downloader::new(
        config
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".")),
    );

    let mut studio = ConversionOrchestrator::with_vlm(config);
    let file = SourceFile::from_path(input).await?;
    studio.select_file(file)?;

    let loading = show_progress.then(|| spinner("Engine", l10n.t("loadingEngine").into_owned()));
    let prepared = studio.prepare().await;
    if let Some(bar) = loading {
        bar.finish_and_clear();
    }
    prepared?;

    studio.convert().await?;
    let Some(markdown) = studio.markdown() else {
        anyhow::bail!("Conversion finished without Markdown");
    };

    if cli.stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(markdown.as_bytes())
            .context("Failed to write to stdout")?;
        return Ok(());
    }

    if cli.preview {
        let html = studio.render_preview()?.to_html();
        io::stdout()
            .lock()
            .write_all(html.as_bytes())
            .context("Failed to write to stdout")?;
        return Ok(());
    }

    let mut saved_files = Vec::new();
    for &target in cli.format.targets() {
        let payload = studio.export(target, Some(cli.preset))?;
        let saved = downloader.save(&payload).await?;
        saved_files.push(serde_json::json!({
            "target": target.as_str(),
            "path": saved.path.display().to_string(),
            "bytes": saved.bytes,
            "mime_type": saved.mime_type,
        }));
        if !cli.quiet && !cli.json {
            eprintln!(
                "{} {} {}  {}",
                green("✔"),
                l10n.t("savedTo"),
                bold(&saved.path.display().to_string()),
                dim(&format!("{} bytes, {}", saved.bytes, saved.mime_type)),
            );
        }
    }

    if cli.json {
        let summary = serde_json::json!({
            "session": studio.snapshot(),
            "structure": studio.render_preview()?.summary(),
            "preset": cli.preset,
            "exports": saved_files,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    }

    Ok(())
}

/// Map CLI args to `StudioConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<StudioConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut extraction = ExtractionConfig::default()
        .with_concurrency(cli.concurrency)
        .with_max_retries(cli.max_retries)
        .with_max_rendered_pixels(cli.max_pixels);
    extraction.model = cli.model.clone();
    extraction.provider_name = cli.provider.clone();
    extraction.system_prompt = system_prompt;
    extraction.pdfium_library_path = cli.pdfium_path.clone();

    let mut builder = StudioConfig::builder()
        .default_preset(cli.preset)
        .locale(cli.locale)
        .extraction(extraction);
    if let Some(dir) = &cli.output_dir {
        builder = builder.output_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
