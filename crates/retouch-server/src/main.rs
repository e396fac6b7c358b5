//! retouch: interactive image adjustment server and one-shot renderer.
//!
//! ```text
//! retouch serve --addr 127.0.0.1:8080
//! retouch render photo.jpg -o out.png --contrast 130 --sharpen1 80
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use retouch_pipeline::{
    Adjustment, DEFAULT_JPEG_QUALITY, OutputFormat, ParameterVector, RenderDiagnostics,
    codec, render_with_diagnostics,
};
use retouch_server::{AppState, DEFAULT_MAX_UPLOAD_BYTES, router};
use retouch_session::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_PIXELS, Editor, EditorConfig,
    StdClock,
};

/// Interactive image adjustment engine with preview, commit and undo.
#[derive(Parser)]
#[command(name = "retouch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the editing API over HTTP.
    Serve(ServeArgs),
    /// Render one image with a parameter set and print diagnostics.
    Render(RenderArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Reject uploads with more pixels than this.
    #[arg(long, default_value_t = DEFAULT_MAX_PIXELS)]
    max_pixels: u64,

    /// Undo depth (0 = unbounded).
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
    history_limit: usize,

    /// Cached renders per session (0 = no cache).
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY)]
    cache_capacity: usize,

    /// Full editor config as a JSON string.
    ///
    /// When provided, `--max-pixels`, `--history-limit` and
    /// `--cache-capacity` are ignored. Missing fields take their
    /// defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// JPEG quality for rendered responses.
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Respond with PNG instead of JPEG.
    #[arg(long)]
    png: bool,

    /// Maximum request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
}

#[derive(Args)]
struct RenderArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Write the rendered image here (PNG if the extension is `.png`,
    /// JPEG otherwise).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Full parameter set as a JSON object.
    ///
    /// When provided, the individual adjustment flags are ignored.
    #[arg(long)]
    params_json: Option<String>,

    #[command(flatten)]
    adjustments: AdjustmentArgs,

    /// JPEG quality for `--output`.
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Reject inputs with more pixels than this.
    #[arg(long, default_value_t = DEFAULT_MAX_PIXELS)]
    max_pixels: u64,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

/// Individual adjustment flags. Unset flags keep their defaults;
/// out-of-range values are clamped.
#[derive(Args)]
struct AdjustmentArgs {
    /// Brightness offset (-100..=100).
    #[arg(long, allow_negative_numbers = true)]
    brightness: Option<i32>,
    /// Contrast percent (50..=300).
    #[arg(long)]
    contrast: Option<i32>,
    /// Gamma x100 (10..=300).
    #[arg(long)]
    gamma: Option<i32>,
    /// Black level (-250..=250).
    #[arg(long, allow_negative_numbers = true)]
    black_level: Option<i32>,
    /// White level (0..=255).
    #[arg(long)]
    white_level: Option<i32>,
    /// Local contrast strength (1..=10).
    #[arg(long)]
    local_contrast: Option<i32>,
    /// Blur kernel size (1..=50).
    #[arg(long)]
    blur: Option<i32>,
    /// Tone curve strength (5..=25).
    #[arg(long)]
    tone_curve: Option<i32>,
    /// Shadow lift (-50..=50).
    #[arg(long, allow_negative_numbers = true)]
    shadows: Option<i32>,
    /// Highlight compression (-50..=50).
    #[arg(long, allow_negative_numbers = true)]
    highlights: Option<i32>,
    /// Fine sharpening percent (0..=300).
    #[arg(long)]
    sharpen1: Option<i32>,
    /// Coarse sharpening percent (0..=300).
    #[arg(long)]
    sharpen2: Option<i32>,
}

impl AdjustmentArgs {
    fn to_params(&self) -> ParameterVector {
        [
            (Adjustment::Brightness, self.brightness),
            (Adjustment::Contrast, self.contrast),
            (Adjustment::Gamma, self.gamma),
            (Adjustment::BlackLevel, self.black_level),
            (Adjustment::WhiteLevel, self.white_level),
            (Adjustment::LocalContrast, self.local_contrast),
            (Adjustment::Blur, self.blur),
            (Adjustment::ToneCurve, self.tone_curve),
            (Adjustment::Shadows, self.shadows),
            (Adjustment::Highlights, self.highlights),
            (Adjustment::Sharpen1, self.sharpen1),
            (Adjustment::Sharpen2, self.sharpen2),
        ]
        .into_iter()
        .filter_map(|(adj, value)| value.map(|v| (adj, v)))
        .fold(ParameterVector::default(), |p, (adj, v)| p.with(adj, v))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve(args) => serve(&args),
        Command::Render(args) => render(&args),
    }
}

/// Build an [`EditorConfig`] from serve arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored.
fn editor_config(args: &ServeArgs) -> Result<EditorConfig> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).context("parsing --config-json");
    }
    Ok(EditorConfig {
        max_pixels: args.max_pixels,
        history_limit: args.history_limit,
        cache_capacity: args.cache_capacity,
    })
}

fn serve(args: &ServeArgs) -> Result<()> {
    let config = editor_config(args)?;
    let format = if args.png {
        OutputFormat::Png
    } else {
        OutputFormat::Jpeg {
            quality: args.jpeg_quality,
        }
    };
    let state = AppState::new(Arc::new(Editor::new(config)), format);
    let app = router(state, args.max_upload_bytes);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;
    let addr = args.addr;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        tracing::info!(%addr, ?config, ?format, "listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("serving HTTP")
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Parameters from `--params-json` or the individual flags.
fn params_from_args(args: &RenderArgs) -> Result<ParameterVector> {
    if let Some(ref json) = args.params_json {
        return serde_json::from_str(json).context("parsing --params-json");
    }
    Ok(args.adjustments.to_params())
}

fn output_format(path: &Path, jpeg_quality: u8) -> OutputFormat {
    let is_png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    if is_png {
        OutputFormat::Png
    } else {
        OutputFormat::Jpeg {
            quality: jpeg_quality,
        }
    }
}

fn render(args: &RenderArgs) -> Result<()> {
    let params = params_from_args(args)?;
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let original = codec::decode(&bytes, args.max_pixels)
        .with_context(|| format!("decoding {}", args.input.display()))?;

    eprintln!("Image: {} ({} bytes)", args.input.display(), bytes.len());
    eprintln!("Params: {params:?}");
    eprintln!("Runs: {}", args.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(args.runs);
    for run in 0..args.runs {
        if args.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, args.runs);
        }
        let (rendered, diagnostics) = render_with_diagnostics(&original, &params, &StdClock)?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        } else {
            println!("{}", diagnostics.report());
        }

        // Write the image on the first run only.
        if run == 0
            && let Some(ref path) = args.output
        {
            let encoded = codec::encode(&rendered, output_format(path, args.jpeg_quality))?;
            std::fs::write(path, &encoded)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Image written to {} ({} bytes)", path.display(), encoded.len());
        }

        all_diagnostics.push(diagnostics);
        if args.runs > 1 {
            eprintln!();
        }
    }

    if args.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }
    Ok(())
}

/// Print min/mean/max total duration across runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all: &[RenderDiagnostics]) {
    let totals: Vec<f64> = all
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();
    let min = totals.iter().copied().fold(f64::INFINITY, f64::min);
    let max = totals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = totals.iter().sum::<f64>() / totals.len() as f64;

    println!("\nSummary over {} runs", totals.len());
    println!("{}", "=".repeat(40));
    println!("Total: min {min:.3}ms  mean {mean:.3}ms  max {max:.3}ms");
}
