use std::io;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::prelude::*;

mod async_utils;
mod cmd;
mod config;
mod cpu_limit;
mod criteria;
mod drivers;
mod extract;
mod feedback;
mod pipeline;
mod prelude;
mod prompt;
mod server;
mod submission;

/// Feedback on student math submissions.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - GOOGLE_API_KEY: The key for the LLM provider.
  - FEEDBACK_DRIVER, FEEDBACK_MODEL, FEEDBACK_API_BASE (optional): Choose
    the LLM driver, model and server.
  - FEEDBACK_PROMPT (optional): A TOML file overriding the built-in prompt.
  - OCR_LANGUAGES (optional): Tesseract languages, default "kor+eng".
  - HOST, PORT (optional): Where `serve` listens.

  These variables may be set in a standard `.env` file.

External Tools:
  - tesseract (with the requested language data) for PNG and JPEG files.
  - pdftotext (from Poppler) for PDF files.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Accept submissions over HTTP.
    Serve(cmd::serve::ServeOpts),
    /// Get feedback on a single local file.
    Analyze(cmd::analyze::AnalyzeOpts),
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing.
    let directive: Directive = "info".parse()?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    // stdout is reserved for `analyze` output.
    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(io::stderr)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(subscriber).init();

    real_main().await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main() -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Run the appropriate subcommand.
    match &opts.subcmd {
        Cmd::Serve(opts) => cmd::serve::cmd_serve(opts).await?,
        Cmd::Analyze(opts) => cmd::analyze::cmd_analyze(opts).await?,
    }
    Ok(())
}
