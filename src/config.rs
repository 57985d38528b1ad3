//! Process configuration, shared by every subcommand.

use clap::Args;

use crate::{drivers::LlmOpts, extract::ExtractorOpts, prelude::*};

/// Everything needed to build a [`Pipeline`](crate::pipeline::Pipeline).
///
/// This is parsed once at startup, from the command line and environment
/// (including any `.env` file).
#[derive(Args, Clone, Debug, Default)]
pub struct AppConfig {
    /// A TOML prompt file to use instead of the built-in prompt. It must
    /// define `system`, `problem` and `criteria`.
    #[clap(long, env = "FEEDBACK_PROMPT")]
    pub prompt: Option<PathBuf>,

    #[clap(flatten)]
    pub llm: LlmOpts,

    #[clap(flatten)]
    pub extractor: ExtractorOpts,
}
