//! The `analyze` subcommand.

use clap::Args;
use tokio::io::{AsyncWriteExt as _, stdout};

use crate::{
    config::AppConfig,
    criteria::{CriteriaField, CriteriaFields},
    pipeline::{Pipeline, Submission},
    prelude::*,
    submission::Upload,
};

/// Get feedback on a single local file.
#[derive(Args, Debug)]
pub struct AnalyzeOpts {
    /// The problem and answer: a PNG, JPEG or PDF file.
    pub file: PathBuf,

    /// A PDF describing what the feedback should focus on.
    #[clap(long)]
    pub criteria_document: Option<PathBuf>,

    /// The achievement standard being assessed.
    #[clap(long)]
    pub achievement_standard: Option<String>,

    /// The mathematical object under discussion.
    #[clap(long)]
    pub math_object: Option<String>,

    /// The routine the student is expected to use.
    #[clap(long)]
    pub routine: Option<String>,

    /// The narratives the student is expected to endorse.
    #[clap(long)]
    pub narrative: Option<String>,

    /// Anything else the feedback should consider.
    #[clap(long)]
    pub other: Option<String>,

    /// Write the feedback to this file instead of stdout.
    #[clap(short = 'o', long = "output")]
    pub output_path: Option<PathBuf>,

    #[clap(flatten)]
    pub config: AppConfig,
}

impl AnalyzeOpts {
    fn criteria_fields(&self) -> CriteriaFields {
        let values = [
            (CriteriaField::AchievementStandard, &self.achievement_standard),
            (CriteriaField::MathObject, &self.math_object),
            (CriteriaField::Routine, &self.routine),
            (CriteriaField::Narrative, &self.narrative),
            (CriteriaField::Other, &self.other),
        ];
        let mut fields = CriteriaFields::default();
        for (field, value) in values {
            if let Some(value) = value {
                fields.set(field, value.clone());
            }
        }
        fields
    }
}

/// Run the `analyze` subcommand.
///
/// A rejected file is an error. A provider error is not: its message is
/// written out just like feedback would be.
#[instrument(level = "debug", skip_all, fields(file = %opts.file.display()))]
pub async fn cmd_analyze(opts: &AnalyzeOpts) -> Result<()> {
    let pipeline = Pipeline::from_config(&opts.config).await?;

    let problem = Upload::from_path(&opts.file).await?;
    let criteria_document = match &opts.criteria_document {
        Some(path) => Some(Upload::from_path(path).await?),
        None => None,
    };
    let submission = Submission {
        problem: Some(problem),
        criteria_document,
        criteria_fields: opts.criteria_fields(),
    };

    let result = pipeline
        .run(submission)
        .await
        .with_context(|| format!("cannot analyze {:?}", opts.file.display()))?;
    if !result.is_feedback() {
        warn!("No feedback available; writing the error message instead");
    }

    let text = result.text();
    match &opts.output_path {
        Some(path) => tokio::fs::write(path, text)
            .await
            .with_context(|| format!("cannot write {:?}", path.display()))?,
        None => {
            let mut out = stdout();
            out.write_all(text.as_bytes()).await?;
            if !text.ends_with('\n') {
                out.write_all(b"\n").await?;
            }
            out.flush().await?;
        }
    }
    Ok(())
}
