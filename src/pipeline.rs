//! The submission-to-feedback pipeline.
//!
//! 1. Check the uploaded file's type, rejecting anything we can't read.
//! 2. Extract the answer text.
//! 3. Collect any feedback criteria.
//! 4. Build the prompt.
//! 5. Ask the LLM.
//!
//! Only step 1 can fail. Everything after that produces text for the student,
//! even if the text is an error message.

use tracing::Span;

use crate::{
    config::AppConfig,
    criteria::{CriteriaFields, aggregate_criteria},
    extract::Extractor,
    feedback::{FeedbackProvider, FeedbackResult},
    prelude::*,
    prompt::PromptBuilder,
    submission::{Rejection, SubmissionFile, Upload},
};

/// Everything a student (or teacher) sent us in one request.
#[derive(Clone, Debug, Default)]
pub struct Submission {
    /// The problem and the student's answer. Required.
    pub problem: Option<Upload>,

    /// An optional PDF describing what the feedback should focus on.
    pub criteria_document: Option<Upload>,

    /// Optional free-text criteria.
    pub criteria_fields: CriteriaFields,
}

/// The full pipeline. Stateless, so one instance can serve many concurrent
/// requests.
#[derive(Debug)]
pub struct Pipeline {
    extractor: Extractor,
    prompt_builder: PromptBuilder,
    provider: FeedbackProvider,
}

impl Pipeline {
    /// Assemble a pipeline from its parts.
    pub fn new(
        extractor: Extractor,
        prompt_builder: PromptBuilder,
        provider: FeedbackProvider,
    ) -> Self {
        Self {
            extractor,
            prompt_builder,
            provider,
        }
    }

    /// Build the standard pipeline from our configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let prompt_builder =
            PromptBuilder::from_optional_path(config.prompt.as_deref()).await?;
        let provider = FeedbackProvider::from_opts(&config.llm)?;
        if config.llm.api_key.is_none() {
            warn!("No API key configured; relying on provider environment variables");
        }
        Ok(Self::new(
            Extractor::from_opts(&config.extractor),
            prompt_builder,
            provider,
        ))
    }

    /// Run a submission through the pipeline.
    #[instrument(level = "info", skip_all, fields(filename, kind))]
    pub async fn run(&self, submission: Submission) -> Result<FeedbackResult, Rejection> {
        let Submission {
            problem,
            criteria_document,
            criteria_fields,
        } = submission;

        let file = problem
            .ok_or(Rejection::MissingFile)
            .and_then(SubmissionFile::accept)
            .inspect_err(|rejection| info!(?rejection, "Rejected submission"))?;
        let span = Span::current();
        span.record("filename", file.filename());
        span.record("kind", file.kind().to_string());

        let problem_text = self.extractor.extract_file(&file).await;
        let criteria_text = aggregate_criteria(
            &self.extractor,
            criteria_document.as_ref(),
            &criteria_fields,
        )
        .await;

        let payload = match self.prompt_builder.build(&problem_text, &criteria_text) {
            Ok(payload) => payload,
            Err(err) => {
                error!(error = ?err, "Could not build prompt");
                return Ok(FeedbackResult::from_error(&err));
            }
        };

        let result = self.provider.get_feedback(&payload).await;
        info!(status = result.status(), "Finished submission");
        Ok(result)
    }
}
