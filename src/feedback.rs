//! Asking the LLM for feedback.

use std::sync::Arc;

use crate::{
    drivers::{Driver, LlmOpts},
    prelude::*,
    prompt::FeedbackPayload,
};

/// Shown to the student, followed by the underlying error, when we couldn't
/// get feedback.
pub const PROVIDER_ERROR_PREFIX: &str = "AI 피드백을 생성하는 동안 오류가 발생했습니다";

/// What we got back from a feedback request.
///
/// Either way, [`FeedbackResult::text`] is what the student sees. The variant
/// is there for callers that need to know whether it worked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedbackResult {
    /// The model's reply, verbatim.
    Feedback(String),

    /// A readable explanation of why there is no feedback.
    ProviderError(String),
}

impl FeedbackResult {
    /// Build the student-facing message for an error.
    pub fn from_error(err: &anyhow::Error) -> Self {
        FeedbackResult::ProviderError(format!("{PROVIDER_ERROR_PREFIX}: {err:#}"))
    }

    /// The text to show the student.
    pub fn text(&self) -> &str {
        match self {
            FeedbackResult::Feedback(text) | FeedbackResult::ProviderError(text) => text,
        }
    }

    /// Consume this result, returning the text to show the student.
    pub fn into_text(self) -> String {
        match self {
            FeedbackResult::Feedback(text) | FeedbackResult::ProviderError(text) => text,
        }
    }

    /// Did we actually get feedback?
    pub fn is_feedback(&self) -> bool {
        matches!(self, FeedbackResult::Feedback(_))
    }

    /// A short machine-readable status.
    pub fn status(&self) -> &'static str {
        match self {
            FeedbackResult::Feedback(_) => "ok",
            FeedbackResult::ProviderError(_) => "provider-error",
        }
    }
}

/// Sends prompts to the configured LLM.
#[derive(Clone, Debug)]
pub struct FeedbackProvider {
    driver: Arc<dyn Driver>,
    llm_opts: LlmOpts,
}

impl FeedbackProvider {
    /// Create a provider using an explicit driver.
    pub fn new(driver: Arc<dyn Driver>, llm_opts: LlmOpts) -> Self {
        Self { driver, llm_opts }
    }

    /// Create a provider using the driver named in `llm_opts`.
    pub fn from_opts(llm_opts: &LlmOpts) -> Result<Self> {
        let driver = llm_opts.driver.create_driver(llm_opts)?;
        Ok(Self::new(driver, llm_opts.clone()))
    }

    /// Ask for feedback. This never fails: errors become a
    /// [`FeedbackResult::ProviderError`] explaining what went wrong.
    #[instrument(level = "debug", skip_all, fields(model = %self.llm_opts.model))]
    pub async fn get_feedback(&self, payload: &FeedbackPayload) -> FeedbackResult {
        match self.driver.chat_completion(payload, &self.llm_opts).await {
            Ok(text) => FeedbackResult::Feedback(text),
            Err(err) => {
                error!(error = ?err, "Could not get feedback from LLM");
                FeedbackResult::from_error(&err)
            }
        }
    }
}
