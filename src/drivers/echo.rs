//! Echo driver for testing.
//!
//! This driver never talks to a network. It replies with the user
//! instruction it was sent, which makes it easy to see exactly what would
//! have gone to the model.

use crate::{prelude::*, prompt::FeedbackPayload};

use super::{Driver, LlmOpts};

/// Echo driver for testing.
#[derive(Debug, Default)]
pub struct EchoDriver;

impl EchoDriver {
    /// Create a new echo driver.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for EchoDriver {
    async fn chat_completion(
        &self,
        payload: &FeedbackPayload,
        _llm_opts: &LlmOpts,
    ) -> Result<String> {
        Ok(payload.user_instruction())
    }
}
