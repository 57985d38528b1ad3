//! Our OpenAI driver, which we also use for LiteLLM, Ollama and other
//! compatible gateways.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        FinishReason,
    },
};

use crate::{prelude::*, prompt::FeedbackPayload};

use super::{Driver, FEEDBACK_TEMPERATURE, LlmOpts};

/// Our OpenAI driver.
#[derive(Debug)]
pub struct OpenAiDriver {
    /// The OpenAI client.
    pub client: Client<OpenAIConfig>,
}

impl OpenAiDriver {
    /// Create a new OpenAI driver.
    pub fn new(llm_opts: &LlmOpts) -> Result<Self> {
        let mut client_config = OpenAIConfig::new();
        if let Some(api_key) = &llm_opts.api_key {
            client_config = client_config.with_api_key(api_key.expose());
        }
        if let Some(api_base) = &llm_opts.api_base {
            client_config = client_config.with_api_base(api_base);
        }
        Ok(Self {
            client: Client::with_config(client_config),
        })
    }
}

#[async_trait]
impl Driver for OpenAiDriver {
    #[instrument(level = "debug", skip_all, fields(model = %llm_opts.model))]
    async fn chat_completion(
        &self,
        payload: &FeedbackPayload,
        llm_opts: &LlmOpts,
    ) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(payload.system.clone())
                .build()
                .context("Error building system message")?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(payload.user_instruction())
                .build()
                .context("Error building user message")?
                .into(),
        ];

        // Turn our prompt into a chat request.
        let mut req = CreateChatCompletionRequestArgs::default();
        req.model(llm_opts.model.clone())
            .messages(messages)
            .temperature(FEEDBACK_TEMPERATURE);
        if let Some(max_completion_tokens) = llm_opts.max_completion_tokens {
            req.max_completion_tokens(max_completion_tokens);
        }
        let req = req.build().context("Error building request")?;
        trace!(?req, "Request");

        // Call OpenAI.
        let response = llm_opts
            .apply_timeout(async {
                self.client
                    .chat()
                    .create(req)
                    .await
                    .context("OpenAI request failed")
            })
            .await?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| anyhow!("No choices in OpenAI response"))?;
        if choice.finish_reason == Some(FinishReason::ContentFilter) {
            return Err(anyhow!(
                "Content filter triggered (may also be a RECITATION error for Gemini models)"
            ));
        }
        let content = choice
            .message
            .content
            .clone()
            .ok_or_else(|| anyhow!("No content in OpenAI response"))?;
        debug!(chars = content.chars().count(), "Response");
        Ok(content)
    }
}
