//! Native LLM driver.
//!
//! For now, we use the [`genai`] crate, which speaks Gemini's own API and
//! picks an adapter based on the model name.

use genai::{
    Client, ModelIden,
    chat::{ChatMessage, ChatOptions, ChatRequest},
    resolver::{self, AuthData, AuthResolver},
};

use crate::{prelude::*, prompt::FeedbackPayload};

use super::{Driver, FEEDBACK_TEMPERATURE, LlmOpts};

/// Our native driver.
#[derive(Debug)]
pub struct NativeDriver {
    /// The `genai` client.
    pub client: Client,
}

impl NativeDriver {
    /// Create a new native driver.
    ///
    /// If we were given an API key, we use it for every model. Otherwise
    /// `genai` looks up the usual per-provider environment variables.
    pub fn new(llm_opts: &LlmOpts) -> Self {
        let client = match &llm_opts.api_key {
            Some(api_key) => {
                let api_key = api_key.expose().to_owned();
                let auth_resolver = AuthResolver::from_resolver_fn(
                    move |_model_iden: ModelIden| -> Result<Option<AuthData>, resolver::Error> {
                        Ok(Some(AuthData::from_single(api_key.clone())))
                    },
                );
                Client::builder().with_auth_resolver(auth_resolver).build()
            }
            None => Client::default(),
        };
        Self { client }
    }
}

#[async_trait]
impl Driver for NativeDriver {
    #[instrument(level = "debug", skip_all, fields(model = %llm_opts.model))]
    async fn chat_completion(
        &self,
        payload: &FeedbackPayload,
        llm_opts: &LlmOpts,
    ) -> Result<String> {
        // Report what native driver we're using under the hood.
        if let Ok(service_target) =
            self.client.resolve_service_target(&llm_opts.model).await
        {
            debug!(
                adapter_kind = %service_target.model.adapter_kind,
                "Using native driver"
            );
        }

        let req = ChatRequest::new(vec![
            ChatMessage::system(payload.system.clone()),
            ChatMessage::user(payload.user_instruction()),
        ]);
        let opts = ChatOptions {
            temperature: Some(f64::from(FEEDBACK_TEMPERATURE)),
            max_tokens: llm_opts.max_completion_tokens,
            ..ChatOptions::default()
        };

        let chat_res = llm_opts
            .apply_timeout(async {
                self.client
                    .exec_chat(&llm_opts.model, req, Some(&opts))
                    .await
                    .context("LLM request failed")
            })
            .await?;

        // Extract our response content.
        let content = chat_res
            .content
            .as_ref()
            .ok_or_else(|| anyhow!("No content in response: {:?}", chat_res))?;
        let text = content.text_as_str().ok_or_else(|| {
            anyhow!("Expected text content in response, found: {:?}", content)
        })?;
        debug!(chars = text.chars().count(), "Response");
        Ok(text.to_owned())
    }
}
