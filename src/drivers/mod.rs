//! LLM drivers.
//!
//! Each driver knows how to send a [`FeedbackPayload`] to one kind of API and
//! get text back. By default we talk to Gemini through the [`genai`] crate,
//! but anything with an OpenAI-compatible `/chat/completions` endpoint works
//! too.

use std::{convert::Infallible, fmt, str::FromStr, sync::Arc, time::Duration};

use clap::{Args, ValueEnum};
use tokio::time;

use crate::{prelude::*, prompt::FeedbackPayload};

pub mod echo;
pub mod native;
pub mod openai;

/// The sampling temperature for every feedback request. Feedback on the same
/// submission must be reproducible, so this is not an option.
pub const FEEDBACK_TEMPERATURE: f32 = 0.0;

/// The model we use if none is specified.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Our different driver types.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum DriverType {
    /// Native driver, which talks to Gemini (and others) directly.
    #[default]
    Native,

    /// OpenAI driver (also for LiteLLM, Ollama, etc).
    #[clap(name = "openai")]
    OpenAI,

    /// Offline driver that replies with the prompt it was sent.
    Echo,
}

impl DriverType {
    /// Instantiate an appropriate driver.
    pub fn create_driver(&self, llm_opts: &LlmOpts) -> Result<Arc<dyn Driver>> {
        match self {
            DriverType::Native => Ok(Arc::new(native::NativeDriver::new(llm_opts))),
            DriverType::OpenAI => Ok(Arc::new(openai::OpenAiDriver::new(llm_opts)?)),
            DriverType::Echo => Ok(Arc::new(echo::EchoDriver::new())),
        }
    }
}

/// An API key, which we're careful never to print.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    /// The actual key, for handing to an API client.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl FromStr for ApiKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Our LLM-related options. These are read once at startup.
#[derive(Args, Clone, Debug)]
pub struct LlmOpts {
    /// The LLM driver to use.
    #[clap(
        long,
        value_enum,
        env = "FEEDBACK_DRIVER",
        default_value_t = DriverType::default()
    )]
    pub driver: DriverType,

    /// The model to ask for feedback.
    #[clap(long, env = "FEEDBACK_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// The API key for the LLM provider. If this is missing or wrong, we still
    /// start, but every feedback request will report an error.
    #[clap(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<ApiKey>,

    /// Override the server URL (`openai` driver only).
    #[clap(long, env = "FEEDBACK_API_BASE")]
    pub api_base: Option<String>,

    /// An upper limit on the number of completion tokens to generate.
    #[clap(long)]
    pub max_completion_tokens: Option<u32>,

    /// A timeout, in seconds, for the LLM to return a complete response. By
    /// default we wait as long as it takes.
    #[clap(long)]
    pub timeout: Option<u64>,
}

impl Default for LlmOpts {
    fn default() -> Self {
        Self {
            driver: DriverType::default(),
            model: DEFAULT_MODEL.to_owned(),
            api_key: None,
            api_base: None,
            max_completion_tokens: None,
            timeout: None,
        }
    }
}

impl LlmOpts {
    /// Apply our timeout (if any) to a future.
    pub async fn apply_timeout<T>(
        &self,
        future: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match self.timeout {
            Some(timeout) => time::timeout(Duration::from_secs(timeout), future)
                .await
                .map_err(|_| anyhow!("LLM request timed out after {timeout}s"))?,
            None => future.await,
        }
    }
}

/// Interface trait for LLM drivers.
#[async_trait]
pub trait Driver: fmt::Debug + Send + Sync + 'static {
    /// Send the system framing and user instruction as a single-turn
    /// conversation, and return the model's reply verbatim.
    ///
    /// Implementations must sample at [`FEEDBACK_TEMPERATURE`].
    async fn chat_completion(
        &self,
        payload: &FeedbackPayload,
        llm_opts: &LlmOpts,
    ) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_is_redacted() {
        let opts = LlmOpts {
            api_key: Some("secret-key".parse().unwrap()),
            ..LlmOpts::default()
        };
        let debug = format!("{opts:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("redacted"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let opts = LlmOpts {
            timeout: Some(0),
            ..LlmOpts::default()
        };
        let err = opts
            .apply_timeout(async {
                time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));

        let no_timeout = LlmOpts::default();
        let value = no_timeout.apply_timeout(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
