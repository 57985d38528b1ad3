//! Building the prompt we send to the LLM.
//!
//! A prompt file has three parts: a fixed `system` framing, a `problem`
//! template wrapping the extracted answer text, and a `criteria` template
//! wrapping any feedback criteria. Building the same inputs twice always
//! produces the same payload.

use handlebars::Handlebars;
use toml_span::{DeserError, de_helpers::TableHelper};

use crate::prelude::*;

/// The default prompt, used if no prompt file is provided.
const DEFAULT_PROMPT: &str = include_str!("feedback_prompt.toml");

/// Template names registered with Handlebars.
const PROBLEM_TEMPLATE: &str = "problem";
const CRITERIA_TEMPLATE: &str = "criteria";

/// The raw contents of a prompt file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptTemplates {
    /// The system framing, sent verbatim.
    pub system: String,

    /// Template for the answer block. Binds `problem_text`.
    pub problem: String,

    /// Template for the criteria block. Binds `criteria_text`.
    pub criteria: String,
}

impl<'de> toml_span::Deserialize<'de> for PromptTemplates {
    fn deserialize(value: &mut toml_span::Value<'de>) -> Result<Self, DeserError> {
        let mut th = TableHelper::new(value)?;
        let system = th.required::<String>("system")?;
        let problem = th.required::<String>("problem")?;
        let criteria = th.required::<String>("criteria")?;
        th.finalize(None)?;
        Ok(Self {
            system,
            problem,
            criteria,
        })
    }
}

impl PromptTemplates {
    /// Parse a prompt file.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let parsed = toml_span::de::parse(toml_str)
            .map_err(DeserError::from)
            .and_then(|mut value| {
                <Self as toml_span::Deserialize>::deserialize(&mut value)
            });
        parsed.map_err(|err| {
            anyhow!("invalid prompt file:\n{}", describe_deser_error(&err))
        })
    }
}

/// Turn a [`DeserError`] into something readable, one problem per line.
fn describe_deser_error(err: &DeserError) -> String {
    err.errors
        .iter()
        .map(|e| format!("{:?} at bytes {}..{}", e.kind, e.span.start, e.span.end))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The two halves of a request to the LLM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedbackPayload {
    /// The fixed system framing.
    pub system: String,

    /// The user instruction, as one or two blocks.
    pub blocks: Vec<String>,
}

impl FeedbackPayload {
    /// The full user instruction, with blocks separated by a blank line.
    pub fn user_instruction(&self) -> String {
        self.blocks.join("\n\n")
    }
}

/// Renders [`FeedbackPayload`]s from a prompt file.
#[derive(Debug)]
pub struct PromptBuilder {
    system: String,
    handlebars: Handlebars<'static>,
}

impl PromptBuilder {
    /// Create a builder from parsed templates, checking that both templates
    /// compile and render.
    pub fn new(templates: PromptTemplates) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        // Student answers are plain text, not HTML.
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(true);
        handlebars
            .register_template_string(PROBLEM_TEMPLATE, &templates.problem)
            .context("invalid problem template")?;
        handlebars
            .register_template_string(CRITERIA_TEMPLATE, &templates.criteria)
            .context("invalid criteria template")?;

        let builder = Self {
            system: templates.system,
            handlebars,
        };
        builder
            .build("problem", "criteria")
            .context("prompt templates do not render")?;
        Ok(builder)
    }

    /// Create a builder for our built-in prompt.
    pub fn default_prompt() -> Result<Self> {
        Self::new(PromptTemplates::from_toml_str(DEFAULT_PROMPT)?)
    }

    /// Load a prompt file from disk.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let toml_str = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read prompt file {:?}", path.display()))?;
        let templates = PromptTemplates::from_toml_str(&toml_str)
            .with_context(|| format!("cannot load prompt file {:?}", path.display()))?;
        Self::new(templates)
    }

    /// Load `path` if given, or fall back to the built-in prompt.
    pub async fn from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path).await,
            None => Self::default_prompt(),
        }
    }

    /// Build the payload for an answer and (possibly empty) criteria.
    pub fn build(
        &self,
        problem_text: &str,
        criteria_text: &str,
    ) -> Result<FeedbackPayload> {
        let bindings = json!({
            "problem_text": problem_text,
            "criteria_text": criteria_text,
        });
        let mut blocks = vec![self.handlebars.render(PROBLEM_TEMPLATE, &bindings)?];
        if !criteria_text.is_empty() {
            blocks.push(self.handlebars.render(CRITERIA_TEMPLATE, &bindings)?);
        }
        Ok(FeedbackPayload {
            system: self.system.clone(),
            blocks,
        })
    }
}
