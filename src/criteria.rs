//! Feedback criteria supplied alongside a submission.
//!
//! Teachers can upload a criteria document (a PDF), fill in any of five
//! labeled text fields, or both. We flatten everything into a single block of
//! text for the prompt.

use std::fmt;

use crate::{
    extract::Extractor,
    prelude::*,
    submission::{Kind, Upload},
};

/// The labeled criteria fields, in the order they appear in the prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CriteriaField {
    /// The curriculum achievement standard being assessed.
    AchievementStandard,
    /// The mathematical objects the problem is about.
    MathObject,
    /// Routines the student is expected to use.
    Routine,
    /// Narratives (endorsed statements) the student should arrive at.
    Narrative,
    /// Anything else.
    Other,
}

impl CriteriaField {
    /// Every field, in prompt order.
    pub const ALL: [CriteriaField; 5] = [
        CriteriaField::AchievementStandard,
        CriteriaField::MathObject,
        CriteriaField::Routine,
        CriteriaField::Narrative,
        CriteriaField::Other,
    ];

    /// The label used both as the form field name and in the prompt.
    pub fn label(self) -> &'static str {
        match self {
            CriteriaField::AchievementStandard => "achievement-standard",
            CriteriaField::MathObject => "math-object",
            CriteriaField::Routine => "routine",
            CriteriaField::Narrative => "narrative",
            CriteriaField::Other => "other",
        }
    }

    /// Look up a field by its label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.label() == label)
    }
}

impl fmt::Display for CriteriaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Free-text criteria, one optional value per [`CriteriaField`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CriteriaFields {
    values: [Option<String>; 5],
}

impl CriteriaFields {
    /// Set the value of a field, replacing any previous value.
    pub fn set(&mut self, field: CriteriaField, value: impl Into<String>) {
        self.values[field as usize] = Some(value.into());
    }

    /// Builder-style version of [`CriteriaFields::set`].
    #[cfg(test)]
    pub fn with(mut self, field: CriteriaField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Get the value of a field, if any.
    pub fn get(&self, field: CriteriaField) -> Option<&str> {
        self.values[field as usize].as_deref()
    }

    /// Iterate over fields with non-blank values, in prompt order.
    pub fn non_blank(&self) -> impl Iterator<Item = (CriteriaField, &str)> {
        CriteriaField::ALL.into_iter().filter_map(|field| {
            self.get(field)
                .filter(|value| !value.trim().is_empty())
                .map(|value| (field, value))
        })
    }
}

/// Join criteria text from every source into one block.
///
/// The document's text (if non-empty) comes first, followed by one
/// `"<label>: <value>"` line per non-blank field. Returns an empty string if
/// nothing contributed.
pub fn join_criteria(document_text: Option<&str>, fields: &CriteriaFields) -> String {
    let mut segments = Vec::new();
    if let Some(text) = document_text
        && !text.is_empty()
    {
        segments.push(text.to_owned());
    }
    for (field, value) in fields.non_blank() {
        segments.push(format!("{}: {}", field.label(), value));
    }
    segments.join("\n")
}

/// Collect criteria from an optional criteria document and the text fields.
///
/// Only PDF criteria documents are read. Anything else (including images) is
/// ignored rather than rejected, since the criteria upload is optional.
#[instrument(level = "debug", skip_all)]
pub async fn aggregate_criteria(
    extractor: &Extractor,
    document: Option<&Upload>,
    fields: &CriteriaFields,
) -> String {
    let document_text = match document {
        Some(upload) => match Kind::from_filename(&upload.filename) {
            Ok(Kind::Document) => {
                Some(extractor.extract(&upload.data, Kind::Document).await)
            }
            Ok(kind) => {
                info!(
                    filename = %upload.filename,
                    %kind,
                    "Ignoring criteria upload that is not a PDF"
                );
                None
            }
            Err(rejection) => {
                info!(
                    filename = %upload.filename,
                    ?rejection,
                    "Ignoring unsupported criteria upload"
                );
                None
            }
        },
        None => None,
    };
    join_criteria(document_text.as_deref(), fields)
}
