//! Turning uploaded files into plain text.
//!
//! Each [`Kind`] of file has its own [`TextEngine`]. The [`Extractor`] picks
//! one and, importantly, never fails: a file we can't read just produces no
//! text, and the feedback request carries on without it.

use std::{fmt, sync::Arc};

use clap::Args;

use crate::{
    prelude::*,
    submission::{Kind, SubmissionFile},
};

use self::{pdftotext::PdfToTextEngine, tesseract::TesseractEngine};

pub mod pdftotext;
pub mod scratch;
pub mod tesseract;

/// Interface to something that can turn file contents into text.
#[async_trait]
pub trait TextEngine: fmt::Debug + Send + Sync + 'static {
    /// Extract all the text we can find in `data`.
    async fn extract_text(&self, data: &[u8]) -> Result<String>;
}

/// Options controlling text extraction.
#[derive(Args, Clone, Debug)]
pub struct ExtractorOpts {
    /// Tesseract language models to use for OCR, joined with `+`. Submissions
    /// usually mix Korean with Latin-script math.
    #[clap(long, env = "OCR_LANGUAGES", default_value = "kor+eng")]
    pub ocr_languages: String,

    /// Directory in which to create per-request scratch directories. Defaults
    /// to the system temporary directory.
    #[clap(long)]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ExtractorOpts {
    fn default() -> Self {
        Self {
            ocr_languages: "kor+eng".to_owned(),
            scratch_dir: None,
        }
    }
}

/// Extracts text from accepted files, using the engine for each [`Kind`].
#[derive(Clone, Debug)]
pub struct Extractor {
    image_engine: Arc<dyn TextEngine>,
    document_engine: Arc<dyn TextEngine>,
}

impl Extractor {
    /// Create an extractor from explicit engines.
    pub fn new(
        image_engine: Arc<dyn TextEngine>,
        document_engine: Arc<dyn TextEngine>,
    ) -> Self {
        Self {
            image_engine,
            document_engine,
        }
    }

    /// Create the standard `tesseract` + `pdftotext` extractor.
    pub fn from_opts(opts: &ExtractorOpts) -> Self {
        Self::new(
            Arc::new(TesseractEngine::new(
                opts.ocr_languages.clone(),
                opts.scratch_dir.clone(),
            )),
            Arc::new(PdfToTextEngine::new(opts.scratch_dir.clone())),
        )
    }

    /// Extract text from `data`, which has already been classified as `kind`.
    ///
    /// Errors are logged and turned into an empty string.
    pub async fn extract(&self, data: &[u8], kind: Kind) -> String {
        let engine = match kind {
            Kind::Image => &self.image_engine,
            Kind::Document => &self.document_engine,
        };
        match engine.extract_text(data).await {
            Ok(text) => {
                debug!(%kind, chars = text.chars().count(), "Extracted text");
                text
            }
            Err(err) => {
                warn!(%kind, error = ?err, "Could not extract text; continuing without it");
                String::new()
            }
        }
    }

    /// Extract text from an accepted submission file.
    #[instrument(level = "debug", skip_all, fields(filename = %file.filename()))]
    pub async fn extract_file(&self, file: &SubmissionFile) -> String {
        self.extract(file.data(), file.kind()).await
    }
}
