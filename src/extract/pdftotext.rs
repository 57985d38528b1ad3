//! Text extraction from PDFs using `pdftotext` from `poppler-utils`.
//!
//! This only sees text that is actually stored in the PDF. Scanned pages with
//! no text layer come back empty.

use tokio::process::Command;

use crate::{
    async_utils::{check_for_command_failure, run_command},
    cpu_limit::with_cpu_semaphore,
    prelude::*,
};

use super::{TextEngine, scratch::ScratchDir};

/// The form feed `pdftotext` writes after every page.
const PAGE_BREAK: char = '\x0C';

/// Engine wrapping the `pdftotext` CLI tool.
#[derive(Debug)]
pub struct PdfToTextEngine {
    /// Where to put scratch directories.
    scratch_parent: Option<PathBuf>,
}

impl PdfToTextEngine {
    /// Create a new `pdftotext` engine.
    pub fn new(scratch_parent: Option<PathBuf>) -> Self {
        Self { scratch_parent }
    }
}

#[async_trait]
impl TextEngine for PdfToTextEngine {
    #[instrument(level = "debug", skip_all, fields(len = data.len()))]
    async fn extract_text(&self, data: &[u8]) -> Result<String> {
        // Fail non-PDF files immediately.
        let is_pdf = infer::get(data).is_some_and(|t| t.mime_type() == "application/pdf");
        if !is_pdf {
            return Err(anyhow!("pdftotext only works with PDFs"));
        }

        // Write our input to a temporary file.
        let scratch = ScratchDir::new("pdftotext", self.scratch_parent.as_deref())?;
        let input_path = scratch.write_file("input.pdf", data)?;
        let output_path = scratch.path().join("output.txt");

        // Run pdftotext on the input file.
        let output = with_cpu_semaphore(|| async {
            let mut command = Command::new("pdftotext");
            command
                .arg("-enc")
                .arg("UTF-8")
                .arg(&input_path)
                .arg(&output_path);
            run_command("pdftotext", &mut command).await
        })
        .await?;
        check_for_command_failure("pdftotext", &output, None)?;

        // Read the output file.
        let text = tokio::fs::read_to_string(&output_path)
            .await
            .context("cannot read pdftotext output file")?;
        Ok(join_pages(&text))
    }
}

/// Concatenate every page's text in order, dropping the page breaks.
pub fn join_pages(raw: &str) -> String {
    raw.split(PAGE_BREAK).collect()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_join_pages() {
        assert_eq!(join_pages("one\n\x0Ctwo\n\x0C"), "one\ntwo\n");
        assert_eq!(join_pages("only page"), "only page");
        assert_eq!(join_pages(""), "");
    }

    #[tokio::test]
    async fn test_non_pdf_is_refused() {
        let parent = TempDir::new().unwrap();
        let engine = PdfToTextEngine::new(Some(parent.path().to_owned()));
        let err = engine.extract_text(b"\x89PNG\r\n\x1a\n").await.unwrap_err();
        assert!(err.to_string().contains("only works with PDFs"));
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_broken_pdf_leaves_no_files() {
        // This gets past the PDF sniffing, so we really do create a scratch
        // directory. `pdftotext` then fails (or isn't installed at all).
        let parent = TempDir::new().unwrap();
        let engine = PdfToTextEngine::new(Some(parent.path().to_owned()));
        let result = engine.extract_text(b"%PDF-1.4\nthis is not a real pdf").await;
        assert!(result.is_err(), "{result:?}");
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    #[ignore = "Needs pdftotext"]
    async fn test_extracts_text_and_leaves_no_files() {
        let parent = TempDir::new().unwrap();
        let engine = PdfToTextEngine::new(Some(parent.path().to_owned()));
        let text = engine
            .extract_text(include_bytes!("../../tests/fixtures/two_plus_two.pdf"))
            .await
            .unwrap();
        assert!(text.contains("2+2=4"), "{text:?}");
        assert!(!text.contains(PAGE_BREAK));
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }
}
