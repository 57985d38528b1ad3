//! OCR engine wrapping the `tesseract` CLI tool.

use std::{io::Cursor, sync::LazyLock};

use image::ImageFormat;
use regex::Regex;
use tokio::process::Command;

use crate::{
    async_utils::{
        check_for_command_failure, run_command, spawn_blocking_propagating_panics,
    },
    cpu_limit::with_cpu_semaphore,
    prelude::*,
};

use super::{TextEngine, scratch::ScratchDir};

/// `tesseract` keeps going (exit code 0) if only some of the requested
/// languages are missing, but it gives up entirely if none of them load.
static NO_LANGUAGES_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)couldn't load any languages").expect("failed to compile regex")
});

/// OCR engine wrapping the `tesseract` CLI tool.
#[derive(Debug)]
pub struct TesseractEngine {
    /// Language models to load, in `tesseract -l` syntax (`kor+eng`).
    languages: String,

    /// Where to put scratch directories.
    scratch_parent: Option<PathBuf>,
}

impl TesseractEngine {
    /// Create a new `tesseract` engine.
    pub fn new(languages: impl Into<String>, scratch_parent: Option<PathBuf>) -> Self {
        Self {
            languages: languages.into(),
            scratch_parent,
        }
    }
}

#[async_trait]
impl TextEngine for TesseractEngine {
    #[instrument(level = "debug", skip_all, fields(languages = %self.languages))]
    async fn extract_text(&self, data: &[u8]) -> Result<String> {
        // Make sure we actually have an image before starting any processes,
        // and hand tesseract a format it always understands.
        let data = data.to_owned();
        let png = spawn_blocking_propagating_panics(move || normalize_to_png(&data))
            .await??;

        // Write our input to a temporary file.
        let scratch = ScratchDir::new("tesseract", self.scratch_parent.as_deref())?;
        let input_path = scratch.write_file("input.png", &png)?;
        let output_base = scratch.path().join("output");

        // Run tesseract on the input file.
        let output = with_cpu_semaphore(|| async {
            let mut command = Command::new("tesseract");
            command
                .arg(&input_path)
                .arg(&output_base)
                .arg("-l")
                .arg(&self.languages);
            run_command("tesseract", &mut command).await
        })
        .await?;
        check_for_command_failure("tesseract", &output, Some(&NO_LANGUAGES_REGEX))?;

        // Read the output file.
        tokio::fs::read_to_string(output_base.with_extension("txt"))
            .await
            .context("cannot read tesseract output file")
    }
}

/// Decode a PNG or JPEG image and re-encode it as PNG.
fn normalize_to_png(data: &[u8]) -> Result<Vec<u8>> {
    let image = image::load_from_memory(data).context("cannot decode image")?;
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("cannot encode image as PNG")?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, RgbImage};
    use tempfile::TempDir;

    use super::*;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            8,
            8,
            image::Rgb([255, 255, 255]),
        ));
        let mut data = Vec::new();
        image.write_to(&mut Cursor::new(&mut data), format).unwrap();
        data
    }

    #[test]
    fn test_normalize_accepts_png_and_jpeg() {
        for format in [ImageFormat::Png, ImageFormat::Jpeg] {
            let png = normalize_to_png(&encoded(format)).unwrap();
            assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
        }
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        let err = normalize_to_png(b"this is not an image").unwrap_err();
        assert!(err.to_string().contains("cannot decode image"));
    }

    #[tokio::test]
    async fn test_garbage_fails_without_leaving_files() {
        let parent = TempDir::new().unwrap();
        let engine = TesseractEngine::new("kor+eng", Some(parent.path().to_owned()));
        assert!(engine.extract_text(b"\x89PNG garbage").await.is_err());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    #[ignore = "Needs tesseract"]
    async fn test_reads_rendered_arithmetic() {
        let parent = TempDir::new().unwrap();
        let engine = TesseractEngine::new("eng", Some(parent.path().to_owned()));
        let text = engine
            .extract_text(include_bytes!("../../tests/fixtures/two_plus_two.png"))
            .await
            .unwrap();
        let compact = text.split_whitespace().collect::<String>();
        assert!(compact.contains("2+2=4"), "{text:?}");
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_tesseract_leaves_no_files() {
        // Whether or not tesseract is installed here, the scratch directory
        // must be gone afterwards.
        let parent = TempDir::new().unwrap();
        let engine = TesseractEngine::new("eng", Some(parent.path().to_owned()));
        let _ = engine.extract_text(&encoded(ImageFormat::Png)).await;
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }
}
