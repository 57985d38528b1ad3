//! Uploaded files, and deciding which ones we accept.

use std::{error, fmt};

use crate::prelude::*;

/// Extensions we treat as raster images.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Extensions we treat as paginated documents.
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf"];

/// The kinds of file we know how to extract text from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// A PNG or JPEG image, which we OCR.
    Image,

    /// A PDF, which we extract page by page.
    Document,
}

impl Kind {
    /// Classify a filename by its extension.
    ///
    /// The extension is everything after the last `.`, compared
    /// case-insensitively. Anything we can't handle is a [`Rejection`].
    pub fn from_filename(filename: &str) -> Result<Kind, Rejection> {
        if filename.is_empty() {
            return Err(Rejection::EmptyFilename);
        }
        let Some((_, extension)) = filename.rsplit_once('.') else {
            return Err(Rejection::UnsupportedType {
                filename: filename.to_owned(),
            });
        };
        let extension = extension.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Ok(Kind::Image)
        } else if DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
            Ok(Kind::Document)
        } else {
            Err(Rejection::UnsupportedType {
                filename: filename.to_owned(),
            })
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Image => write!(f, "image"),
            Kind::Document => write!(f, "document"),
        }
    }
}

/// A file as it arrived from the client, before we've looked at it.
#[derive(Clone, Debug)]
pub struct Upload {
    /// The filename declared by the client. May be empty.
    pub filename: String,

    /// The raw file contents.
    pub data: Vec<u8>,
}

impl Upload {
    /// Create a new upload.
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }

    /// Read an upload from a local file, using the file's name as the
    /// declared filename.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("cannot read {:?}", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, data })
    }
}

/// A file whose [`Kind`] has been checked. This is the only thing the
/// extractor will accept.
#[derive(Clone, Debug)]
pub struct SubmissionFile {
    filename: String,
    kind: Kind,
    data: Vec<u8>,
}

impl SubmissionFile {
    /// Classify an upload, rejecting anything we can't extract text from.
    pub fn accept(upload: Upload) -> Result<Self, Rejection> {
        let kind = Kind::from_filename(&upload.filename)?;
        Ok(Self {
            filename: upload.filename,
            kind,
            data: upload.data,
        })
    }

    /// The declared filename.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// What kind of file is this?
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The raw file contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Why we refused to process a submission.
///
/// The [`Display`](fmt::Display) output is the message shown to the student.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// No problem/answer file was uploaded at all.
    MissingFile,

    /// A file field was present, but no file was chosen.
    EmptyFilename,

    /// The filename has no extension, or one we don't support.
    UnsupportedType {
        /// The offending filename.
        filename: String,
    },

    /// The upload itself could not be parsed.
    MalformedUpload {
        /// What went wrong.
        reason: String,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingFile => write!(f, "문제 및 답안 파일이 없습니다"),
            Rejection::EmptyFilename => write!(f, "선택된 파일이 없습니다"),
            Rejection::UnsupportedType { .. } => {
                write!(f, "지원하지 않는 파일 형식입니다")
            }
            Rejection::MalformedUpload { .. } => {
                write!(f, "처리 중 오류가 발생했습니다")
            }
        }
    }
}

impl error::Error for Rejection {}
