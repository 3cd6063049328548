//! Uploaded documents and how they are spliced into a question.
//!
//! An [`Upload`] is what a file picker holds: raw bytes plus an optional file
//! name. It is decoded into a [`Document`] at the moment a question is
//! submitted. Decoding is deliberately permissive at the call site: anything
//! that cannot be read as text degrades to "no document".

use std::path::Path;

use crate::error::LLMError;

/// File extensions the pickers offer
pub const ACCEPTED_EXTENSIONS: &[&str] = &["txt", "pdf"];

/// Raw bytes of a file chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// File name as reported by the picker, if any
    pub name: Option<String>,
    /// Unprocessed file content
    pub bytes: Vec<u8>,
}

/// Text content of an upload, ready to be spliced into a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    name: Option<String>,
    text: String,
}

impl Upload {
    pub fn new(name: Option<String>, bytes: Vec<u8>) -> Self {
        Self { name, bytes }
    }

    /// Reads an upload from disk, keeping the file name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LLMError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Ok(Self { name, bytes })
    }

    /// Decodes the upload, reporting why it is unusable.
    pub fn try_decode(&self) -> Result<Document, LLMError> {
        Document::decode(self.name.as_deref(), &self.bytes)
    }

    /// Decodes the upload, degrading to `None` when it is not usable text.
    pub fn decode(&self) -> Option<Document> {
        match self.try_decode() {
            Ok(document) => Some(document),
            Err(e) => {
                log::warn!(
                    "ignoring upload {}: {e}",
                    self.name.as_deref().unwrap_or("<unnamed>")
                );
                None
            }
        }
    }
}

impl Document {
    /// Strictly decodes upload bytes as UTF-8 text.
    ///
    /// PDF files are not parsed; their bytes go through the same text decoding
    /// as plain text files, which only succeeds for text-only PDFs.
    ///
    /// # Errors
    ///
    /// * `DocumentError` if the name has an unsupported extension, the content
    ///   is empty, or the bytes are not valid UTF-8
    pub fn decode(name: Option<&str>, bytes: &[u8]) -> Result<Self, LLMError> {
        if let Some(name) = name {
            let extension = Path::new(name)
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase());
            match extension {
                Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => {}
                _ => {
                    return Err(LLMError::DocumentError(format!(
                        "unsupported file type: {name}"
                    )))
                }
            }
        }

        if bytes.is_empty() {
            return Err(LLMError::DocumentError("upload is empty".to_string()));
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|e| LLMError::DocumentError(format!("not valid UTF-8 text: {e}")))?;

        Ok(Self {
            name: name.map(str::to_owned),
            text: text.to_owned(),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Builds the content actually sent for a question.
///
/// Without a document this is the question itself. With one, the document
/// text is placed in front of the question.
pub fn augment_question(document: Option<&Document>, question: &str) -> String {
    match document {
        Some(doc) => format!(
            "Document content:\n{}\n\nQuestion: {}",
            doc.text(),
            question
        ),
        None => question.to_string(),
    }
}
