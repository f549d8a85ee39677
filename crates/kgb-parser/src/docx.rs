//! DOCX document parser using docx-rs
//!
//! Extracts the text of every body paragraph, one paragraph per line.

use docx_rs::{read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild};

use crate::{DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// DOCX document parser
pub struct DocxParser {
    /// Drop paragraphs that contain only whitespace
    pub skip_empty_paragraphs: bool,
}

impl DocxParser {
    /// Create a new DOCX parser with default settings
    pub fn new() -> Self {
        Self {
            skip_empty_paragraphs: false,
        }
    }

    /// Skip blank paragraphs
    pub fn with_skip_empty(mut self, enabled: bool) -> Self {
        self.skip_empty_paragraphs = enabled;
        self
    }
}

impl Default for DocxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Concatenate the text runs of a paragraph
fn paragraph_text(para: &Paragraph) -> String {
    let mut text = String::new();
    for child in &para.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    _ => {}
                }
            }
        }
    }
    text
}

impl DocumentParser for DocxParser {
    fn parse_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<ParsedDocument> {
        let docx =
            read_docx(bytes).map_err(|e| ParserError::DocxError(format!("{file_name}: {e}")))?;

        let mut paragraphs = Vec::new();
        let mut title = None;

        for child in &docx.document.children {
            if let DocumentChild::Paragraph(para) = child {
                let text = paragraph_text(para);

                if title.is_none() {
                    let is_heading = para.property.style.as_ref().is_some_and(|style| {
                        style.val.starts_with("Heading")
                            || style.val.starts_with("heading")
                            || style.val == "Title"
                    });
                    if is_heading && !text.trim().is_empty() {
                        title = Some(text.trim().to_string());
                    }
                }

                if self.skip_empty_paragraphs && text.trim().is_empty() {
                    continue;
                }
                paragraphs.push(text);
            }
        }

        let paragraph_count = paragraphs.len() as u32;
        let mut doc =
            ParsedDocument::new(file_name, FileType::Docx).with_content(paragraphs.join("\n"));
        doc.metadata.paragraph_count = Some(paragraph_count);
        doc.metadata.title = title;

        tracing::debug!(file_name, paragraph_count, "Extracted DOCX text");

        Ok(doc)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Docx]
    }
}
