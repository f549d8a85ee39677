//! PDF document parser using pdf-extract
//!
//! Extracts the text layer of every page and concatenates the pages.

use crate::{DocumentParseMetadata, DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// PDF document parser
pub struct PdfParser {
    /// Keep form feed characters between pages
    pub keep_page_breaks: bool,
}

impl PdfParser {
    /// Create a new PDF parser with default settings
    pub fn new() -> Self {
        Self {
            keep_page_breaks: false,
        }
    }

    /// Keep page break markers in the extracted text
    pub fn with_page_breaks(mut self, enabled: bool) -> Self {
        self.keep_page_breaks = enabled;
        self
    }

    /// Count pages from form feed separators
    fn page_count(text: &str) -> Option<u32> {
        let breaks = text.matches('\x0C').count() as u32;
        if breaks > 0 {
            Some(breaks + 1)
        } else {
            None
        }
    }

    /// Pages are joined with no separator
    fn join_pages(&self, text: &str) -> String {
        if self.keep_page_breaks {
            text.to_string()
        } else {
            text.replace('\x0C', "")
        }
    }
}

impl Default for PdfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for PdfParser {
    fn parse_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<ParsedDocument> {
        let raw = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ParserError::PdfError(format!("{file_name}: {e}")))?;

        let page_count = Self::page_count(&raw);
        let content = self.join_pages(&raw);

        tracing::debug!(file_name, ?page_count, chars = content.len(), "Extracted PDF text");

        let mut doc = ParsedDocument::new(file_name, FileType::Pdf).with_content(content);
        doc.metadata = DocumentParseMetadata {
            page_count,
            ..doc.metadata
        };

        // First non-empty short line doubles as the title
        if let Some(first_line) = doc.content.lines().map(str::trim).find(|l| !l.is_empty()) {
            if first_line.len() < 200 {
                doc.metadata.title = Some(first_line.to_string());
            }
        }

        Ok(doc)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Pdf]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_parser_creation() {
        let parser = PdfParser::new();
        assert!(!parser.keep_page_breaks);

        let parser = parser.with_page_breaks(true);
        assert!(parser.keep_page_breaks);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(PdfParser::page_count("one page"), None);
        assert_eq!(PdfParser::page_count("p1\x0Cp2\x0Cp3"), Some(3));
    }

    #[test]
    fn test_pages_concatenated() {
        let parser = PdfParser::new();
        assert_eq!(parser.join_pages("end of one.\x0CStart of two"), "end of one.Start of two");

        let parser = parser.with_page_breaks(true);
        assert_eq!(parser.join_pages("a\x0Cb"), "a\x0Cb");
    }

    #[test]
    fn test_invalid_pdf_bytes() {
        let err = PdfParser::new()
            .parse_bytes("broken.pdf", b"not a pdf at all")
            .unwrap_err();
        assert!(matches!(err, ParserError::PdfError(msg) if msg.contains("broken.pdf")));
    }

    #[test]
    fn test_supported_types() {
        let parser = PdfParser::new();
        assert!(parser.can_parse(FileType::Pdf));
        assert!(!parser.can_parse(FileType::Docx));
    }
}
