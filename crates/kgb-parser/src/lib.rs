//! KGB Parser - Text ingestion for various file formats
//!
//! Supports parsing of:
//! - PDF documents
//! - Microsoft Word (DOCX)
//! - Markdown files
//! - Plain text files
//!
//! Each parser implements the `DocumentParser` trait and produces
//! a `ParsedDocument` whose text feeds the extraction pipeline.
//! Parsers work on in-memory bytes so uploads and files on disk share
//! one code path.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

pub mod docx;
pub mod pdf;

pub use docx::DocxParser;
pub use pdf::PdfParser;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during document parsing
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PDF parsing error
    #[error("PDF parsing error: {0}")]
    PdfError(String),

    /// DOCX parsing error
    #[error("DOCX parsing error: {0}")]
    DocxError(String),

    /// Encoding error
    #[error("Text encoding error in {file}: {message}")]
    EncodingError { file: String, message: String },
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// Parsed Document Types
// ============================================================================

/// A parsed document with extracted content
#[derive(Debug, Clone, Serialize)]
pub struct ParsedDocument {
    /// Original file name or path
    pub file_name: String,

    /// Detected file type
    pub file_type: FileType,

    /// Extracted text content
    pub content: String,

    /// Metadata extracted from the document
    pub metadata: DocumentParseMetadata,
}

impl ParsedDocument {
    /// Create a new parsed document
    pub fn new(file_name: impl Into<String>, file_type: FileType) -> Self {
        Self {
            file_name: file_name.into(),
            file_type,
            content: String::new(),
            metadata: DocumentParseMetadata::default(),
        }
    }

    /// Set content
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self.metadata.word_count = Some(self.word_count() as u32);
        self
    }

    /// Get total character count
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    /// Get total word count (approximate)
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Markdown,
    PlainText,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "md" | "markdown" => Self::Markdown,
            "txt" | "text" => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path or upload file name
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Get MIME type
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Markdown => "text/markdown",
            Self::PlainText => "text/plain",
            Self::Unknown => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Docx => write!(f, "docx"),
            Self::Markdown => write!(f, "markdown"),
            Self::PlainText => write!(f, "text"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Metadata extracted during parsing
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentParseMetadata {
    /// Document title
    pub title: Option<String>,

    /// Number of pages
    pub page_count: Option<u32>,

    /// Number of paragraphs
    pub paragraph_count: Option<u32>,

    /// Word count
    pub word_count: Option<u32>,
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for document parsers
pub trait DocumentParser: Send + Sync {
    /// Parse a document held in memory
    fn parse_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<ParsedDocument>;

    /// Get supported file types
    fn supported_types(&self) -> &[FileType];

    /// Parse a document from a file path
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        self.parse_bytes(&path.display().to_string(), &bytes)
    }

    /// Check if this parser can handle a file type
    fn can_parse(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

// ============================================================================
// Plain Text
// ============================================================================

/// Plain text parser (also handles Markdown)
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn parse_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<ParsedDocument> {
        let content = std::str::from_utf8(bytes).map_err(|e| ParserError::EncodingError {
            file: file_name.to_string(),
            message: e.to_string(),
        })?;

        let file_type = match FileType::from_path(file_name) {
            FileType::Markdown => FileType::Markdown,
            _ => FileType::PlainText,
        };

        // Strip a UTF-8 BOM left by some editors
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        Ok(ParsedDocument::new(file_name, file_type).with_content(content))
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::PlainText, FileType::Markdown]
    }
}

// ============================================================================
// Parser Registry
// ============================================================================

/// Registry of available parsers
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Create a registry with the plain text, PDF, and DOCX parsers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PlainTextParser);
        registry.register(PdfParser::new());
        registry.register(DocxParser::new());
        registry
    }

    /// Register a parser
    pub fn register<P: DocumentParser + 'static>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
    }

    /// Find a parser for a file type
    pub fn find_parser(&self, file_type: FileType) -> Option<&dyn DocumentParser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(file_type))
            .map(|p| p.as_ref())
    }

    fn parser_for(&self, file_name: &str) -> Result<&dyn DocumentParser> {
        let file_type = FileType::from_path(file_name);

        if file_type == FileType::Unknown {
            return Err(ParserError::UnsupportedFormat(
                Path::new(file_name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            ));
        }

        self.find_parser(file_type)
            .ok_or_else(|| ParserError::UnsupportedFormat(file_type.to_string()))
    }

    /// Parse a file using the appropriate parser
    pub fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let parser = self.parser_for(&path.display().to_string())?;
        tracing::debug!(path = %path.display(), "Parsing file");
        parser.parse(path)
    }

    /// Parse an uploaded file using the appropriate parser
    pub fn parse_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<ParsedDocument> {
        let parser = self.parser_for(file_name)?;
        tracing::debug!(file_name, size = bytes.len(), "Parsing upload");
        parser.parse_bytes(file_name, bytes)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// Input Selection
// ============================================================================

/// Join the text of several documents, one per line, skipping empty ones
pub fn join_texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    texts
        .into_iter()
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pick the text to process: typed text wins unless it is blank
pub fn select_input<'a>(typed: Option<&'a str>, uploaded: &'a str) -> Option<&'a str> {
    match typed {
        Some(text) if !text.trim().is_empty() => Some(text),
        _ if !uploaded.trim().is_empty() => Some(uploaded),
        _ => None,
    }
}

// ============================================================================
// Chunking
// ============================================================================

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Target chunk size in bytes
    pub chunk_size: usize,

    /// Window (in bytes) searched backwards for a natural break
    pub break_window: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            break_window: 300,
        }
    }
}

impl ChunkConfig {
    /// Create a config with the given chunk size
    pub fn with_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            break_window: (chunk_size / 5).max(1),
        }
    }
}

/// A chunk of text
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// Chunk content
    pub content: String,

    /// Chunk index
    pub index: u32,

    /// Starting byte offset in the original text
    pub start_offset: usize,

    /// Ending byte offset
    pub end_offset: usize,
}

/// Split text into chunks no longer than `chunk_size` bytes, preferring
/// paragraph and sentence boundaries. Chunks do not overlap and always
/// end on a char boundary.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<TextChunk> {
    let mut chunks = Vec::new();
    let chunk_size = config.chunk_size.max(1);
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + chunk_size).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end <= start {
            // A single char wider than chunk_size
            end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }

        let actual_end = if end < text.len() {
            find_break_point(text, start, end, config.break_window)
        } else {
            end
        };

        let content = text[start..actual_end].trim();
        if !content.is_empty() {
            chunks.push(TextChunk {
                content: content.to_string(),
                index: chunks.len() as u32,
                start_offset: start,
                end_offset: actual_end,
            });
        }

        start = actual_end;
    }

    chunks
}

/// Find a good break point at or before `target`
fn find_break_point(text: &str, start: usize, target: usize, window: usize) -> usize {
    let mut search_start = target.saturating_sub(window).max(start);
    while !text.is_char_boundary(search_start) {
        search_start += 1;
    }

    let search_text = &text[search_start..target];

    // Look for paragraph break first
    if let Some(pos) = search_text.rfind("\n\n") {
        return search_start + pos + 2;
    }

    // Look for sentence end
    for pattern in [". ", "! ", "? ", "。"] {
        if let Some(pos) = search_text.rfind(pattern) {
            return search_start + pos + pattern.len();
        }
    }

    // Look for line break, then any whitespace
    if let Some(pos) = search_text.rfind('\n') {
        return search_start + pos + 1;
    }
    if let Some(pos) = search_text.rfind(' ') {
        if search_start + pos > start {
            return search_start + pos + 1;
        }
    }

    // Fall back to target
    target
}

// ============================================================================
// Tests
// ============================================================================
