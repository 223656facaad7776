use crate::error::ExtractionError;
use lopdf::Document as PdfDocument;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Recognized source formats, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    PlainText,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(|ext| ext.to_str())?;
        if extension.eq_ignore_ascii_case("pdf") {
            Some(SourceKind::Pdf)
        } else if extension.eq_ignore_ascii_case("txt") {
            Some(SourceKind::PlainText)
        } else {
            None
        }
    }
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractionError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractionError> {
        let document = PdfDocument::load(path)
            .map_err(|error| ExtractionError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ExtractionError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(ExtractionError::EmptyContent(path.display().to_string()));
        }

        Ok(pages)
    }
}

pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>, ExtractionError> {
    LopdfExtractor.extract_pages(path)
}

pub fn extract_plain_text(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| ExtractionError::InvalidText(path.display().to_string()))?;

    if text.trim().is_empty() {
        return Err(ExtractionError::EmptyContent(path.display().to_string()));
    }

    Ok(text)
}
