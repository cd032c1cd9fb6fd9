use serde::Serialize;

use crate::utils::storage::extension_of;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Word,
    Image,
}

#[derive(Debug, thiserror::Error)]
pub enum PageCountError {
    #[error("unsupported file type, allowed: PDF, DOC, DOCX, JPG, PNG, WEBP")]
    UnsupportedType,

    #[error("the PDF could not be read: {0}")]
    UnreadablePdf(String),

    #[error("the PDF has no pages")]
    EmptyPdf,
}

impl DocumentKind {
    /// Classify an upload by extension, falling back to its declared content type.
    pub fn detect(file_name: &str, content_type: Option<&str>) -> Result<Self, PageCountError> {
        let by_extension = match extension_of(file_name).as_deref() {
            Some("pdf") => Some(DocumentKind::Pdf),
            Some("doc") | Some("docx") => Some(DocumentKind::Word),
            Some("jpg") | Some("jpeg") | Some("png") | Some("webp") => Some(DocumentKind::Image),
            _ => None,
        };
        if let Some(kind) = by_extension {
            return Ok(kind);
        }

        match content_type {
            Some("application/pdf") => Ok(DocumentKind::Pdf),
            Some("application/msword")
            | Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document") => {
                Ok(DocumentKind::Word)
            }
            Some("image/jpeg") | Some("image/png") | Some("image/webp") => Ok(DocumentKind::Image),
            _ => Err(PageCountError::UnsupportedType),
        }
    }
}

/// Pages of an uploaded document. `None` means the server cannot tell and the
/// client has to supply the count (Word files).
pub fn count_pages(kind: DocumentKind, content: &[u8]) -> Result<Option<u32>, PageCountError> {
    match kind {
        DocumentKind::Pdf => {
            let doc = lopdf::Document::load_mem(content)
                .map_err(|e| PageCountError::UnreadablePdf(e.to_string()))?;
            let pages = doc.get_pages().len() as u32;
            if pages == 0 {
                return Err(PageCountError::EmptyPdf);
            }
            Ok(Some(pages))
        }
        DocumentKind::Image => Ok(Some(1)),
        DocumentKind::Word => Ok(None),
    }
}
