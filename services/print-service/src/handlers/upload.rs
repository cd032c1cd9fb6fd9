use std::collections::HashMap;

use axum_extra::extract::Multipart;

use crate::error::AppError;
use crate::utils::page_count::{count_pages, DocumentKind};

/// The `file` part of a multipart upload plus every text field next to it.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn parsed<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, AppError> {
        match self.field(name) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| AppError::validation(format!("{} has an invalid value", name))),
            None => Ok(None),
        }
    }

    /// File name and detected kind; fails when no file was sent.
    pub fn document(&self) -> Result<(&str, DocumentKind), AppError> {
        let name = self
            .file_name
            .as_deref()
            .filter(|_| !self.content.is_empty())
            .ok_or_else(|| AppError::validation("A file is required"))?;
        let kind = DocumentKind::detect(name, self.content_type.as_deref())?;
        Ok((name, kind))
    }

    /// Server-side page count, falling back to the `pages` field the client sent.
    pub fn page_count(&self, kind: DocumentKind) -> Result<Option<u32>, AppError> {
        match count_pages(kind, &self.content)? {
            Some(pages) => Ok(Some(pages)),
            None => self.parsed::<u32>("pages"),
        }
    }
}

pub async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            form.file_name = field.file_name().map(str::to_string);
            form.content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            if bytes.len() > max_bytes {
                return Err(AppError::validation(format!(
                    "File is larger than {} MB",
                    max_bytes / (1024 * 1024)
                )));
            }
            form.content = bytes.to_vec();
        } else {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}
