use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use walkdir::WalkDir;

pub const TEMP_DIR: &str = "temp";
pub const ORDERS_DIR: &str = "orders";

const PDF_EXTENSIONS: &[&str] = &["pdf"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            return StorageError::NotFound(path.display().to_string());
        }
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// A file sitting in the temporary upload area.
#[derive(Debug, Clone)]
pub struct TempFile {
    pub relative_path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, utoipa::ToSchema)]
pub struct StorageStats {
    pub order_files: u64,
    pub order_bytes: u64,
    pub order_pdf_files: u64,
    pub order_image_files: u64,
    pub temp_files: u64,
    pub temp_bytes: u64,
    pub total_files: u64,
    pub total_bytes: u64,
}

impl StorageStats {
    pub fn order_mb(&self) -> f64 {
        bytes_to_mb(self.order_bytes)
    }

    pub fn temp_mb(&self) -> f64 {
        bytes_to_mb(self.temp_bytes)
    }

    pub fn total_mb(&self) -> f64 {
        bytes_to_mb(self.total_bytes)
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

// rename first, copy + remove when crossing devices
fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    fs::copy(src, dst).map_err(|e| StorageError::io(src, e))?;
    fs::remove_file(src).map_err(|e| StorageError::io(src, e))?;
    Ok(())
}

/// Keep file names portable: ASCII letters, digits, dot, dash and underscore.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();

    if cleaned.is_empty() {
        return "upload".to_string();
    }

    // keep the extension when shortening
    if cleaned.len() > 100 {
        return match cleaned.rfind('.') {
            Some(dot) if cleaned.len() - dot <= 10 => {
                format!("{}{}", &cleaned[..100 - (cleaned.len() - dot)], &cleaned[dot..])
            }
            _ => cleaned[..100].to_string(),
        };
    }
    cleaned
}

pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Upload storage rooted at `MEDIA_ROOT`, split into `temp/` and `orders/`.
///
/// Paths handed out and accepted by this type are relative to the root and
/// use forward slashes, which is what the database stores.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_layout(&self) -> Result<(), StorageError> {
        for dir in [TEMP_DIR, ORDERS_DIR] {
            let path = self.root.join(dir);
            fs::create_dir_all(&path).map_err(|e| StorageError::io(&path, e))?;
        }
        Ok(())
    }

    /// Map a stored relative path to an absolute one, refusing anything that
    /// could escape the media root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(relative);
        if relative.is_empty() || rel.is_absolute() {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(StorageError::InvalidPath(relative.to_string())),
            }
        }
        Ok(self.root.join(rel))
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.resolve(relative).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn is_temp_path(relative: &str) -> bool {
        relative.starts_with("temp/")
    }

    /// Store an upload under `temp/<uuid>_<name>`.
    pub fn save_temp(&self, original_name: &str, content: &[u8]) -> Result<String, StorageError> {
        let dir = self.root.join(TEMP_DIR);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let relative = format!(
            "{}/{}_{}",
            TEMP_DIR,
            uuid::Uuid::new_v4().simple(),
            sanitize_file_name(original_name)
        );
        let path = self.resolve(&relative)?;
        fs::write(&path, content).map_err(|e| StorageError::io(&path, e))?;

        tracing::debug!("📥 Stored temp upload {} ({} bytes)", relative, content.len());
        Ok(relative)
    }

    /// Move a paid job's file to `orders/<yyyy>/<mm>/<order_code>_<name>`.
    pub fn promote(
        &self,
        temp_relative: &str,
        order_code: &str,
        file_name: &str,
        at: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let src = self.resolve(temp_relative)?;
        if !src.is_file() {
            return Err(StorageError::NotFound(temp_relative.to_string()));
        }

        let dir_relative = format!("{}/{:04}/{:02}", ORDERS_DIR, at.year(), at.month());
        let dir = self.resolve(&dir_relative)?;
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let relative = format!(
            "{}/{}_{}",
            dir_relative,
            order_code,
            sanitize_file_name(file_name)
        );
        let dst = self.resolve(&relative)?;
        move_file(&src, &dst)?;

        Ok(relative)
    }

    /// Delete a stored file and return the bytes freed.
    pub fn delete(&self, relative: &str) -> Result<u64, StorageError> {
        let path = self.resolve(relative)?;
        let size = fs::metadata(&path)
            .map_err(|e| StorageError::io(&path, e))?
            .len();
        fs::remove_file(&path).map_err(|e| StorageError::io(&path, e))?;
        Ok(size)
    }

    pub fn file_size(&self, relative: &str) -> Result<u64, StorageError> {
        let path = self.resolve(relative)?;
        Ok(fs::metadata(&path)
            .map_err(|e| StorageError::io(&path, e))?
            .len())
    }

    pub fn read(&self, relative: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(relative)?;
        fs::read(&path).map_err(|e| StorageError::io(&path, e))
    }

    pub fn list_temp_files(&self) -> Result<Vec<TempFile>, StorageError> {
        let dir = self.root.join(TEMP_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("⚠️ Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let modified: DateTime<Utc> = metadata
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH)
                .into();

            files.push(TempFile {
                relative_path: self.relative_of(entry.path()),
                size: metadata.len(),
                modified,
            });
        }
        Ok(files)
    }

    pub fn stats(&self) -> StorageStats {
        let mut stats = StorageStats::default();

        let orders = self.root.join(ORDERS_DIR);
        for entry in WalkDir::new(&orders).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            stats.order_files += 1;
            stats.order_bytes += size;

            let ext = extension_of(&entry.file_name().to_string_lossy());
            match ext.as_deref() {
                Some(e) if PDF_EXTENSIONS.contains(&e) => stats.order_pdf_files += 1,
                Some(e) if IMAGE_EXTENSIONS.contains(&e) => stats.order_image_files += 1,
                _ => {}
            }
        }

        let temp = self.root.join(TEMP_DIR);
        for entry in WalkDir::new(&temp).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                stats.temp_files += 1;
                stats.temp_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }

        stats.total_files = stats.order_files + stats.temp_files;
        stats.total_bytes = stats.order_bytes + stats.temp_bytes;
        stats
    }

    fn relative_of(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("My Thesis (final).pdf"), "My_Thesis__final_.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\notes.docx"), "notes.docx");
        assert_eq!(sanitize_file_name("..."), "upload");

        let long = format!("{}.pdf", "a".repeat(150));
        let short = sanitize_file_name(&long);
        assert_eq!(short.len(), 100);
        assert!(short.ends_with(".pdf"));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let storage = FileStorage::new("/srv/media");
        assert!(storage.resolve("temp/a.pdf").is_ok());
        assert!(matches!(
            storage.resolve("../secret"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("orders/../x").is_err());
        assert!(storage.resolve("").is_err());
    }

    #[test]
    fn test_save_promote_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        let temp = storage.save_temp("notes.pdf", b"%PDF-1.4 test").unwrap();
        assert!(temp.starts_with("temp/"));
        assert!(temp.ends_with("_notes.pdf"));
        assert!(storage.exists(&temp));

        let at = Utc.with_ymd_and_hms(2025, 3, 9, 10, 0, 0).unwrap();
        let promoted = storage
            .promote(&temp, "FC20250309ABC123", "notes.pdf", at)
            .unwrap();
        assert_eq!(promoted, "orders/2025/03/FC20250309ABC123_notes.pdf");
        assert!(!storage.exists(&temp));
        assert!(storage.exists(&promoted));

        let freed = storage.delete(&promoted).unwrap();
        assert_eq!(freed, 13);
        assert!(matches!(
            storage.delete(&promoted),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_promote_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let result = storage.promote("temp/gone.pdf", "FC1", "gone.pdf", Utc::now());
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_stats_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.ensure_layout().unwrap();

        storage.save_temp("a.png", &[0u8; 10]).unwrap();
        let t = storage.save_temp("b.pdf", &[0u8; 20]).unwrap();
        storage
            .promote(&t, "FC1", "b.pdf", Utc::now())
            .unwrap();
        let t = storage.save_temp("c.jpg", &[0u8; 5]).unwrap();
        storage
            .promote(&t, "FC2", "c.jpg", Utc::now())
            .unwrap();

        let stats = storage.stats();
        assert_eq!(stats.order_files, 2);
        assert_eq!(stats.order_pdf_files, 1);
        assert_eq!(stats.order_image_files, 1);
        assert_eq!(stats.order_bytes, 25);
        assert_eq!(stats.temp_files, 1);
        assert_eq!(stats.total_bytes, 35);

        let temps = storage.list_temp_files().unwrap();
        assert_eq!(temps.len(), 1);
        assert!(temps[0].relative_path.starts_with("temp/"));
        assert_eq!(temps[0].size, 10);
    }

    #[test]
    fn test_bytes_to_mb() {
        assert_eq!(bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mb(0), 0.0);
    }
}
