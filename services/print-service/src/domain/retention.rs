use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::utils::storage::{bytes_to_mb, FileStorage, StorageError};

/// Which orders a retention window applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum RetentionCategory {
    /// status Delivered
    Delivered,
    /// status Cancelled or Rejected, payment not Failed
    Cancelled,
    /// payment Failed
    Failed,
}

impl RetentionCategory {
    pub const ALL: [RetentionCategory; 3] = [
        RetentionCategory::Delivered,
        RetentionCategory::Cancelled,
        RetentionCategory::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionCategory::Delivered => "Delivered",
            RetentionCategory::Cancelled => "Cancelled",
            RetentionCategory::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delivered" => Some(RetentionCategory::Delivered),
            "cancelled" | "canceled" | "rejected" => Some(RetentionCategory::Cancelled),
            "failed" => Some(RetentionCategory::Failed),
            _ => None,
        }
    }

    pub fn matches(&self, status: &str, payment_status: &str) -> bool {
        match self {
            RetentionCategory::Delivered => status == "Delivered",
            RetentionCategory::Cancelled => {
                (status == "Cancelled" || status == "Rejected") && payment_status != "Failed"
            }
            RetentionCategory::Failed => payment_status == "Failed",
        }
    }
}

impl std::fmt::Display for RetentionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longest retention window a caller may ask for.
pub const MAX_RETENTION_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub delivered_days: i64,
    pub cancelled_days: i64,
    pub failed_days: i64,
    pub temp_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            delivered_days: 30,
            cancelled_days: 7,
            failed_days: 3,
            temp_days: 1,
        }
    }
}

impl RetentionPolicy {
    pub fn days_for(&self, category: RetentionCategory) -> i64 {
        match category {
            RetentionCategory::Delivered => self.delivered_days,
            RetentionCategory::Cancelled => self.cancelled_days,
            RetentionCategory::Failed => self.failed_days,
        }
    }

    /// None when the window reaches past the representable calendar.
    pub fn cutoff(
        &self,
        category: RetentionCategory,
        days_override: Option<i64>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let days = days_override.unwrap_or_else(|| self.days_for(category));
        Duration::try_days(days).and_then(|window| now.checked_sub_signed(window))
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CleanupOptions {
    #[serde(default)]
    pub dry_run: bool,
    pub category: Option<RetentionCategory>,
    /// Overrides the order windows only; temp uploads keep their own.
    pub days_override: Option<i64>,
    #[serde(default = "default_true")]
    pub include_temp: bool,
    /// false sweeps temp uploads only
    #[serde(default = "default_true")]
    pub include_orders: bool,
}

impl CleanupOptions {
    pub fn validate(&self) -> Result<(), String> {
        match self.days_override {
            Some(days) if days < 0 => Err("Retention days cannot be negative".to_string()),
            Some(days) if days > MAX_RETENTION_DAYS => {
                Err(format!("Retention days cannot exceed {}", MAX_RETENTION_DAYS))
            }
            _ => Ok(()),
        }
    }
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            category: None,
            days_override: None,
            include_temp: true,
            include_orders: true,
        }
    }
}

// An order still holding a file that a retention window may have expired
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PurgeCandidate {
    pub id: i32,
    pub order_code: String,
    pub file_path: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TempReferences {
    pub cart: HashSet<String>,
    pub orders: HashSet<String>,
}

impl TempReferences {
    pub fn contains(&self, path: &str) -> bool {
        self.cart.contains(path) || self.orders.contains(path)
    }
}

#[async_trait]
pub trait RetentionStore: Send + Sync {
    async fn purge_candidates(
        &self,
        category: RetentionCategory,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<PurgeCandidate>>;

    /// Clear the file reference and stamp `file_purged_at`. Leaves `updated_at` alone.
    async fn mark_purged(&self, order_id: i32, at: DateTime<Utc>) -> AppResult<()>;

    async fn temp_references(&self) -> AppResult<TempReferences>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    Deleted,
    WouldDelete,
    Missing,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileDetail {
    pub order_code: Option<String>,
    pub file_path: String,
    pub category: String,
    pub size_bytes: u64,
    pub age_days: i64,
    pub outcome: FileOutcome,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub eligible_orders: usize,
    pub orders_processed: usize,
    pub files_deleted: usize,
    pub temp_files_deleted: usize,
    pub bytes_freed: u64,
    pub mb_freed: f64,
    pub missing: usize,
    pub failures: usize,
    pub details: Vec<FileDetail>,
    pub finished_at: DateTime<Utc>,
}

impl CleanupReport {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            eligible_orders: 0,
            orders_processed: 0,
            files_deleted: 0,
            temp_files_deleted: 0,
            bytes_freed: 0,
            mb_freed: 0.0,
            missing: 0,
            failures: 0,
            details: Vec::new(),
            finished_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct StatusFileCount {
    pub status: String,
    pub orders: i64,
    pub with_files: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CleanupPotential {
    pub eligible_orders: usize,
    pub estimated_bytes: u64,
    pub estimated_mb: f64,
}

/// Delete expired upload files. Database rows are never deleted.
pub async fn run_cleanup(
    store: &dyn RetentionStore,
    storage: &FileStorage,
    policy: &RetentionPolicy,
    options: &CleanupOptions,
    now: DateTime<Utc>,
) -> AppResult<CleanupReport> {
    options.validate().map_err(AppError::validation)?;

    let prefix = if options.dry_run { "[DRY RUN] " } else { "" };
    tracing::info!("🧹 {}Starting file cleanup", prefix);

    let mut report = CleanupReport::new(options.dry_run);
    let references = store.temp_references().await?;

    let categories: Vec<RetentionCategory> = match (options.include_orders, options.category) {
        (false, _) => Vec::new(),
        (true, Some(category)) => vec![category],
        (true, None) => RetentionCategory::ALL.to_vec(),
    };

    let mut seen = HashSet::new();
    for category in categories {
        let cutoff = policy
            .cutoff(category, options.days_override, now)
            .ok_or_else(|| AppError::validation("Retention window is out of range"))?;
        let candidates = store.purge_candidates(category, cutoff).await?;

        for candidate in candidates {
            if !seen.insert(candidate.id) {
                continue;
            }
            report.eligible_orders += 1;
            purge_order_file(store, storage, &references, category, &candidate, options.dry_run, now, &mut report)
                .await?;
        }
    }

    if options.include_temp {
        sweep_temp_files(storage, policy, &references, options.dry_run, now, &mut report);
    }

    report.mb_freed = bytes_to_mb(report.bytes_freed);
    report.finished_at = Utc::now();

    tracing::info!(
        "🧹 {}Cleanup finished: {} eligible order(s), {} file(s), {:.2} MB freed, {} missing, {} failure(s)",
        prefix,
        report.eligible_orders,
        report.files_deleted + report.temp_files_deleted,
        report.mb_freed,
        report.missing,
        report.failures
    );

    Ok(report)
}

#[allow(clippy::too_many_arguments)]
async fn purge_order_file(
    store: &dyn RetentionStore,
    storage: &FileStorage,
    references: &TempReferences,
    category: RetentionCategory,
    candidate: &PurgeCandidate,
    dry_run: bool,
    now: DateTime<Utc>,
    report: &mut CleanupReport,
) -> AppResult<()> {
    let mut detail = FileDetail {
        order_code: Some(candidate.order_code.clone()),
        file_path: candidate.file_path.clone(),
        category: category.to_string(),
        size_bytes: 0,
        age_days: (now - candidate.updated_at).num_days(),
        outcome: FileOutcome::Deleted,
        error: None,
    };

    // a restored cart item may still own this upload
    if FileStorage::is_temp_path(&candidate.file_path) && references.cart.contains(&candidate.file_path) {
        detail.outcome = FileOutcome::Skipped;
        report.details.push(detail);
        return Ok(());
    }

    if dry_run {
        match storage.file_size(&candidate.file_path) {
            Ok(size) => {
                tracing::info!("[DRY RUN] Would delete {} ({})", candidate.file_path, candidate.order_code);
                detail.size_bytes = size;
                detail.outcome = FileOutcome::WouldDelete;
                report.files_deleted += 1;
                report.orders_processed += 1;
                report.bytes_freed += size;
            }
            Err(StorageError::NotFound(_)) => {
                detail.outcome = FileOutcome::Missing;
                report.missing += 1;
            }
            Err(e) => {
                detail.outcome = FileOutcome::Failed;
                detail.error = Some(e.to_string());
                report.failures += 1;
            }
        }
        report.details.push(detail);
        return Ok(());
    }

    match storage.delete(&candidate.file_path) {
        Ok(size) => {
            store.mark_purged(candidate.id, now).await?;
            tracing::info!("🗑️ Deleted {} ({}, {} bytes)", candidate.file_path, candidate.order_code, size);
            detail.size_bytes = size;
            report.files_deleted += 1;
            report.orders_processed += 1;
            report.bytes_freed += size;
        }
        Err(StorageError::NotFound(_)) => {
            // nothing left to delete, record the purge anyway
            store.mark_purged(candidate.id, now).await?;
            tracing::warn!("⚠️ File {} of order {} was already gone", candidate.file_path, candidate.order_code);
            detail.outcome = FileOutcome::Missing;
            report.missing += 1;
            report.orders_processed += 1;
        }
        Err(e) => {
            tracing::error!("❌ Failed to delete {}: {}", candidate.file_path, e);
            detail.outcome = FileOutcome::Failed;
            detail.error = Some(e.to_string());
            report.failures += 1;
        }
    }
    report.details.push(detail);
    Ok(())
}

fn sweep_temp_files(
    storage: &FileStorage,
    policy: &RetentionPolicy,
    references: &TempReferences,
    dry_run: bool,
    now: DateTime<Utc>,
    report: &mut CleanupReport,
) {
    let cutoff = now - Duration::days(policy.temp_days);
    let files = match storage.list_temp_files() {
        Ok(files) => files,
        Err(e) => {
            tracing::error!("❌ Cannot list temp uploads: {}", e);
            report.failures += 1;
            return;
        }
    };

    for file in files {
        if file.modified >= cutoff || references.contains(&file.relative_path) {
            continue;
        }

        let mut detail = FileDetail {
            order_code: None,
            file_path: file.relative_path.clone(),
            category: "Temp".to_string(),
            size_bytes: file.size,
            age_days: (now - file.modified).num_days(),
            outcome: FileOutcome::Deleted,
            error: None,
        };

        if dry_run {
            tracing::info!("[DRY RUN] Would delete temp upload {}", file.relative_path);
            detail.outcome = FileOutcome::WouldDelete;
            report.temp_files_deleted += 1;
            report.bytes_freed += file.size;
        } else {
            match storage.delete(&file.relative_path) {
                Ok(size) => {
                    tracing::info!("🗑️ Deleted temp upload {}", file.relative_path);
                    detail.size_bytes = size;
                    report.temp_files_deleted += 1;
                    report.bytes_freed += size;
                }
                Err(StorageError::NotFound(_)) => {
                    detail.outcome = FileOutcome::Missing;
                    report.missing += 1;
                }
                Err(e) => {
                    tracing::error!("❌ Failed to delete temp upload {}: {}", file.relative_path, e);
                    detail.outcome = FileOutcome::Failed;
                    detail.error = Some(e.to_string());
                    report.failures += 1;
                }
            }
        }
        report.details.push(detail);
    }
}

/// What a full sweep would free right now.
pub async fn cleanup_potential(
    store: &dyn RetentionStore,
    storage: &FileStorage,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> AppResult<CleanupPotential> {
    let options = CleanupOptions {
        dry_run: true,
        category: None,
        days_override: None,
        include_temp: false,
        include_orders: true,
    };
    let report = run_cleanup(store, storage, policy, &options, now).await?;

    Ok(CleanupPotential {
        eligible_orders: report.eligible_orders,
        estimated_bytes: report.bytes_freed,
        estimated_mb: report.mb_freed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StoredOrder {
        id: i32,
        order_code: String,
        status: String,
        payment_status: String,
        file_path: Option<String>,
        updated_at: DateTime<Utc>,
        file_purged_at: Option<DateTime<Utc>>,
    }

    #[derive(Default)]
    struct MemoryRetentionStore {
        orders: Mutex<Vec<StoredOrder>>,
        cart_paths: Vec<String>,
    }

    impl MemoryRetentionStore {
        fn add(&self, status: &str, payment: &str, file_path: Option<&str>, age_days: i64) -> i32 {
            let mut orders = self.orders.lock().unwrap();
            let id = orders.len() as i32 + 1;
            orders.push(StoredOrder {
                id,
                order_code: format!("FC0000000000000000000{}-01", id),
                status: status.to_string(),
                payment_status: payment.to_string(),
                file_path: file_path.map(str::to_string),
                updated_at: Utc::now() - Duration::days(age_days) - Duration::minutes(1),
                file_purged_at: None,
            });
            id
        }

        fn file_of(&self, id: i32) -> Option<String> {
            self.orders.lock().unwrap().iter().find(|o| o.id == id).and_then(|o| o.file_path.clone())
        }

        fn row_count(&self) -> usize {
            self.orders.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RetentionStore for MemoryRetentionStore {
        async fn purge_candidates(
            &self,
            category: RetentionCategory,
            cutoff: DateTime<Utc>,
        ) -> AppResult<Vec<PurgeCandidate>> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .iter()
                .filter(|o| category.matches(&o.status, &o.payment_status) && o.updated_at < cutoff)
                .filter_map(|o| {
                    o.file_path.as_ref().map(|path| PurgeCandidate {
                        id: o.id,
                        order_code: o.order_code.clone(),
                        file_path: path.clone(),
                        status: o.status.clone(),
                        updated_at: o.updated_at,
                    })
                })
                .collect())
        }

        async fn mark_purged(&self, order_id: i32, at: DateTime<Utc>) -> AppResult<()> {
            if let Some(o) = self.orders.lock().unwrap().iter_mut().find(|o| o.id == order_id) {
                o.file_path = None;
                o.file_purged_at = Some(at);
            }
            Ok(())
        }

        async fn temp_references(&self) -> AppResult<TempReferences> {
            let orders = self
                .orders
                .lock()
                .unwrap()
                .iter()
                .filter_map(|o| o.file_path.clone())
                .filter(|p| FileStorage::is_temp_path(p))
                .collect();
            Ok(TempReferences {
                cart: self.cart_paths.iter().cloned().collect(),
                orders,
            })
        }
    }

    fn order_file(storage: &FileStorage, name: &str, content: &[u8]) -> String {
        let relative = format!("orders/2025/01/{}", name);
        let path = storage.resolve(&relative).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        relative
    }

    #[test]
    fn test_category_matching() {
        assert!(RetentionCategory::Delivered.matches("Delivered", "Success"));
        assert!(RetentionCategory::Cancelled.matches("Rejected", "Success"));
        assert!(!RetentionCategory::Cancelled.matches("Cancelled", "Failed"));
        assert!(RetentionCategory::Failed.matches("Cancelled", "Failed"));
        assert!(!RetentionCategory::Delivered.matches("Ready", "Success"));
        assert_eq!(RetentionCategory::parse("rejected"), Some(RetentionCategory::Cancelled));
        assert_eq!(RetentionCategory::parse("Ready"), None);
    }

    #[tokio::test]
    async fn test_only_expired_files_are_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let store = MemoryRetentionStore::default();

        let old = order_file(&storage, "FC1-01_old.pdf", b"0123456789");
        let young = order_file(&storage, "FC2-01_young.pdf", b"01234");
        let active = order_file(&storage, "FC3-01_active.pdf", b"012");

        let old_id = store.add("Delivered", "Success", Some(&old), 31);
        let young_id = store.add("Delivered", "Success", Some(&young), 29);
        let active_id = store.add("Ready", "Success", Some(&active), 90);

        let report = run_cleanup(&store, &storage, &RetentionPolicy::default(), &CleanupOptions::default(), Utc::now())
            .await
            .unwrap();

        assert_eq!(report.eligible_orders, 1);
        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.bytes_freed, 10);
        assert!(!storage.exists(&old));
        assert!(storage.exists(&young));
        assert!(storage.exists(&active));

        // rows survive, only the reference is cleared
        assert_eq!(store.row_count(), 3);
        assert_eq!(store.file_of(old_id), None);
        assert_eq!(store.file_of(young_id), Some(young));
        assert_eq!(store.file_of(active_id), Some(active));
    }

    #[tokio::test]
    async fn test_windows_per_category() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let store = MemoryRetentionStore::default();

        let cancelled = order_file(&storage, "a.pdf", b"a");
        let rejected_young = order_file(&storage, "b.pdf", b"b");
        store.add("Cancelled", "Success", Some(&cancelled), 8);
        store.add("Rejected", "Success", Some(&rejected_young), 6);

        let report = run_cleanup(&store, &storage, &RetentionPolicy::default(), &CleanupOptions::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(report.files_deleted, 1);
        assert!(!storage.exists(&cancelled));
        assert!(storage.exists(&rejected_young));
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let store = MemoryRetentionStore::default();
        let old = order_file(&storage, "old.pdf", b"0123456789");
        let id = store.add("Delivered", "Success", Some(&old), 45);

        let options = CleanupOptions {
            dry_run: true,
            ..CleanupOptions::default()
        };
        let report = run_cleanup(&store, &storage, &RetentionPolicy::default(), &options, Utc::now())
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.bytes_freed, 10);
        assert_eq!(report.details[0].outcome, FileOutcome::WouldDelete);
        assert!(storage.exists(&old));
        assert_eq!(store.file_of(id), Some(old));
    }

    #[tokio::test]
    async fn test_missing_file_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let store = MemoryRetentionStore::default();
        let present = order_file(&storage, "present.pdf", b"xx");
        let gone_id = store.add("Delivered", "Success", Some("orders/2025/01/gone.pdf"), 40);
        store.add("Delivered", "Success", Some(&present), 40);

        let report = run_cleanup(&store, &storage, &RetentionPolicy::default(), &CleanupOptions::default(), Utc::now())
            .await
            .unwrap();

        assert_eq!(report.eligible_orders, 2);
        assert_eq!(report.missing, 1);
        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.failures, 0);
        assert_eq!(store.file_of(gone_id), None);
    }

    #[tokio::test]
    async fn test_category_filter_and_days_override() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let store = MemoryRetentionStore::default();
        let delivered = order_file(&storage, "d.pdf", b"d");
        let cancelled = order_file(&storage, "c.pdf", b"c");
        store.add("Delivered", "Success", Some(&delivered), 5);
        store.add("Cancelled", "Success", Some(&cancelled), 5);

        let options = CleanupOptions {
            category: Some(RetentionCategory::Delivered),
            days_override: Some(2),
            ..CleanupOptions::default()
        };
        let report = run_cleanup(&store, &storage, &RetentionPolicy::default(), &options, Utc::now())
            .await
            .unwrap();

        assert_eq!(report.files_deleted, 1);
        assert!(!storage.exists(&delivered));
        assert!(storage.exists(&cancelled));
    }

    #[test]
    fn test_retention_days_are_bounded() {
        let policy = RetentionPolicy::default();
        let now = Utc::now();

        assert_eq!(
            policy.cutoff(RetentionCategory::Delivered, None, now),
            Some(now - Duration::days(30))
        );
        assert!(policy
            .cutoff(RetentionCategory::Delivered, Some(MAX_RETENTION_DAYS), now)
            .is_some());
        assert_eq!(policy.cutoff(RetentionCategory::Delivered, Some(i64::MAX), now), None);
        assert_eq!(policy.cutoff(RetentionCategory::Failed, Some(1_000_000_000), now), None);

        let options = |days| CleanupOptions {
            days_override: Some(days),
            ..CleanupOptions::default()
        };
        assert!(options(0).validate().is_ok());
        assert!(options(MAX_RETENTION_DAYS).validate().is_ok());
        assert!(options(-1).validate().is_err());
        assert!(options(MAX_RETENTION_DAYS + 1).validate().is_err());
        assert!(options(1_000_000_000).validate().is_err());
    }

    #[tokio::test]
    async fn test_huge_days_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let store = MemoryRetentionStore::default();
        let delivered = order_file(&storage, "d.pdf", b"d");
        store.add("Delivered", "Success", Some(&delivered), 5);

        let options = CleanupOptions {
            days_override: Some(i64::from(u32::MAX)),
            ..CleanupOptions::default()
        };
        let result = run_cleanup(&store, &storage, &RetentionPolicy::default(), &options, Utc::now()).await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert!(storage.exists(&delivered));
    }

    #[tokio::test]
    async fn test_temp_sweep_keeps_referenced_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let in_cart = storage.save_temp("cart.pdf", b"cart").unwrap();
        let orphan = storage.save_temp("orphan.pdf", b"orphan").unwrap();

        let store = MemoryRetentionStore {
            cart_paths: vec![in_cart.clone()],
            ..MemoryRetentionStore::default()
        };

        // files were just written, so look at them from two days ahead
        let later = Utc::now() + Duration::days(2);
        let report = run_cleanup(&store, &storage, &RetentionPolicy::default(), &CleanupOptions::default(), later)
            .await
            .unwrap();

        assert_eq!(report.temp_files_deleted, 1);
        assert!(storage.exists(&in_cart));
        assert!(!storage.exists(&orphan));

        let keep_temp = CleanupOptions {
            include_temp: false,
            ..CleanupOptions::default()
        };
        let fresh = storage.save_temp("fresh.pdf", b"f").unwrap();
        let report = run_cleanup(&store, &storage, &RetentionPolicy::default(), &keep_temp, later)
            .await
            .unwrap();
        assert_eq!(report.temp_files_deleted, 0);
        assert!(storage.exists(&fresh));
    }

    #[tokio::test]
    async fn test_temp_only_sweep_leaves_orders() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let store = MemoryRetentionStore::default();
        let old = order_file(&storage, "old.pdf", b"old");
        let id = store.add("Delivered", "Success", Some(&old), 90);
        let orphan = storage.save_temp("orphan.pdf", b"orphan").unwrap();

        let options = CleanupOptions {
            include_orders: false,
            ..CleanupOptions::default()
        };
        let later = Utc::now() + Duration::days(2);
        let report = run_cleanup(&store, &storage, &RetentionPolicy::default(), &options, later)
            .await
            .unwrap();

        assert_eq!(report.eligible_orders, 0);
        assert_eq!(report.temp_files_deleted, 1);
        assert!(storage.exists(&old));
        assert!(!storage.exists(&orphan));
        assert_eq!(store.file_of(id), Some(old));
    }

    #[tokio::test]
    async fn test_cleanup_potential() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let store = MemoryRetentionStore::default();
        let old = order_file(&storage, "old.pdf", b"0123456789");
        store.add("Delivered", "Success", Some(&old), 60);

        let potential = cleanup_potential(&store, &storage, &RetentionPolicy::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(potential.eligible_orders, 1);
        assert_eq!(potential.estimated_bytes, 10);
        assert!(storage.exists(&old));
    }
}
