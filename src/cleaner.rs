use crate::storage::{StorageError, StorageService};
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::fmt;
use std::time::Instant;
use thiserror::Error;

/// Largest number of files requested per listing call.
pub const PAGE_SIZE: usize = 25;

#[derive(Debug, Clone)]
pub struct CleanerConfig {
    pub concurrency_limit: usize,
    pub page_size: usize,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 10,
            page_size: PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDeletion {
    pub id: String,
    pub error: String,
}

impl fmt::Display for FailedDeletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.error)
    }
}

fn format_failures(failures: &[FailedDeletion]) -> String {
    let items: Vec<String> = failures.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to list files from bucket {bucket_id}: {source}")]
    List {
        bucket_id: String,
        #[source]
        source: StorageError,
    },

    /// Deletion stopped after the page in which `failures` happened.
    #[error(
        "Deleted {deleted} files, but failed to delete {} files: {}",
        .failures.len(),
        format_failures(.failures)
    )]
    PartialFailure {
        deleted: usize,
        /// Files from the failing page that were deleted.
        deleted_in_page: Vec<String>,
        failures: Vec<FailedDeletion>,
    },
}

impl CleanupError {
    /// Full description for server-side logs, including what was deleted in a failing page.
    pub fn detail(&self) -> String {
        match self {
            CleanupError::PartialFailure {
                deleted_in_page, ..
            } => format!("{self}; deleted in failing page: {deleted_in_page:?}"),
            _ => self.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub deleted: usize,
    pub pages: usize,
}

/// Returns the instant before which files are eligible for deletion.
pub fn expiry_cutoff(now: DateTime<Utc>, retention_days: u32) -> Result<DateTime<Utc>, CleanupError> {
    Duration::try_days(retention_days.into())
        .and_then(|retention| now.checked_sub_signed(retention))
        .ok_or_else(|| {
            CleanupError::Validation(format!(
                "Retention period of {retention_days} days is out of range"
            ))
        })
}

/// Deletes every file in `bucket_id` created before `cutoff`, one page at a time.
///
/// Deleting shrinks the filtered listing, so each iteration lists the first
/// page again until it comes back empty. If any deletion in a page fails the
/// rest of that page still runs, then no further page is listed.
pub async fn clean_bucket<S>(
    storage: &S,
    bucket_id: &str,
    cutoff: DateTime<Utc>,
    config: &CleanerConfig,
) -> Result<CleanupSummary, CleanupError>
where
    S: StorageService + ?Sized,
{
    if bucket_id.trim().is_empty() {
        return Err(CleanupError::Validation("Bucket ID must not be empty".to_string()));
    }

    let page_size = config.page_size.clamp(1, PAGE_SIZE);
    let concurrency_limit = config.concurrency_limit.max(1);
    let start_time = Instant::now();
    let mut summary = CleanupSummary::default();

    debug!("Cleaning up {bucket_id} from before {cutoff}");

    loop {
        let files = storage
            .list_files(bucket_id, cutoff, page_size)
            .await
            .map_err(|source| CleanupError::List {
                bucket_id: bucket_id.to_string(),
                source,
            })?;

        if files.is_empty() {
            break;
        }
        summary.pages += 1;

        let ids: Vec<String> = files
            .into_iter()
            .filter(|file| file.created_at < cutoff)
            .filter_map(|file| file.id)
            .collect();

        if ids.is_empty() {
            warn!("Page {} of {bucket_id} listed no deletable files", summary.pages);
            break;
        }

        debug!("Deleting {} file(s) from {bucket_id} (page {})", ids.len(), summary.pages);

        let results: Vec<(String, Result<(), StorageError>)> = stream::iter(ids)
            .map(|id| async move {
                let result = storage.delete_file(bucket_id, &id).await;
                (id, result)
            })
            .buffer_unordered(concurrency_limit)
            .collect()
            .await;

        let mut deleted_in_page = Vec::new();
        let mut failures = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => {
                    debug!("Deleted {bucket_id}/{id}");
                    deleted_in_page.push(id);
                }
                Err(e) => {
                    warn!("Failed to delete {bucket_id}/{id}: {e}");
                    failures.push(FailedDeletion {
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }

        summary.deleted += deleted_in_page.len();

        if !failures.is_empty() {
            return Err(CleanupError::PartialFailure {
                deleted: summary.deleted,
                deleted_in_page,
                failures,
            });
        }
    }

    info!(
        "Cleaned {bucket_id}: deleted {} file(s) across {} page(s) in {:.2}s",
        summary.deleted,
        summary.pages,
        start_time.elapsed().as_secs_f64()
    );

    Ok(summary)
}

/// Lists the first eligible page without deleting anything.
pub async fn preview_bucket<S>(
    storage: &S,
    bucket_id: &str,
    cutoff: DateTime<Utc>,
    config: &CleanerConfig,
) -> Result<Vec<String>, CleanupError>
where
    S: StorageService + ?Sized,
{
    let files = storage
        .list_files(bucket_id, cutoff, config.page_size.clamp(1, PAGE_SIZE))
        .await
        .map_err(|source| CleanupError::List {
            bucket_id: bucket_id.to_string(),
            source,
        })?;

    let ids: Vec<String> = files.into_iter().filter_map(|file| file.id).collect();
    for id in &ids {
        debug!("Keeping (Dry-Run) {bucket_id}/{id}");
    }
    info!("Would delete {} file(s) from the first page of {bucket_id}", ids.len());

    Ok(ids)
}
