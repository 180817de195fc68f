use chrono::DateTime;
use chrono::Months;
use chrono::Utc;
use framework::exception::CoreRsResult;
use futures::future::join_all;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::drive::DriveApi;
use crate::drive::DriveFile;

pub struct RetentionPolicy {
    pub retention: Months,
    pub page_size: u32,
    pub query: Option<String>,
}

impl RetentionPolicy {
    // without a query only non-trashed files named after the backup are listed, an empty query lists everything
    pub fn new(backup_name: &str, retention_months: u32, page_size: u32, query: Option<String>) -> Self {
        let query = query.unwrap_or_else(|| {
            let name = backup_name.replace('\\', "\\\\").replace('\'', "\\'");
            format!("name contains '{name}_' and trashed = false")
        });
        RetentionPolicy {
            retention: Months::new(retention_months),
            page_size,
            query: if query.is_empty() { None } else { Some(query) },
        }
    }
}

pub fn filter_files_by_date(files: Vec<DriveFile>, now: DateTime<Utc>, retention: Months) -> Vec<DriveFile> {
    let Some(cutoff) = now.checked_sub_months(retention) else {
        warn!("retention cutoff is out of range, skip filtering, now={now}");
        return Vec::new();
    };
    files
        .into_iter()
        .filter(|file| {
            file.created_time
                .as_deref()
                .and_then(|created_time| DateTime::parse_from_rfc3339(created_time).ok())
                // strictly older, an entry exactly at the cutoff is kept
                .is_some_and(|created_time| created_time < cutoff)
        })
        .collect()
}

pub async fn sweep_backups<D>(drive: &D, policy: &RetentionPolicy, now: DateTime<Utc>) -> CoreRsResult<usize>
where
    D: DriveApi,
{
    // single page only, deletes are independent and a failed one does not stop the others
    let list = drive.list_files(policy.page_size, policy.query.as_deref()).await?;
    if list.next_page_token.is_some() {
        warn!(
            "listing has more pages, only the first page is swept, page_size={}",
            policy.page_size
        );
    }
    debug!(listed_files = list.files.len(), "stats");

    let expired = filter_files_by_date(list.files, now, policy.retention);
    info!("delete expired backups, count={}", expired.len());

    join_all(expired.iter().map(|file| async move {
        match drive.delete_file(&file.id).await {
            Ok(()) => info!(file_id = file.id.as_str(), "expired backup deleted"),
            Err(e) => warn!(file_id = file.id.as_str(), "failed to delete expired backup, error={e}"),
        }
    }))
    .await;

    Ok(expired.len())
}
