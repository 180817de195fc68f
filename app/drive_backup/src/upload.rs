use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use chrono::NaiveDate;
use framework::exception;
use framework::exception::CoreRsResult;
use tokio::fs::File;
use tracing::debug;
use tracing::info;

use crate::drive::DriveApi;
use crate::error_code::FILE_NOT_FOUND;

pub const ARCHIVE_CONTENT_TYPE: &str = "application/x-7z-compressed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub local_path: PathBuf,
    pub remote_name: String,
}

impl BackupArtifact {
    pub fn new(name: &str, dir: &Path, date: NaiveDate) -> Self {
        let remote_name = format!("{name}_{}", date.format("%d.%m.%Y"));
        BackupArtifact {
            local_path: dir.join(format!("{remote_name}.7z")),
            remote_name,
        }
    }
}

pub async fn upload_backup<D>(drive: &D, artifact: &BackupArtifact) -> CoreRsResult<String>
where
    D: DriveApi,
{
    let path = artifact.local_path.to_string_lossy();
    info!("upload backup, path={path}, name={}", artifact.remote_name);

    let file = File::open(&artifact.local_path).await.map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            exception!(
                code = FILE_NOT_FOUND,
                message = format!("backup archive not found, path={path}"),
                source = err
            )
        } else {
            exception!(message = format!("failed to open backup archive, path={path}"), source = err)
        }
    })?;
    let length = file.metadata().await?.len();
    debug!(archive_size = length, "stats");

    let id = drive
        .create_file(&artifact.remote_name, ARCHIVE_CONTENT_TYPE, file, length)
        .await?;
    info!(file_id = id.as_str(), "backup uploaded");
    Ok(id)
}
