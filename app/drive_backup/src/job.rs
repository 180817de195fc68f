use std::sync::Arc;

use chrono::Utc;
use framework::exception::CoreRsResult;
use framework::schedule::JobContext;
use framework::task;
use tracing::info;

use crate::AppState;
use crate::auth::CodePrompt;
use crate::auth::TokenExchange;
use crate::credential::Credentials;
use crate::drive::DriveConnector;
use crate::sweep::sweep_backups;
use crate::upload::BackupArtifact;
use crate::upload::upload_backup;

// both branches are dispatched without waiting, each authorizes on its own so one failing never blocks the other
pub async fn drive_backup_job<E, P, C>(state: Arc<AppState<E, P, C>>, context: JobContext) -> CoreRsResult<()>
where
    E: TokenExchange + Clone + 'static,
    P: CodePrompt + 'static,
    C: DriveConnector<E> + 'static,
{
    let local_time = context.scheduled_time.with_timezone(&state.timezone);
    info!(
        "processing google drive backup at: {}",
        local_time.format("%Y-%m-%dT%H:%M:%S")
    );

    let credentials = Arc::new(Credentials::load(&state.credentials_path)?);
    let artifact = BackupArtifact::new(&state.backup_name, &state.backup_dir, local_time.date_naive());

    let upload_state = state.clone();
    let upload_credentials = credentials.clone();
    task::spawn_action("upload_backup", async move {
        let client = upload_state.authorizer.authorize(upload_credentials).await?;
        let drive = upload_state.connector.connect(client);
        upload_backup(&drive, &artifact).await?;
        Ok(())
    });

    task::spawn_action("sweep_backups", async move {
        let client = state.authorizer.authorize(credentials).await?;
        let drive = state.connector.connect(client);
        sweep_backups(&drive, &state.retention, Utc::now()).await?;
        Ok(())
    });

    Ok(())
}
