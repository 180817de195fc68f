use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use auth::Authorizer;
use auth::ConsolePrompt;
use auth::GoogleOAuth;
use axum::Router;
use chrono::FixedOffset;
use drive::GoogleDriveConnector;
use framework::asset::asset_path;
use framework::exception;
use framework::exception::CoreRsResult;
use framework::http::HttpClient;
use framework::json;
use framework::log;
use framework::schedule::Scheduler;
use framework::shutdown::Shutdown;
use framework::task;
use framework::web::server::HttpServerConfig;
use framework::web::server::start_http_server;
use job::drive_backup_job;
use serde::Deserialize;
use sweep::RetentionPolicy;
use tracing::info;

mod auth;
mod credential;
mod drive;
mod error_code;
mod job;
#[cfg(test)]
mod mock_server;
mod sweep;
mod upload;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Deserialize, Clone)]
struct AppConfig {
    backup_name: String,
    backup_dir: String,
    schedule: String,
    timezone_offset_hours: i32,
    retention_months: u32,
    list_page_size: u32,
    list_query: Option<String>,
    http_timeout_secs: u64,
}

struct EnvConfig {
    port: u16,
    credentials_path: PathBuf,
    token_path: PathBuf,
}

impl EnvConfig {
    fn load() -> CoreRsResult<Self> {
        Ok(EnvConfig {
            port: parse_port(env::var("PORT").ok())?,
            credentials_path: PathBuf::from(required_env("CREDENTIALS_PATH")?),
            token_path: PathBuf::from(required_env("TOKEN_PATH")?),
        })
    }
}

fn parse_port(value: Option<String>) -> CoreRsResult<u16> {
    match value {
        Some(port) => port
            .parse::<u16>()
            .map_err(|err| exception!(message = format!("invalid PORT, value={port}"), source = err)),
        None => Ok(DEFAULT_PORT),
    }
}

fn required_env(name: &str) -> CoreRsResult<String> {
    env::var(name).map_err(|err| exception!(message = format!("env var is required, name={name}"), source = err))
}

pub struct AppState<E = GoogleOAuth, P = ConsolePrompt, C = GoogleDriveConnector> {
    backup_name: String,
    backup_dir: PathBuf,
    timezone: FixedOffset,
    credentials_path: PathBuf,
    authorizer: Authorizer<E, P>,
    connector: C,
    retention: RetentionPolicy,
}

impl AppState {
    fn new(config: &AppConfig, env: &EnvConfig) -> CoreRsResult<Self> {
        let timezone = FixedOffset::east_opt(config.timezone_offset_hours * 60 * 60).ok_or_else(|| {
            exception!(message = format!("invalid timezone offset, hours={}", config.timezone_offset_hours))
        })?;

        Ok(AppState {
            backup_name: config.backup_name.clone(),
            backup_dir: PathBuf::from(&config.backup_dir),
            timezone,
            credentials_path: env.credentials_path.clone(),
            authorizer: Authorizer::new(
                env.token_path.clone(),
                GoogleOAuth::new(HttpClient::default()),
                ConsolePrompt,
            ),
            connector: GoogleDriveConnector::new(HttpClient::new(Duration::from_secs(config.http_timeout_secs))),
            retention: RetentionPolicy::new(
                &config.backup_name,
                config.retention_months,
                config.list_page_size,
                config.list_query.clone(),
            ),
        })
    }
}

#[tokio::main]
async fn main() -> CoreRsResult<()> {
    log::init();

    if let Ok(path) = dotenvy::dotenv() {
        info!("loaded env file, path={}", path.to_string_lossy());
    }
    let config: AppConfig = json::load_file(&asset_path("assets/conf.json")?)?;
    let env = EnvConfig::load()?;

    let shutdown = Shutdown::new();
    let http_signal = shutdown.subscribe();
    let scheduler_signal = shutdown.subscribe();
    shutdown.listen();

    let state = Arc::new(AppState::new(&config, &env)?);

    let mut scheduler: Scheduler<Arc<AppState>> = Scheduler::new(state.timezone);
    scheduler.schedule_cron("drive-backup-job", drive_backup_job, &config.schedule)?;
    let scheduler_state = state.clone();
    task::spawn_task(async move { scheduler.start(scheduler_state, scheduler_signal).await });

    start_http_server(Router::new(), http_signal, HttpServerConfig::with_port(env.port)).await?;

    task::shutdown().await;

    Ok(())
}
