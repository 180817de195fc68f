use tokio::task_local;
use tracing::Instrument;
use tracing::Level;
use tracing::info_span;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use crate::exception::CoreRsResult;
use crate::exception::Exception;
use crate::exception::Severity;

task_local! {
    static CURRENT_ACTION_ID: String
}

pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(false) // generally cloud log console doesn't support color
                .with_line_number(true)
                .with_thread_ids(true)
                .with_filter(LevelFilter::INFO),
        )
        .init();
}

macro_rules! log_event {
    (level = $level:ident, error_code = $error_code:expr, $($arg:tt)+) => {
        match $level {
            ::tracing::Level::WARN => {
                match $error_code {
                    Some(ref error_code) => ::tracing::warn!(error_code, $($arg)+),
                    None => ::tracing::warn!($($arg)+),
                }
            },
            _ => {
                match $error_code {
                    Some(ref error_code) => ::tracing::error!(error_code, $($arg)+),
                    None => ::tracing::error!($($arg)+),
                }
            }
        }
    };
}

// errors end here, they are logged and not propagated
pub async fn start_action<T>(action: &str, ref_id: Option<String>, task: T)
where
    T: Future<Output = CoreRsResult<()>>,
{
    let action_id = random_id();
    let action_span = info_span!("action", action, action_id, ref_id);
    CURRENT_ACTION_ID
        .scope(
            action_id,
            async {
                if let Err(e) = task.await {
                    log_exception(&e);
                }
            }
            .instrument(action_span),
        )
        .await;
}

pub fn log_exception(e: &Exception) {
    let level = match e.severity {
        Severity::Warn => Level::WARN,
        Severity::Error => Level::ERROR,
    };
    let message = &e.message;
    log_event!(
        level = level,
        error_code = e.code,
        backtrace = e.to_string(),
        "{message}"
    );
}

pub fn current_action_id() -> Option<String> {
    CURRENT_ACTION_ID
        .try_with(|current_action_id| Some(current_action_id.clone()))
        .unwrap_or(None)
}

fn random_id() -> String {
    Uuid::now_v7().simple().to_string()
}
