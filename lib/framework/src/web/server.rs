use std::net::SocketAddr;

use axum::Router;
use axum::extract::MatchedPath;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::debug;
use tracing::info;

use crate::exception::CoreRsResult;
use crate::log;

pub struct HttpServerConfig {
    pub bind_address: String,
}

impl HttpServerConfig {
    pub fn with_port(port: u16) -> Self {
        HttpServerConfig {
            bind_address: format!("0.0.0.0:{port}"),
        }
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        HttpServerConfig::with_port(8080)
    }
}

pub async fn start_http_server(
    router: Router,
    mut shutdown_signal: broadcast::Receiver<()>,
    config: HttpServerConfig,
) -> CoreRsResult<()> {
    let app = Router::new();
    let app = app.merge(router);
    let app = app.layer(middleware::from_fn(http_server_layer));
    let app = app.into_make_service_with_connect_info::<SocketAddr>();
    let listener = TcpListener::bind(&config.bind_address).await.map_err(|err| {
        exception!(
            message = format!("failed to bind http server, bind={}", config.bind_address),
            source = err
        )
    })?;
    info!("http server started, bind={}", config.bind_address);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _: Result<(), broadcast::error::RecvError> = shutdown_signal.recv().await;
        })
        .await?;
    info!("http server stopped");

    Ok(())
}

async fn http_server_layer(request: Request, next: Next) -> Response {
    // skip log for health check
    if request.uri().path() == "/health-check" {
        return StatusCode::OK.into_response();
    }

    let mut response = None;
    log::start_action("http", None, async {
        let method = request.method().clone();
        let uri = request.uri().clone();
        debug!(uri = ?uri, method = ?method, "context");

        if let Some(matched_path) = request.extensions().get::<MatchedPath>() {
            debug!(matched_path = matched_path.as_str(), "context");
        }

        let http_response = next.run(request).await;

        let status = http_response.status().as_u16();
        debug!(status, "[response]");
        debug!(response_status = status, "context");
        response = Some(http_response);
        Ok(())
    })
    .await;
    response.unwrap_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
