use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;

use bytes::Bytes;
use futures::TryStream;
pub use http::HeaderName;
pub use http::header;
use reqwest::Body;
use reqwest::Method;
use reqwest::Request;
use reqwest::Url;
use tracing::Instrument;
use tracing::debug;
use tracing::debug_span;
use tracing::warn;
use url::form_urlencoded;

use crate::exception::CoreRsResult;

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<HeaderName, String>,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
}

enum RequestBody {
    Text(String),
    Form(String),
    Stream(Body),
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: String) -> Self {
        HttpRequest {
            method,
            url,
            headers: HashMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn query(&mut self, key: &str, value: impl Into<String>) {
        self.query.push((key.to_owned(), value.into()));
    }

    pub fn bearer_auth(&mut self, access_token: &str) {
        self.headers.insert(header::AUTHORIZATION, format!("Bearer {access_token}"));
    }

    pub fn body(&mut self, body: String, content_type: impl Into<String>) {
        self.body = Some(RequestBody::Text(body));
        self.headers.insert(header::CONTENT_TYPE, content_type.into());
    }

    pub fn form(&mut self, params: &[(&str, &str)]) {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        self.body = Some(RequestBody::Form(body));
        self.headers
            .insert(header::CONTENT_TYPE, "application/x-www-form-urlencoded".to_owned());
    }

    pub fn stream_body<S>(&mut self, stream: S, content_type: impl Into<String>, content_length: Option<u64>)
    where
        S: TryStream + Send + 'static,
        Bytes: From<S::Ok>,
        S::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        self.body = Some(RequestBody::Stream(Body::wrap_stream(stream)));
        self.headers.insert(header::CONTENT_TYPE, content_type.into());
        if let Some(length) = content_length {
            self.headers.insert(header::CONTENT_LENGTH, length.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::GET => Method::GET,
            HttpMethod::POST => Method::POST,
            HttpMethod::PUT => Method::PUT,
            HttpMethod::DELETE => Method::DELETE,
        }
    }
}

pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<HeaderName, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(300))
            .connection_verbose(false)
            .build()
            .unwrap_or_else(|err| {
                warn!("failed to build http client, fallback to default, error={err}");
                reqwest::Client::new()
            });
        HttpClient { client }
    }

    pub async fn execute(&self, request: HttpRequest) -> CoreRsResult<HttpResponse> {
        let span = debug_span!("http_client", url = request.url, method = ?request.method);
        async {
            debug!(method = ?request.method, "[request]");
            debug!(url = request.url, "[request]");
            let mut url = Url::parse(&request.url)?;
            if !request.query.is_empty() {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in &request.query {
                    debug!("[param] {key}={value}");
                    pairs.append_pair(key, value);
                }
            }
            let mut http_request = Request::new(request.method.into(), url);
            for (key, value) in request.headers {
                if key == header::AUTHORIZATION {
                    debug!("[header] {key}=******");
                } else {
                    debug!("[header] {key}={value}");
                }
                http_request.headers_mut().insert(key, value.parse()?);
            }
            match request.body {
                Some(RequestBody::Text(body)) => {
                    debug!("[request] body={body}");
                    *http_request.body_mut() = Some(Body::from(body));
                }
                Some(RequestBody::Form(body)) => {
                    // form bodies carry oauth secrets
                    debug!("[request] body=<form>");
                    *http_request.body_mut() = Some(Body::from(body));
                }
                Some(RequestBody::Stream(body)) => {
                    debug!("[request] body=<stream>");
                    *http_request.body_mut() = Some(body);
                }
                None => {}
            }

            let response = self.client.execute(http_request).await?;
            let status = response.status().as_u16();
            let mut headers = HashMap::new();
            debug!(status, "[response]");
            for (key, value) in response.headers() {
                let value = value.to_str()?;
                debug!("[header] {key}={value}");
                headers.insert(key.to_owned(), value.to_owned());
            }

            let body = response.text().await?;
            if let Some(content_type) = headers.get(&header::CONTENT_TYPE)
                && (content_type.contains("json") || content_type.contains("text"))
            {
                debug!("[response] body={body}");
            }

            Ok(HttpResponse { status, headers, body })
        }
        .instrument(span)
        .await
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        HttpClient::new(Duration::from_secs(30))
    }
}
