use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use framework::exception;
use framework::exception::CoreRsResult;
use framework::http::HttpClient;
use framework::http::HttpMethod::POST;
use framework::http::HttpRequest;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use tokio::io;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::Mutex;
use tracing::info;
use tracing::warn;
use url::Url;

use crate::credential::Credentials;
use crate::credential::Token;
use crate::error_code::BAD_CREDENTIALS;
use crate::error_code::EXCHANGE_FAILED;

#[cfg(test)]
pub mod fake;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

pub trait TokenExchange: Send + Sync {
    fn exchange_code(&self, credentials: &Credentials, code: &str) -> impl Future<Output = CoreRsResult<Token>> + Send;

    fn refresh_token(
        &self,
        credentials: &Credentials,
        refresh_token: &str,
    ) -> impl Future<Output = CoreRsResult<Token>> + Send;
}

pub trait CodePrompt: Send + Sync {
    fn read_code(&self, auth_url: &str) -> impl Future<Output = CoreRsResult<String>> + Send;
}

#[derive(Clone)]
pub struct GoogleOAuth {
    http_client: HttpClient,
}

impl GoogleOAuth {
    pub fn new(http_client: HttpClient) -> Self {
        GoogleOAuth { http_client }
    }

    async fn token_request(&self, request: HttpRequest) -> CoreRsResult<Token> {
        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(exception!(
                message = format!(
                    "token endpoint rejected request, status={}, body={}",
                    response.status, response.body
                )
            ));
        }
        let token: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|err| exception!(message = "failed to deserialize token response", source = err))?;
        Ok(token.into_token(Utc::now()))
    }
}

impl TokenExchange for GoogleOAuth {
    async fn exchange_code(&self, credentials: &Credentials, code: &str) -> CoreRsResult<Token> {
        let mut request = HttpRequest::new(POST, credentials.token_uri.clone());
        request.form(&[
            ("code", code),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("redirect_uri", credentials.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ]);
        self.token_request(request).await
    }

    async fn refresh_token(&self, credentials: &Credentials, refresh_token: &str) -> CoreRsResult<Token> {
        let mut request = HttpRequest::new(POST, credentials.token_uri.clone());
        request.form(&[
            ("refresh_token", refresh_token),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ]);
        self.token_request(request).await
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
    token_type: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> Token {
        Token {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            scope: self.scope,
            token_type: self.token_type,
            expiry_date: self
                .expires_in
                .map(|expires_in| now.timestamp_millis().saturating_add(expires_in.saturating_mul(1000))),
            extra: self.extra,
        }
    }
}

pub struct ConsolePrompt;

impl CodePrompt for ConsolePrompt {
    async fn read_code(&self, auth_url: &str) -> CoreRsResult<String> {
        let mut stdout = io::stdout();
        stdout
            .write_all(
                format!("Authorize this app by visiting this url: {auth_url}\nEnter the code from that page here: ")
                    .as_bytes(),
            )
            .await?;
        stdout.flush().await?;

        let mut line = String::new();
        let read = BufReader::new(io::stdin()).read_line(&mut line).await?;
        if read == 0 {
            return Err(exception!(
                code = EXCHANGE_FAILED,
                message = "stdin closed before authorization code was entered"
            ));
        }
        Ok(line.trim().to_owned())
    }
}

pub struct Authorizer<E, P> {
    token_path: PathBuf,
    exchange: E,
    prompt: P,
    interactive_lock: Mutex<()>,
}

impl<E, P> Authorizer<E, P>
where
    E: TokenExchange + Clone,
    P: CodePrompt,
{
    pub fn new(token_path: PathBuf, exchange: E, prompt: P) -> Self {
        Authorizer {
            token_path,
            exchange,
            prompt,
            interactive_lock: Mutex::new(()),
        }
    }

    // without a stored token this waits on the console for the operator, an unattended run stalls here
    pub async fn authorize(&self, credentials: Arc<Credentials>) -> CoreRsResult<AuthorizedClient<E>> {
        if let Some(token) = self.stored_token() {
            return Ok(self.client(credentials, token));
        }

        let _guard = self.interactive_lock.lock().await;
        // another branch may have finished the flow while waiting
        if let Some(token) = self.stored_token() {
            return Ok(self.client(credentials, token));
        }

        let token = self.request_token(&credentials).await?;
        store_token(&self.token_path, &token);
        Ok(self.client(credentials, token))
    }

    async fn request_token(&self, credentials: &Credentials) -> CoreRsResult<Token> {
        let auth_url = authorization_url(credentials)?;
        warn!(
            "no valid token, waiting for operator to authorize on console, token_path={}",
            self.token_path.to_string_lossy()
        );
        info!("authorize this app by visiting this url: {auth_url}");

        let code = self.prompt.read_code(&auth_url).await?;
        if code.is_empty() {
            return Err(exception!(code = EXCHANGE_FAILED, message = "authorization code is empty"));
        }

        self.exchange.exchange_code(credentials, &code).await.map_err(|err| {
            exception!(
                code = EXCHANGE_FAILED,
                message = "failed to exchange authorization code",
                source = err
            )
        })
    }

    fn stored_token(&self) -> Option<Token> {
        if !self.token_path.exists() {
            info!("token file not found, path={}", self.token_path.to_string_lossy());
            return None;
        }
        match Token::load(&self.token_path) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("token file is unreadable, error={e}");
                None
            }
        }
    }

    fn client(&self, credentials: Arc<Credentials>, token: Token) -> AuthorizedClient<E> {
        AuthorizedClient {
            credentials,
            token: Mutex::new(token),
            token_path: self.token_path.clone(),
            exchange: self.exchange.clone(),
        }
    }
}

fn authorization_url(credentials: &Credentials) -> CoreRsResult<String> {
    let url = Url::parse_with_params(
        &credentials.auth_uri,
        &[
            ("access_type", "offline"),
            ("scope", DRIVE_SCOPE),
            ("response_type", "code"),
            ("client_id", credentials.client_id.as_str()),
            ("redirect_uri", credentials.redirect_uri.as_str()),
        ],
    )
    .map_err(|err| {
        exception!(
            code = BAD_CREDENTIALS,
            message = format!("invalid auth uri, auth_uri={}", credentials.auth_uri),
            source = err
        )
    })?;
    Ok(url.into())
}

// failing to persist only costs a new consent next run, the in-memory token is still usable
fn store_token(path: &Path, token: &Token) {
    match token.save(path) {
        Ok(()) => info!("token stored to: {}", path.to_string_lossy()),
        Err(e) => warn!("failed to store token, error={e}"),
    }
}

pub struct AuthorizedClient<E> {
    credentials: Arc<Credentials>,
    token: Mutex<Token>,
    token_path: PathBuf,
    exchange: E,
}

impl<E> AuthorizedClient<E>
where
    E: TokenExchange,
{
    pub async fn access_token(&self) -> CoreRsResult<String> {
        let mut token = self.token.lock().await;
        if token.is_expired(Utc::now())
            && let Some(refresh_token) = token.refresh_token.clone()
        {
            info!("access token expired, refresh token");
            let mut refreshed = self
                .exchange
                .refresh_token(&self.credentials, &refresh_token)
                .await
                .map_err(|err| exception!(code = EXCHANGE_FAILED, message = "failed to refresh token", source = err))?;
            if refreshed.refresh_token.is_none() {
                refreshed.refresh_token = Some(refresh_token);
            }
            store_token(&self.token_path, &refreshed);
            *token = refreshed;
        }
        Ok(token.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use axum::http::Method;
    use axum::http::StatusCode;
    use axum::http::header;
    use chrono::TimeZone;
    use chrono::Utc;
    use framework::http::HttpClient;
    use tempfile::TempDir;

    use super::Authorizer;
    use super::GoogleOAuth;
    use super::TokenExchange;
    use super::TokenResponse;
    use super::fake::FakeExchange;
    use super::fake::FakePrompt;
    use super::fake::credentials;
    use super::fake::token;
    use crate::credential::Credentials;
    use crate::credential::Token;
    use crate::error_code::EXCHANGE_FAILED;
    use crate::mock_server::MockServer;

    const TOKEN_RESPONSE: &str =
        r#"{"access_token":"access","expires_in":3599,"refresh_token":"refresh","token_type":"Bearer"}"#;

    fn authorizer(token_path: &Path, exchange: FakeExchange, prompt: FakePrompt) -> Authorizer<FakeExchange, FakePrompt> {
        Authorizer::new(token_path.to_path_buf(), exchange, prompt)
    }

    fn local_credentials(server: &MockServer) -> Credentials {
        Credentials {
            token_uri: format!("{}/token", server.url),
            ..credentials()
        }
    }

    fn pairs(values: &[(&str, &str)]) -> Vec<(String, String)> {
        values
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[tokio::test]
    async fn stored_token_skips_prompt() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");
        token("stored", None, None).save(&token_path).unwrap();
        let exchange = FakeExchange::default();
        let prompt = FakePrompt::default();

        let client = authorizer(&token_path, exchange.clone(), prompt.clone())
            .authorize(Arc::new(credentials()))
            .await
            .unwrap();

        assert_eq!(client.access_token().await.unwrap(), "stored");
        assert_eq!(prompt.prompts(), 0);
        assert_eq!(exchange.exchanges(), 0);
    }

    #[tokio::test]
    async fn missing_token_prompts_once_and_stores() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");
        let exchange = FakeExchange::default();
        let prompt = FakePrompt::default();
        let authorizer = authorizer(&token_path, exchange.clone(), prompt.clone());

        let client = authorizer.authorize(Arc::new(credentials())).await.unwrap();
        assert_eq!(client.access_token().await.unwrap(), "issued");
        assert_eq!(prompt.prompts(), 1);
        assert_eq!(exchange.exchanges(), 1);
        assert_eq!(Token::load(&token_path).unwrap().access_token, "issued");

        let client = authorizer.authorize(Arc::new(credentials())).await.unwrap();
        assert_eq!(client.access_token().await.unwrap(), "issued");
        assert_eq!(prompt.prompts(), 1);
    }

    #[tokio::test]
    async fn concurrent_authorize_prompts_once() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");
        let prompt = FakePrompt::default();
        let authorizer = authorizer(&token_path, FakeExchange::default(), prompt.clone());
        let credentials = Arc::new(credentials());

        let (upload, sweep) = tokio::join!(
            authorizer.authorize(credentials.clone()),
            authorizer.authorize(credentials.clone())
        );
        assert!(upload.is_ok());
        assert!(sweep.is_ok());
        assert_eq!(prompt.prompts(), 1);
    }

    #[tokio::test]
    async fn invalid_token_file_prompts() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");
        fs::write(&token_path, "corrupted").unwrap();
        let prompt = FakePrompt::default();

        let client = authorizer(&token_path, FakeExchange::default(), prompt.clone())
            .authorize(Arc::new(credentials()))
            .await
            .unwrap();

        assert_eq!(client.access_token().await.unwrap(), "issued");
        assert_eq!(prompt.prompts(), 1);
        assert_eq!(Token::load(&token_path).unwrap().access_token, "issued");
    }

    #[tokio::test]
    async fn rejected_exchange() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");
        let exchange = FakeExchange {
            reject: true,
            ..FakeExchange::default()
        };

        let result = authorizer(&token_path, exchange, FakePrompt::default())
            .authorize(Arc::new(credentials()))
            .await;

        assert!(result.err().is_some_and(|e| e.has_code(EXCHANGE_FAILED)));
        assert!(!token_path.exists());
    }

    #[tokio::test]
    async fn unwritable_token_path_still_authorizes() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("missing_dir").join("token.json");

        let client = authorizer(&token_path, FakeExchange::default(), FakePrompt::default())
            .authorize(Arc::new(credentials()))
            .await
            .unwrap();

        assert_eq!(client.access_token().await.unwrap(), "issued");
        assert!(!token_path.exists());
    }

    #[tokio::test]
    async fn expired_token_is_refreshed() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");
        token("expired", Some("refresh"), Some(0)).save(&token_path).unwrap();
        let exchange = FakeExchange::default();

        let client = authorizer(&token_path, exchange.clone(), FakePrompt::default())
            .authorize(Arc::new(credentials()))
            .await
            .unwrap();

        assert_eq!(client.access_token().await.unwrap(), "refreshed");
        assert_eq!(client.access_token().await.unwrap(), "refreshed");
        assert_eq!(exchange.refreshes(), 1);

        let stored = Token::load(&token_path).unwrap();
        assert_eq!(stored.access_token, "refreshed");
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));
    }

    #[test]
    fn token_response_expiry() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"access","expires_in":3599,"scope":"https://www.googleapis.com/auth/drive","token_type":"Bearer","id_token":"id"}"#,
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 1, 30, 0).unwrap();

        let token = response.into_token(now);
        assert_eq!(token.expiry_date, Some(now.timestamp_millis() + 3_599_000));
        assert!(token.refresh_token.is_none());
        assert_eq!(token.extra.get("id_token").and_then(|v| v.as_str()), Some("id"));
    }

    #[test]
    fn token_response_with_huge_expiry() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 1, 30, 0).unwrap();
        let response: TokenResponse =
            serde_json::from_str(&format!(r#"{{"access_token":"access","expires_in":{}}}"#, i64::MAX)).unwrap();
        assert_eq!(response.into_token(now).expiry_date, Some(i64::MAX));

        let response: TokenResponse =
            serde_json::from_str(&format!(r#"{{"access_token":"access","expires_in":{}}}"#, i64::MIN)).unwrap();
        let token = response.into_token(now);
        assert!(token.expiry_date.is_some_and(|expiry_date| expiry_date < 0));
        assert!(token.is_expired(now));
    }

    #[tokio::test]
    async fn exchange_code_posts_form() {
        let server = MockServer::start(StatusCode::OK, TOKEN_RESPONSE).await;
        let oauth = GoogleOAuth::new(HttpClient::default());

        let token = oauth
            .exchange_code(&local_credentials(&server), "4/code")
            .await
            .unwrap();

        assert_eq!(token.access_token, "access");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh"));
        assert!(token.expiry_date.is_some());

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/token");
        assert_eq!(request.header(header::CONTENT_TYPE), "application/x-www-form-urlencoded");
        assert_eq!(
            request.form(),
            pairs(&[
                ("code", "4/code"),
                ("client_id", "client"),
                ("client_secret", "secret"),
                ("redirect_uri", "urn:ietf:wg:oauth:2.0:oob"),
                ("grant_type", "authorization_code"),
            ])
        );
    }

    #[tokio::test]
    async fn refresh_token_posts_form() {
        let server = MockServer::start(StatusCode::OK, TOKEN_RESPONSE).await;
        let oauth = GoogleOAuth::new(HttpClient::default());

        let token = oauth
            .refresh_token(&local_credentials(&server), "refresh")
            .await
            .unwrap();

        assert_eq!(token.access_token, "access");
        let requests = server.requests();
        assert_eq!(
            requests[0].form(),
            pairs(&[
                ("refresh_token", "refresh"),
                ("client_id", "client"),
                ("client_secret", "secret"),
                ("grant_type", "refresh_token"),
            ])
        );
    }

    #[tokio::test]
    async fn token_endpoint_rejects() {
        let server = MockServer::start(StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#).await;
        let oauth = GoogleOAuth::new(HttpClient::default());

        let error = oauth
            .exchange_code(&local_credentials(&server), "4/code")
            .await
            .unwrap_err();

        assert!(error.to_string().contains("status=400"), "{error}");
    }
}
