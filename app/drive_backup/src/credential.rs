use std::fmt::Debug;
use std::fmt::Formatter;
use std::path::Path;

use chrono::DateTime;
use chrono::Utc;
use framework::exception;
use framework::exception::CoreRsResult;
use framework::json;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error_code::BAD_CREDENTIALS;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const EXPIRY_SKEW_MILLIS: i64 = 60_000;

#[derive(Deserialize)]
struct CredentialsFile {
    web: Option<ClientSecret>,
    installed: Option<ClientSecret>,
}

#[derive(Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

// client secret file as downloaded from the cloud console
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_uri: String,
    pub token_uri: String,
}

impl Credentials {
    pub fn load(path: &Path) -> CoreRsResult<Self> {
        let file: CredentialsFile = json::load_file(path).map_err(|err| {
            exception!(
                code = BAD_CREDENTIALS,
                message = format!("failed to load credentials, path={}", path.to_string_lossy()),
                source = err
            )
        })?;

        let Some(secret) = file.web.or(file.installed) else {
            return Err(exception!(
                code = BAD_CREDENTIALS,
                message = format!(
                    "credentials must contain \"web\" or \"installed\" client, path={}",
                    path.to_string_lossy()
                )
            ));
        };
        let Some(redirect_uri) = secret.redirect_uris.into_iter().next() else {
            return Err(exception!(
                code = BAD_CREDENTIALS,
                message = format!("credentials has no redirect uri, path={}", path.to_string_lossy())
            ));
        };

        Ok(Credentials {
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            redirect_uri,
            auth_uri: secret.auth_uri.unwrap_or_else(|| DEFAULT_AUTH_URI.to_owned()),
            token_uri: secret.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_owned()),
        })
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"******")
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    // epoch millis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Token {
    pub fn load(path: &Path) -> CoreRsResult<Self> {
        json::load_file(path)
    }

    pub fn save(&self, path: &Path) -> CoreRsResult<()> {
        json::save_file(path, self)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date
            .is_some_and(|expiry_date| expiry_date.saturating_sub(EXPIRY_SKEW_MILLIS) <= now.timestamp_millis())
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"******")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "******"))
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("expiry_date", &self.expiry_date)
            .finish_non_exhaustive()
    }
}
