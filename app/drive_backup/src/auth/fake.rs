use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use framework::exception;
use framework::exception::CoreRsResult;
use serde_json::Map;

use super::CodePrompt;
use super::TokenExchange;
use crate::credential::Credentials;
use crate::credential::Token;

pub const AUTHORIZATION_CODE: &str = "4/code";

#[derive(Clone, Default)]
pub struct FakeExchange {
    pub exchanges: Arc<AtomicUsize>,
    pub refreshes: Arc<AtomicUsize>,
    pub reject: bool,
}

impl FakeExchange {
    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl TokenExchange for FakeExchange {
    async fn exchange_code(&self, _credentials: &Credentials, code: &str) -> CoreRsResult<Token> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(exception!(message = "invalid_grant"));
        }
        assert_eq!(code, AUTHORIZATION_CODE);
        Ok(token("issued", Some("refresh"), None))
    }

    async fn refresh_token(&self, _credentials: &Credentials, refresh_token: &str) -> CoreRsResult<Token> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        assert_eq!(refresh_token, "refresh");
        Ok(token("refreshed", None, Some(i64::MAX)))
    }
}

#[derive(Clone, Default)]
pub struct FakePrompt {
    pub prompts: Arc<AtomicUsize>,
}

impl FakePrompt {
    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl CodePrompt for FakePrompt {
    async fn read_code(&self, auth_url: &str) -> CoreRsResult<String> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        assert!(auth_url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(auth_url.contains("access_type=offline"));
        assert!(auth_url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdrive"));
        Ok(AUTHORIZATION_CODE.to_owned())
    }
}

pub fn token(access_token: &str, refresh_token: Option<&str>, expiry_date: Option<i64>) -> Token {
    Token {
        access_token: access_token.to_owned(),
        refresh_token: refresh_token.map(str::to_owned),
        scope: None,
        token_type: Some("Bearer".to_owned()),
        expiry_date,
        extra: Map::new(),
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        client_id: "client".to_owned(),
        client_secret: "secret".to_owned(),
        redirect_uri: "urn:ietf:wg:oauth:2.0:oob".to_owned(),
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_owned(),
        token_uri: "https://oauth2.googleapis.com/token".to_owned(),
    }
}
