//! OAuth2 resource-owner password grant.
//!
//! For identity providers that expose a token endpoint directly, this avoids
//! scripting the login page altogether.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as TimeDelta, Utc};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use url::Url;

use crate::auth::{TokenProvider, TokenResult};
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PasswordGrantProvider {
    http: reqwest::Client,
    token_endpoint: Url,
    client_id: Option<String>,
    scope: Option<String>,
}

impl PasswordGrantProvider {
    pub fn new(token_endpoint: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;
        Self::with_http(token_endpoint, http)
    }

    pub fn with_http(token_endpoint: &str, http: reqwest::Client) -> Result<Self> {
        let token_endpoint = Url::parse(token_endpoint)
            .map_err(|e| Error::Config(format!("Invalid token endpoint: {}", e)))?;
        Ok(Self {
            http,
            token_endpoint,
            client_id: None,
            scope: None,
        })
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    fn form_body(&self, username: &str, password: &str) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", "password")
            .append_pair("username", username)
            .append_pair("password", password);
        if let Some(client_id) = &self.client_id {
            form.append_pair("client_id", client_id);
        }
        if let Some(scope) = &self.scope {
            form.append_pair("scope", scope);
        }
        form.finish()
    }
}

#[async_trait]
impl TokenProvider for PasswordGrantProvider {
    fn name(&self) -> &str {
        "password_grant"
    }

    async fn login(&self, username: &str, password: &str) -> Result<TokenResult> {
        let response = self
            .http
            .post(self.token_endpoint.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(self.form_body(username, password))
            .send()
            .await
            .map_err(|e| Error::auth(format!("Token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => body.trim().to_string(),
            };
            return Err(Error::auth(format!(
                "Token endpoint returned HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Unexpected token response: {}", e)))?;

        if body.access_token.is_empty() {
            return Err(Error::auth("Token endpoint returned an empty access token"));
        }

        if body.expires_in <= 0 {
            return Err(Error::auth(format!(
                "Token endpoint returned a non-positive lifetime: {}",
                body.expires_in
            )));
        }

        let expires_at = TimeDelta::try_seconds(body.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                Error::auth(format!("Token lifetime out of range: {}", body.expires_in))
            })?;
        let token_type = body.token_type.as_deref().unwrap_or(DEFAULT_TOKEN_TYPE);

        Ok(TokenResult::new(
            format!("{} {}", token_type, body.access_token),
            expires_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_body_encoding() {
        let provider = PasswordGrantProvider::new("https://idp.example.com/oauth/token")
            .unwrap()
            .with_client_id("spark-web");
        let body = provider.form_body("alice@example.com", "p&ss w=rd");

        assert_eq!(
            body,
            "grant_type=password&username=alice%40example.com&password=p%26ss+w%3Drd&client_id=spark-web"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = PasswordGrantProvider::new("not a url").unwrap_err();
        assert!(err.is_configuration_error());
    }
}
