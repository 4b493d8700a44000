use crate::error::{FederationError, Result};
use crate::helpers::base64_decode_to_string;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tracing::debug;
use url::Url;

/// What the operator supplies to the identity provider.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LoginDetails {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl LoginDetails {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(FederationError::Auth("empty identity provider URL".into()));
        }
        if self.username.trim().is_empty() {
            return Err(FederationError::Auth("empty username".into()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for LoginDetails {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginDetails")
            .field("url", &self.url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// An identity provider that turns login details into a base64 SAML
/// assertion.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, details: &LoginDetails) -> Result<String>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdpProvider {
    #[default]
    Custom,
}

impl IdpProvider {
    pub fn client(self, http: reqwest::Client) -> Box<dyn Authenticator> {
        match self {
            Self::Custom => Box::new(CustomClient::new(http)),
        }
    }
}

impl FromStr for IdpProvider {
    type Err = FederationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "custom" => Ok(Self::Custom),
            other => Err(FederationError::Auth(format!(
                "unsupported identity provider {other:?}"
            ))),
        }
    }
}

impl Display for IdpProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Posts a username/password form and expects `{"success": true, "data": <assertion>}`.
pub struct CustomClient {
    http: reqwest::Client,
}

impl CustomClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Authenticator for CustomClient {
    async fn authenticate(&self, details: &LoginDetails) -> Result<String> {
        details.validate()?;

        let url = Url::parse(&details.url)
            .map_err(|e| FederationError::Auth(format!("error building login request URL: {e}")))?;

        debug!("Authenticating {} against {}", details.username, url);

        let response = self
            .http
            .post(url)
            .form(&[
                ("username", details.username.as_str()),
                ("password", details.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FederationError::remote(None, format!("error retrieving auth response: {e}")))?;

        let status = response.status();
        if !status.is_success() && !status.is_redirection() {
            return Err(FederationError::Auth(format!(
                "identity provider answered {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FederationError::remote(None, format!("error reading auth response: {e}")))?;

        parse_auth_response(&body)
    }
}

/// Extracts the assertion from the custom provider's JSON reply.
pub fn parse_auth_response(body: &str) -> Result<String> {
    let reply: Value = serde_json::from_str(body)
        .map_err(|e| FederationError::Auth(format!("unreadable auth response: {e}")))?;

    let success = match reply.get("success") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) => flag == "true",
        _ => false,
    };
    if !success {
        return Err(FederationError::Auth(
            "identity provider rejected the credentials".into(),
        ));
    }

    let assertion = reply
        .get("data")
        .and_then(Value::as_str)
        .filter(|data| !data.trim().is_empty())
        .ok_or_else(|| FederationError::Auth("auth response carries no assertion".into()))?;

    let decoded = base64_decode_to_string(assertion)
        .map_err(|e| FederationError::Auth(format!("failed to decode SAML response: {e}")))?;
    debug!("Custom auth response: {}", decoded);

    Ok(assertion.to_string())
}
