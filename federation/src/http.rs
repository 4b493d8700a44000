use crate::error::{FederationError, Result};
use reqwest::redirect::Policy;

pub use reqwest::Client as HttpClient;

const USER_AGENT: &str = concat!("saml-sts-login/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 10;

/// Client shared by the identity provider and the role selection page.
/// Cookies persist across requests so the page sees the provider's session.
pub fn create_http_client(skip_verify: bool) -> Result<HttpClient> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .cookie_store(true)
        .danger_accept_invalid_certs(skip_verify)
        .redirect(Policy::custom(|attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else {
                attempt.follow()
            }
        }))
        .build()
        .map_err(|e| FederationError::remote(None, format!("error building http client: {e}")))
}
