use crate::assertion::SamlAssertion;
use crate::credentials::Credentials;
use crate::error::{FederationError, Result};
use crate::role::Role;
use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

/// Error codes the identity check returns for credentials that are merely
/// stale.
const EXPIRED_TOKEN_CODES: [&str; 4] = [
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "InvalidSecurityToken.Expired",
];

/// The next hop of a delegated role chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainedRole {
    pub role_arn: String,
    pub session_name: String,
}

impl ChainedRole {
    pub fn new(role_arn: impl Into<String>, session_name: Option<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            session_name: session_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| format!("saml-login-{}", Uuid::new_v4().simple())),
        }
    }
}

/// The remote security token service.
#[async_trait]
pub trait TokenService: Send + Sync {
    async fn assume_role_with_saml(
        &self,
        role: &Role,
        assertion: &str,
        duration_seconds: i32,
    ) -> Result<Credentials>;

    /// Returns the ARN of the identity the credentials belong to.
    async fn get_caller_identity(&self, credentials: &Credentials) -> Result<String>;

    async fn assume_role(
        &self,
        source: &Credentials,
        target: &ChainedRole,
        duration_seconds: i32,
    ) -> Result<Credentials>;
}

/// Trades assertions and credentials for new credentials. Every call is a
/// single round trip; nothing is cached or retried.
pub struct CredentialExchange<S> {
    service: S,
}

impl<S: TokenService> CredentialExchange<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// A role without a trust principal fails with `NotFound` before any
    /// request is made. Failures of the call itself are `Remote`.
    pub async fn exchange(
        &self,
        assertion: &SamlAssertion,
        role: &Role,
        duration_seconds: i64,
    ) -> Result<Credentials> {
        if role.principal_arn.is_empty() {
            return Err(FederationError::not_found(format!(
                "no saml-provider principal known for role {}",
                role.role_arn
            )));
        }

        let duration_seconds = session_duration(duration_seconds)?;

        info!("Requesting credentials for {} using SAML assertion", role.role_arn);

        let credentials = self
            .service
            .assume_role_with_saml(role, assertion.encoded(), duration_seconds)
            .await?;

        complete(credentials)
    }

    /// `Ok(false)` when the service reports the credentials as expired or
    /// invalid; any other failure is an error.
    pub async fn check_liveness(&self, credentials: &Credentials) -> Result<bool> {
        match self.service.get_caller_identity(credentials).await {
            Ok(identity) => {
                debug!("Credentials are valid for {}", identity);
                Ok(true)
            }
            Err(FederationError::Remote {
                code: Some(code), ..
            }) if is_expired_token(&code) => {
                info!("Stored credentials were rejected ({})", code);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Assumes `target` with `source`. Longer chains call this once per hop,
    /// feeding each result into the next call.
    pub async fn assume_chained(
        &self,
        source: &Credentials,
        target: &ChainedRole,
        duration_seconds: i64,
    ) -> Result<Credentials> {
        let duration_seconds = session_duration(duration_seconds)?;

        info!(
            "Assuming {} as {} (session {})",
            target.role_arn, source.principal_arn, target.session_name
        );

        let credentials = self
            .service
            .assume_role(source, target, duration_seconds)
            .await?;

        complete(credentials)
    }
}

pub fn is_expired_token(code: &str) -> bool {
    EXPIRED_TOKEN_CODES.contains(&code)
}

fn session_duration(seconds: i64) -> Result<i32> {
    i32::try_from(seconds)
        .ok()
        .filter(|seconds| *seconds > 0)
        .ok_or_else(|| {
            FederationError::parse(format!("session duration {seconds} is out of range"))
        })
}

fn complete(credentials: Credentials) -> Result<Credentials> {
    match credentials.missing_field() {
        Some(field) => Err(FederationError::remote(
            None,
            format!("token service response is missing the {field}"),
        )),
        None => Ok(credentials),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::sample_credentials;
    use crate::helpers::base64_encode;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTokenService {
        identity_error: Option<(Option<&'static str>, &'static str)>,
        issued: Option<Credentials>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTokenService {
        fn issuing(credentials: Credentials) -> Self {
            Self {
                issued: Some(credentials),
                ..Default::default()
            }
        }

        fn rejecting_identity(code: Option<&'static str>, message: &'static str) -> Self {
            Self {
                identity_error: Some((code, message)),
                ..Default::default()
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn issue(&self) -> Result<Credentials> {
            self.issued
                .clone()
                .ok_or_else(|| FederationError::remote(Some("AccessDenied".into()), "denied"))
        }
    }

    #[async_trait]
    impl TokenService for FakeTokenService {
        async fn assume_role_with_saml(
            &self,
            role: &Role,
            assertion: &str,
            duration_seconds: i32,
        ) -> Result<Credentials> {
            self.record(format!(
                "saml {} {} {} {}",
                role.role_arn, role.principal_arn, assertion, duration_seconds
            ));
            self.issue()
        }

        async fn get_caller_identity(&self, credentials: &Credentials) -> Result<String> {
            self.record(format!("identity {}", credentials.access_key_id));
            match self.identity_error {
                Some((code, message)) => {
                    Err(FederationError::remote(code.map(str::to_string), message))
                }
                None => Ok(credentials.principal_arn.clone()),
            }
        }

        async fn assume_role(
            &self,
            source: &Credentials,
            target: &ChainedRole,
            duration_seconds: i32,
        ) -> Result<Credentials> {
            self.record(format!(
                "assume {} {} {} {}",
                source.access_key_id, target.role_arn, target.session_name, duration_seconds
            ));
            self.issue()
        }
    }

    fn assertion() -> SamlAssertion {
        let xml = include_str!("../testdata/assertion.xml");
        SamlAssertion::decode(&base64_encode(xml.as_bytes())).unwrap()
    }

    fn role() -> Role {
        Role::new(
            "arn:aws:iam::000000000001:role/Development",
            "arn:aws:iam::000000000001:saml-provider/example-idp",
        )
    }

    #[tokio::test]
    async fn exchange_sends_role_principal_and_duration() {
        let exchange = CredentialExchange::new(FakeTokenService::issuing(sample_credentials()));
        let assertion = assertion();

        let credentials = exchange.exchange(&assertion, &role(), 3600).await.unwrap();

        assert_eq!(credentials, sample_credentials());
        let calls = exchange.service.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            [format!(
                "saml arn:aws:iam::000000000001:role/Development arn:aws:iam::000000000001:saml-provider/example-idp {} 3600",
                assertion.encoded()
            )]
        );
    }

    #[tokio::test]
    async fn exchange_rejects_incomplete_credentials() {
        let mut partial = sample_credentials();
        partial.secret_access_key.clear();
        let exchange = CredentialExchange::new(FakeTokenService::issuing(partial));

        let result = exchange.exchange(&assertion(), &role(), 3600).await;
        assert!(matches!(result, Err(FederationError::Remote { .. })));
    }

    #[tokio::test]
    async fn exchange_surfaces_service_rejection() {
        let exchange = CredentialExchange::new(FakeTokenService::default());

        let result = exchange.exchange(&assertion(), &role(), 3600).await;
        assert!(matches!(
            result,
            Err(FederationError::Remote { code: Some(code), .. }) if code == "AccessDenied"
        ));
        assert_eq!(exchange.service.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exchange_requires_trust_principal() {
        let exchange = CredentialExchange::new(FakeTokenService::issuing(sample_credentials()));
        let role = Role::new("arn:aws:iam::000000000001:role/Development", "");

        let result = exchange.exchange(&assertion(), &role, 3600).await;
        assert!(matches!(result, Err(FederationError::NotFound(_))));
        assert!(exchange.service.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exchange_rejects_out_of_range_duration() {
        let exchange = CredentialExchange::new(FakeTokenService::issuing(sample_credentials()));

        for duration in [0, -5, i64::from(i32::MAX) + 1] {
            let result = exchange.exchange(&assertion(), &role(), duration).await;
            assert!(matches!(result, Err(FederationError::Parse(_))));
        }
    }

    #[tokio::test]
    async fn live_credentials_are_reported_live() {
        let exchange = CredentialExchange::new(FakeTokenService::default());
        assert!(exchange.check_liveness(&sample_credentials()).await.unwrap());
    }

    #[tokio::test]
    async fn expired_token_is_not_an_error() {
        for code in EXPIRED_TOKEN_CODES {
            let exchange = CredentialExchange::new(FakeTokenService::rejecting_identity(
                Some(code),
                "The security token included in the request is expired",
            ));
            assert!(!exchange.check_liveness(&sample_credentials()).await.unwrap());
        }
    }

    #[tokio::test]
    async fn other_liveness_failures_are_errors() {
        let exchange = CredentialExchange::new(FakeTokenService::rejecting_identity(
            None,
            "dispatch failure: connection refused",
        ));
        assert!(matches!(
            exchange.check_liveness(&sample_credentials()).await,
            Err(FederationError::Remote { code: None, .. })
        ));

        let exchange = CredentialExchange::new(FakeTokenService::rejecting_identity(
            Some("Throttling"),
            "Rate exceeded",
        ));
        assert!(exchange.check_liveness(&sample_credentials()).await.is_err());
    }

    #[tokio::test]
    async fn chained_hops_feed_into_each_other() {
        let mut second = sample_credentials();
        second.access_key_id = "ASIASECONDHOP".into();
        let exchange = CredentialExchange::new(FakeTokenService::issuing(second.clone()));

        let first_hop = ChainedRole::new("arn:aws:iam::000000000002:role/Deploy", Some("ci".into()));
        let hop_one = exchange
            .assume_chained(&sample_credentials(), &first_hop, 900)
            .await
            .unwrap();
        let second_hop = ChainedRole::new("arn:aws:iam::000000000003:role/ReadOnly", Some("ci".into()));
        exchange.assume_chained(&hop_one, &second_hop, 900).await.unwrap();

        let calls = exchange.service.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            [
                "assume ASIAEXAMPLE arn:aws:iam::000000000002:role/Deploy ci 900".to_string(),
                "assume ASIASECONDHOP arn:aws:iam::000000000003:role/ReadOnly ci 900".to_string(),
            ]
        );
    }

    #[test]
    fn chained_role_gets_generated_session_name() {
        let role = ChainedRole::new("arn:aws:iam::000000000002:role/Deploy", None);
        assert!(role.session_name.starts_with("saml-login-"));
        assert!(role.session_name.len() <= 64);

        let role = ChainedRole::new("arn:aws:iam::000000000002:role/Deploy", Some(" ".into()));
        assert!(role.session_name.starts_with("saml-login-"));
    }
}
