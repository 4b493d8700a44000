use crate::credentials::Credentials;
use crate::error::{FederationError, Result};
use crate::exchange::{ChainedRole, TokenService};
use crate::role::Role;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sts::config::Region;
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sts::types::{AssumedRoleUser, Credentials as StsCredentials};
use aws_smithy_types::date_time::Format;
use aws_smithy_types::DateTime;
use chrono::Utc;
use std::fmt::Debug;
use tracing::debug;

const PROVIDER_NAME: &str = "saml-sts-login";

/// [`TokenService`] backed by AWS STS. Roles decoded from Alibaba Cloud
/// assertions are sent here unchanged; there is no RAM STS backend.
#[derive(Clone, Debug, Default)]
pub struct StsTokenService {
    region: Option<String>,
}

impl StsTokenService {
    pub fn new(region: Option<String>) -> Self {
        Self { region }
    }

    async fn anonymous_client(&self) -> aws_sdk_sts::Client {
        let loader = match &self.region {
            Some(region) => aws_config::from_env().region(Region::new(region.clone())),
            None => aws_config::from_env(),
        };
        client(loader.no_credentials().load().await)
    }

    async fn client_for(&self, credentials: &Credentials) -> aws_sdk_sts::Client {
        let provider = aws_credential_types::Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            Some(credentials.session_token.clone()),
            None,
            PROVIDER_NAME,
        );

        let loader = match self.region(Some(credentials)) {
            Some(region) => aws_config::from_env().region(Region::new(region)),
            None => aws_config::from_env(),
        };
        client(loader.credentials_provider(provider).load().await)
    }

    fn region(&self, credentials: Option<&Credentials>) -> Option<String> {
        credentials
            .and_then(|c| c.region.clone())
            .or_else(|| self.region.clone())
    }
}

#[async_trait]
impl TokenService for StsTokenService {
    async fn assume_role_with_saml(
        &self,
        role: &Role,
        assertion: &str,
        duration_seconds: i32,
    ) -> Result<Credentials> {
        let response = self
            .anonymous_client()
            .await
            .assume_role_with_saml()
            .role_arn(&role.role_arn)
            .principal_arn(&role.principal_arn)
            .saml_assertion(assertion)
            .duration_seconds(duration_seconds)
            .send()
            .await
            .map_err(remote_error)?;

        convert(
            response.credentials,
            response.assumed_role_user,
            self.region(None),
        )
    }

    async fn get_caller_identity(&self, credentials: &Credentials) -> Result<String> {
        let response = self
            .client_for(credentials)
            .await
            .get_caller_identity()
            .send()
            .await
            .map_err(remote_error)?;

        debug!("Caller identity account: {:?}", response.account);

        response
            .arn
            .ok_or_else(|| FederationError::remote(None, "caller identity response has no ARN"))
    }

    async fn assume_role(
        &self,
        source: &Credentials,
        target: &ChainedRole,
        duration_seconds: i32,
    ) -> Result<Credentials> {
        let response = self
            .client_for(source)
            .await
            .assume_role()
            .role_arn(&target.role_arn)
            .role_session_name(&target.session_name)
            .duration_seconds(duration_seconds)
            .send()
            .await
            .map_err(remote_error)?;

        convert(
            response.credentials,
            response.assumed_role_user,
            self.region(Some(source)),
        )
    }
}

fn client(config: SdkConfig) -> aws_sdk_sts::Client {
    aws_sdk_sts::Client::new(&config)
}

fn remote_error<E, R>(err: SdkError<E, R>) -> FederationError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: Debug,
{
    let code = match &err {
        SdkError::ServiceError(context) => context.err().code().map(str::to_string),
        _ => None,
    };
    FederationError::remote(code, DisplayErrorContext(&err).to_string())
}

/// Missing fields are left empty; the exchange rejects incomplete results.
fn convert(
    credentials: Option<StsCredentials>,
    user: Option<AssumedRoleUser>,
    region: Option<String>,
) -> Result<Credentials> {
    let credentials = credentials
        .ok_or_else(|| FederationError::remote(None, "no credentials in token service response"))?;

    let session_token = credentials.session_token.unwrap_or_default();
    let expiration = credentials.expiration.map(to_chrono).transpose()?;

    Ok(Credentials {
        access_key_id: credentials.access_key_id.unwrap_or_default(),
        secret_access_key: credentials.secret_access_key.unwrap_or_default(),
        security_token: session_token.clone(),
        session_token,
        principal_arn: user.and_then(|u| u.arn).unwrap_or_default(),
        region,
        expiration,
    })
}

fn to_chrono(value: DateTime) -> Result<chrono::DateTime<Utc>> {
    let formatted = value
        .fmt(Format::DateTime)
        .map_err(|e| FederationError::parse(format!("invalid expiration: {e}")))?;

    chrono::DateTime::parse_from_rfc3339(&formatted)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FederationError::parse(format!("invalid expiration {formatted}: {e}")))
}
