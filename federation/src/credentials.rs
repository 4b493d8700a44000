use crate::error::Result;
use chrono::{DateTime, Utc};
use std::fmt::{Debug, Formatter};

/// Temporary credentials issued by the security token service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub security_token: String,
    /// The assumed identity the credentials act as.
    pub principal_arn: String,
    pub region: Option<String>,
    /// Informational only, liveness is decided by the remote identity check.
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Returns the name of the first required field that is empty.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("access key id", &self.access_key_id),
            ("secret access key", &self.secret_access_key),
            ("session token", &self.session_token),
            ("security token", &self.security_token),
            ("principal ARN", &self.principal_arn),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("security_token", &"** redacted **")
            .field("principal_arn", &self.principal_arn)
            .field("region", &self.region)
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Persistence for one profile's credentials.
///
/// Implementations must serialise concurrent writers themselves.
pub trait CredentialStore {
    fn exists(&self) -> Result<bool>;

    /// Fails with `NotFound` when nothing has been stored for the profile.
    fn load(&self) -> Result<Credentials>;

    fn save(&self, credentials: &Credentials) -> Result<()>;
}

#[cfg(test)]
pub(crate) fn sample_credentials() -> Credentials {
    Credentials {
        access_key_id: "ASIAEXAMPLE".into(),
        secret_access_key: "secret".into(),
        session_token: "token".into(),
        security_token: "token".into(),
        principal_arn: "arn:aws:sts::000000000001:assumed-role/admin/jane".into(),
        region: Some("us-east-1".into()),
        expiration: None,
    }
}
