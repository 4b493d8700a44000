use std::fmt::Display;

const ROLE_RESOURCE: &str = ":role/";
const SAML_PROVIDER_RESOURCE: &str = ":saml-provider/";

/// An assumable role and the SAML provider trust it is assumed through.
///
/// `principal_arn` is empty for roles whose trust principal has not been
/// discovered yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub role_arn: String,
    pub principal_arn: String,
}

impl Role {
    /// Builds a role named after the last segment of its ARN.
    pub fn new(role_arn: impl Into<String>, principal_arn: impl Into<String>) -> Self {
        let role_arn = role_arn.into();
        Self {
            name: role_name_from_arn(&role_arn),
            role_arn,
            principal_arn: principal_arn.into(),
        }
    }

    pub fn named(
        name: impl Into<String>,
        role_arn: impl Into<String>,
        principal_arn: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role_arn: role_arn.into(),
            principal_arn: principal_arn.into(),
        }
    }

    /// The account id embedded in the role ARN, e.g. `000000000001` for
    /// `arn:aws:iam::000000000001:role/Admin`.
    pub fn account_id(&self) -> Option<&str> {
        self.role_arn
            .rsplit(':')
            .nth(1)
            .filter(|account| !account.is_empty())
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.role_arn, self.principal_arn)
    }
}

/// An account as listed on the provider's role selection page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub roles: Vec<Role>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PrincipalKind {
    Role,
    Trust,
}

pub(crate) fn classify_arn(arn: &str) -> Option<PrincipalKind> {
    if arn.contains(SAML_PROVIDER_RESOURCE) {
        Some(PrincipalKind::Trust)
    } else if arn.contains(ROLE_RESOURCE) {
        Some(PrincipalKind::Role)
    } else {
        None
    }
}

pub(crate) fn role_name_from_arn(role_arn: &str) -> String {
    role_arn
        .rsplit('/')
        .next()
        .unwrap_or(role_arn)
        .trim()
        .to_string()
}
