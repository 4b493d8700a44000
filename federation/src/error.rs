use thiserror::Error;

/// Failures surfaced by the role and credential resolution engine.
///
/// Every operation fails atomically: an error is never returned alongside a
/// partially built role list, account tree or credential set.
#[derive(Debug, Error)]
pub enum FederationError {
    /// The assertion or role selection page is malformed.
    #[error("parse error: {0}")]
    Parse(String),

    /// An optional field or stored record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("no roles available to assume")]
    NoRolesAvailable,

    #[error("supplied role ARN not found in SAML assertion: {0}")]
    RoleNotFound(String),

    /// More than one role is assumable and the policy allows neither an
    /// explicit role nor prompting.
    #[error("multiple roles available, supply a role ARN or allow prompting")]
    AmbiguousSelection,

    /// A network or service failure, carrying the service error code when the
    /// remote side supplied one.
    #[error("remote call failed{}: {message}", code_suffix(.code))]
    Remote {
        code: Option<String>,
        message: String,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("role selection cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = FederationError> = std::result::Result<T, E>;

impl FederationError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn remote(code: Option<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_ref()
        .map(|code| format!(" ({code})"))
        .unwrap_or_default()
}

/// Turns a `NotFound` failure into `None`, leaving every other error in place.
pub(crate) fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(FederationError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
