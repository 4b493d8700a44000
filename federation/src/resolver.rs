use crate::error::{FederationError, Result};
use crate::reconcile::RoleCatalog;
use crate::role::{Account, Role};
use tracing::warn;

/// Number of invalid answers accepted before interactive selection gives up.
pub const MAX_SELECTION_ATTEMPTS: usize = 5;

/// How a single role is picked when the assertion offers several.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolutionPolicy {
    pub explicit_role_arn: Option<String>,
    pub interactive: bool,
}

impl ResolutionPolicy {
    pub fn explicit(role_arn: impl Into<String>) -> Self {
        Self {
            explicit_role_arn: Some(role_arn.into()),
            interactive: false,
        }
    }

    pub fn interactive() -> Self {
        Self {
            explicit_role_arn: None,
            interactive: true,
        }
    }

    fn explicit_role_arn(&self) -> Option<&str> {
        self.explicit_role_arn
            .as_deref()
            .map(str::trim)
            .filter(|arn| !arn.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Resolved(Role),
    /// The operator has to choose from this listing.
    Prompt(Vec<Account>),
}

/// Operator-facing side of interactive role selection.
pub trait RolePrompt {
    /// Presents the listing and returns the raw answer, or `None` when the
    /// operator cancelled.
    fn ask(&mut self, listing: &[Account], attempt: usize) -> Option<String>;
}

/// Decides the outcome of role resolution without any interaction.
pub fn decide(catalog: &RoleCatalog, policy: &ResolutionPolicy) -> Result<Decision> {
    let explicit = policy.explicit_role_arn();

    match catalog.roles() {
        [] => Err(FederationError::NoRolesAvailable),
        [only] => match explicit {
            Some(arn) if arn != only.role_arn => Err(FederationError::RoleNotFound(arn.to_string())),
            _ => Ok(Decision::Resolved(only.clone())),
        },
        _ => {
            if let Some(arn) = explicit {
                find_in_catalog(catalog, arn).map(Decision::Resolved)
            } else if policy.interactive {
                Ok(Decision::Prompt(catalog.listing()))
            } else {
                Err(FederationError::AmbiguousSelection)
            }
        }
    }
}

/// Resolves exactly one role, asking `prompt` when the policy allows it.
pub fn resolve(
    catalog: &RoleCatalog,
    policy: &ResolutionPolicy,
    prompt: &mut dyn RolePrompt,
) -> Result<Role> {
    match decide(catalog, policy)? {
        Decision::Resolved(role) => Ok(role),
        Decision::Prompt(listing) => select_from_listing(&listing, prompt),
    }
}

/// Asks for a 1-based index into the listing until a valid one is given.
pub fn select_from_listing(listing: &[Account], prompt: &mut dyn RolePrompt) -> Result<Role> {
    let choices: Vec<&Role> = listing.iter().flat_map(|account| account.roles.iter()).collect();

    for attempt in 1..=MAX_SELECTION_ATTEMPTS {
        let Some(answer) = prompt.ask(listing, attempt) else {
            return Err(FederationError::Cancelled);
        };

        match parse_selection(&answer, choices.len()) {
            Ok(index) => return Ok(choices[index].clone()),
            Err(reason) => warn!("{}, try again", reason),
        }
    }

    warn!(
        "No valid role selected after {} attempts",
        MAX_SELECTION_ATTEMPTS
    );
    Err(FederationError::Cancelled)
}

/// Parses a 1-based selection, returning the 0-based index.
pub fn parse_selection(answer: &str, choices: usize) -> std::result::Result<usize, String> {
    let answer = answer.trim();
    let number: usize = answer
        .parse()
        .map_err(|_| format!("{answer:?} is not a number"))?;

    if number == 0 || number > choices {
        return Err(format!("{number} is not between 1 and {choices}"));
    }

    Ok(number - 1)
}

pub fn locate_role(roles: &[Role], role_arn: &str) -> Result<Role> {
    roles
        .iter()
        .find(|role| role.role_arn == role_arn)
        .cloned()
        .ok_or_else(|| FederationError::RoleNotFound(role_arn.to_string()))
}

fn find_in_catalog(catalog: &RoleCatalog, role_arn: &str) -> Result<Role> {
    let account_roles: Vec<Role> = catalog
        .accounts()
        .iter()
        .flat_map(|account| account.roles.iter().cloned())
        .collect();

    locate_role(&account_roles, role_arn).or_else(|_| locate_role(catalog.roles(), role_arn))
}
