use crate::error::{FederationError, Result};
use crate::role::{Account, Role};
use std::collections::HashMap;

/// The reconciled view of every role the user may assume.
///
/// `roles` is the flat list from the assertion with trust principals filled
/// in; `accounts` is the role selection page, empty when no page was fetched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleCatalog {
    roles: Vec<Role>,
    accounts: Vec<Account>,
}

impl RoleCatalog {
    /// A catalog built from the assertion alone.
    pub fn from_roles(roles: &[Role]) -> Result<Self> {
        reconcile(roles, &[])
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Accounts to present for interactive selection: the page's accounts,
    /// or the flat roles grouped by the account id in their ARN.
    pub fn listing(&self) -> Vec<Account> {
        if !self.accounts.is_empty() {
            return self.accounts.clone();
        }

        let mut accounts: Vec<Account> = Vec::new();
        for role in &self.roles {
            let name = role.account_id().unwrap_or("unknown").to_string();
            match accounts.iter_mut().find(|account| account.name == name) {
                Some(account) => account.roles.push(role.clone()),
                None => accounts.push(Account {
                    name,
                    roles: vec![role.clone()],
                }),
            }
        }
        accounts
    }
}

/// Overwrites the trust principal of every account role with the one the
/// assertion carries for the same role ARN. Roles the assertion does not
/// mention, or mentions without a principal, keep their current value.
pub fn assign_principals(roles: &[Role], accounts: &mut [Account]) {
    let principals: HashMap<&str, &str> = roles
        .iter()
        .filter(|role| !role.principal_arn.is_empty())
        .map(|role| (role.role_arn.as_str(), role.principal_arn.as_str()))
        .collect();

    for account in accounts.iter_mut() {
        for role in account.roles.iter_mut() {
            if let Some(principal) = principals.get(role.role_arn.as_str()) {
                role.principal_arn = (*principal).to_string();
            }
        }
    }
}

/// Joins the assertion's flat role list with the page's accounts.
///
/// Account roles take the assertion's principal; flat roles without one take
/// the principal the page lists for the same ARN.
pub fn reconcile(roles: &[Role], accounts: &[Account]) -> Result<RoleCatalog> {
    let flat = unique_roles(roles)?;

    let mut accounts = accounts.to_vec();
    assign_principals(&flat, &mut accounts);

    let page_principals: HashMap<&str, &str> = accounts
        .iter()
        .flat_map(|account| account.roles.iter())
        .filter(|role| !role.principal_arn.is_empty())
        .map(|role| (role.role_arn.as_str(), role.principal_arn.as_str()))
        .collect();

    let roles = flat
        .into_iter()
        .map(|mut role| {
            if role.principal_arn.is_empty() {
                if let Some(principal) = page_principals.get(role.role_arn.as_str()) {
                    role.principal_arn = (*principal).to_string();
                }
            }
            role
        })
        .collect();

    Ok(RoleCatalog { roles, accounts })
}

fn unique_roles(roles: &[Role]) -> Result<Vec<Role>> {
    let mut unique: Vec<Role> = Vec::with_capacity(roles.len());

    for role in roles {
        let Some(index) = unique.iter().position(|r| r.role_arn == role.role_arn) else {
            unique.push(role.clone());
            continue;
        };

        let existing = &mut unique[index];
        if existing.principal_arn.is_empty() {
            existing.principal_arn = role.principal_arn.clone();
        } else if !role.principal_arn.is_empty() && existing.principal_arn != role.principal_arn {
            return Err(FederationError::parse(format!(
                "role {} is bound to both {} and {}",
                role.role_arn, existing.principal_arn, role.principal_arn
            )));
        }
    }

    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV: &str = "arn:aws:iam::000000000001:role/Development";
    const PROD: &str = "arn:aws:iam::000000000001:role/Production";
    const IDP: &str = "arn:aws:iam::000000000001:saml-provider/test-idp";

    fn account(roles: Vec<Role>) -> Account {
        Account {
            name: "account-alias (000000000001)".to_string(),
            roles,
        }
    }

    #[test]
    fn assigns_principal_from_assertion() {
        let roles = vec![Role::new(DEV, IDP)];
        let mut accounts = vec![account(vec![Role::named("Development", DEV, "")])];

        assign_principals(&roles, &mut accounts);

        assert_eq!(accounts[0].roles[0].principal_arn, IDP);
    }

    #[test]
    fn unmatched_roles_keep_their_principal() {
        let roles = vec![Role::new(DEV, IDP)];
        let mut accounts = vec![account(vec![Role::named(
            "Production",
            PROD,
            "arn:aws:iam::000000000001:saml-provider/other",
        )])];

        assign_principals(&roles, &mut accounts);

        assert_eq!(
            accounts[0].roles[0].principal_arn,
            "arn:aws:iam::000000000001:saml-provider/other"
        );
    }

    #[test]
    fn assign_principals_is_idempotent() {
        let roles = vec![Role::new(DEV, IDP), Role::new(PROD, "")];
        let mut once = vec![account(vec![
            Role::named("Development", DEV, ""),
            Role::named("Production", PROD, "arn:aws:iam::000000000001:saml-provider/page"),
        ])];
        assign_principals(&roles, &mut once);

        let mut twice = once.clone();
        assign_principals(&roles, &mut twice);

        assert_eq!(once, twice);
    }

    #[test]
    fn blank_flat_principals_are_filled_from_page() {
        let idp_b = "arn:aws:iam::000000000001:saml-provider/idp-B";
        let roles = vec![Role::new(DEV, ""), Role::new(PROD, "")];
        let accounts = vec![account(vec![
            Role::named("Development", DEV, idp_b),
            Role::named("Production", PROD, idp_b),
        ])];

        let catalog = reconcile(&roles, &accounts).unwrap();

        assert!(catalog.roles().iter().all(|r| r.principal_arn == idp_b));
        assert!(catalog.accounts()[0]
            .roles
            .iter()
            .all(|r| r.principal_arn == idp_b));
    }

    #[test]
    fn conflicting_duplicates_are_rejected() {
        let roles = vec![
            Role::new(DEV, IDP),
            Role::new(DEV, "arn:aws:iam::000000000001:saml-provider/other"),
        ];
        assert!(matches!(
            reconcile(&roles, &[]),
            Err(FederationError::Parse(_))
        ));
    }

    #[test]
    fn identical_duplicates_collapse() {
        let roles = vec![Role::new(DEV, IDP), Role::new(DEV, IDP), Role::new(DEV, "")];
        let catalog = reconcile(&roles, &[]).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn listing_groups_flat_roles_by_account() {
        let roles = vec![
            Role::new(DEV, IDP),
            Role::new("arn:aws:iam::000000000002:role/Audit", IDP),
            Role::new(PROD, IDP),
        ];
        let listing = RoleCatalog::from_roles(&roles).unwrap().listing();

        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].name, "000000000001");
        assert_eq!(listing[0].roles.len(), 2);
        assert_eq!(listing[0].roles[1].role_arn, PROD);
        assert_eq!(listing[1].name, "000000000002");
    }

    #[test]
    fn listing_prefers_page_accounts() {
        let roles = vec![Role::new(DEV, IDP)];
        let accounts = vec![account(vec![Role::named("Development", DEV, "")])];

        let listing = reconcile(&roles, &accounts).unwrap().listing();
        assert_eq!(listing[0].name, "account-alias (000000000001)");
        assert_eq!(listing[0].roles[0].principal_arn, IDP);
    }
}
