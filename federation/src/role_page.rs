use crate::assertion::SamlAssertion;
use crate::error::{FederationError, Result};
use crate::role::{role_name_from_arn, Account, Role};
use async_trait::async_trait;
use select::document::Document;
use select::node::Node;
use select::predicate::{And, Attr, Child, Class, Name};
use tracing::debug;
use url::Url;

const ROLE_FORM_ID: &str = "samlRoleForm";
const ROLE_INPUT_NAME: &str = "roleAttribute";

/// Where the provider's role selection page comes from.
#[async_trait]
pub trait RolePageSource: Send + Sync {
    /// Posts the assertion to the audience URL and returns the page body.
    async fn fetch(&self, audience_url: &str, assertion: &str) -> Result<String>;
}

pub struct HttpRolePage {
    client: reqwest::Client,
}

impl HttpRolePage {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RolePageSource for HttpRolePage {
    async fn fetch(&self, audience_url: &str, assertion: &str) -> Result<String> {
        let url = Url::parse(audience_url).map_err(|e| {
            FederationError::parse(format!("audience URL {audience_url:?} is invalid: {e}"))
        })?;

        debug!("Posting SAML assertion to {}", url);

        let response = self
            .client
            .post(url)
            .form(&[("SAMLResponse", assertion)])
            .send()
            .await
            .map_err(|e| FederationError::remote(None, format!("error retrieving role page: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FederationError::remote(
                Some(status.as_u16().to_string()),
                "role selection page request was rejected",
            ));
        }

        response
            .text()
            .await
            .map_err(|e| FederationError::remote(None, format!("error reading role page: {e}")))
    }
}

/// Fetches and parses the role selection page the assertion is addressed to.
pub async fn fetch_accounts(
    source: &dyn RolePageSource,
    assertion: &SamlAssertion,
) -> Result<Vec<Account>> {
    let audience_url = assertion.audience_url().ok_or_else(|| {
        FederationError::not_found("assertion has no destination URL to fetch roles from")
    })?;

    let html = source.fetch(audience_url, assertion.encoded()).await?;
    extract_accounts(&html)
}

/// Parses the accounts and roles listed on the role selection page, in
/// document order.
///
/// A page without the role form is a markup mismatch and fails; a form that
/// lists no accounts yields an empty list.
pub fn extract_accounts(html: &str) -> Result<Vec<Account>> {
    let document = Document::from(html);

    if document.find(Attr("id", ROLE_FORM_ID)).next().is_none() {
        return Err(FederationError::parse(format!(
            "role selection page has no #{ROLE_FORM_ID} form"
        )));
    }

    let account_labels = Child(
        Child(
            Child(
                Attr("id", ROLE_FORM_ID),
                And(Name("div"), Class("form-group")),
            ),
            And(Name("div"), Class("col-sm-4")),
        ),
        Name("label"),
    );

    document.find(account_labels).map(account_from_label).collect()
}

fn account_from_label(label: Node) -> Result<Account> {
    let name = account_name(&label.text());

    let role_block = label
        .parent()
        .and_then(|column| column.parent())
        .and_then(next_element)
        .ok_or_else(|| FederationError::parse(format!("account {name:?} has no role block")))?;

    let roles = role_block
        .find(And(Name("input"), Attr("name", ROLE_INPUT_NAME)))
        .map(role_from_input)
        .collect::<Result<Vec<_>>>()?;

    if roles.is_empty() {
        return Err(FederationError::parse(format!(
            "account {name:?} lists no roles"
        )));
    }

    Ok(Account { name, roles })
}

fn role_from_input(input: Node) -> Result<Role> {
    let value = input.attr("value").unwrap_or_default();

    let (role_arn, principal_arn) = match value.split_once(',') {
        Some((role_arn, principal_arn)) => (role_arn.trim(), principal_arn.trim()),
        None => (value.trim(), ""),
    };

    if role_arn.is_empty() || principal_arn.contains(',') {
        return Err(FederationError::parse(format!(
            "role control value {value:?} is not a role,principal pair"
        )));
    }

    let name = input
        .parent()
        .map(|label| label.text().trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| role_name_from_arn(role_arn));

    Ok(Role::named(name, role_arn, principal_arn))
}

fn account_name(label: &str) -> String {
    match label.split_once(':') {
        Some((_, name)) => name.trim().to_string(),
        None => label.trim().to_string(),
    }
}

fn next_element(node: Node) -> Option<Node> {
    std::iter::successors(node.next(), |sibling| sibling.next()).find(|sibling| sibling.name().is_some())
}
