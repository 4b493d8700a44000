use crate::error::{optional, FederationError, Result};
use crate::helpers::base64_decode_to_string;
use crate::role::{classify_arn, PrincipalKind, Role};
use roxmltree::{Document, Node};

const ROLE_ATTRIBUTES: [&str; 2] = [
    "https://aws.amazon.com/SAML/Attributes/Role",
    "https://www.aliyun.com/SAML-Role/Attributes/Role",
];

const SESSION_DURATION_ATTRIBUTES: [&str; 2] = [
    "https://aws.amazon.com/SAML/Attributes/SessionDuration",
    "https://www.aliyun.com/SAML-Role/Attributes/SessionDuration",
];

/// A SAML assertion as returned by the identity provider, together with the
/// fields derived from its XML body.
#[derive(Clone, Debug)]
pub struct SamlAssertion {
    encoded: String,
    roles: Vec<Role>,
    audience_url: Option<String>,
    session_duration_seconds: Option<i64>,
}

impl SamlAssertion {
    /// Decodes the base64 assertion. Roles are mandatory; the session
    /// duration hint and audience URL are kept when present.
    pub fn decode(encoded: &str) -> Result<Self> {
        let xml = base64_decode_to_string(encoded)?;

        let roles = extract_roles(&xml)?;
        let session_duration_seconds = optional(extract_session_duration(&xml))?;
        let audience_url = optional(extract_audience_url(&xml))?;

        Ok(Self {
            encoded: encoded.trim().to_string(),
            roles,
            audience_url,
            session_duration_seconds,
        })
    }

    /// The assertion exactly as the federation endpoint expects it.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn audience_url(&self) -> Option<&str> {
        self.audience_url.as_deref()
    }

    pub fn session_duration_seconds(&self) -> Option<i64> {
        self.session_duration_seconds
    }
}

/// Extracts every role attribute value as a role/trust principal pair.
pub fn extract_roles(xml: &str) -> Result<Vec<Role>> {
    let doc = parse_document(xml)?;

    let values = attribute_values(&doc, &ROLE_ATTRIBUTES).ok_or_else(|| {
        FederationError::parse("assertion contains no role attribute statement")
    })?;

    if values.is_empty() {
        return Err(FederationError::parse(
            "role attribute statement carries no values",
        ));
    }

    parse_role_values(&values)
}

/// Parses raw `principal,role` attribute values. Any malformed entry fails the
/// whole batch.
pub fn parse_role_values<S: AsRef<str>>(values: &[S]) -> Result<Vec<Role>> {
    values
        .iter()
        .map(|value| parse_role_pair(value.as_ref()))
        .collect()
}

pub fn extract_session_duration(xml: &str) -> Result<i64> {
    let doc = parse_document(xml)?;

    let value = attribute_values(&doc, &SESSION_DURATION_ATTRIBUTES)
        .and_then(|values| values.into_iter().next())
        .ok_or_else(|| FederationError::not_found("session duration attribute"))?;

    value.parse::<i64>().map_err(|_| {
        FederationError::parse(format!("session duration {value:?} is not a number"))
    })
}

/// The URL the assertion is addressed to: the response `Destination`, or the
/// bearer confirmation `Recipient` when the destination is omitted.
pub fn extract_audience_url(xml: &str) -> Result<String> {
    let doc = parse_document(xml)?;

    let destination = doc
        .descendants()
        .filter(|node| node.is_element() && node.tag_name().name() == "Response")
        .find_map(|node| non_empty_attribute(node, "Destination"));

    destination
        .or_else(|| {
            doc.descendants()
                .filter(|node| {
                    node.is_element() && node.tag_name().name() == "SubjectConfirmationData"
                })
                .find_map(|node| non_empty_attribute(node, "Recipient"))
        })
        .ok_or_else(|| FederationError::not_found("assertion has no destination or recipient"))
}

fn parse_document(xml: &str) -> Result<Document<'_>> {
    Document::parse(xml)
        .map_err(|e| FederationError::parse(format!("assertion is not well-formed XML: {e}")))
}

fn attribute_values(doc: &Document, names: &[&str]) -> Option<Vec<String>> {
    let attributes: Vec<Node> = doc
        .descendants()
        .filter(|node| node.is_element() && node.tag_name().name() == "Attribute")
        .filter(|node| {
            node.attribute("Name")
                .map_or(false, |name| names.iter().any(|known| *known == name))
        })
        .collect();

    if attributes.is_empty() {
        return None;
    }

    let values = attributes
        .iter()
        .flat_map(|attribute| attribute.children())
        .filter(|node| node.is_element() && node.tag_name().name() == "AttributeValue")
        .map(|node| node.text().unwrap_or_default().trim().to_string())
        .collect();

    Some(values)
}

fn non_empty_attribute(node: Node, name: &str) -> Option<String> {
    node.attribute(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_role_pair(value: &str) -> Result<Role> {
    let segments: Vec<&str> = value.split(',').map(str::trim).collect();

    let &[first, second] = segments.as_slice() else {
        return Err(FederationError::parse(format!(
            "role attribute value {value:?} must contain exactly two ARNs"
        )));
    };

    if first.is_empty() || second.is_empty() {
        return Err(FederationError::parse(format!(
            "role attribute value {value:?} contains an empty ARN"
        )));
    }

    match (classify_arn(first), classify_arn(second)) {
        (Some(PrincipalKind::Role), Some(PrincipalKind::Trust)) => Ok(Role::new(first, second)),
        (Some(PrincipalKind::Trust), Some(PrincipalKind::Role)) => Ok(Role::new(second, first)),
        _ => Err(FederationError::parse(format!(
            "role attribute value {value:?} must pair one role ARN with one saml-provider ARN"
        ))),
    }
}
