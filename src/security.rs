// Security requirements of an operation
// Flattens AND/OR requirement sets into the list the scheme picker renders.

use serde::{Deserialize, Serialize};

use crate::auth::AuthKind;

/// Scheme name marking an alternative where authorization is optional
pub const NULL_SCHEME: &str = "null";
/// Label rendered for the optional-authorization alternative
pub const NO_AUTH_LABEL: &str = "No authorization";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub kind: AuthKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A named scheme reference inside a requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametrizedSecurityScheme {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<SecurityScheme>,
}

/// Schemes that must all be satisfied together. An operation lists several
/// requirements as alternatives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityRequirement {
    #[serde(default)]
    pub schemes: Vec<ParametrizedSecurityScheme>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecuritySelectorListItem {
    /// `None` for the optional-authorization placeholder and unresolved schemes
    pub types: Vec<Option<AuthKind>>,
    pub labels: Vec<String>,
    pub security: SecurityRequirement,
}

/// One selector entry per alternative; schemes joined by AND share an entry.
/// An empty requirement is the optional-authorization alternative and yields
/// an entry with no types.
pub fn read_security_list(requirements: &[SecurityRequirement]) -> Vec<SecuritySelectorListItem> {
    requirements
        .iter()
        .map(|requirement| {
            let (types, labels): (Vec<_>, Vec<_>) = requirement.schemes.iter().map(describe_scheme).unzip();
            SecuritySelectorListItem {
                types,
                labels,
                security: requirement.clone(),
            }
        })
        .collect()
}

fn describe_scheme(scheme: &ParametrizedSecurityScheme) -> (Option<AuthKind>, String) {
    if scheme.name == NULL_SCHEME {
        return (None, NO_AUTH_LABEL.to_string());
    }
    let kind = scheme.scheme.as_ref().map(|s| s.kind);
    let label = if !scheme.name.is_empty() {
        scheme.name.clone()
    } else if let Some(name) = scheme.scheme.as_ref().and_then(|s| s.name.clone()) {
        name
    } else {
        kind.map(|k| k.label().to_string()).unwrap_or_default()
    };
    (kind, label)
}
