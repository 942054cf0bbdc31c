// Authorization strategies for reqcraft
// Merges resolved authorization configs into an assembled request.
//
// Each applied config comes back with `enabled = false`: it is now embedded in
// the request and must not be applied again by a later pass.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

use crate::error::ParseError;
use crate::headers::{append_cookie, append_header, headers_from_map};
use crate::models::ApiRequest;
use crate::parameters::coercion::to_text;
use crate::parameters::report::ValueMap;
use crate::uri::{apply_url_parameters, set_query_param};

/// Authorization method kinds known to the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AuthKind {
    Basic,
    Bearer,
    OAuth1,
    OAuth2,
    OpenIdConnect,
    ApiKey,
    PassThrough,
    Custom,
    Digest,
}

impl AuthKind {
    /// Human readable name used by the scheme picker
    pub fn label(&self) -> &'static str {
        match self {
            AuthKind::Basic => "Basic Authentication",
            AuthKind::Bearer => "Bearer",
            AuthKind::OAuth1 => "OAuth 1.0",
            AuthKind::OAuth2 => "OAuth 2.0",
            AuthKind::OpenIdConnect => "OpenID Connect",
            AuthKind::ApiKey => "API Key",
            AuthKind::PassThrough => "Pass Through",
            AuthKind::Custom => "Custom",
            AuthKind::Digest => "Digest Authentication",
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthKind::Basic => "basic",
            AuthKind::Bearer => "bearer",
            AuthKind::OAuth1 => "oauth 1",
            AuthKind::OAuth2 => "oauth 2",
            AuthKind::OpenIdConnect => "openid connect",
            AuthKind::ApiKey => "api key",
            AuthKind::PassThrough => "pass through",
            AuthKind::Custom => "custom",
            AuthKind::Digest => "digest",
        };
        f.write_str(name)
    }
}

impl FromStr for AuthKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_lowercase()
            .replace(['-', '_'], " ");
        let normalized = normalized.strip_prefix("x amf ").unwrap_or(&normalized);
        match normalized {
            "basic" | "basic auth" | "basic authentication" | "http basic" => Ok(AuthKind::Basic),
            "bearer" | "bearer token" | "http bearer" => Ok(AuthKind::Bearer),
            "oauth 1" | "oauth 1.0" | "oauth1" => Ok(AuthKind::OAuth1),
            "oauth 2" | "oauth 2.0" | "oauth2" => Ok(AuthKind::OAuth2),
            "openid connect" | "openidconnect" | "openid" | "oidc" => Ok(AuthKind::OpenIdConnect),
            "api key" | "apikey" => Ok(AuthKind::ApiKey),
            "pass through" | "passthrough" => Ok(AuthKind::PassThrough),
            "custom" | "custom scheme" => Ok(AuthKind::Custom),
            "digest" | "digest auth" | "digest authentication" => Ok(AuthKind::Digest),
            _ => Err(ParseError::AuthKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for AuthKind {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AuthKind> for String {
    fn from(kind: AuthKind) -> Self {
        kind.to_string()
    }
}

/// Where a token-based authorization is carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeliveryMethod {
    #[default]
    Header,
    Query,
}

impl FromStr for DeliveryMethod {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "header" => Ok(DeliveryMethod::Header),
            "query" => Ok(DeliveryMethod::Query),
            _ => Err(ParseError::DeliveryMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for DeliveryMethod {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeliveryMethod> for String {
    fn from(method: DeliveryMethod) -> Self {
        match method {
            DeliveryMethod::Header => "header".to_string(),
            DeliveryMethod::Query => "query".to_string(),
        }
    }
}

/// Resolved settings of one authorization method. Which fields matter
/// depends on the config's [`AuthKind`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_method: Option<DeliveryMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub header: ValueMap,
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub query: ValueMap,
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub cookie: ValueMap,
}

/// One authorization config as produced by the authorization panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    #[serde(rename = "type")]
    pub kind: AuthKind,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AuthSettings>,
}

impl AuthorizationConfig {
    pub fn new(kind: AuthKind, config: AuthSettings) -> Self {
        Self {
            kind,
            enabled: true,
            config: Some(config),
        }
    }
}

/// A way of embedding credentials into a request.
///
/// `None` means there was nothing to apply and the request is unchanged.
pub trait AuthStrategy {
    fn apply_auth(&self, req: &ApiRequest) -> Option<ApiRequest>;
}

pub struct BasicAuth<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl AuthStrategy for BasicAuth<'_> {
    fn apply_auth(&self, req: &ApiRequest) -> Option<ApiRequest> {
        // an unset username must not block the request
        if self.username.is_empty() {
            return None;
        }
        let encoded = general_purpose::STANDARD.encode(format!("{}:{}", self.username, self.password));
        let mut out = req.clone();
        out.headers = append_header(&req.headers, "authorization", &format!("Basic {}", encoded));
        Some(out)
    }
}

pub struct BearerAuth<'a> {
    pub token: &'a str,
}

impl AuthStrategy for BearerAuth<'_> {
    fn apply_auth(&self, req: &ApiRequest) -> Option<ApiRequest> {
        if self.token.is_empty() {
            return None;
        }
        let mut out = req.clone();
        out.headers = append_header(&req.headers, "authorization", &format!("Bearer {}", self.token));
        Some(out)
    }
}

/// OAuth 2.0 and OpenID Connect access tokens
pub struct TokenAuth<'a> {
    pub access_token: &'a str,
    pub token_type: Option<&'a str>,
    pub delivery_method: DeliveryMethod,
    pub delivery_name: Option<&'a str>,
}

impl AuthStrategy for TokenAuth<'_> {
    fn apply_auth(&self, req: &ApiRequest) -> Option<ApiRequest> {
        if self.access_token.is_empty() {
            return None;
        }
        let value = format!("{} {}", self.token_type.unwrap_or("Bearer"), self.access_token);
        let mut out = req.clone();
        match self.delivery_method {
            DeliveryMethod::Query => {
                let name = self.delivery_name.unwrap_or("access_token");
                out.url = append_query_pair(&req.url, name, &value);
            }
            DeliveryMethod::Header => {
                let name = self.delivery_name.unwrap_or("authorization");
                out.headers = append_header(&req.headers, name, &value);
            }
        }
        Some(out)
    }
}

/// API key, pass-through and custom schemes: free-form header/query/cookie maps
pub struct ParamsAuth<'a> {
    pub header: &'a ValueMap,
    pub query: &'a ValueMap,
    pub cookie: &'a ValueMap,
}

impl AuthStrategy for ParamsAuth<'_> {
    fn apply_auth(&self, req: &ApiRequest) -> Option<ApiRequest> {
        let mut out = req.clone();
        out.headers = headers_from_map(&req.headers, self.header);
        for (name, value) in self.cookie {
            out.headers = append_cookie(&out.headers, name, &to_text(value));
        }
        for (name, value) in self.query {
            let values = match value {
                serde_json::Value::Array(items) => items.iter().map(to_text).collect(),
                other => vec![to_text(other)],
            };
            out.url = set_query_param(&out.url, name, &values);
        }
        Some(out)
    }
}

/// Adds a query pair through the URL parser; relative URLs fall back to plain
/// query string building.
fn append_query_pair(url: &str, name: &str, value: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair(name, value);
            parsed.to_string()
        }
        Err(_) => {
            let mut params = ValueMap::new();
            params.insert(name.to_string(), serde_json::Value::String(value.to_string()));
            apply_url_parameters(url, &params, true)
        }
    }
}

fn strategy_for<'a>(kind: AuthKind, config: &'a AuthSettings) -> Option<Box<dyn AuthStrategy + 'a>> {
    let strategy: Box<dyn AuthStrategy + 'a> = match kind {
        AuthKind::Basic => Box::new(BasicAuth {
            username: config.username.as_deref().unwrap_or(""),
            password: config.password.as_deref().unwrap_or(""),
        }),
        AuthKind::Bearer => Box::new(BearerAuth {
            token: config.token.as_deref().unwrap_or(""),
        }),
        AuthKind::OAuth2 | AuthKind::OpenIdConnect => Box::new(TokenAuth {
            access_token: config.access_token.as_deref().unwrap_or(""),
            token_type: config.token_type.as_deref().filter(|t| !t.is_empty()),
            delivery_method: config.delivery_method.unwrap_or_default(),
            delivery_name: config.delivery_name.as_deref().filter(|n| !n.is_empty()),
        }),
        AuthKind::ApiKey | AuthKind::PassThrough | AuthKind::Custom => Box::new(ParamsAuth {
            header: &config.header,
            query: &config.query,
            cookie: &config.cookie,
        }),
        // signed/challenge based schemes are handled by the transport layer
        AuthKind::OAuth1 | AuthKind::Digest => return None,
    };
    Some(strategy)
}

/// Applies every enabled config in order.
///
/// Returns the updated request and the config list; configs that were
/// embedded come back disabled so that a second pass is a no-op.
pub fn apply_authorization(
    request: ApiRequest,
    auth: Vec<AuthorizationConfig>,
) -> (ApiRequest, Vec<AuthorizationConfig>) {
    let mut request = request;
    let mut processed = Vec::with_capacity(auth.len());

    for mut entry in auth {
        let applied = match (&entry.config, entry.enabled) {
            (Some(config), true) => strategy_for(entry.kind, config).and_then(|s| s.apply_auth(&request)),
            _ => None,
        };
        match applied {
            Some(updated) => {
                debug!(kind = %entry.kind, "authorization applied");
                request = updated;
                entry.enabled = false;
            }
            None if entry.enabled => trace!(kind = %entry.kind, "authorization left unapplied"),
            None => {}
        }
        processed.push(entry);
    }

    (request, processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Method;
    use serde_json::json;

    fn request() -> ApiRequest {
        ApiRequest::new(Method::GET, "https://api.com/items")
    }

    #[test]
    fn kind_normalization() {
        assert_eq!("Basic Auth".parse::<AuthKind>(), Ok(AuthKind::Basic));
        assert_eq!("OAuth 2.0".parse::<AuthKind>(), Ok(AuthKind::OAuth2));
        assert_eq!("x-amf-apiKey".parse::<AuthKind>(), Ok(AuthKind::ApiKey));
        assert_eq!("Pass-Through".parse::<AuthKind>(), Ok(AuthKind::PassThrough));
        assert!("kerberos".parse::<AuthKind>().is_err());
    }

    #[test]
    fn basic_auth_header() {
        let config = AuthSettings {
            username: Some("u".into()),
            password: Some("p".into()),
            ..Default::default()
        };
        let (req, auth) = apply_authorization(request(), vec![AuthorizationConfig::new(AuthKind::Basic, config)]);
        assert_eq!(req.headers, "authorization: Basic dTpw");
        assert!(!auth[0].enabled);
    }

    #[test]
    fn basic_auth_without_username_is_noop() {
        let config = AuthSettings {
            password: Some("p".into()),
            ..Default::default()
        };
        let (req, auth) = apply_authorization(request(), vec![AuthorizationConfig::new(AuthKind::Basic, config)]);
        assert_eq!(req, request());
        assert!(auth[0].enabled);
    }

    #[test]
    fn oauth2_query_delivery_uses_url_parser() {
        let config = AuthSettings {
            access_token: Some("tok en".into()),
            delivery_method: Some(DeliveryMethod::Query),
            ..Default::default()
        };
        let (req, _) = apply_authorization(request(), vec![AuthorizationConfig::new(AuthKind::OAuth2, config)]);
        assert_eq!(req.url, "https://api.com/items?access_token=Bearer+tok+en");
        assert!(req.headers.is_empty());
    }

    #[test]
    fn oauth2_query_delivery_with_custom_name() {
        let config = AuthSettings {
            access_token: Some("abc".into()),
            delivery_method: Some(DeliveryMethod::Query),
            delivery_name: Some("auth".into()),
            ..Default::default()
        };
        let req = ApiRequest::new(Method::GET, "https://api.com/x");
        let (req, auth) = apply_authorization(req, vec![AuthorizationConfig::new(AuthKind::OAuth2, config)]);
        assert_eq!(req.url, "https://api.com/x?auth=Bearer+abc");
        assert!(!auth[0].enabled);
    }

    #[test]
    fn oauth2_header_with_custom_type_and_name() {
        let config = AuthSettings {
            access_token: Some("abc".into()),
            token_type: Some("MAC".into()),
            delivery_name: Some("x-token".into()),
            ..Default::default()
        };
        let (req, _) = apply_authorization(request(), vec![AuthorizationConfig::new(AuthKind::OAuth2, config)]);
        assert_eq!(req.headers, "x-token: MAC abc");
    }

    #[test]
    fn oidc_without_token_is_noop() {
        let (req, auth) = apply_authorization(
            request(),
            vec![AuthorizationConfig::new(AuthKind::OpenIdConnect, AuthSettings::default())],
        );
        assert_eq!(req, request());
        assert!(auth[0].enabled);
    }

    #[test]
    fn api_key_merges_header_query_and_cookie() {
        let config: AuthSettings = serde_json::from_value(json!({
            "header": {"x-api-key": "k1"},
            "query": {"key": "k2"},
            "cookie": {"session": "s"}
        }))
        .unwrap();
        let mut req = request();
        req.url = "https://api.com/items?key=old".to_string();
        let (req, auth) = apply_authorization(req, vec![AuthorizationConfig::new(AuthKind::ApiKey, config)]);
        assert_eq!(req.url, "https://api.com/items?key=k2");
        assert_eq!(req.headers, "x-api-key: k1\ncookie: session=s");
        assert!(!auth[0].enabled);
    }

    #[test]
    fn unsupported_kinds_are_skipped() {
        let (req, auth) = apply_authorization(
            request(),
            vec![AuthorizationConfig::new(AuthKind::OAuth1, AuthSettings::default())],
        );
        assert_eq!(req, request());
        assert!(auth[0].enabled);
    }

    #[test]
    fn second_pass_changes_nothing() {
        let config = AuthSettings {
            token: Some("t".into()),
            ..Default::default()
        };
        let (once, auth) = apply_authorization(request(), vec![AuthorizationConfig::new(AuthKind::Bearer, config)]);
        let (twice, _) = apply_authorization(once.clone(), auth);
        assert_eq!(once, twice);
        assert_eq!(twice.headers, "authorization: Bearer t");
    }
}
