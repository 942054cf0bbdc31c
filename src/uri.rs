// URL compilation for reqcraft
// Base URI selection, path template expansion and query string generation

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;
use crate::models::Server;
use crate::parameters::coercion::to_text;
use crate::parameters::report::ValueMap;

lazy_static! {
    // {name}, {+name}, {#name}
    static ref TEMPLATE_VARIABLE: Regex = Regex::new(r"\{([+#]?[^{}\s]+)\}").unwrap();
}

/// Characters `encodeURIComponent`-style encoding leaves alone (besides ASCII alphanumerics)
const COMPONENT_SAFE: &str = "-_.!~*'()";
/// Reserved URI characters additionally kept by reserved expansion
const RESERVED: &str = ";,/?:@&=+$#";

/// How the user picked the server in the server selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    /// One of the servers declared by the API model
    #[default]
    Server,
    /// A URI typed in by the user
    Custom,
    /// A URI provided by the host application
    Uri,
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerKind::Server => write!(f, "server"),
            ServerKind::Custom => write!(f, "custom"),
            ServerKind::Uri => write!(f, "uri"),
        }
    }
}

impl FromStr for ServerKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server" => Ok(ServerKind::Server),
            "custom" => Ok(ServerKind::Custom),
            "uri" => Ok(ServerKind::Uri),
            _ => Err(ParseError::ServerKind(s.to_string())),
        }
    }
}

/// Base URI to use for the request.
///
/// An explicit base URI always wins. Otherwise a custom/uri selection yields
/// `server_value`; a model server selection yields an empty string since those
/// are resolved through [`compute_base_uri`].
pub fn effective_base_uri(explicit: &str, kind: ServerKind, server_value: &str) -> String {
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    match kind {
        ServerKind::Server => String::new(),
        ServerKind::Custom | ServerKind::Uri => server_value.to_string(),
    }
}

/// Base URI of a model server: `{version}` substituted, one trailing slash
/// dropped, protocol prefixed when the URL has none.
pub fn compute_base_uri(server: Option<&Server>, protocols: &[String], version: Option<&str>) -> String {
    let Some(server) = server else {
        return String::new();
    };
    let mut uri = server.url.clone();
    if let Some(version) = version.filter(|v| !v.is_empty()) {
        if uri.contains("{version}") {
            uri = uri.replace("{version}", version);
        }
    }
    if uri.ends_with('/') {
        uri.pop();
    }
    if uri.is_empty() || has_http_scheme(&uri) {
        return uri;
    }
    let protocol = server
        .protocol
        .iter()
        .chain(protocols.iter())
        .find(|p| !p.is_empty());
    match protocol {
        Some(protocol) => format!("{}://{}", protocol.to_lowercase(), uri),
        None => uri,
    }
}

fn has_http_scheme(uri: &str) -> bool {
    let lower = uri.to_lowercase();
    lower.starts_with("http:") || lower.starts_with("https:")
}

/// Names of all template variables in `url`, modifiers included (`+path`).
pub fn template_variables(url: &str) -> Vec<String> {
    TEMPLATE_VARIABLE
        .captures_iter(url)
        .map(|c| c[1].to_string())
        .collect()
}

/// Expands `{name}` occurrences with values from `variables`.
///
/// Keys may carry a `+` or `#` modifier. Missing, null and empty values leave
/// the template token in place.
pub fn apply_url_variables(url: &str, variables: &ValueMap, encode: bool) -> String {
    let mut result = url.to_string();
    for (name, value) in variables {
        let text = match value {
            Value::Null => continue,
            other => to_text(other),
        };
        if text.is_empty() {
            continue;
        }
        let reserved = name.starts_with('+') || name.starts_with('#');
        let replacement = match (encode, reserved) {
            (false, _) => text,
            (true, true) => encode_reserved(&text),
            (true, false) => encode_component(&text),
        };
        let pattern = format!(r"\{{{}\}}", regex::escape(name));
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        result = re.replace_all(&result, regex::NoExpand(&replacement)).into_owned();
    }
    result
}

/// Appends `params` as a query string.
///
/// List values produce one pair per item, nested lists are comma-joined.
/// An empty map leaves the URL untouched.
pub fn apply_url_parameters(url: &str, params: &ValueMap, encode: bool) -> String {
    let mut pairs = Vec::new();
    for (name, value) in params {
        let items: Vec<String> = match value {
            Value::Array(items) => items.iter().map(to_text).collect(),
            other => vec![to_text(other)],
        };
        for item in items {
            if encode {
                pairs.push(format!("{}={}", encode_query_string(name), encode_query_string(&item)));
            } else {
                pairs.push(format!("{}={}", name, item));
            }
        }
    }
    if pairs.is_empty() {
        return url.to_string();
    }
    let separator = match url.find('?') {
        None => "?",
        Some(_) if url.ends_with('?') || url.ends_with('&') => "",
        Some(_) => "&",
    };
    format!("{}{}{}", url, separator, pairs.join("&"))
}

/// Drops every `name` pair from the query of `url`, then appends one pair per
/// entry of `values`. A fragment stays at the end.
pub fn set_query_param(url: &str, name: &str, values: &[String]) -> String {
    let (without_fragment, fragment) = match url.find('#') {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    let (base, query) = without_fragment.split_once('?').unwrap_or((without_fragment, ""));
    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| decode_query_string(pair.split('=').next().unwrap_or("")) != name)
        .map(str::to_string)
        .collect();
    for value in values {
        pairs.push(format!("{}={}", encode_query_string(name), encode_query_string(value)));
    }
    if pairs.is_empty() {
        return format!("{}{}", base, fragment);
    }
    format!("{}?{}{}", base, pairs.join("&"), fragment)
}

/// Reverses [`encode_query_string`]; malformed escapes are returned as-is.
pub fn decode_query_string(value: &str) -> String {
    let spaced = value.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced.clone(),
    }
}

/// Form encoding of a single query name or value: percent-encoded, spaces as `+`.
pub fn encode_query_string(value: &str) -> String {
    encode_component(value).replace("%20", "+")
}

/// Percent-encodes everything except unreserved characters.
pub fn encode_component(value: &str) -> String {
    encode_except(value, COMPONENT_SAFE)
}

/// Percent-encoding that keeps reserved URI characters intact.
pub fn encode_reserved(value: &str) -> String {
    let mut keep = String::from(COMPONENT_SAFE);
    keep.push_str(RESERVED);
    encode_except(value, &keep)
}

fn encode_except(value: &str, keep: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut buf = [0u8; 4];
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || keep.contains(ch) {
            out.push(ch);
        } else {
            out.push_str(&urlencoding::encode(ch.encode_utf8(&mut buf)));
        }
    }
    out
}
