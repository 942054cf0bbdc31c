// Core data models for reqcraft
// Operation descriptions as handed over by the API model, and the request/response descriptors

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::auth::AuthorizationConfig;
use crate::error::ParseError;
use crate::schema::Schema;
use crate::security::SecurityRequirement;

/// Supported HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    OPTIONS,
    HEAD,
    TRACE,
}

impl Method {
    /// Methods that never carry a payload on the wire.
    pub fn allows_payload(&self) -> bool {
        !matches!(self, Method::GET | Method::HEAD)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::GET => write!(f, "GET"),
            Method::POST => write!(f, "POST"),
            Method::PUT => write!(f, "PUT"),
            Method::DELETE => write!(f, "DELETE"),
            Method::PATCH => write!(f, "PATCH"),
            Method::OPTIONS => write!(f, "OPTIONS"),
            Method::HEAD => write!(f, "HEAD"),
            Method::TRACE => write!(f, "TRACE"),
        }
    }
}

impl FromStr for Method {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "PATCH" => Ok(Method::PATCH),
            "OPTIONS" => Ok(Method::OPTIONS),
            "HEAD" => Ok(Method::HEAD),
            "TRACE" => Ok(Method::TRACE),
            _ => Err(ParseError::Method(s.to_string())),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.to_string()
    }
}

/// Request location a parameter serializes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Binding {
    Query,
    Path,
    Header,
    Cookie,
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Query => write!(f, "query"),
            Binding::Path => write!(f, "path"),
            Binding::Header => write!(f, "header"),
            Binding::Cookie => write!(f, "cookie"),
        }
    }
}

impl FromStr for Binding {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Binding::Query),
            "path" => Ok(Binding::Path),
            "header" => Ok(Binding::Header),
            "cookie" => Ok(Binding::Cookie),
            _ => Err(ParseError::Binding(s.to_string())),
        }
    }
}

/// Operation input as described by the API model.
///
/// `schema` is `None` for custom parameters the user added by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Serialized key override (e.g. a header name that differs from the declared name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_name: Option<String>,
    pub binding: Binding,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default)]
    pub allow_empty_value: bool,
}

impl Parameter {
    pub fn new(id: impl Into<String>, name: impl Into<String>, binding: Binding) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            wire_name: None,
            binding,
            required: false,
            schema: None,
            allow_empty_value: false,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_wire_name(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = Some(wire_name.into());
        self
    }

    /// Key used in the serialized request, `None` when the parameter has no usable name.
    pub fn key(&self) -> Option<&str> {
        self.wire_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| Some(self.name.as_str()).filter(|n| !n.is_empty()))
    }
}

/// Server entry of the API model
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Request body declaration; only the media type matters to the assembler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub media_type: String,
}

/// An API operation as returned by the model graph accessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: String,
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub payloads: Vec<Payload>,
    #[serde(default)]
    pub security: Vec<SecurityRequirement>,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub protocols: Vec<String>,
}

/// Body produced by the payload editors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestPayload {
    Text(String),
    Binary(Vec<u8>),
}

/// Wire-ready request handed to the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    /// Newline-joined `name: value` lines
    pub headers: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<RequestPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorization: Vec<AuthorizationConfig>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: String::new(),
            payload: None,
            authorization: Vec::new(),
        }
    }
}

/// Response descriptor produced by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub id: String,
    pub status: u16,
    pub status_text: String,
    pub headers: String,
    pub payload: String,
}
