// HTTP transport for reqcraft
// Sends assembled requests with reqwest's blocking client

use reqwest::blocking::Client;
use reqwest::header::{HeaderName, HeaderValue};
use tracing::{info, warn};

use crate::error::{ParseError, TransportError};
use crate::headers::{parse_headers, stringify_headers};
use crate::models::{ApiRequest, ApiResponse, RequestPayload};

/// Delivers a request and produces the response. `id` correlates the two.
pub trait Transport {
    fn send(&self, id: &str, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

pub struct HttpTransport {
    pub client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn send(&self, id: &str, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.to_string().as_bytes())
            .map_err(|_| ParseError::Method(request.method.to_string()))?;
        let mut req = self.client.request(method, &request.url);

        for (name, value) in parse_headers(&request.headers) {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::Header { name: name.clone() })?;
            let header_value = HeaderValue::from_str(&value)
                .map_err(|_| TransportError::Header { name: name.clone() })?;
            req = req.header(header_name, header_value);
        }

        if request.method.allows_payload() {
            match &request.payload {
                Some(RequestPayload::Text(text)) => req = req.body(text.clone()),
                Some(RequestPayload::Binary(bytes)) => req = req.body(bytes.clone()),
                None => {}
            }
        }

        info!(id, method = %request.method, url = %request.url, "sending request");
        let resp = req.send().map_err(|source| TransportError::RequestFailed {
            id: id.to_string(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(id, status = status.as_u16(), "non-success response");
        }
        let headers: Vec<(String, String)> = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let payload = resp.text().map_err(|source| TransportError::ResponseRead {
            id: id.to_string(),
            source,
        })?;

        Ok(ApiResponse {
            id: id.to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers: stringify_headers(&headers),
            payload,
        })
    }
}
