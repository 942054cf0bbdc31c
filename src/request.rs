// Request assembler for reqcraft
// Composes the report compiler, URL compiler and security processor into
// the request handed to a transport.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{apply_authorization, AuthorizationConfig};
use crate::engine::Transport;
use crate::error::AssembleError;
use crate::headers::{append_header, cookies_from_map, header_value, headers_from_map};
use crate::models::{ApiRequest, ApiResponse, Operation, RequestPayload};
use crate::parameters::report::{compile, SerializationReport, ValueMap};
use crate::security::{read_security_list, SecuritySelectorListItem};
use crate::store::{ScopedStore, ValueStore};
use crate::uri::{
    apply_url_parameters, apply_url_variables, compute_base_uri, effective_base_uri, template_variables, ServerKind,
};

/// Base URI selection for the assembler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblerConfig {
    /// Explicit base URI; overrides any server selection
    #[serde(default)]
    pub base_uri: String,
    #[serde(default)]
    pub server_kind: ServerKind,
    /// URI typed in (or provided) for `custom` / `uri` selections
    #[serde(default)]
    pub server_value: String,
    /// Model server used for `server` selections
    #[serde(default)]
    pub server_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

/// A validated, authorized request and the id it is sent under
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub id: String,
    pub request: ApiRequest,
}

/// Holds the current operation selection and everything the user entered for it.
///
/// The value store is a type parameter so that sharing a [`crate::store::SharedStore`]
/// between editors is a visible decision of whoever constructs the assembler.
#[derive(Debug)]
pub struct RequestAssembler<S = ScopedStore> {
    config: AssemblerConfig,
    operation: Option<Operation>,
    store: S,
    nil_ids: HashSet<String>,
    payload: Option<RequestPayload>,
    content_type: Option<String>,
    authorization: Vec<AuthorizationConfig>,
}

impl RequestAssembler<ScopedStore> {
    pub fn new(config: AssemblerConfig) -> Self {
        Self::with_store(config, ScopedStore::new())
    }
}

impl<S: ValueStore> RequestAssembler<S> {
    pub fn with_store(config: AssemblerConfig, store: S) -> Self {
        Self {
            config,
            operation: None,
            store,
            nil_ids: HashSet::new(),
            payload: None,
            content_type: None,
            authorization: Vec::new(),
        }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AssemblerConfig {
        &mut self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn operation(&self) -> Option<&Operation> {
        self.operation.as_ref()
    }

    /// Replaces the selected operation. Nil marks belong to the old parameters and are dropped.
    pub fn select_operation(&mut self, operation: Operation) {
        info!(operation = %operation.id, "operation selected");
        self.operation = Some(operation);
        self.nil_ids.clear();
    }

    pub fn mark_nil(&mut self, id: impl Into<String>) {
        self.nil_ids.insert(id.into());
    }

    pub fn clear_nil(&mut self, id: &str) {
        self.nil_ids.remove(id);
    }

    pub fn set_payload(&mut self, payload: Option<RequestPayload>, content_type: Option<String>) {
        self.payload = payload;
        self.content_type = content_type;
    }

    pub fn set_authorization(&mut self, authorization: Vec<AuthorizationConfig>) {
        self.authorization = authorization;
    }

    /// Scheme picker entries for the selected operation
    pub fn security_list(&self) -> Vec<SecuritySelectorListItem> {
        self.operation
            .as_ref()
            .map(|op| read_security_list(&op.security))
            .unwrap_or_default()
    }

    pub fn report(&self) -> Result<SerializationReport, AssembleError> {
        let operation = self.operation.as_ref().ok_or(AssembleError::NoOperation)?;
        let report = compile(&operation.parameters, &self.store, &self.nil_ids);
        debug!(valid = report.valid, invalid = ?report.invalid, "parameters compiled");
        Ok(report)
    }

    /// Base URI for the current selection
    pub fn base_uri(&self) -> String {
        let effective = effective_base_uri(
            &self.config.base_uri,
            self.config.server_kind,
            &self.config.server_value,
        );
        if !effective.is_empty() || self.config.server_kind != ServerKind::Server {
            return effective;
        }
        let Some(operation) = &self.operation else {
            return String::new();
        };
        compute_base_uri(
            operation.servers.get(self.config.server_index),
            &operation.protocols,
            self.config.api_version.as_deref(),
        )
    }

    /// Best-effort request for the current values; never blocks on invalid input.
    /// Authorization configs are attached but not yet applied.
    pub fn serialize(&self) -> Result<ApiRequest, AssembleError> {
        let report = self.report()?;
        self.build(&report)
    }

    /// Validates, authorizes and assigns a request id.
    pub fn prepare(&self) -> Result<PreparedRequest, AssembleError> {
        let report = self.report()?;
        if !report.valid {
            return Err(AssembleError::InvalidParameters(report.invalid));
        }
        let request = self.build(&report)?;
        let (mut request, authorization) = apply_authorization(request, self.authorization.clone());
        request.authorization = authorization;
        let id = Uuid::new_v4().to_string();
        Ok(PreparedRequest { id, request })
    }

    /// Prepares the request and hands it to `transport`.
    pub fn execute<T: Transport + ?Sized>(&self, transport: &T) -> Result<ApiResponse, AssembleError> {
        let prepared = self.prepare()?;
        info!(id = %prepared.id, url = %prepared.request.url, "dispatching request");
        Ok(transport.send(&prepared.id, &prepared.request)?)
    }

    fn build(&self, report: &SerializationReport) -> Result<ApiRequest, AssembleError> {
        let operation = self.operation.as_ref().ok_or(AssembleError::NoOperation)?;

        let url = join_url(&self.base_uri(), &operation.path);
        let url = apply_url_variables(&url, &path_variables(&url, &report.path), true);
        let url = apply_url_parameters(&url, &report.query, true);

        let headers = headers_from_map("", &report.header);
        let mut headers = cookies_from_map(&headers, &report.cookie);

        let payload = if operation.method.allows_payload() {
            self.payload.clone()
        } else {
            None
        };
        if let (Some(_), Some(content_type)) = (&payload, &self.content_type) {
            if header_value(&headers, "content-type").is_none() {
                headers = append_header(&headers, "content-type", content_type);
            }
        }

        let mut request = ApiRequest::new(operation.method, url);
        request.headers = headers;
        request.payload = payload;
        request.authorization = self.authorization.clone();
        Ok(request)
    }
}

/// Maps template variables (modifiers included) to the report's path values.
fn path_variables(url: &str, path: &ValueMap) -> ValueMap {
    let mut variables = ValueMap::new();
    for raw in template_variables(url) {
        let name = raw.trim_start_matches(['+', '#']);
        if let Some(value) = path.get(name) {
            variables.insert(raw.clone(), value.clone());
        }
    }
    variables
}

fn join_url(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.to_string();
    }
    let path = path.trim_start_matches('/');
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}
