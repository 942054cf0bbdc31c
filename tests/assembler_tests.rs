/// Integration tests for the request assembler
/// Covers operation loading, base URI selection, serialization and dispatch
use mockito::Matcher;
use reqcraft::auth::{AuthKind, AuthSettings, AuthorizationConfig};
use reqcraft::engine::HttpTransport;
use reqcraft::error::AssembleError;
use reqcraft::headers::header_value;
use reqcraft::models::{Method, Operation, RequestPayload};
use reqcraft::request::{AssemblerConfig, RequestAssembler};
use reqcraft::store::{SharedStore, ValueStore};
use reqcraft::uri::ServerKind;
use serde_json::json;

fn operation() -> Operation {
    serde_json::from_value(json!({
        "id": "getUser",
        "method": "POST",
        "path": "/users/{id}",
        "servers": [ { "url": "api.example.com/{version}/" } ],
        "protocols": ["HTTPS"],
        "parameters": [
            { "id": "p-id", "name": "id", "binding": "path", "required": true,
              "schema": { "kind": "scalar", "dataType": "integer" } },
            { "id": "p-fields", "name": "fields", "binding": "query",
              "schema": { "kind": "array", "items": { "kind": "scalar", "dataType": "string" } } },
            { "id": "p-trace", "name": "traceId", "wireName": "x-trace-id", "binding": "header" },
            { "id": "p-session", "name": "session", "binding": "cookie" }
        ],
        "security": [
            { "schemes": [ { "name": "basic", "scheme": { "type": "basic" } } ] },
            { "schemes": [ { "name": "null" } ] }
        ]
    }))
    .unwrap()
}

fn assembler() -> RequestAssembler {
    let mut assembler = RequestAssembler::new(AssemblerConfig {
        api_version: Some("v2".to_string()),
        ..Default::default()
    });
    assembler.select_operation(operation());
    assembler
}

#[test]
fn test_no_operation_selected() {
    let assembler = RequestAssembler::new(AssemblerConfig::default());
    assert!(matches!(assembler.serialize(), Err(AssembleError::NoOperation)));
    assert!(assembler.security_list().is_empty());
}

#[test]
fn test_base_uri_from_model_server() {
    // Test version substitution, trailing slash removal and protocol prefix
    assert_eq!(assembler().base_uri(), "https://api.example.com/v2");
}

#[test]
fn test_explicit_and_custom_base_uri() {
    let mut assembler = assembler();
    assembler.config_mut().server_kind = ServerKind::Custom;
    assembler.config_mut().server_value = "http://localhost:8080".to_string();
    assert_eq!(assembler.base_uri(), "http://localhost:8080");

    assembler.config_mut().base_uri = "https://override.io".to_string();
    assert_eq!(assembler.base_uri(), "https://override.io");
}

#[test]
fn test_serialize_builds_full_request() {
    let mut assembler = assembler();
    let store = assembler.store_mut();
    store.set("p-id", "42".into());
    store.set("p-fields", json!(["name", null, "email"]).into());
    store.set("p-trace", "abc".into());
    store.set("p-session", "s1".into());
    assembler.set_payload(
        Some(RequestPayload::Text("{\"a\":1}".to_string())),
        Some("application/json".to_string()),
    );

    let request = assembler.serialize().unwrap();
    assert_eq!(request.method, Method::POST);
    assert_eq!(
        request.url,
        "https://api.example.com/v2/users/42?fields=name&fields=email"
    );
    assert_eq!(header_value(&request.headers, "x-trace-id").as_deref(), Some("abc"));
    assert_eq!(header_value(&request.headers, "cookie").as_deref(), Some("session=s1"));
    assert_eq!(
        header_value(&request.headers, "content-type").as_deref(),
        Some("application/json")
    );
    assert_eq!(request.payload, Some(RequestPayload::Text("{\"a\":1}".to_string())));
}

#[test]
fn test_serialize_is_best_effort_but_prepare_validates() {
    let assembler = assembler();
    let request = assembler.serialize().unwrap();
    assert!(request.url.ends_with("/users/{id}"));

    match assembler.prepare() {
        Err(AssembleError::InvalidParameters(ids)) => assert_eq!(ids, vec!["p-id"]),
        other => panic!("expected invalid parameters, got {:?}", other),
    }
}

#[test]
fn test_nil_marks_reset_on_operation_change() {
    let mut assembler = assembler();
    assembler.mark_nil("p-trace");
    assert!(assembler.report().unwrap().header.contains_key("x-trace-id"));

    assembler.select_operation(operation());
    assert!(!assembler.report().unwrap().header.contains_key("x-trace-id"));
}

#[test]
fn test_prepare_applies_authorization() {
    let mut assembler = assembler();
    assembler.store_mut().set("p-id", "7".into());
    let config = AuthSettings {
        username: Some("u".into()),
        password: Some("p".into()),
        ..Default::default()
    };
    assembler.set_authorization(vec![AuthorizationConfig::new(AuthKind::Basic, config)]);

    let prepared = assembler.prepare().unwrap();
    assert!(!prepared.id.is_empty());
    assert_eq!(
        header_value(&prepared.request.headers, "authorization").as_deref(),
        Some("Basic dTpw")
    );
    assert!(!prepared.request.authorization[0].enabled);

    // each preparation gets its own id
    let second = assembler.prepare().unwrap();
    assert_ne!(prepared.id, second.id);
    assert_eq!(second.request.headers, prepared.request.headers);
}

#[test]
fn test_security_list_for_operation() {
    let list = assembler().security_list();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].types, vec![Some(AuthKind::Basic)]);
    assert_eq!(list[1].types, vec![None]);
}

#[test]
fn test_shared_store_is_visible_to_every_assembler() {
    let shared = SharedStore::new();
    let mut first = RequestAssembler::with_store(AssemblerConfig::default(), shared.clone());
    let mut second = RequestAssembler::with_store(AssemblerConfig::default(), shared.clone());
    first.select_operation(operation());
    second.select_operation(operation());

    first.store_mut().set("p-id", "9".into());
    let request = second.serialize().unwrap();
    assert!(request.url.contains("/users/9"));
    assert!(second.store().shares_with(&shared));
}

#[test]
fn test_execute_sends_through_transport() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/users/5")
        .match_query(Matcher::UrlEncoded("fields".into(), "name".into()))
        .match_header("authorization", "Bearer t0k")
        .match_header("x-trace-id", "abc")
        .with_status(200)
        .with_body("{\"id\":5}")
        .create();

    let mut assembler = assembler();
    assembler.config_mut().base_uri = server.url();
    let store = assembler.store_mut();
    store.set("p-id", "5".into());
    store.set("p-fields", json!(["name"]).into());
    store.set("p-trace", "abc".into());
    assembler.set_authorization(vec![AuthorizationConfig::new(
        AuthKind::Bearer,
        AuthSettings {
            token: Some("t0k".into()),
            ..Default::default()
        },
    )]);

    let transport = HttpTransport::new().unwrap();
    let response = assembler.execute(&transport).unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.payload, "{\"id\":5}");
    mock.assert();
}

#[test]
fn test_execute_refuses_invalid_parameters() {
    let server = mockito::Server::new();
    let mut assembler = assembler();
    assembler.config_mut().base_uri = server.url();

    let transport = HttpTransport::new().unwrap();
    let err = assembler.execute(&transport).unwrap_err();
    assert!(matches!(err, AssembleError::InvalidParameters(_)));
}
