//! Tests for reading `reqwest` responses against a mock service.

use std::sync::Arc;

use async_trait::async_trait;
use nectarclient_lib::response::{check_response, read_response, OPENSTACK_REQUEST_ID_HEADER};
use nectarclient_lib::{
    DictWithMeta, Error, HttpException, HttpResponse, ListWithMeta, Manager, ManagerWithFind,
    Resource, ResourceKind, ResponseMeta, WithMeta,
};
use serde_json::{json, Map, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Flavor;

impl ResourceKind for Flavor {
    const NAME: &'static str = "Flavor";
}

/// Minimal flavor client over the mock server.
struct FlavorManager {
    http: reqwest::Client,
    endpoint: String,
}

impl FlavorManager {
    fn new(server: &MockServer) -> Arc<Self> {
        Arc::new(Self {
            http: reqwest::Client::new(),
            endpoint: server.uri(),
        })
    }

    async fn fetch(&self, route: &str) -> nectarclient_lib::Result<(ResponseMeta, Value)> {
        let response = self
            .http
            .get(format!("{}{route}", self.endpoint))
            .send()
            .await?;
        let (meta, body) = check_response(response).await?;
        let body = body.ok_or_else(|| Error::InvalidResponse("empty body".to_string()))?;
        Ok((meta, body))
    }
}

#[async_trait]
impl Manager for FlavorManager {
    async fn get(&self, id: &Value) -> nectarclient_lib::Result<DictWithMeta> {
        let id = id.as_str().unwrap_or_default();
        let (meta, body) = self.fetch(&format!("/flavors/{id}")).await?;
        match body.get("flavor").cloned() {
            Some(Value::Object(flavor)) => Ok(WithMeta::from_response(flavor, &meta)),
            _ => Err(Error::InvalidResponse("missing flavor".to_string())),
        }
    }
}

#[async_trait]
impl ManagerWithFind<Flavor> for FlavorManager {
    async fn list(&self) -> nectarclient_lib::Result<ListWithMeta<Resource<Flavor>>> {
        let (meta, body) = self.fetch("/flavors").await?;
        let Some(Value::Array(items)) = body.get("flavors").cloned() else {
            return Err(Error::InvalidResponse("missing flavors".to_string()));
        };
        let flavors = items
            .into_iter()
            .map(|item| Resource::from_value(None, item))
            .collect::<nectarclient_lib::Result<Vec<_>>>()?;
        Ok(WithMeta::from_response(flavors, &meta))
    }
}

fn partial_flavor(manager: Arc<FlavorManager>, id: &str) -> Resource<Flavor> {
    let mut info = Map::new();
    info.insert("id".to_string(), json!(id));
    let manager: Arc<dyn Manager> = manager;
    Resource::new(Some(manager), info)
}

#[tokio::test]
async fn read_response_keeps_status_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flavors/m1.small"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-OpenStack-Request-ID", "req-read")
                .set_body_json(json!({"flavor": {"id": "m1.small", "vcpus": 1}})),
        )
        .mount(&server)
        .await;

    let response = reqwest::get(format!("{}/flavors/m1.small", server.uri()))
        .await
        .unwrap();
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header(OPENSTACK_REQUEST_ID_HEADER), Some("req-read"));

    let (meta, body) = read_response(response).await.unwrap();
    assert_eq!(meta.status_code(), 200);
    assert_eq!(meta.header("x-openstack-request-id"), Some("req-read"));
    assert!(meta.url().unwrap().ends_with("/flavors/m1.small"));
    assert_eq!(body.unwrap()["flavor"]["vcpus"], json!(1));
}

#[tokio::test]
async fn read_response_tolerates_empty_and_plain_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let response = reqwest::get(format!("{}/empty", server.uri())).await.unwrap();
    let (meta, body) = read_response(response).await.unwrap();
    assert_eq!(meta.status_code(), 204);
    assert!(body.is_none());

    let response = reqwest::get(format!("{}/plain", server.uri())).await.unwrap();
    let (_, body) = read_response(response).await.unwrap();
    assert!(body.is_none());
}

#[tokio::test]
async fn check_response_classifies_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flavors/gone"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("x-compute-request-id", "req-missing")
                .set_body_json(json!({
                    "itemNotFound": {"code": 404, "message": "Flavor gone could not be found."}
                })),
        )
        .mount(&server)
        .await;

    let response = reqwest::get(format!("{}/flavors/gone", server.uri()))
        .await
        .unwrap();
    let err = check_response(response).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.error_code(), "API_ERROR");
    let exception = err.as_http_exception().unwrap();
    assert!(matches!(exception, HttpException::NotFound(_)));
    assert_eq!(exception.message(), "Flavor gone could not be found.");
    assert_eq!(exception.request_id(), Some("req-missing"));
    assert!(exception.info().url.as_deref().unwrap().ends_with("/flavors/gone"));
}

#[tokio::test]
async fn check_response_throttled_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flavors"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "30")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let response = reqwest::get(format!("{}/flavors", server.uri()))
        .await
        .unwrap();
    let err = check_response(response).await.unwrap_err();

    let exception = err.as_http_exception().unwrap();
    assert!(matches!(exception, HttpException::Throttled(_)));
    assert_eq!(exception.retry_after(), Some(30));
    assert_eq!(exception.message(), "Unknown Error");
}

#[tokio::test]
async fn refresh_replaces_fields_and_appends_request_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flavors/m1.large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-openstack-request-id", "req-refresh")
                .set_body_json(json!({
                    "flavor": {"id": "m1.large", "name": "m1.large", "ram": 8192}
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut flavor = partial_flavor(FlavorManager::new(&server), "m1.large");
    assert!(flavor.get("ram").is_err());

    let ram = flavor.get_or_load("ram").await.unwrap().clone();
    assert_eq!(ram, json!(8192));
    assert!(flavor.is_loaded());
    assert_eq!(flavor.request_ids(), &["req-refresh".to_string()]);

    // Already loaded: a missing field no longer triggers a fetch.
    let err = flavor.get_or_load("disk").await.unwrap_err();
    assert!(matches!(err, Error::AttributeNotFound { .. }));
}

#[tokio::test]
async fn refresh_of_deleted_resource_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flavors/m1.tiny"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut flavor = partial_flavor(FlavorManager::new(&server), "m1.tiny");
    assert!(flavor.refresh().await.unwrap().is_none());
    assert_eq!(flavor.get_str("id"), Some("m1.tiny"));
}

#[tokio::test]
async fn refresh_surfaces_other_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flavors/m1.xlarge"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut flavor = partial_flavor(FlavorManager::new(&server), "m1.xlarge");
    let err = flavor.refresh().await.unwrap_err();
    assert!(matches!(
        err.as_http_exception(),
        Some(HttpException::ServiceUnavailable(_))
    ));
}

#[tokio::test]
async fn find_over_listed_resources() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flavors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "flavors": [
                {"id": "1", "name": "m1.small", "vcpus": 1},
                {"id": "2", "name": "m1.medium", "vcpus": 2},
                {"id": "3", "name": "m2.medium", "vcpus": 2}
            ]
        })))
        .mount(&server)
        .await;

    let manager = FlavorManager::new(&server);

    let mut filters = Map::new();
    filters.insert("name".to_string(), json!("m1.medium"));
    let found = manager.find(&filters).await.unwrap();
    assert_eq!(found.id(), Some(&json!("2")));

    let mut filters = Map::new();
    filters.insert("vcpus".to_string(), json!(2));
    assert_eq!(manager.findall(&filters).await.unwrap().len(), 2);
    assert!(matches!(
        manager.find(&filters).await,
        Err(Error::NoUniqueMatch(_))
    ));

    let mut filters = Map::new();
    filters.insert("name".to_string(), json!("m9.huge"));
    let err = manager.find(&filters).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        err.as_http_exception().unwrap().message(),
        r#"No Flavor matching {"name":"m9.huge"}."#
    );
}
