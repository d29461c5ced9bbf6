use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use mission_api::{router, MissionService};
use mission_proto::{Mission, Parameters};
use mission_store::{MemoryStore, MissionStore, StoreError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tower::ServiceExt;

fn app() -> (Arc<MemoryStore>, Router) {
    let store = Arc::new(MemoryStore::new());
    (store.clone(), router(Arc::new(MissionService::new(store))))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn create(app: &Router, drone: &str) -> String {
    let (status, text) = send(
        app,
        Method::POST,
        "/mission/create",
        Some(json!({ "droneID": drone, "waypoints": [{ "lat": 1, "lng": 2 }, { "lat": "3", "lng": "4" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{text}");
    text.strip_prefix("Mission Successfully, missionID: ").expect(&text).to_string()
}

fn telemetry(alt: &str) -> Value {
    json!({
        "altimeter": alt, "gyro": "0.01,0.02,9.81", "barometer": "1013.25",
        "lat": "37.3352", "lng": "-121.8811", "connected_sats": "11", "voltage": "12.4"
    })
}

#[tokio::test]
async fn create_then_get() {
    let (_, app) = app();
    let id = create(&app, "d1").await;
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

    let (status, text) = send(&app, Method::GET, &format!("/mission/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let m: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(m["missionID"], id.as_str());
    assert_eq!(m["droneID"], "d1");
    assert_eq!(m["inProgress"], true);
    assert_eq!(m["waypoints"], json!([{ "lat": 1.0, "lng": 2.0 }, { "lat": 3.0, "lng": 4.0 }]));
    assert_eq!(
        m["parameters"],
        json!({ "altimeter": "null", "gyro": "null", "barometer": "null",
                "lat": 0.0, "lng": 0.0, "numSats": 0, "voltage": "null" })
    );
    assert_eq!(m["dateCreated"], m["lastUpdated"]);
}

#[tokio::test]
async fn create_rejects_bad_bodies() {
    let (store, app) = app();
    let (status, _) = send(&app, Method::POST, "/mission/create", Some(json!({ "droneID": "d1" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, text) =
        send(&app, Method::POST, "/mission/create", Some(json!({ "droneID": "d1", "waypoints": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let v: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(v["error"], "decode_error");

    let (status, _) = send(
        &app,
        Method::POST,
        "/mission/create",
        Some(json!({ "droneID": "d1", "waypoints": [{ "lat": "up", "lng": "1" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn update_replaces_telemetry() {
    let (store, app) = app();
    let id = create(&app, "d1").await;
    let before = store.find_by_mission_id(&id).await.unwrap();
    let body = json!({ "MissionID": id, "DroneID": "d1", "Parameters": telemetry("120") });
    let (status, text) = send(&app, Method::PUT, &format!("/mission/update/{id}"), Some(body)).await;
    assert_eq!((status, text.as_str()), (StatusCode::OK, "success"));

    let after = store.find_by_mission_id(&id).await.unwrap();
    assert_eq!(after.parameters.altimeter, "120");
    assert_eq!(after.parameters.num_sats, 11);
    assert_eq!(after.parameters.lat, 37.3352);
    assert!(after.last_updated > before.last_updated);
    assert_eq!(after.date_created, before.date_created);
    assert_eq!(after.waypoints, before.waypoints);
    assert_eq!(after.drone_id, before.drone_id);
}

#[tokio::test]
async fn update_errors() {
    let (_, app) = app();
    let id = create(&app, "d1").await;

    let unknown = json!({ "MissionID": "feedface", "Parameters": telemetry("1") });
    let (status, _) = send(&app, Method::PUT, "/mission/update/feedface", Some(unknown)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mismatch = json!({ "MissionID": "feedface", "Parameters": telemetry("1") });
    let (status, _) = send(&app, Method::PUT, &format!("/mission/update/{id}"), Some(mismatch)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad = json!({ "Parameters": { "lat": "north", "lng": "0", "connected_sats": "3" } });
    let (status, text) = send(&app, Method::PUT, &format!("/mission/update/{id}"), Some(bad)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(text.contains("parse_error"));

    let (status, _) = send(&app, Method::PUT, &format!("/mission/update/{id}"), Some(json!("nope"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_unknown_mission_is_404() {
    let (_, app) = app();
    let (status, text) = send(&app, Method::GET, "/mission/0123456789abcdef0123456789abcdef", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let v: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(v["error"], "not_found");
}

#[tokio::test]
async fn drone_listing() {
    let (_, app) = app();
    let (status, text) = send(&app, Method::GET, "/mission/drone/d1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let v: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(v["message"], "No data found.");

    let mut want = vec![create(&app, "d1").await, create(&app, "d1").await, create(&app, "d1").await];
    create(&app, "d2").await;

    let (status, text) = send(&app, Method::GET, "/mission/drone/d1", None).await;
    assert_eq!(status, StatusCode::OK);
    let list: Vec<Mission> = serde_json::from_str(&text).unwrap();
    let mut got: Vec<String> = list.into_iter().map(|m| m.mission_id).collect();
    got.sort();
    want.sort();
    assert_eq!(got, want);
}

#[tokio::test]
async fn complete_mission() {
    let (store, app) = app();
    let id = create(&app, "d1").await;
    let (status, _) = send(&app, Method::PUT, &format!("/mission/complete/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!store.find_by_mission_id(&id).await.unwrap().in_progress);

    let (status, _) = send(&app, Method::PUT, "/mission/complete/feedface", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_headers_and_preflight() {
    let (_, app) = app();
    let id = create(&app, "d1").await;

    let req = Request::builder()
        .uri(format!("/mission/{id}"))
        .header(header::ORIGIN, "http://dashboard.local")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/mission/create")
        .header(header::ORIGIN, "http://dashboard.local")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = resp.headers()[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap().to_string();
    assert!(methods.contains("PUT"), "{methods}");
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn plain_options_gets_empty_ok() {
    let (_, app) = app();
    let uris = ["/mission/create", "/mission/update/abc", "/mission/complete/abc", "/mission/drone/d1", "/mission/abc"];
    for uri in uris {
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri(uri)
            .header(header::ORIGIN, "http://dashboard.local")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty(), "{uri}");
    }
}

/// Store that fails every call the same way.
struct BrokenStore(StoreError);

#[async_trait]
impl MissionStore for BrokenStore {
    async fn insert(&self, _: &Mission) -> Result<String, StoreError> {
        Err(self.0.clone())
    }
    async fn update_parameters(&self, _: &str, _: OffsetDateTime, _: &Parameters) -> Result<(), StoreError> {
        Err(self.0.clone())
    }
    async fn set_in_progress(&self, _: &str, _: OffsetDateTime, _: bool) -> Result<(), StoreError> {
        Err(self.0.clone())
    }
    async fn find_by_mission_id(&self, _: &str) -> Result<Mission, StoreError> {
        Err(self.0.clone())
    }
    async fn find_by_drone_id(&self, _: &str) -> Result<Vec<Mission>, StoreError> {
        Err(self.0.clone())
    }
    async fn ping(&self) -> Result<(), StoreError> {
        Err(self.0.clone())
    }
}

#[tokio::test]
async fn store_failures_map_to_5xx() {
    let app = router(Arc::new(MissionService::new(Arc::new(BrokenStore(StoreError::Transport(
        "connection refused".into(),
    ))))));
    let body = json!({ "droneID": "d1", "waypoints": [{ "lat": 1, "lng": 2 }] });
    let (status, text) = send(&app, Method::POST, "/mission/create", Some(body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!text.contains("connection refused"));

    let (status, _) = send(&app, Method::GET, "/mission/drone/d1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let app = router(Arc::new(MissionService::new(Arc::new(BrokenStore(StoreError::Timeout(
        Duration::from_secs(10),
    ))))));
    let (status, text) = send(&app, Method::GET, "/mission/abc", None).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(text.contains("store_timeout"));
}
