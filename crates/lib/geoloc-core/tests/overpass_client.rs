use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use geoloc_core::overpass::{FeatureSource, OverpassClient, OverpassConfig, selectors_for_type};
use geoloc_core::upstream::UpstreamError;
use geoloc_store::LocationType;
use serde_json::json;

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    delay: Duration,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockState {
    fn new(status: StatusCode) -> Self {
        Self {
            status,
            delay: Duration::ZERO,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

async fn interpreter(
    State(state): State<MockState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state
        .queries
        .lock()
        .unwrap()
        .push(form.get("data").cloned().unwrap_or_default());
    tokio::time::sleep(state.delay).await;
    if !state.status.is_success() {
        return (state.status, "overpass failure").into_response();
    }
    Json(json!({
        "elements": [
            {
                "type": "node",
                "id": 17,
                "lat": 42.6977,
                "lon": 23.3219,
                "tags": {"name": "Sofia", "place": "city", "wikidata": "Q472"}
            },
            {
                "type": "way",
                "id": 18,
                "center": {"lat": 42.69, "lon": 23.32},
                "tags": {"name": "Sofia", "place": "city"}
            },
            {"type": "node", "id": 19, "lat": 42.0, "lon": 23.0, "tags": {"place": "city"}}
        ]
    }))
    .into_response()
}

async fn spawn_mock(state: MockState) -> SocketAddr {
    let app = Router::new()
        .route("/api/interpreter", post(interpreter))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr, timeout: Duration) -> OverpassClient {
    let config = OverpassConfig::new(format!("http://{addr}/api/interpreter")).with_timeout(timeout);
    OverpassClient::with_config(config).unwrap()
}

fn city_selectors() -> Vec<geoloc_core::overpass::TagSelector> {
    selectors_for_type(LocationType::City).unwrap()
}

#[tokio::test]
async fn posts_query_and_normalizes_elements() {
    let state = MockState::new(StatusCode::OK);
    let addr = spawn_mock(state.clone()).await;
    let client = client(addr, Duration::from_secs(5));

    let features = client.search("Sofia", &city_selectors()).await.unwrap();

    let ids: Vec<i64> = features.iter().map(|feature| feature.osm_id).collect();
    assert_eq!(ids, vec![17, 18]);
    assert_eq!(features[0].kind, LocationType::City);
    assert_eq!(features[0].wikidata_id(), Some("Q472"));
    assert_eq!(features[1].osm_type, "way");

    let queries = state.queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("Sofia"), "query was {}", queries[0]);
    assert!(queries[0].contains("place"), "query was {}", queries[0]);
}

#[tokio::test]
async fn rate_limit_and_gateway_timeout_are_unavailable() {
    for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::GATEWAY_TIMEOUT] {
        let addr = spawn_mock(MockState::new(status)).await;
        let client = client(addr, Duration::from_secs(5));

        let err = client.search("Sofia", &city_selectors()).await.unwrap_err();

        assert!(
            matches!(err, UpstreamError::Unavailable { service: "overpass", status: code } if code == status.as_u16()),
            "unexpected error {err:?}"
        );
    }
}

#[tokio::test]
async fn other_failures_report_status() {
    let addr = spawn_mock(MockState::new(StatusCode::BAD_REQUEST)).await;
    let client = client(addr, Duration::from_secs(5));

    let err = client.search("Sofia", &city_selectors()).await.unwrap_err();

    assert!(matches!(err, UpstreamError::Status { service: "overpass", status: 400 }));
    assert_eq!(err.to_string(), "overpass returned status 400");
}

#[tokio::test]
async fn slow_responses_time_out() {
    let state = MockState::new(StatusCode::OK).with_delay(Duration::from_secs(2));
    let addr = spawn_mock(state).await;
    let client = client(addr, Duration::from_millis(200));

    let err = client.search("Sofia", &city_selectors()).await.unwrap_err();

    assert!(matches!(err, UpstreamError::Timeout { service: "overpass", .. }));
}
