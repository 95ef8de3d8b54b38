use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use geoloc_core::enrich::{FactsSource, RetryPolicy, WikidataClient, WikidataConfig};
use geoloc_core::upstream::UpstreamError;
use serde_json::json;

#[derive(Clone)]
struct MockState {
    /// Statuses returned to the first calls, in order; later calls succeed.
    failures: Arc<Vec<StatusCode>>,
    hits: Arc<Mutex<Vec<Instant>>>,
}

impl MockState {
    fn new(failures: Vec<StatusCode>) -> Self {
        Self {
            failures: Arc::new(failures),
            hits: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn hits(&self) -> Vec<Instant> {
        self.hits.lock().unwrap().clone()
    }
}

async fn entities(State(state): State<MockState>) -> Response {
    let call = {
        let mut hits = state.hits.lock().unwrap();
        hits.push(Instant::now());
        hits.len()
    };
    if let Some(status) = state.failures.get(call - 1) {
        return (*status, "upstream failure").into_response();
    }
    Json(json!({
        "entities": {
            "Q472": {
                "id": "Q472",
                "labels": {"en": {"language": "en", "value": "Sofia"}},
                "descriptions": {"en": {"language": "en", "value": "capital of Bulgaria"}},
                "claims": {
                    "P1082": [
                        {"mainsnak": {"datavalue": {"value": {"amount": "+1241675"}}}, "rank": "normal"}
                    ]
                }
            }
        }
    }))
    .into_response()
}

async fn spawn_mock(state: MockState) -> SocketAddr {
    let app = Router::new()
        .route("/w/api.php", get(entities))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr, base_delay: Duration) -> WikidataClient {
    let config = WikidataConfig::new(format!("http://{addr}/w/api.php"))
        .with_timeout(Duration::from_secs(5))
        .with_retry(RetryPolicy::new(3, base_delay));
    WikidataClient::with_config(config).unwrap()
}

#[tokio::test]
async fn retries_server_errors_with_growing_delay() {
    let state = MockState::new(vec![StatusCode::SERVICE_UNAVAILABLE, StatusCode::SERVICE_UNAVAILABLE]);
    let addr = spawn_mock(state.clone()).await;
    let client = client(addr, Duration::from_millis(50));

    let facts = client.facts("Q472").await.unwrap().unwrap();

    assert_eq!(facts.label.as_deref(), Some("Sofia"));
    assert_eq!(facts.population, Some(1_241_675.0));

    let hits = state.hits();
    assert_eq!(hits.len(), 3);
    let first_gap = hits[1].duration_since(hits[0]);
    let second_gap = hits[2].duration_since(hits[1]);
    assert!(first_gap >= Duration::from_millis(50), "first gap {first_gap:?}");
    assert!(second_gap >= Duration::from_millis(100), "second gap {second_gap:?}");
}

#[tokio::test]
async fn client_errors_fail_fast() {
    let state = MockState::new(vec![StatusCode::NOT_FOUND; 3]);
    let addr = spawn_mock(state.clone()).await;
    let client = client(addr, Duration::from_millis(50));

    let err = client.facts("Q472").await.unwrap_err();

    assert!(matches!(err, UpstreamError::Status { status: 404, .. }));
    assert_eq!(state.hits().len(), 1);
}

#[tokio::test]
async fn exhausted_retries_report_attempts() {
    let state = MockState::new(vec![StatusCode::BAD_GATEWAY; 3]);
    let addr = spawn_mock(state.clone()).await;
    let client = client(addr, Duration::from_millis(10));

    let err = client.facts("Q472").await.unwrap_err();

    assert!(matches!(err, UpstreamError::Exhausted { attempts: 3, .. }));
    assert_eq!(
        err.to_string(),
        "wikidata failed after 3 attempts: wikidata is temporarily unavailable (status 502), try again later"
    );
    assert_eq!(state.hits().len(), 3);
}

#[tokio::test]
async fn malformed_ids_never_reach_the_network() {
    let state = MockState::new(Vec::new());
    let addr = spawn_mock(state.clone()).await;
    let client = client(addr, Duration::from_millis(10));

    assert!(client.facts("not-an-id").await.unwrap().is_none());
    assert!(state.hits().is_empty());
}
