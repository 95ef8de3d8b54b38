//! HTTP admin server for geoloc-mcp.
//!
//! Exposes health, per-client request statistics and read-only access to the
//! stored locations. Every request is counted by an injected
//! [`RequestCounter`] and rejected with 429 once the client is over its limit.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Json, Path, Query, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use geoloc_core::control::{ControlError, LocationControlPlane};
use geoloc_core::store::StoreError;
use geoloc_store::LocationRecord;
use serde::{Deserialize, Serialize};
use surrealdb::Connection;
use tracing::{debug, info, warn};

pub mod limiter;

pub use limiter::{Admission, ClientStats, FixedWindowCounter, RequestCounter};

pub const DEFAULT_ADMIN_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 4030);

/// Client identity used when no `x-forwarded-for` header is present.
pub const LOCAL_CLIENT: &str = "local";

/// Configuration for the admin HTTP server.
#[derive(Debug, Clone)]
pub struct AdminServerConfig {
    pub addr: SocketAddr,
    pub request_timeout: Duration,
}

impl AdminServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            request_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for AdminServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ADMIN_ADDR)
    }
}

/// HTTP admin server wrapper.
pub struct AdminServer<C: Connection> {
    config: AdminServerConfig,
    state: AppState<C>,
}

impl<C: Connection> AdminServer<C> {
    #[must_use]
    pub fn new(
        control: Arc<LocationControlPlane<C>>,
        counter: Arc<dyn RequestCounter>,
        config: AdminServerConfig,
    ) -> Self {
        let state = AppState {
            control,
            counter,
            request_timeout: config.request_timeout,
        };
        Self { config, state }
    }
}

impl<C> AdminServer<C>
where
    C: Connection + Send + Sync + 'static,
{
    /// Builds the router without binding a listener.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Runs the HTTP server until shutdown.
    ///
    /// # Errors
    /// Returns any listener or server error.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = build_router(self.state);

        info!("geoloc-admin listening on {addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

struct AppState<C: Connection> {
    control: Arc<LocationControlPlane<C>>,
    counter: Arc<dyn RequestCounter>,
    request_timeout: Duration,
}

impl<C: Connection> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
            counter: self.counter.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn timeout() -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, "admin request timed out")
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        let status = match &err {
            ControlError::Input(_) | ControlError::Store(StoreError::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            ControlError::NotFound(_) => StatusCode::NOT_FOUND,
            ControlError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ControlError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ControlError::Store(StoreError::Surreal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %err, "admin request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse { error: self.message });
        (self.status, payload).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    collection: Option<String>,
    #[serde(rename = "type")]
    location_type: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct CollectionCount {
    collection: String,
    count: u64,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    clients: Vec<ClientStats>,
    collections: Vec<CollectionCount>,
}

fn build_router<C>(state: AppState<C>) -> Router
where
    C: Connection + Send + Sync + 'static,
{
    let counter = state.counter.clone();
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats::<C>))
        .route("/locations", get(list_locations::<C>))
        .route("/locations/:collection/:id", get(get_location::<C>))
        .with_state(state)
        .layer(middleware::from_fn_with_state(counter, count_requests))
}

/// First `x-forwarded-for` entry, or [`LOCAL_CLIENT`].
fn client_identity(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| LOCAL_CLIENT.to_string(), ToString::to_string)
}

async fn count_requests(
    State(counter): State<Arc<dyn RequestCounter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_identity(request.headers());
    match counter.admit(&client) {
        Admission::Allowed => next.run(request).await,
        Admission::Limited { retry_after } => {
            let seconds = retry_after.as_secs().max(1);
            debug!(%client, seconds, "admin request rate limited");
            let mut response = ApiError::new(
                StatusCode::TOO_MANY_REQUESTS,
                format!("rate limit exceeded, retry in {seconds}s"),
            )
            .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
            response
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn stats<C>(State(state): State<AppState<C>>) -> Result<Json<StatsResponse>, ApiError>
where
    C: Connection + Send + Sync + 'static,
{
    let counts = tokio::time::timeout(state.request_timeout, state.control.collection_counts())
        .await
        .map_err(|_| ApiError::timeout())??;

    Ok(Json(StatsResponse {
        clients: state.counter.snapshot(),
        collections: counts
            .into_iter()
            .map(|(partition, count)| CollectionCount {
                collection: partition.to_string(),
                count,
            })
            .collect(),
    }))
}

async fn list_locations<C>(
    State(state): State<AppState<C>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<LocationRecord>>, ApiError>
where
    C: Connection + Send + Sync + 'static,
{
    let records = tokio::time::timeout(
        state.request_timeout,
        state.control.list_locations(
            query.collection.as_deref(),
            query.location_type.as_deref(),
            query.limit,
        ),
    )
    .await
    .map_err(|_| ApiError::timeout())??;

    Ok(Json(records))
}

async fn get_location<C>(
    State(state): State<AppState<C>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<LocationRecord>, ApiError>
where
    C: Connection + Send + Sync + 'static,
{
    let record = tokio::time::timeout(
        state.request_timeout,
        state.control.get_location_by_id(&id, Some(&collection)),
    )
    .await
    .map_err(|_| ApiError::timeout())??;

    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request as HttpRequest;
    use geoloc_core::test_support::{
        StubFactsSource,
        StubFeatureSource,
        StubNarrativeSource,
        feature,
        memory_control_plane,
    };
    use geoloc_store::{Coordinates, LocationType};
    use serde_json::Value;
    use surrealdb::engine::local::Db;
    use tower::ServiceExt;

    use super::*;

    async fn control(db: &str) -> Arc<LocationControlPlane<Db>> {
        let features = Arc::new(StubFeatureSource::new(vec![feature(
            7,
            "Musala",
            LocationType::Peak,
            Coordinates::new(42.18, 23.58),
            &[("natural", "peak"), ("ele", "2925")],
        )]));
        Arc::new(
            memory_control_plane(
                db,
                features,
                Arc::new(StubNarrativeSource::new(None)),
                Arc::new(StubFactsSource::new(None)),
            )
            .await,
        )
    }

    fn router(control: Arc<LocationControlPlane<Db>>, counter: Arc<dyn RequestCounter>) -> Router {
        AdminServer::new(control, counter, AdminServerConfig::default()).router()
    }

    fn get_request(uri: &str, client: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(client) = client {
            builder = builder.header("x-forwarded-for", client);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn client_identity_uses_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers), "local");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 10.0.0.1 , 10.0.0.2"));
        assert_eq!(client_identity(&headers), "10.0.0.1");
    }

    #[tokio::test]
    async fn health_responds_ok() {
        let counter = Arc::new(FixedWindowCounter::new(10, Duration::from_secs(60)));
        let app = router(control("admin_health").await, counter);

        let response = app.oneshot(get_request("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn over_limit_requests_get_429() {
        let counter = Arc::new(FixedWindowCounter::new(2, Duration::from_secs(60)));
        let app = router(control("admin_limit").await, counter.clone());

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(get_request("/health", Some("203.0.113.9")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .clone()
            .oneshot(get_request("/health", Some("203.0.113.9")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("rate limit exceeded"));

        // Other clients keep their own budget.
        let response = app
            .clone()
            .oneshot(get_request("/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        counter.reset();
        let response = app
            .oneshot(get_request("/health", Some("203.0.113.9")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stats_reports_clients_and_collections() {
        let control = control("admin_stats").await;
        control.resolve_one("Musala", Some("peak"), None).await.unwrap();
        let counter = Arc::new(FixedWindowCounter::new(10, Duration::from_secs(60)));
        let app = router(control, counter);

        app.clone()
            .oneshot(get_request("/health", Some("198.51.100.4")))
            .await
            .unwrap();
        let response = app.oneshot(get_request("/stats", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let clients = body["clients"].as_array().unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0]["client"], "198.51.100.4");
        assert_eq!(clients[1]["client"], "local");
        assert_eq!(clients[1]["total_requests"], 1);

        let peaks = body["collections"]
            .as_array()
            .unwrap()
            .iter()
            .find(|entry| entry["collection"] == "peaks")
            .unwrap();
        assert_eq!(peaks["count"], 1);
    }

    #[tokio::test]
    async fn locations_are_listed_and_fetched() {
        let control = control("admin_locations").await;
        let stored = control.resolve_one("Musala", Some("peak"), None).await.unwrap();
        let id = stored.id.unwrap();
        let counter = Arc::new(FixedWindowCounter::new(10, Duration::from_secs(60)));
        let app = router(control, counter);

        let response = app
            .clone()
            .oneshot(get_request("/locations?type=peak&limit=5", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "Musala");

        let response = app
            .clone()
            .oneshot(get_request(&format!("/locations/peaks/{id}"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["elevation"], 2925.0);

        let response = app
            .clone()
            .oneshot(get_request(&format!("/locations/cities/{id}"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await["error"],
            format!("no location with id {id}")
        );

        let response = app
            .oneshot(get_request("/locations?collection=rivers", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "unknown collection: rivers");
    }
}
