use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::app::{EventAdmin, EventCatalog, EventQuery, RegistrationWriter};
use crate::config::Config;
use crate::constants::USER_ID_HEADER;
use crate::domain::{Event, Identity, Registration, RegistrationForm};
use crate::error::EventsError;
use crate::storage::EventStore;

/// Shared handles for request handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<EventCatalog>,
    pub registrations: Arc<RegistrationWriter>,
    pub admin: Arc<EventAdmin>,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>, config: &Config) -> Self {
        let catalog = Arc::new(EventCatalog::from_config(store.clone(), config));
        Self::with_catalog(store, catalog, config)
    }

    /// Build around an existing catalog (tests pin its clock)
    pub fn with_catalog(
        store: Arc<dyn EventStore>,
        catalog: Arc<EventCatalog>,
        config: &Config,
    ) -> Self {
        let timeout = config.store.timeout();
        Self {
            registrations: Arc::new(RegistrationWriter::new(store.clone(), timeout)),
            admin: Arc::new(EventAdmin::new(store, catalog.clone(), timeout)),
            catalog,
        }
    }
}

impl IntoResponse for EventsError {
    fn into_response(self) -> Response {
        let status = match &self {
            EventsError::InvalidInput { .. }
            | EventsError::MalformedRecord { .. }
            | EventsError::GalleryParseFailure(_)
            | EventsError::Json(_) => StatusCode::BAD_REQUEST,
            EventsError::DuplicateRegistration => StatusCode::CONFLICT,
            EventsError::InvalidReference { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EventsError::NotFound(_) => StatusCode::NOT_FOUND,
            EventsError::WriteFailed { .. }
            | EventsError::ReadFailed { .. }
            | EventsError::Storage { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EventsError::Config(_) | EventsError::Toml(_) | EventsError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "error": self.code(),
            "message": self.user_message(),
        });
        (status, Json(body)).into_response()
    }
}

fn body_error(rejection: JsonRejection) -> EventsError {
    EventsError::invalid_input("body", rejection.body_text())
}

fn query_error(rejection: QueryRejection) -> EventsError {
    EventsError::invalid_input("query", rejection.body_text())
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "community-events",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics() -> impl IntoResponse {
    crate::observability::metrics::render().unwrap_or_default()
}

async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<EventQuery>, QueryRejection>,
) -> Result<Json<Vec<Event>>, EventsError> {
    let Query(query) = query.map_err(query_error)?;
    state.catalog.list_events(&query).await.map(Json)
}

async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Event>, EventsError> {
    state.catalog.get_event(&id).await.map(Json)
}

async fn create_registration(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RegistrationForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Registration>), EventsError> {
    let Json(form) = payload.map_err(body_error)?;
    let identity = Identity::from_header(
        headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
    );

    let registration = state.registrations.submit(&form, identity).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

async fn create_event(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Event>), EventsError> {
    let Json(data) = payload.map_err(body_error)?;
    let event = state.admin.create_event(data).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Event>, EventsError> {
    let Json(data) = payload.map_err(body_error)?;
    state.admin.update_event(&id, data).await.map(Json)
}

async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, EventsError> {
    state.admin.delete_event(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_registrations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Registration>>, EventsError> {
    state.admin.list_registrations(&id).await.map(Json)
}

/// Create the HTTP router with public, admin and operational routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        // Public site
        .route("/api/events", get(list_events))
        .route("/api/events/:id", get(get_event))
        .route("/api/registrations", post(create_registration))
        // Admin dashboard
        .route("/admin/events", post(create_event))
        .route("/admin/events/:id", put(update_event).delete(delete_event))
        .route("/admin/events/:id/registrations", get(list_registrations))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Serve the router until Ctrl-C
pub async fn serve(router: Router, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Listening on http://{}", addr);
    hyper::Server::bind(&addr)
        .serve(router.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
