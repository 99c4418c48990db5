//! JSON REST API over the course store.
//!
//! The server opens the store read-only and shares the handle across
//! requests through router state.

mod error;
mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use coursemap_shared::{CourseMapError, Result, ServeConfig};
use coursemap_storage::Storage;

pub use error::ApiError;

/// Build the API router over a shared store handle.
pub fn router(storage: Arc<Storage>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/majors", get(routes::list_majors))
        .route("/api/majors/{id}/requirements", get(routes::major_requirements))
        .route("/api/courses", get(routes::list_courses))
        .route("/api/courses/eligible", post(routes::eligible_courses))
        .route("/api/courses/{code}", get(routes::get_course))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(storage)
}

/// Open the configured store read-only and serve until the process exits.
///
/// Fails before binding when the database file is missing or was never
/// populated.
pub async fn serve(config: &ServeConfig) -> Result<()> {
    let storage = Storage::open_readonly(&config.db_path).await?;
    let courses = storage.count_courses().await?;

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| CourseMapError::Network(format!("bind {addr}: {e}")))?;

    info!(%addr, db = %config.db_path.display(), courses, "API server listening");

    axum::serve(listener, router(Arc::new(storage)))
        .await
        .map_err(|e| CourseMapError::Network(format!("server error: {e}")))
}
