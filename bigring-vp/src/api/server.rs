//! HTTP server setup and routing
//!
//! Sets up the Axum HTTP server with the control endpoints and SSE.

use crate::error::{Error, Result};
use crate::playback::controller::ControllerHandle;
use crate::playback::cyclist::SensorDistance;
use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use bigring_common::catalog::find_route_mut;
use bigring_common::events::RideEvent;
use bigring_common::Route;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared application context passed to all handlers
///
/// AppContext implements Clone, which gives us `FromRef<AppContext>` for free
/// via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub controller: ControllerHandle,
    /// Route catalog, sorted by name
    pub catalog: Arc<RwLock<Vec<Route>>>,
    /// Present when the distance comes from an external sensor feed
    pub sensor: Option<Arc<SensorDistance>>,
    pub port: u16,
}

/// Build the router with all endpoints
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Route and course selection
        .route("/routes", get(super::handlers::list_routes))
        .route("/routes/select", post(super::handlers::select_route))
        .route("/routes/start_point", post(super::handlers::add_start_point))
        .route("/course/select", post(super::handlers::select_course))

        // Playback control
        .route("/playback/play", post(super::handlers::play))
        .route("/playback/pause", post(super::handlers::pause))
        .route("/playback/status", get(super::handlers::get_status))

        // Rider input and route geometry
        .route("/ride/distance", post(super::handlers::set_distance))
        .route("/route/profile", get(super::handlers::get_profile))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local UI access
        .layer(CorsLayer::permissive())
}

/// Keep unfinished-run markers in the catalog in step with ride events
pub fn spawn_catalog_tracker(
    catalog: Arc<RwLock<Vec<Route>>>,
    state: &SharedState,
) -> JoinHandle<()> {
    let mut rx = state.subscribe_events();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(RideEvent::UnfinishedRun {
                    route_name,
                    distance,
                    ..
                }) => {
                    let mut routes = catalog.write().await;
                    if let Ok(route) = find_route_mut(&mut routes, &route_name) {
                        debug!("Marking '{}' unfinished at {:.1}m", route_name, distance);
                        route.set_unfinished_run(distance);
                    }
                }
                Ok(RideEvent::CourseFinished { route_name, .. }) => {
                    let mut routes = catalog.write().await;
                    if let Ok(route) = find_route_mut(&mut routes, &route_name) {
                        route.clear_unfinished_run();
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!("Catalog tracker missed {} events", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Run HTTP API server until `shutdown` completes
pub async fn run<F>(ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let port = ctx.port;
    spawn_catalog_tracker(Arc::clone(&ctx.catalog), &ctx.state);
    let app = create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
