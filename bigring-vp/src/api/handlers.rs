//! HTTP request handlers
//!
//! Route selection, course selection, playback control and status endpoints.

use crate::api::server::AppContext;
use crate::error::Error;
use crate::playback::cyclist::DistanceSource;
use crate::state::PlaybackStatus;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use bigring_common::catalog::{find_route, find_route_mut};
use bigring_common::{Course, Route};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub git_hash: String,
    pub build_timestamp: String,
    pub build_profile: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CourseSummary {
    pub index: usize,
    pub name: String,
    pub start_distance: f64,
    pub end_distance: f64,
    pub custom: bool,
}

impl CourseSummary {
    fn new(index: usize, course: &Course) -> Self {
        Self {
            index,
            name: course.name.clone(),
            start_distance: course.start_distance,
            end_distance: course.end_distance,
            custom: course.custom,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RouteSummary {
    pub name: String,
    pub video: String,
    pub frame_rate: f64,
    pub valid: bool,
    pub total_distance: f64,
    pub minimum_altitude: f64,
    pub maximum_altitude: f64,
    pub unfinished_run: Option<f64>,
    pub courses: Vec<CourseSummary>,
}

impl From<&Route> for RouteSummary {
    fn from(route: &Route) -> Self {
        Self {
            name: route.name().to_string(),
            video: route.video_information().filename.display().to_string(),
            frame_rate: route.video_information().frame_rate,
            valid: route.is_valid(),
            total_distance: route.total_distance(),
            minimum_altitude: route.minimum_altitude(),
            maximum_altitude: route.maximum_altitude(),
            unfinished_run: route.unfinished_run(),
            courses: route
                .courses()
                .iter()
                .enumerate()
                .map(|(index, course)| CourseSummary::new(index, course))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectRouteRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectCourseRequest {
    /// `null` or absent clears the course selection
    #[serde(default)]
    pub index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StartPointRequest {
    pub route: String,
    pub distance: f64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct StartPointResponse {
    pub route: String,
    pub course: CourseSummary,
}

#[derive(Debug, Deserialize)]
pub struct DistanceRequest {
    pub distance: f64,
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub distance: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub route: String,
    pub distance: f64,
    pub slope: f64,
    pub altitude: f64,
    pub frame: Option<u32>,
}

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Map player errors onto HTTP status codes
fn error_response(err: Error) -> ApiError {
    let code = match &err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::Common(inner) => match inner {
            bigring_common::Error::NotFound(_) => StatusCode::NOT_FOUND,
            bigring_common::Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            bigring_common::Error::InvalidRoute(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if code.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected: {}", err);
    }

    (
        code,
        Json(StatusResponse {
            status: format!("error: {}", err),
        }),
    )
}

fn ok() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

// ============================================================================
// Health
// ============================================================================

/// GET /health - Health check with build identification
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "bigring-vp".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
    })
}

// ============================================================================
// Routes and courses
// ============================================================================

/// GET /routes - List the route catalog
pub async fn list_routes(State(ctx): State<AppContext>) -> Json<Vec<RouteSummary>> {
    let routes = ctx.catalog.read().await;
    Json(routes.iter().map(RouteSummary::from).collect())
}

/// POST /routes/select - Select a route by name
pub async fn select_route(
    State(ctx): State<AppContext>,
    Json(req): Json<SelectRouteRequest>,
) -> ApiResult<StatusResponse> {
    info!("Select route request: {}", req.name);

    let route = find_route(&ctx.catalog.read().await, &req.name)
        .cloned()
        .map_err(|e| error_response(e.into()))?;

    ctx.controller
        .select_route(route)
        .await
        .map_err(error_response)?;

    Ok(ok())
}

/// POST /routes/start_point - Add a custom course to a route
///
/// The new course is visible to the player the next time the route is selected.
pub async fn add_start_point(
    State(ctx): State<AppContext>,
    Json(req): Json<StartPointRequest>,
) -> ApiResult<StartPointResponse> {
    info!(
        "Add start point '{}' at {:.1}m on '{}'",
        req.name, req.distance, req.route
    );

    if !req.distance.is_finite() || req.distance < 0.0 {
        return Err(error_response(Error::BadRequest(format!(
            "distance must be a non-negative number, got {}",
            req.distance
        ))));
    }
    if req.name.trim().is_empty() {
        return Err(error_response(Error::BadRequest(
            "start point name must not be empty".to_string(),
        )));
    }

    let mut routes = ctx.catalog.write().await;
    let route =
        find_route_mut(&mut routes, &req.route).map_err(|e| error_response(e.into()))?;

    if req.distance >= route.total_distance() {
        return Err(error_response(Error::BadRequest(format!(
            "distance {:.1}m is beyond the end of the route",
            req.distance
        ))));
    }

    route.add_start_point(req.distance, req.name.trim());
    let index = route.courses().len() - 1;
    let course = route
        .course(index)
        .map(|c| CourseSummary::new(index, c))
        .ok_or_else(|| Error::Internal("course vanished after insert".to_string()))
        .map_err(error_response)?;

    Ok(Json(StartPointResponse {
        route: req.route,
        course,
    }))
}

/// POST /course/select - Select a course of the current route
pub async fn select_course(
    State(ctx): State<AppContext>,
    Json(req): Json<SelectCourseRequest>,
) -> ApiResult<StatusResponse> {
    info!("Select course request: {:?}", req.index);

    ctx.controller
        .select_course(req.index)
        .await
        .map_err(error_response)?;

    Ok(ok())
}

// ============================================================================
// Playback control
// ============================================================================

/// POST /playback/play - Start or resume playback
pub async fn play(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    info!("Play request");
    ctx.controller.play(true).await.map_err(error_response)?;
    Ok(ok())
}

/// POST /playback/pause - Pause playback
pub async fn pause(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    info!("Pause request");
    ctx.controller.play(false).await.map_err(error_response)?;
    Ok(ok())
}

/// GET /playback/status - Current playback status
pub async fn get_status(State(ctx): State<AppContext>) -> Json<PlaybackStatus> {
    Json(ctx.state.status().await)
}

// ============================================================================
// Rider input and route geometry
// ============================================================================

/// POST /ride/distance - Report the rider's distance from an external sensor
pub async fn set_distance(
    State(ctx): State<AppContext>,
    Json(req): Json<DistanceRequest>,
) -> ApiResult<StatusResponse> {
    let sensor = ctx
        .sensor
        .as_ref()
        .ok_or_else(|| {
            Error::InvalidState("distance is simulated; start with --sensor".to_string())
        })
        .map_err(error_response)?;

    if !req.distance.is_finite() || req.distance < 0.0 {
        return Err(error_response(Error::BadRequest(format!(
            "distance must be a non-negative number, got {}",
            req.distance
        ))));
    }

    sensor.set_distance(req.distance);
    Ok(ok())
}

/// GET /route/profile - Slope and altitude of the current route
///
/// Without a `distance` query parameter the rider's current distance is used.
pub async fn get_profile(
    State(ctx): State<AppContext>,
    Query(query): Query<ProfileQuery>,
) -> ApiResult<ProfileResponse> {
    let status = ctx.state.status().await;
    let route_name = status
        .route_name
        .ok_or_else(|| Error::InvalidState("no route selected".to_string()))
        .map_err(error_response)?;

    let distance = match query.distance {
        Some(d) if d.is_finite() => d,
        Some(d) => {
            return Err(error_response(Error::BadRequest(format!(
                "invalid distance {}",
                d
            ))))
        }
        None => ctx
            .sensor
            .as_ref()
            .map_or(status.distance, |sensor| sensor.distance()),
    };

    let routes = ctx.catalog.read().await;
    let route = find_route(&routes, &route_name).map_err(|e| error_response(e.into()))?;

    Ok(Json(ProfileResponse {
        route: route_name.clone(),
        distance,
        slope: route.slope_for_distance(distance),
        altitude: route.altitude_for_distance(distance),
        frame: route.frame_for_distance(distance).ok(),
    }))
}
