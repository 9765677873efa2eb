//! Route catalog loading
//!
//! A catalog is a JSON array of [`RouteDefinition`]s. Loading converts each
//! definition into a [`Route`], drops the ones that fail validation or are not
//! playable, resolves relative video paths and sorts by name.

use crate::route::{Route, RouteDefinition};
use crate::{Error, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Parse a catalog from JSON text
///
/// Relative video filenames are resolved against `video_folder`.
pub fn parse_catalog(json: &str, video_folder: &Path) -> Result<Vec<Route>> {
    let definitions: Vec<RouteDefinition> = serde_json::from_str(json)?;
    let total = definitions.len();

    let mut routes: Vec<Route> = definitions
        .into_iter()
        .filter_map(|definition| {
            let name = definition.name.clone();
            match Route::try_from(definition) {
                Ok(route) if route.is_valid() => Some(route),
                Ok(_) => {
                    warn!("Skipping route '{}': no distance mapping or courses", name);
                    None
                }
                Err(e) => {
                    warn!("Skipping route '{}': {}", name, e);
                    None
                }
            }
        })
        .collect();

    for route in &mut routes {
        route.resolve_video_path(video_folder);
        debug!(
            "Route '{}': {} courses, {:.0}m, video {}",
            route.name(),
            route.courses().len(),
            route.total_distance(),
            route.video_information().filename.display()
        );
    }

    Route::sort_by_name(&mut routes);
    info!("Loaded {} of {} routes", routes.len(), total);
    Ok(routes)
}

/// Load a catalog file
pub fn load_catalog(path: &Path, video_folder: &Path) -> Result<Vec<Route>> {
    let json = std::fs::read_to_string(path)?;
    parse_catalog(&json, video_folder)
}

/// Look up a route by name
pub fn find_route<'a>(routes: &'a [Route], name: &str) -> Result<&'a Route> {
    routes
        .iter()
        .find(|r| r.name() == name)
        .ok_or_else(|| Error::NotFound(format!("route '{}'", name)))
}

pub fn find_route_mut<'a>(routes: &'a mut [Route], name: &str) -> Result<&'a mut Route> {
    routes
        .iter_mut()
        .find(|r| r.name() == name)
        .ok_or_else(|| Error::NotFound(format!("route '{}'", name)))
}
