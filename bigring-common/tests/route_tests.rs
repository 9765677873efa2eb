//! Integration tests for the route model
//!
//! Exercises the distance ↔ frame mapping across many breakpoints and the
//! JSON round trip used by route catalogs.

use bigring_common::{Course, DistanceMappingEntry, ProfileEntry, Route, VideoInformation};

/// Route with speed changes every few hundred frames, as recorded on a climb
fn mountain_route() -> Route {
    let mappings = vec![
        DistanceMappingEntry::new(0, 0.55),
        DistanceMappingEntry::new(240, 0.31),
        DistanceMappingEntry::new(900, 0.18),
        DistanceMappingEntry::new(1500, 0.42),
        DistanceMappingEntry::new(1501, 0.27),
        DistanceMappingEntry::new(4000, 0.6),
    ];
    let profile = vec![
        ProfileEntry::new(0.0, 2.0),
        ProfileEntry::new(300.0, 7.5),
        ProfileEntry::new(600.0, 9.1),
        ProfileEntry::new(1200.0, -3.0),
    ];
    Route::new(
        "Mountain",
        VideoInformation::new("mountain.avi", 30.0),
        vec![
            Course::new("Full climb", 0.0, 1800.0),
            Course::new("Upper half", 900.0, 1800.0),
        ],
        mappings,
        profile,
    )
    .with_start_altitude(850.0)
}

#[test]
fn test_frame_for_distance_is_monotonic() {
    let route = mountain_route();
    let mut previous = 0;
    let mut distance = -5.0;
    while distance < 3000.0 {
        let frame = route.frame_for_distance(distance).unwrap();
        assert!(
            frame >= previous,
            "frame went backwards at {distance}m: {frame} < {previous}"
        );
        previous = frame;
        distance += 0.07;
    }
}

#[test]
fn test_breakpoints_land_on_their_frames() {
    let route = mountain_route();
    for frame in [240u32, 900, 1500, 1501, 4000] {
        let distance = route.distance_for_frame(frame).unwrap();
        // Nudge past the key to avoid rounding below the breakpoint
        let found = route.frame_for_distance(distance + 1e-6).unwrap();
        assert_eq!(found, frame, "breakpoint frame {frame} at {distance}m");
    }
}

#[test]
fn test_course_start_frames() {
    let route = mountain_route();
    let starts: Vec<u32> = route
        .courses()
        .iter()
        .map(|course| route.frame_for_distance(course.start_distance).unwrap())
        .collect();
    assert_eq!(starts[0], 0);
    assert!(starts[1] > starts[0]);
}

#[test]
fn test_altitude_profile_bounds() {
    let route = mountain_route();
    assert_eq!(route.altitude_for_distance(0.0), 850.0);
    assert!(route.maximum_altitude() > route.minimum_altitude());
    assert_eq!(route.minimum_altitude(), 850.0);
    // Highest point is where the descent starts
    let top = route.altitude_for_distance(1200.0);
    assert!((route.maximum_altitude() - top).abs() < 1e-9);
}

#[test]
fn test_json_round_trip_preserves_mapping() {
    let mut route = mountain_route();
    route.set_unfinished_run(1234.5);

    let json = serde_json::to_string(&route).unwrap();
    let restored: Route = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.name(), "Mountain");
    assert_eq!(restored.unfinished_run(), Some(1234.5));
    for distance in [0.0, 133.0, 777.7, 1500.0, 2999.0] {
        assert_eq!(
            restored.frame_for_distance(distance).unwrap(),
            route.frame_for_distance(distance).unwrap()
        );
        assert_eq!(
            restored.altitude_for_distance(distance),
            route.altitude_for_distance(distance)
        );
    }
}

#[test]
fn test_json_rejects_invalid_mapping() {
    let json = r#"{
        "name": "Bad",
        "video": { "filename": "bad.avi", "frame_rate": 30.0 },
        "courses": [ { "name": "All", "start_distance": 0.0, "end_distance": 10.0 } ],
        "distance_mappings": [ { "frame_number": 0, "meters_per_frame": 0.0 } ]
    }"#;
    assert!(serde_json::from_str::<Route>(json).is_err());
}
