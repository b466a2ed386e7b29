//! Map viewport calculation.
//!
//! Turns a set of points (a trip's stops, optionally the device location)
//! into the region a map should display: a center plus latitude/longitude
//! spans.

use serde::{Deserialize, Serialize};

use crate::domain::{Coordinates, Trip};

/// Center of the default region, shown when there is nothing to display.
pub const DEFAULT_CENTER: Coordinates = Coordinates::new(37.78825, -122.4324);

/// Smallest span (degrees) for either axis.
///
/// A lone marker, or a cluster of nearly colocated markers, is shown at this
/// zoom rather than zooming in without limit.
pub const MIN_DELTA: f64 = 0.05;

/// Factor applied to the bounding-box span so markers are inset from the edge.
pub const PADDING_FACTOR: f64 = 1.5;

/// A visible map area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl Region {
    /// A region centered on a point with equal spans.
    pub fn centered(center: Coordinates, delta: f64) -> Self {
        Self {
            latitude: center.latitude,
            longitude: center.longitude,
            latitude_delta: delta,
            longitude_delta: delta,
        }
    }

    /// Returns true if the point lies inside the region.
    pub fn contains(&self, point: Coordinates) -> bool {
        (point.latitude - self.latitude).abs() <= self.latitude_delta / 2.0
            && (point.longitude - self.longitude).abs() <= self.longitude_delta / 2.0
    }
}

/// Configuration for viewport calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig {
    /// Region returned for an empty point set.
    pub default_region: Region,
    /// Minimum span for both axes.
    pub min_delta: f64,
    /// Multiplier applied to the bounding-box span.
    pub padding: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            default_region: Region::centered(DEFAULT_CENTER, MIN_DELTA),
            min_delta: MIN_DELTA,
            padding: PADDING_FACTOR,
        }
    }
}

/// Computes map regions from point sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportCalculator {
    config: ViewportConfig,
}

impl ViewportCalculator {
    /// Create a calculator with the given configuration.
    pub fn new(config: ViewportConfig) -> Self {
        Self { config }
    }

    /// Compute the region covering `points`.
    ///
    /// Points with non-finite coordinates are ignored.
    pub fn calculate_region(&self, points: &[Coordinates]) -> Region {
        let mut usable = points
            .iter()
            .filter(|p| p.latitude.is_finite() && p.longitude.is_finite());

        let Some(first) = usable.next() else {
            return self.config.default_region;
        };

        let mut min_lat = first.latitude;
        let mut max_lat = first.latitude;
        let mut min_lng = first.longitude;
        let mut max_lng = first.longitude;
        let mut count = 1usize;

        for p in usable {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
            count += 1;
        }

        if count == 1 {
            return Region::centered(*first, self.config.min_delta);
        }

        Region {
            latitude: (min_lat + max_lat) / 2.0,
            longitude: (min_lng + max_lng) / 2.0,
            latitude_delta: ((max_lat - min_lat) * self.config.padding).max(self.config.min_delta),
            longitude_delta: ((max_lng - min_lng) * self.config.padding)
                .max(self.config.min_delta),
        }
    }

    /// Compute the region for a trip, optionally including the device location.
    pub fn region_for_trip(&self, trip: Option<&Trip>, user_location: Option<Coordinates>) -> Region {
        self.calculate_region(&trip_points(trip, user_location))
    }
}

/// Compute a region with the default configuration.
pub fn calculate_region(points: &[Coordinates]) -> Region {
    ViewportCalculator::default().calculate_region(points)
}

/// Collect the points to frame for a trip.
///
/// The sentinel stop is skipped: the device location, when known, is passed
/// separately and is the fresher of the two.
pub fn trip_points(trip: Option<&Trip>, user_location: Option<Coordinates>) -> Vec<Coordinates> {
    let mut points: Vec<Coordinates> = user_location.into_iter().collect();
    if let Some(trip) = trip {
        points.extend(trip.routable_stops().map(|s| s.location.coordinates()));
    }
    points
}
