//! Caching layer for reverse geocoding.
//!
//! Device positions jitter by a few meters between fixes. Coordinates are
//! snapped to a grid (about 11 m at the default precision) so nearby fixes
//! share one cache entry.

use std::time::Duration;

use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::domain::Coordinates;

use super::address::RawAddress;
use super::client::Geocoder;
use super::error::GeocodeError;

/// Cache key: coordinates scaled by the grid resolution and rounded.
type CellKey = (i64, i64);

/// Configuration for the geocode cache.
#[derive(Debug, Clone)]
pub struct GeocodeCacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,

    /// Decimal places kept when snapping coordinates.
    pub precision: u8,
}

impl Default for GeocodeCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_capacity: 1000,
            precision: 4,
        }
    }
}

/// Geocoder wrapper that caches lookups yielding an address, per grid cell.
pub struct CachedGeocoder<G> {
    inner: G,
    cells: MokaCache<CellKey, RawAddress>,
    scale: f64,
}

impl<G> CachedGeocoder<G> {
    /// Create a new cached geocoder.
    pub fn new(inner: G, config: &GeocodeCacheConfig) -> Self {
        let cells = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self {
            inner,
            cells,
            scale: 10f64.powi(i32::from(config.precision)),
        }
    }

    /// Grid cell for a coordinate pair.
    fn cell(&self, coords: Coordinates) -> CellKey {
        (
            (coords.latitude * self.scale).round() as i64,
            (coords.longitude * self.scale).round() as i64,
        )
    }

    /// Number of cached cells (for monitoring).
    pub fn entry_count(&self) -> u64 {
        self.cells.entry_count()
    }

    /// Invalidate all cached entries.
    pub fn invalidate_all(&self) {
        self.cells.invalidate_all();
    }
}

impl<G> Geocoder for CachedGeocoder<G>
where
    G: Geocoder + Sync,
{
    async fn reverse_geocode(&self, coords: Coordinates) -> Result<RawAddress, GeocodeError> {
        let key = self.cell(coords);

        if let Some(hit) = self.cells.get(&key).await {
            debug!(lat = coords.latitude, lng = coords.longitude, "Geocode cache hit");
            return Ok(hit);
        }

        let raw = self.inner.reverse_geocode(coords).await?;
        // An answer with no usable address would pin the cell until expiry.
        if raw.normalize().is_some() {
            self.cells.insert(key, raw.clone()).await;
        }
        Ok(raw)
    }
}
