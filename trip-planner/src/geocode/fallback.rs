//! Primary/secondary geocoder chain.

use tracing::debug;

use crate::domain::Coordinates;

use super::address::RawAddress;
use super::client::Geocoder;
use super::error::GeocodeError;

/// Tries `primary` first and falls back to `secondary` when the primary
/// fails or returns a result with no usable address.
#[derive(Debug, Clone)]
pub struct FallbackGeocoder<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> FallbackGeocoder<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

impl<P, S> Geocoder for FallbackGeocoder<P, S>
where
    P: Geocoder + Sync,
    S: Geocoder + Sync,
{
    async fn reverse_geocode(&self, coords: Coordinates) -> Result<RawAddress, GeocodeError> {
        match self.primary.reverse_geocode(coords).await {
            Ok(raw) if raw.normalize().is_some() => return Ok(raw),
            Ok(_) => debug!("Primary geocoder returned an empty address, trying secondary"),
            Err(e) => debug!(error = %e, "Primary geocoder failed, trying secondary"),
        }

        self.secondary.reverse_geocode(coords).await
    }
}
