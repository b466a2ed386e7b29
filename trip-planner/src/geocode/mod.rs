//! Reverse geocoding of the device location.
//!
//! Geocoding is best-effort: it never blocks or fails a trip mutation.
//! Providers return a [`RawAddress`] in whatever shape they have, and
//! [`normalize_address`] reduces it to one line. Providers compose:
//! [`FallbackGeocoder`] chains a primary and a secondary, and
//! [`CachedGeocoder`] sits in front of either.

mod address;
mod cache;
mod client;
mod error;
mod fallback;
mod lookup;

pub use address::{AddressComponent, RawAddress, normalize_address};
pub use cache::{CachedGeocoder, GeocodeCacheConfig};
pub use client::{Geocoder, GeocoderConfig, GoogleGeocoder, lookup_address};
pub use error::GeocodeError;
pub use fallback::FallbackGeocoder;
pub use lookup::{AddressLookup, DEFAULT_LOOKUP_TIMEOUT};
