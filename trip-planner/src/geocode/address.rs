//! Raw geocoder results and their normalization to a single address line.

use serde::Deserialize;

/// Component types used to assemble an address, in output order.
const COMPONENT_ORDER: [&str; 4] = [
    "street_number",
    "route",
    "locality",
    "administrative_area_level_1",
];

/// One entry of a structured address breakdown.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl AddressComponent {
    pub fn new(long_name: impl Into<String>, types: &[&str]) -> Self {
        let long_name = long_name.into();
        Self {
            short_name: long_name.clone(),
            long_name,
            types: types.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    fn has_type(&self, kind: &str) -> bool {
        self.types.iter().any(|t| t == kind)
    }
}

/// A reverse-geocoding result as a provider returns it.
///
/// Providers fill in different shapes: a full formatted address, a
/// name/region pair (device geocoders), or only a component breakdown.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawAddress {
    pub formatted_address: Option<String>,
    pub name: Option<String>,
    pub region: Option<String>,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
}

impl RawAddress {
    pub fn formatted(address: impl Into<String>) -> Self {
        Self {
            formatted_address: Some(address.into()),
            ..Self::default()
        }
    }

    pub fn named(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            region: Some(region.into()),
            ..Self::default()
        }
    }

    pub fn from_components(components: Vec<AddressComponent>) -> Self {
        Self {
            address_components: components,
            ..Self::default()
        }
    }

    /// Normalize to one address line. See [`normalize_address`].
    pub fn normalize(&self) -> Option<String> {
        normalize_address(self)
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Turn a raw result into a single address string.
///
/// Priority: the formatted address; then `"name, region"` when both are
/// present; then street number, route, locality and first-level
/// administrative area joined by `", "`. Blank fields count as absent.
/// Returns `None` if nothing usable is left.
pub fn normalize_address(raw: &RawAddress) -> Option<String> {
    if let Some(formatted) = non_blank(raw.formatted_address.as_ref()) {
        return Some(formatted.to_string());
    }

    if let (Some(name), Some(region)) = (non_blank(raw.name.as_ref()), non_blank(raw.region.as_ref())) {
        return Some(format!("{name}, {region}"));
    }

    let parts: Vec<&str> = COMPONENT_ORDER
        .iter()
        .filter_map(|kind| {
            raw.address_components
                .iter()
                .find(|c| c.has_type(kind))
                .map(|c| c.long_name.trim())
                .filter(|s| !s.is_empty())
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
