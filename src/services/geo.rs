//! Geolocation enrichment
//!
//! One bulk endpoint returns a GeoJSON-like feature collection; the
//! pipeline turns it into an address-keyed lookup map. Enrichment is
//! best-effort: any failure degrades to an empty map.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::GeoError;
use crate::models::GeoInfo;

#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Fetch the full geolocation feed, keyed by gateway address.
    async fn lookup_all(&self) -> Result<HashMap<String, GeoInfo>, GeoError>;
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: FeatureProperties,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize)]
struct FeatureProperties {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    isp: Option<String>,
    #[serde(default)]
    org: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// GeoJSON order: `[lon, lat]`.
    #[serde(default)]
    coordinates: Vec<f64>,
}

pub struct HttpGeoProvider {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpGeoProvider {
    /// `endpoint = None` disables enrichment entirely.
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl GeoProvider for HttpGeoProvider {
    async fn lookup_all(&self) -> Result<HashMap<String, GeoInfo>, GeoError> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(HashMap::new());
        };

        let collection = self
            .http
            .get(endpoint)
            .send()
            .await?
            .error_for_status()?
            .json::<FeatureCollection>()
            .await
            .map_err(|_| GeoError::MalformedBody)?;

        Ok(build_lookup(collection))
    }
}

fn build_lookup(collection: FeatureCollection) -> HashMap<String, GeoInfo> {
    let mut lookup = HashMap::with_capacity(collection.features.len());
    for feature in collection.features {
        let Some(address) = feature.properties.address.clone().filter(|a| !a.is_empty()) else {
            continue;
        };
        let (lon, lat) = match feature.geometry.as_ref().map(|g| g.coordinates.as_slice()) {
            Some([lon, lat, ..]) => (Some(*lon), Some(*lat)),
            _ => (None, None),
        };
        let props = feature.properties;
        lookup.insert(
            address,
            GeoInfo {
                ip: props.ip.unwrap_or_default(),
                country: props.country.unwrap_or_default(),
                region: props.region.unwrap_or_default(),
                city: props.city.unwrap_or_default(),
                isp: props.isp.unwrap_or_default(),
                org: props.org.unwrap_or_default(),
                lat,
                lon,
            },
        );
    }
    lookup
}
