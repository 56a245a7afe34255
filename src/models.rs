//! Data models for USGS earthquake feeds.
//!
//! The raw structures mirror the GeoJSON summary format but are deliberately
//! lenient: every field is optional, and a feature that still fails to
//! deserialize is skipped instead of failing the whole feed.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Top-level GeoJSON document. Features are kept as raw values so one bad
/// record cannot poison the rest.
#[derive(Debug, Default, Deserialize)]
struct FeedDocument {
    #[serde(default)]
    features: Option<Vec<serde_json::Value>>,
}

/// A single feature as it appears on the wire.
#[derive(Debug, Default, Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    geometry: Option<RawGeometry>,

    #[serde(default)]
    properties: RawProperties,
}

/// Point geometry: `[longitude, latitude, depth_km]`.
#[derive(Debug, Default, Deserialize)]
struct RawGeometry {
    #[serde(default)]
    coordinates: Vec<Option<f64>>,
}

/// The subset of USGS properties the map uses.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProperties {
    mag: Option<f64>,

    #[serde(rename = "magType")]
    mag_type: Option<String>,

    place: Option<String>,

    /// Event time (ms since epoch)
    time: Option<i64>,

    /// Event page URL
    url: Option<String>,
}

/// One seismic observation, normalized from the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuakeEvent {
    /// USGS event id, when the feed provides one
    pub id: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    /// Depth in kilometers (positive down)
    pub depth_km: Option<f64>,
    /// Magnitude; `None` means unknown, not zero
    pub magnitude: Option<f64>,
    pub magnitude_type: Option<String>,
    pub place: Option<String>,
    /// Occurrence time (ms since epoch)
    pub time_ms: Option<i64>,
    pub url: Option<String>,
}

impl QuakeEvent {
    /// Occurrence time as a `DateTime<Utc>`.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    /// Both coordinates, or `None` if either is missing.
    #[must_use]
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

impl From<RawFeature> for QuakeEvent {
    fn from(raw: RawFeature) -> Self {
        let coords = raw.geometry.map(|g| g.coordinates).unwrap_or_default();
        let coord = |i: usize| coords.get(i).copied().flatten();

        Self {
            id: raw.id,
            longitude: coord(0),
            latitude: coord(1),
            depth_km: coord(2),
            magnitude: raw.properties.mag,
            magnitude_type: raw.properties.mag_type,
            place: raw.properties.place,
            time_ms: raw.properties.time,
            url: raw.properties.url,
        }
    }
}

/// Parse a feed body into events.
///
/// A body that is not a JSON object, or has no `features` array, yields an
/// empty list. Features that fail to deserialize are dropped individually.
#[must_use]
pub fn parse_feed(body: &str) -> Vec<QuakeEvent> {
    let doc: FeedDocument = match serde_json::from_str(body) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("feed body is not a usable GeoJSON document: {}", e);
            return Vec::new();
        }
    };

    let features = doc.features.unwrap_or_default();
    let total = features.len();

    let events: Vec<QuakeEvent> = features
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<RawFeature>(value) {
            Ok(raw) => Some(QuakeEvent::from(raw)),
            Err(e) => {
                debug!("skipping malformed feature #{}: {}", index, e);
                None
            }
        })
        .collect();

    if events.len() < total {
        debug!("kept {} of {} features", events.len(), total);
    }
    events
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::QuakeEvent;

    /// A fully-populated event with the given magnitude.
    pub fn quake(id: &str, magnitude: Option<f64>) -> QuakeEvent {
        QuakeEvent {
            id: Some(id.to_string()),
            longitude: Some(-122.41),
            latitude: Some(37.77),
            depth_km: Some(8.25),
            magnitude,
            magnitude_type: Some("ml".into()),
            place: Some(format!("near {id}")),
            time_ms: Some(1_700_000_000_000),
            url: None,
        }
    }

    pub fn quakes(magnitudes: &[Option<f64>]) -> Vec<QuakeEvent> {
        magnitudes
            .iter()
            .enumerate()
            .map(|(i, m)| quake(&format!("ev{i}"), *m))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_feed() {
        let json = include_str!("../tools/sample_feed.json");
        let events = parse_feed(json);

        // The fixture holds five features, one of which has a non-object
        // properties member and must be dropped.
        assert_eq!(events.len(), 4);

        let first = &events[0];
        assert_eq!(first.id.as_deref(), Some("nc75095651"));
        assert_eq!(first.magnitude, Some(2.7));
        assert_eq!(first.position(), Some((38.8215, -122.8076667)));
        assert_eq!(first.depth_km, Some(1.93));
        assert_eq!(first.place.as_deref(), Some("5 km NW of The Geysers, CA"));
        assert!(first.time().is_some());
    }

    #[test]
    fn test_missing_magnitude_is_none_not_zero() {
        let events = parse_feed(include_str!("../tools/sample_feed.json"));
        let unknown = events
            .iter()
            .find(|e| e.id.as_deref() == Some("ak0253ad9y1c"))
            .unwrap();
        assert_eq!(unknown.magnitude, None);
    }

    #[test]
    fn test_missing_coordinates_are_tolerated() {
        let events = parse_feed(include_str!("../tools/sample_feed.json"));
        let partial = events
            .iter()
            .find(|e| e.id.as_deref() == Some("us7000nodepth"))
            .unwrap();
        assert_eq!(partial.depth_km, None);
        assert_eq!(partial.latitude, None);
        assert_eq!(partial.position(), None);
    }

    #[test]
    fn test_absent_features_yield_empty() {
        assert!(parse_feed(r#"{"type":"FeatureCollection"}"#).is_empty());
        assert!(parse_feed(r#"{"features":null}"#).is_empty());
    }

    #[test]
    fn test_malformed_body_yields_empty() {
        assert!(parse_feed("<html>oops</html>").is_empty());
        assert!(parse_feed("").is_empty());
    }
}
