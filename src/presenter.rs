//! Marker presentation: turns filtered events into map marker descriptors.
//!
//! Color and size follow fixed magnitude bands:
//!
//! | Magnitude   | Severity | Fill      |
//! |-------------|----------|-----------|
//! | >= 6.0      | Strong   | `#dc2626` |
//! | >= 4.5      | Moderate | `#f59e0b` |
//! | >= 2.5      | Light    | `#fbbf24` |
//! | below 2.5   | Minor    | `#10b981` |

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use serde::Serialize;

use crate::models::QuakeEvent;

/// Smallest radius a marker is ever drawn with.
pub const MIN_RADIUS: f64 = 4.0;

/// Pixels of radius per unit of magnitude.
const RADIUS_PER_MAGNITUDE: f64 = 2.0;

/// Magnitude band of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Light,
    Moderate,
    Strong,
}

impl Severity {
    /// Bands in legend order, weakest first.
    pub const ALL: [Self; 4] = [Self::Minor, Self::Light, Self::Moderate, Self::Strong];

    /// Classify a magnitude. Lower bounds are inclusive; anything that is not
    /// at least 2.5 (NaN included) is minor.
    #[must_use]
    pub fn from_magnitude(magnitude: f64) -> Self {
        match magnitude {
            m if m >= 6.0 => Self::Strong,
            m if m >= 4.5 => Self::Moderate,
            m if m >= 2.5 => Self::Light,
            _ => Self::Minor,
        }
    }

    #[must_use]
    pub const fn fill_color(self) -> &'static str {
        match self {
            Self::Strong => "#dc2626",
            Self::Moderate => "#f59e0b",
            Self::Light => "#fbbf24",
            Self::Minor => "#10b981",
        }
    }

    #[must_use]
    pub const fn legend_label(self) -> &'static str {
        match self {
            Self::Strong => "6.0+ Strong",
            Self::Moderate => "4.5 - 6.0 Moderate",
            Self::Light => "2.5 - 4.5 Light",
            Self::Minor => "< 2.5 Minor",
        }
    }
}

/// Marker radius for a magnitude; never below [`MIN_RADIUS`].
#[must_use]
pub fn marker_radius(magnitude: f64) -> f64 {
    (magnitude * RADIUS_PER_MAGNITUDE).max(MIN_RADIUS)
}

/// Stroke and opacity shared by every circle marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerStyle {
    pub stroke_color: &'static str,
    pub weight: u8,
    pub opacity: f64,
    pub fill_opacity: f64,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            stroke_color: "#fff",
            weight: 1,
            opacity: 0.8,
            fill_opacity: 0.6,
        }
    }
}

/// Popup content for one marker, already formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Popup {
    pub title: String,
    pub location: String,
    pub time: String,
    pub depth: String,
    pub coordinates: String,
}

impl Popup {
    /// Render as an HTML fragment. Feed-provided text is escaped.
    #[must_use]
    pub fn to_html(&self) -> String {
        format!(
            r#"<div class="popup">
  <h3>{title}</h3>
  <p><strong>Location:</strong> {location}</p>
  <p><strong>Time:</strong> {time}</p>
  <p><strong>Depth:</strong> {depth}</p>
  <p><strong>Coordinates:</strong> {coordinates}</p>
</div>"#,
            title = escape_html(&self.title),
            location = escape_html(&self.location),
            time = escape_html(&self.time),
            depth = escape_html(&self.depth),
            coordinates = escape_html(&self.coordinates),
        )
    }

    /// Render as a single line of plain text.
    #[must_use]
    pub fn to_text(&self) -> String {
        format!(
            "{} │ {} │ {} │ depth {} │ {}",
            self.title, self.location, self.time, self.depth, self.coordinates
        )
    }
}

/// Escape text for use in HTML content and attribute values.
pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Everything a map needs to draw one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerDescriptor {
    pub event_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: f64,
    pub severity: Severity,
    pub fill_color: &'static str,
    pub radius: f64,
    pub style: MarkerStyle,
    pub popup: Popup,
}

/// Converts events to marker descriptors, formatting times in a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct MarkerPresenter {
    offset: FixedOffset,
}

impl MarkerPresenter {
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Format times in UTC.
    #[must_use]
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Format times in the machine's current local offset.
    #[must_use]
    pub fn local() -> Self {
        Self::new(Local::now().offset().fix())
    }

    /// Describe a single event. Returns `None` when the event has no
    /// magnitude or lacks either coordinate.
    #[must_use]
    pub fn describe(&self, event: &QuakeEvent) -> Option<MarkerDescriptor> {
        let magnitude = event.magnitude?;
        let (latitude, longitude) = event.position()?;
        let severity = Severity::from_magnitude(magnitude);

        Some(MarkerDescriptor {
            event_id: event.id.clone(),
            latitude,
            longitude,
            magnitude,
            severity,
            fill_color: severity.fill_color(),
            radius: marker_radius(magnitude),
            style: MarkerStyle::default(),
            popup: Popup {
                title: format!("Magnitude {magnitude}"),
                location: event
                    .place
                    .clone()
                    .unwrap_or_else(|| "Unknown location".into()),
                time: event
                    .time()
                    .map(|t| self.format_time(t))
                    .unwrap_or_else(|| "Unknown".into()),
                depth: event
                    .depth_km
                    .map(|d| format!("{d:.1} km"))
                    .unwrap_or_else(|| "N/A".into()),
                coordinates: format!("{latitude:.3}°, {longitude:.3}°"),
            },
        })
    }

    /// Describe every event that can be placed on the map, preserving order.
    #[must_use]
    pub fn present<'a, I>(&self, events: I) -> Vec<MarkerDescriptor>
    where
        I: IntoIterator<Item = &'a QuakeEvent>,
    {
        events.into_iter().filter_map(|e| self.describe(e)).collect()
    }

    fn format_time(&self, time: DateTime<Utc>) -> String {
        time.with_timezone(&self.offset)
            .format("%b %-d, %Y, %-I:%M:%S %p (UTC%:z)")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::quake;

    #[test]
    fn test_color_boundaries_inclusive() {
        let cases = [
            (0.0, "#10b981"),
            (2.49, "#10b981"),
            (2.5, "#fbbf24"),
            (4.49, "#fbbf24"),
            (4.5, "#f59e0b"),
            (5.99, "#f59e0b"),
            (6.0, "#dc2626"),
            (9.5, "#dc2626"),
        ];
        for (magnitude, color) in cases {
            assert_eq!(
                Severity::from_magnitude(magnitude).fill_color(),
                color,
                "magnitude {magnitude}"
            );
        }
    }

    #[test]
    fn test_color_has_no_gaps() {
        // Walk 0.00..=10.00 in hundredths; every value maps to exactly the
        // band whose lower bound it last crossed.
        for hundredths in 0..=1000 {
            let m = f64::from(hundredths) / 100.0;
            let expected = if m >= 6.0 {
                Severity::Strong
            } else if m >= 4.5 {
                Severity::Moderate
            } else if m >= 2.5 {
                Severity::Light
            } else {
                Severity::Minor
            };
            assert_eq!(Severity::from_magnitude(m), expected, "magnitude {m}");
        }
    }

    #[test]
    fn test_radius_floor() {
        assert!((marker_radius(0.0) - MIN_RADIUS).abs() < f64::EPSILON);
        assert!((marker_radius(-3.0) - MIN_RADIUS).abs() < f64::EPSILON);
        assert!((marker_radius(1.9) - MIN_RADIUS).abs() < f64::EPSILON);
        assert!((marker_radius(2.0) - 4.0).abs() < f64::EPSILON);
        assert!((marker_radius(6.5) - 13.0).abs() < f64::EPSILON);
        assert!(marker_radius(f64::NAN) >= MIN_RADIUS);
    }

    #[test]
    fn test_describe_popup() {
        let mut event = quake("us1", Some(4.5));
        event.latitude = Some(-23.66424);
        event.longitude = Some(178.98115);
        event.depth_km = Some(563.04);
        event.place = Some("South of the Fiji Islands".into());
        event.time_ms = Some(0);

        let marker = MarkerPresenter::utc().describe(&event).unwrap();

        assert_eq!(marker.fill_color, "#f59e0b");
        assert!((marker.radius - 9.0).abs() < f64::EPSILON);
        assert_eq!(marker.popup.title, "Magnitude 4.5");
        assert_eq!(marker.popup.location, "South of the Fiji Islands");
        assert_eq!(marker.popup.time, "Jan 1, 1970, 12:00:00 AM (UTC+00:00)");
        assert_eq!(marker.popup.depth, "563.0 km");
        assert_eq!(marker.popup.coordinates, "-23.664°, 178.981°");
    }

    #[test]
    fn test_time_uses_presenter_offset() {
        let mut event = quake("x", Some(3.0));
        event.time_ms = Some(0);
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();

        let marker = MarkerPresenter::new(offset).describe(&event).unwrap();

        assert_eq!(marker.popup.time, "Jan 1, 1970, 9:00:00 AM (UTC+09:00)");
    }

    #[test]
    fn test_missing_depth_is_na() {
        let mut event = quake("x", Some(3.0));
        event.depth_km = None;
        let marker = MarkerPresenter::utc().describe(&event).unwrap();
        assert_eq!(marker.popup.depth, "N/A");
    }

    #[test]
    fn test_events_without_position_are_skipped() {
        let mut no_lat = quake("a", Some(5.0));
        no_lat.latitude = None;
        let mut no_lng = quake("b", Some(5.0));
        no_lng.longitude = None;
        let ok = quake("c", Some(5.0));

        let markers = MarkerPresenter::utc().present([&no_lat, &no_lng, &ok]);

        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].event_id.as_deref(), Some("c"));
    }

    #[test]
    fn test_popup_html_escapes_feed_text() {
        let mut event = quake("x", Some(3.0));
        event.place = Some("<script>alert('x')</script> & co".into());

        let html = MarkerPresenter::utc().describe(&event).unwrap().popup.to_html();

        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; co"));
        assert!(!html.contains("<script>"));
    }
}
