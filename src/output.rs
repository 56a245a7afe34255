//! Output formatters for the `show` command.
//!
//! Supports human-readable (with colors), JSON, NDJSON and GeoJSON formats.

use std::io::{self, Write};

use serde_json::json;

use crate::controller::{MarkerView, ViewSnapshot};
use crate::presenter::Severity;

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

// Closest terminal colors to the marker fills
const RED: &str = "\x1b[91m";
const ORANGE: &str = "\x1b[38;5;208m";
const YELLOW: &str = "\x1b[93m";
const GREEN: &str = "\x1b[92m";

const ICON_QUAKE: &str = "🌍";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// Full view snapshot as pretty JSON
    Json,
    /// Newline-delimited JSON (one marker per line)
    Ndjson,
    /// GeoJSON `FeatureCollection` of the markers
    GeoJson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            "geojson" => Ok(Self::GeoJson),
            _ => Err(format!(
                "unknown format: {s} (expected: human, json, ndjson, geojson)"
            )),
        }
    }
}

/// Terminal color for a severity band.
const fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Strong => RED,
        Severity::Moderate => ORANGE,
        Severity::Light => YELLOW,
        Severity::Minor => GREEN,
    }
}

/// Write the view in human-readable format: a header with statistics, one
/// line per marker, the legend, and the event count footer.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(writer: &mut W, view: &ViewSnapshot) -> io::Result<()> {
    writeln!(
        writer,
        "{BOLD}{ICON_QUAKE} Earthquakes, {}{RESET} {DIM}(min magnitude {}){RESET}",
        view.window_label, view.threshold
    )?;

    if let Some(error) = &view.error {
        writeln!(writer, "{RED}Error loading data:{RESET} {error}")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{DIM}Total events: {} │ Avg magnitude: {} │ Max magnitude: {}{RESET}",
        view.filtered_count, view.stats.avg, view.stats.max
    )?;

    for marker in &view.markers {
        let m = &marker.marker;
        let color = severity_color(m.severity);
        writeln!(
            writer,
            "{color}{BOLD}●{RESET} {color}M{:<4.1}{RESET} {DIM}r{:>4.1}{RESET} │ {}",
            m.magnitude,
            m.radius,
            m.popup.to_text()
        )?;
    }

    let legend: Vec<String> = Severity::ALL
        .iter()
        .map(|s| format!("{}●{RESET} {}", severity_color(*s), s.legend_label()))
        .collect();
    writeln!(writer, "{}", legend.join("  "))?;

    writeln!(
        writer,
        "{DIM}Showing {} of {} events{RESET}",
        view.filtered_count, view.total_count
    )
}

/// Write the whole snapshot as a JSON object.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, view: &ViewSnapshot) -> io::Result<()> {
    let json = serde_json::to_string_pretty(view)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write markers as newline-delimited JSON.
///
/// Each marker is written as a single line of JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(writer: &mut W, view: &ViewSnapshot) -> io::Result<()> {
    for marker in &view.markers {
        let json = serde_json::to_string(&marker.marker)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}

fn geojson_feature(marker: &MarkerView) -> serde_json::Value {
    let m = &marker.marker;
    json!({
        "type": "Feature",
        "id": m.event_id,
        "geometry": {
            "type": "Point",
            "coordinates": [m.longitude, m.latitude],
        },
        "properties": {
            "mag": m.magnitude,
            "severity": m.severity,
            "marker-color": m.fill_color,
            "radius": m.radius,
            "popup": m.popup,
        },
    })
}

/// Write markers as a GeoJSON `FeatureCollection`.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_geojson<W: Write>(writer: &mut W, view: &ViewSnapshot) -> io::Result<()> {
    let collection = json!({
        "type": "FeatureCollection",
        "features": view.markers.iter().map(geojson_feature).collect::<Vec<_>>(),
    });
    let json = serde_json::to_string_pretty(&collection)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write the view in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_view<W: Write>(writer: &mut W, view: &ViewSnapshot, format: Format) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, view),
        Format::Json => write_json(writer, view),
        Format::Ndjson => write_ndjson(writer, view),
        Format::GeoJson => write_geojson(writer, view),
    }
}
