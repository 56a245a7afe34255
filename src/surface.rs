//! Map surface: owns the viewport and the displayed marker set.
//!
//! The drawing back end is abstracted behind [`MarkerLayer`]. The surface
//! never diffs: every update removes all displayed markers and adds the new
//! set.

use serde::Serialize;
use tracing::debug;

use crate::presenter::MarkerDescriptor;

/// Initial map center latitude.
pub const INITIAL_LATITUDE: f64 = 20.0;

/// Initial map center longitude.
pub const INITIAL_LONGITUDE: f64 = 0.0;

/// Initial zoom level.
pub const INITIAL_ZOOM: u8 = 2;

/// Base tile layer.
pub const TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const TILE_ATTRIBUTION: &str = "&copy; OpenStreetMap contributors";
pub const TILE_MAX_ZOOM: u8 = 18;

/// Fixed view the map opens with, plus its base tiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center: (f64, f64),
    pub zoom: u8,
    pub tile_url: &'static str,
    pub tile_attribution: &'static str,
    pub max_zoom: u8,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: (INITIAL_LATITUDE, INITIAL_LONGITUDE),
            zoom: INITIAL_ZOOM,
            tile_url: TILE_URL,
            tile_attribution: TILE_ATTRIBUTION,
            max_zoom: TILE_MAX_ZOOM,
        }
    }
}

/// Handle for a marker placed on a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MarkerId(pub u64);

/// A drawing back end for circle markers.
pub trait MarkerLayer {
    /// Draw a marker with its popup bound to click.
    fn add_marker(&mut self, marker: MarkerDescriptor) -> MarkerId;

    /// Remove a previously added marker.
    fn remove_marker(&mut self, id: MarkerId);

    /// Release the layer and the viewport behind it. Called exactly once.
    fn release(&mut self) {}
}

/// Owner of the viewport and every marker currently drawn on it.
pub struct MapSurface<L: MarkerLayer> {
    viewport: Viewport,
    layer: Option<L>,
    displayed: Vec<MarkerId>,
}

impl<L: MarkerLayer> MapSurface<L> {
    /// Acquire the viewport on `layer` at the fixed initial view.
    pub fn new(layer: L) -> Self {
        debug!(
            "map viewport created at ({}, {}) zoom {}",
            INITIAL_LATITUDE, INITIAL_LONGITUDE, INITIAL_ZOOM
        );
        Self {
            viewport: Viewport::default(),
            layer: Some(layer),
            displayed: Vec::new(),
        }
    }

    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// The drawing layer, or `None` after teardown.
    #[must_use]
    pub fn layer(&self) -> Option<&L> {
        self.layer.as_ref()
    }

    /// Number of markers currently drawn.
    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.displayed.len()
    }

    /// Remove every displayed marker, then add `markers`. A torn-down
    /// surface ignores the call.
    pub fn replace_markers(&mut self, markers: Vec<MarkerDescriptor>) {
        let Some(layer) = self.layer.as_mut() else {
            debug!("replace_markers on a torn-down surface ignored");
            return;
        };

        let removed = self.displayed.len();
        for id in self.displayed.drain(..) {
            layer.remove_marker(id);
        }

        self.displayed.reserve(markers.len());
        for marker in markers {
            self.displayed.push(layer.add_marker(marker));
        }

        debug!("markers replaced: {} removed, {} added", removed, self.displayed.len());
    }

    /// Remove all markers and release the layer. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(mut layer) = self.layer.take() {
            for id in self.displayed.drain(..) {
                layer.remove_marker(id);
            }
            layer.release();
            debug!("map viewport released");
        }
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.layer.is_none()
    }
}

impl<L: MarkerLayer> Drop for MapSurface<L> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// A layer that keeps the drawn markers in memory, in insertion order.
///
/// The web server publishes its contents to browsers; the `show` command
/// prints them.
#[derive(Debug, Default)]
pub struct SceneLayer {
    markers: Vec<(MarkerId, MarkerDescriptor)>,
    next_id: u64,
}

impl SceneLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Markers currently drawn, in the order they were added.
    pub fn markers(&self) -> impl Iterator<Item = &MarkerDescriptor> {
        self.markers.iter().map(|(_, m)| m)
    }
}

impl MarkerLayer for SceneLayer {
    fn add_marker(&mut self, marker: MarkerDescriptor) -> MarkerId {
        let id = MarkerId(self.next_id);
        self.next_id += 1;
        self.markers.push((id, marker));
        id
    }

    fn remove_marker(&mut self, id: MarkerId) {
        self.markers.retain(|(existing, _)| *existing != id);
    }

    fn release(&mut self) {
        self.markers.clear();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{LayerOp, RecordingLayer};
    use super::*;
    use crate::models::fixtures::quakes;
    use crate::presenter::MarkerPresenter;

    fn markers(magnitudes: &[Option<f64>]) -> Vec<MarkerDescriptor> {
        MarkerPresenter::utc().present(&quakes(magnitudes))
    }

    #[test]
    fn test_initial_view() {
        let surface = MapSurface::new(SceneLayer::new());
        let viewport = surface.viewport();
        assert_eq!(viewport.center, (20.0, 0.0));
        assert_eq!(viewport.zoom, 2);
        assert_eq!(viewport.max_zoom, 18);
    }

    #[test]
    fn test_replace_removes_all_before_adding() {
        let layer = RecordingLayer::default();
        let journal = layer.clone();
        let mut surface = MapSurface::new(layer);

        surface.replace_markers(markers(&[Some(1.0), Some(2.0)]));
        journal.clear();
        surface.replace_markers(markers(&[Some(3.0)]));

        assert_eq!(
            journal.journal(),
            vec![
                LayerOp::Remove(MarkerId(0)),
                LayerOp::Remove(MarkerId(1)),
                LayerOp::Add(MarkerId(2), Some("ev0".into())),
            ]
        );
        assert_eq!(surface.marker_count(), 1);
    }

    #[test]
    fn test_replace_with_empty_clears() {
        let mut surface = MapSurface::new(SceneLayer::new());
        surface.replace_markers(markers(&[Some(1.0), Some(5.0)]));
        assert_eq!(surface.layer().unwrap().markers().count(), 2);

        surface.replace_markers(Vec::new());

        assert_eq!(surface.marker_count(), 0);
        assert_eq!(surface.layer().unwrap().markers().count(), 0);
    }

    #[test]
    fn test_scene_layer_keeps_order() {
        let mut surface = MapSurface::new(SceneLayer::new());
        surface.replace_markers(markers(&[Some(6.0), Some(1.0), Some(3.0)]));

        let ids: Vec<_> = surface
            .layer()
            .unwrap()
            .markers()
            .map(|m| m.event_id.clone().unwrap())
            .collect();
        assert_eq!(ids, ["ev0", "ev1", "ev2"]);
    }

    #[test]
    fn test_teardown_releases_exactly_once() {
        let layer = RecordingLayer::default();
        let journal = layer.clone();
        let mut surface = MapSurface::new(layer);
        surface.replace_markers(markers(&[Some(4.0)]));

        surface.teardown();
        surface.teardown();
        surface.replace_markers(markers(&[Some(5.0)]));
        drop(surface);

        let ops = journal.journal();
        let releases = ops.iter().filter(|op| **op == LayerOp::Release).count();
        assert_eq!(releases, 1);
        assert_eq!(
            ops,
            vec![
                LayerOp::Add(MarkerId(0), Some("ev0".into())),
                LayerOp::Remove(MarkerId(0)),
                LayerOp::Release,
            ]
        );
    }

    #[test]
    fn test_drop_releases() {
        let layer = RecordingLayer::default();
        let journal = layer.clone();
        drop(MapSurface::new(layer));
        assert_eq!(journal.journal(), vec![LayerOp::Release]);
    }
}
