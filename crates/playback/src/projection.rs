//! Geographic to overlay-pixel projection.
//!
//! Pixel coordinates are "layer points": world pixels at the current zoom,
//! shifted by the viewport's pixel origin. The core never talks to a map
//! library directly; it only ever sees a [`ProjectionState`] obtained through
//! a [`ViewportProvider`].

use foundation::math::{LonLat, Vec2, lonlat_to_world_px, world_px_to_lonlat};

/// Everything needed to map a coordinate to overlay pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProjectionState {
    pub zoom: f64,
    /// World pixel that maps to layer point `(0, 0)`.
    pub pixel_origin: Vec2,
}

impl ProjectionState {
    pub fn new(zoom: f64, pixel_origin: Vec2) -> Self {
        Self { zoom, pixel_origin }
    }

    pub fn is_valid(&self) -> bool {
        self.zoom.is_finite() && self.pixel_origin.is_finite()
    }

    pub fn project(&self, coord: LonLat) -> Vec2 {
        project(coord, self)
    }
}

/// Projects `coord` with `state`. Pure: no caching, no failure mode;
/// coordinates outside the view simply land outside it.
pub fn project(coord: LonLat, state: &ProjectionState) -> Vec2 {
    lonlat_to_world_px(coord, state.zoom) - state.pixel_origin
}

/// Read-only access to the map's current view.
pub trait ViewportProvider {
    /// `None` when the map cannot currently provide a projection.
    fn current_projection_state(&self) -> Option<ProjectionState>;
}

/// Why a viewport sync was requested.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ViewportChange {
    MapReady,
    PanEnd,
    ZoomEnd,
    Reset,
}

/// A plain slippy-map view: center, zoom and container size in pixels.
///
/// Shells that drive a real map library implement [`ViewportProvider`]
/// themselves; this one backs the headless replay and the tests.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub center: LonLat,
    pub zoom: f64,
    pub size: Vec2,
}

impl Viewport {
    pub fn new(center: LonLat, zoom: f64, size: Vec2) -> Self {
        Self { center, zoom, size }
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    /// Moves the view by a screen-space delta.
    pub fn pan_by(&mut self, delta: Vec2) {
        let center_px = lonlat_to_world_px(self.center, self.zoom) + delta;
        self.center = world_px_to_lonlat(center_px, self.zoom);
    }

    /// World pixel at the container's top-left corner, rounded to whole
    /// pixels so paths stay crisp.
    pub fn pixel_origin(&self) -> Vec2 {
        (lonlat_to_world_px(self.center, self.zoom) - self.size * 0.5).round()
    }
}

impl ViewportProvider for Viewport {
    fn current_projection_state(&self) -> Option<ProjectionState> {
        let state = ProjectionState::new(self.zoom, self.pixel_origin());
        state.is_valid().then_some(state)
    }
}
