use std::collections::BTreeMap;

use foundation::math::Vec2;

use crate::trip::{TripId, TripState};

/// Stroke-dash styling of one trace: a visible dash of `trace_length`
/// followed by a gap as long as the whole path, shifted by `dash_offset`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DashStyle {
    pub dash_array: [f64; 2],
    pub dash_offset: f64,
}

/// The drawing surface the engine renders into.
///
/// The surface owns its own lifecycle (DOM node, canvas, texture); the engine
/// only issues geometry, placement and per-path dash styling.
pub trait OverlaySurface {
    fn resize(&mut self, width: f64, height: f64);
    fn position(&mut self, x: f64, y: f64);
    fn set_local_transform(&mut self, dx: f64, dy: f64);

    /// Creates or replaces the path geometry for `trip`.
    fn draw_path(&mut self, trip: TripId, points: &[Vec2]);
    fn set_dash(&mut self, trip: TripId, dash: DashStyle);
    fn set_class(&mut self, trip: TripId, state: TripState);
    fn remove_path(&mut self, trip: TripId);
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPath {
    pub points: Vec<Vec2>,
    pub dash: Option<DashStyle>,
    pub class: &'static str,
}

/// Records the latest state the engine pushed, for headless runs and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryOverlay {
    pub size: Vec2,
    pub origin: Vec2,
    pub local_transform: Vec2,
    paths: BTreeMap<TripId, OverlayPath>,
    // Class each removed path carried when it was taken down.
    retired: BTreeMap<TripId, &'static str>,
    placements: u64,
}

impl MemoryOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self, trip: TripId) -> Option<&OverlayPath> {
        self.paths.get(&trip)
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn trip_ids(&self) -> Vec<TripId> {
        self.paths.keys().copied().collect()
    }

    /// Class of a path at the moment it was removed.
    pub fn retired_class(&self, trip: TripId) -> Option<&'static str> {
        self.retired.get(&trip).copied()
    }

    /// How many times the surface has been resized.
    pub fn placements(&self) -> u64 {
        self.placements
    }
}

impl OverlaySurface for MemoryOverlay {
    fn resize(&mut self, width: f64, height: f64) {
        self.size = Vec2::new(width, height);
        self.placements += 1;
    }

    fn position(&mut self, x: f64, y: f64) {
        self.origin = Vec2::new(x, y);
    }

    fn set_local_transform(&mut self, dx: f64, dy: f64) {
        self.local_transform = Vec2::new(dx, dy);
    }

    fn draw_path(&mut self, trip: TripId, points: &[Vec2]) {
        let entry = self.paths.entry(trip).or_insert_with(|| OverlayPath {
            points: Vec::new(),
            dash: None,
            class: TripState::NotStarted.css_class(),
        });
        entry.points = points.to_vec();
    }

    fn set_dash(&mut self, trip: TripId, dash: DashStyle) {
        if let Some(path) = self.paths.get_mut(&trip) {
            path.dash = Some(dash);
        }
    }

    fn set_class(&mut self, trip: TripId, state: TripState) {
        if let Some(path) = self.paths.get_mut(&trip) {
            path.class = state.css_class();
        }
    }

    fn remove_path(&mut self, trip: TripId) {
        if let Some(path) = self.paths.remove(&trip) {
            self.retired.insert(trip, path.class);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DashStyle, MemoryOverlay, OverlaySurface};
    use crate::trip::{TripId, TripState};
    use foundation::math::Vec2;

    #[test]
    fn styling_requires_a_drawn_path() {
        let mut overlay = MemoryOverlay::new();
        let dash = DashStyle {
            dash_array: [20.0, 100.0],
            dash_offset: 20.0,
        };
        overlay.set_dash(TripId(1), dash);
        assert!(overlay.path(TripId(1)).is_none());

        overlay.draw_path(TripId(1), &[Vec2::ZERO, Vec2::new(1.0, 1.0)]);
        overlay.set_dash(TripId(1), dash);
        overlay.set_class(TripId(1), TripState::Running);
        let path = overlay.path(TripId(1)).expect("drawn");
        assert_eq!(path.dash, Some(dash));
        assert_eq!(path.class, "trip_running");

        overlay.draw_path(TripId(1), &[Vec2::ZERO]);
        assert_eq!(overlay.path(TripId(1)).expect("redrawn").dash, Some(dash));

        overlay.remove_path(TripId(1));
        assert_eq!(overlay.path_count(), 0);
        assert_eq!(overlay.retired_class(TripId(1)), Some("trip_running"));
        assert_eq!(overlay.retired_class(TripId(2)), None);
    }
}
