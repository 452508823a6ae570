use foundation::bounds::Aabb2;
use foundation::math::{LonLat, Vec2};

use crate::projection::ProjectionState;
use crate::trip::Trip;

/// Screen-space polyline of one trip plus its cached length.
///
/// Point order always matches the trip's point order; the trace sweeps from
/// the first point to the last.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPath {
    points: Vec<Vec2>,
    // Distance along the path at each point; `cumulative[0] == 0`.
    cumulative: Vec<f64>,
}

impl RenderedPath {
    pub fn from_points(points: Vec<Vec2>) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                total += points[i - 1].distance(*p);
            }
            cumulative.push(total);
        }
        Self { points, cumulative }
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Point at distance `d` along the path, clamped to the path's ends.
    pub fn point_at_length(&self, d: f64) -> Option<Vec2> {
        let first = *self.points.first()?;
        if d <= 0.0 || self.points.len() == 1 {
            return Some(first);
        }
        // First vertex at or beyond `d`.
        let i = self.cumulative.partition_point(|&c| c < d);
        if i >= self.points.len() {
            return self.points.last().copied();
        }
        let (d0, d1) = (self.cumulative[i - 1], self.cumulative[i]);
        let span = d1 - d0;
        let t = if span > 0.0 { (d - d0) / span } else { 0.0 };
        Some(self.points[i - 1].lerp(self.points[i], t))
    }
}

/// Projects every point of `trip`, in order.
pub fn build_path(trip: &Trip, state: &ProjectionState) -> RenderedPath {
    RenderedPath::from_points(trip.points().iter().map(|&p| state.project(p)).collect())
}

/// Pixel rectangle covering a set of trips.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenBox {
    pub top_left: Vec2,
    pub bottom_right: Vec2,
}

impl ScreenBox {
    pub fn width(&self) -> f64 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> f64 {
        self.bottom_right.y - self.top_left.y
    }
}

/// Union of the trips' geographic extents, projected with `state`.
///
/// Returns `None` for an empty set; callers are expected to skip the call in
/// that case.
pub fn bounding_box<'a>(
    trips: impl IntoIterator<Item = &'a Trip>,
    state: &ProjectionState,
) -> Option<ScreenBox> {
    let geo = trips
        .into_iter()
        .fold(Aabb2::empty(), |acc, t| acc.union(t.geo_bounds()));
    if geo.is_empty() {
        return None;
    }
    // North-west corner is the top-left on screen.
    let top_left = state.project(LonLat::new(geo.min[0], geo.max[1]));
    let bottom_right = state.project(LonLat::new(geo.max[0], geo.min[1]));
    Some(ScreenBox {
        top_left,
        bottom_right,
    })
}
