//! Viewport sync: keeps the overlay and every rendered path aligned with
//! the map after the view changes.

use tracing::{debug, warn};

use crate::config::ProjectionFallback;
use crate::engine::{
    PATHS_BUILT, PlaybackEvent, TripEngine, VIEWPORT_FALLBACKS, VIEWPORT_SYNCS,
};
use crate::overlay::OverlaySurface;
use crate::path::{ScreenBox, bounding_box, build_path};
use crate::projection::{ProjectionState, ViewportChange, ViewportProvider};
use crate::trip::{TripId, TripState};

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    pub bounds: ScreenBox,
    /// Existing paths re-projected.
    pub rebuilt: usize,
    /// Trips that got their first path (and playback handle) in this sync.
    pub first_built: Vec<TripId>,
    /// Whether the last-known-good projection stood in for the viewport.
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// No usable projection: the viewport has none and either no earlier
    /// state exists or the fallback is disabled.
    ProjectionUnavailable,
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::ProjectionUnavailable => write!(f, "viewport projection unavailable"),
        }
    }
}

impl std::error::Error for SyncError {}

impl<V: ViewportProvider, O: OverlaySurface> TripEngine<V, O> {
    /// Handles a viewport-change notification from the map.
    ///
    /// `Ok(None)` means there was nothing to place yet.
    pub fn on_viewport_change(
        &mut self,
        change: ViewportChange,
    ) -> Result<Option<SyncSummary>, SyncError> {
        debug!(?change, "viewport change");
        self.sync_viewport()
    }

    /// Repositions the overlay over all loaded trips and re-projects every
    /// rendered path. Playback state and clocks are left untouched: a trace
    /// keeps its progress and only its geometry follows the map.
    pub fn sync_viewport(&mut self) -> Result<Option<SyncSummary>, SyncError> {
        if self.loaded.is_empty() {
            return Ok(None);
        }
        let (state, used_fallback) = self.resolve_projection()?;

        let Some(bounds) = bounding_box(self.loaded.iter(), &state) else {
            return Ok(None);
        };
        self.overlay.resize(bounds.width(), bounds.height());
        self.overlay.position(bounds.top_left.x, bounds.top_left.y);
        self.overlay
            .set_local_transform(-bounds.top_left.x, -bounds.top_left.y);

        let existing: Vec<TripId> = self.paths.keys().copied().collect();
        for &id in &existing {
            self.rebuild_path(id, &state);
            if let Some(frame) = self.trace_frame(id) {
                self.overlay.set_dash(id, frame.dash);
            }
        }

        let first_built: Vec<TripId> = std::mem::take(&mut self.awaiting_path)
            .into_iter()
            .filter(|&id| self.rebuild_path(id, &state))
            .collect();
        for &id in &first_built {
            self.overlay.set_class(id, TripState::NotStarted);
            self.start_playback(id);
        }

        self.metrics.inc_counter(VIEWPORT_SYNCS, 1);
        self.events.emit(
            self.clock,
            PlaybackEvent::ViewportSynced {
                paths: self.paths.len(),
                fallback: used_fallback,
            },
        );
        debug!(
            rebuilt = existing.len(),
            first_built = first_built.len(),
            width = bounds.width(),
            height = bounds.height(),
            used_fallback,
            "viewport synced"
        );

        Ok(Some(SyncSummary {
            bounds,
            rebuilt: existing.len(),
            first_built,
            used_fallback,
        }))
    }

    /// Current projection, or the last one that worked when the viewport
    /// cannot provide one and the fallback allows it.
    fn resolve_projection(&mut self) -> Result<(ProjectionState, bool), SyncError> {
        if let Some(state) = self
            .viewport
            .current_projection_state()
            .filter(ProjectionState::is_valid)
        {
            self.last_good = Some(state);
            return Ok((state, false));
        }

        match (self.config.projection_fallback, self.last_good) {
            (ProjectionFallback::LastKnownGood, Some(state)) => {
                warn!("viewport projection unavailable, using last known good state");
                self.metrics.inc_counter(VIEWPORT_FALLBACKS, 1);
                Ok((state, true))
            }
            _ => {
                warn!("viewport projection unavailable");
                Err(SyncError::ProjectionUnavailable)
            }
        }
    }

    /// Projects the trip's path and pushes it to the overlay. Returns
    /// `false` if the trip is no longer loaded.
    fn rebuild_path(&mut self, id: TripId, state: &ProjectionState) -> bool {
        let Some(trip) = self.loaded.get(id) else {
            return false;
        };
        let path = build_path(trip, state);
        self.overlay.draw_path(id, path.points());
        self.paths.insert(id, path);
        self.metrics.inc_counter(PATHS_BUILT, 1);
        true
    }
}
