use std::collections::{BTreeMap, BTreeSet};

use foundation::time::Millis;
use runtime::{Event, EventBus, Frame, Metrics};
use streaming::ChunkKey;
use tracing::{debug, trace};

use crate::config::{ConfigError, PlaybackConfig};
use crate::overlay::OverlaySurface;
use crate::path::RenderedPath;
use crate::projection::{ProjectionState, ViewportProvider};
use crate::scheduler::{PlaybackHandle, Scheduler, TraceFrame, Transition};
use crate::trip::{LoadedSet, Trip, TripId, TripKey, TripState};

pub const TRIPS_ACCEPTED: &str = "trips.accepted";
pub const TRIPS_REJECTED: &str = "trips.rejected";
pub const TRIPS_STARTED: &str = "trips.started";
pub const TRIPS_COMPLETED: &str = "trips.completed";
pub const TRIPS_LOOPED: &str = "trips.looped";
pub const TRIPS_UNLOADED: &str = "trips.unloaded";
pub const VIEWPORT_SYNCS: &str = "viewport.syncs";
pub const VIEWPORT_FALLBACKS: &str = "viewport.fallbacks";
pub const PATHS_BUILT: &str = "paths.built";
pub const TRIPS_LOADED: &str = "trips.loaded";
pub const TRIPS_RUNNING: &str = "trips.running";

/// Everything the engine reports on its event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    ChunkLoaded {
        chunk: ChunkKey,
        accepted: usize,
        rejected: usize,
    },
    TripRejected {
        key: TripKey,
        reason: String,
    },
    TripStarted(TripId),
    TripLooped {
        trip: TripId,
        cycle: u64,
    },
    TripCompleted(TripId),
    TripUnloaded(TripId),
    ViewportSynced {
        paths: usize,
        fallback: bool,
    },
}

/// The trip playback engine.
///
/// One instance owns the loaded trips, their rendered paths, the playback
/// handles and the playback clock. Every mutation goes through `&mut self`,
/// so a sync can never observe a half-built path cache.
pub struct TripEngine<V, O> {
    pub(crate) config: PlaybackConfig,
    pub(crate) viewport: V,
    pub(crate) overlay: O,
    pub(crate) loaded: LoadedSet,
    pub(crate) paths: BTreeMap<TripId, RenderedPath>,
    // Loaded trips whose path could not be built yet (no projection).
    pub(crate) awaiting_path: BTreeSet<TripId>,
    pub(crate) scheduler: Scheduler,
    pub(crate) last_good: Option<ProjectionState>,
    pub(crate) clock: Millis,
    pub(crate) next_trip_id: u64,
    pub(crate) events: EventBus<PlaybackEvent>,
    pub(crate) metrics: Metrics,
}

impl<V: ViewportProvider, O: OverlaySurface> TripEngine<V, O> {
    pub fn new(config: PlaybackConfig, viewport: V, overlay: O) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            viewport,
            overlay,
            loaded: LoadedSet::new(),
            paths: BTreeMap::new(),
            awaiting_path: BTreeSet::new(),
            scheduler: Scheduler::new(),
            last_good: None,
            clock: Millis::ZERO,
            next_trip_id: 1,
            events: EventBus::new(),
            metrics: Metrics::new(),
        })
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    /// Access for the shell that owns the map; the engine itself never
    /// changes the view.
    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn loaded(&self) -> &LoadedSet {
        &self.loaded
    }

    pub fn trip(&self, id: TripId) -> Option<&Trip> {
        self.loaded.get(id)
    }

    pub fn state(&self, id: TripId) -> Option<TripState> {
        self.loaded.get(id).map(Trip::state)
    }

    pub fn path(&self, id: TripId) -> Option<&RenderedPath> {
        self.paths.get(&id)
    }

    pub fn handle(&self, id: TripId) -> Option<&PlaybackHandle> {
        self.scheduler.handle(id)
    }

    pub fn now(&self) -> Millis {
        self.clock
    }

    pub fn last_good_projection(&self) -> Option<ProjectionState> {
        self.last_good
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn events(&self) -> &[Event<PlaybackEvent>] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<Event<PlaybackEvent>> {
        self.events.drain()
    }

    /// Linear progress of the trip's current sweep, if it is sweeping.
    pub fn fraction(&self, id: TripId) -> Option<f64> {
        self.scheduler
            .fraction_at(id, self.clock, self.config.completion)
    }

    /// The trace as it should look right now, for trips that have a path
    /// and a live handle.
    pub fn trace_frame(&self, id: TripId) -> Option<TraceFrame> {
        let trip = self.loaded.get(id)?;
        let path = self.paths.get(&id)?;
        let handle = self.scheduler.handle(id)?;
        let fraction = match trip.state() {
            TripState::NotStarted => 0.0,
            TripState::Running => self.fraction(id)?,
            TripState::Complete => return None,
        };
        Some(TraceFrame::compute(
            id,
            trip.state(),
            fraction,
            path,
            handle.trace_length,
            self.config.easing,
        ))
    }

    pub fn step(&mut self, frame: Frame) -> Vec<TraceFrame> {
        self.advance_to(frame.time)
    }

    /// Moves the playback clock to `now` and applies every resulting state
    /// change to the overlay. Returns the frames of all running traces.
    ///
    /// The clock never runs backwards; an earlier `now` re-renders the
    /// current instant.
    pub fn advance_to(&mut self, now: Millis) -> Vec<TraceFrame> {
        if now < self.clock {
            trace!(%now, clock = %self.clock, "ignoring clock step backwards");
        }
        self.clock = self.clock.max(now);

        let transitions = self
            .scheduler
            .advance(self.clock, self.config.completion, &mut self.loaded);
        for transition in transitions {
            self.apply_transition(transition);
        }

        let running: Vec<TripId> = self
            .scheduler
            .handles()
            .map(|(id, _)| id)
            .filter(|id| self.state(*id) == Some(TripState::Running))
            .collect();
        let mut frames = Vec::with_capacity(running.len());
        for id in running {
            if let Some(frame) = self.trace_frame(id) {
                self.overlay.set_dash(id, frame.dash);
                frames.push(frame);
            }
        }
        self.metrics.set_gauge(TRIPS_RUNNING, frames.len() as i64);
        frames
    }

    fn apply_transition(&mut self, transition: Transition) {
        let now = self.clock;
        match transition {
            Transition::Started(id) => {
                debug!(trip = %id, %now, "trip started");
                self.overlay.set_class(id, TripState::Running);
                self.metrics.inc_counter(TRIPS_STARTED, 1);
                self.events.emit(now, PlaybackEvent::TripStarted(id));
            }
            Transition::Looped { trip, cycle } => {
                trace!(%trip, cycle, "trip looped");
                self.metrics.inc_counter(TRIPS_LOOPED, 1);
                self.events
                    .emit(now, PlaybackEvent::TripLooped { trip, cycle });
            }
            Transition::Completed(id) => {
                debug!(trip = %id, %now, "trip complete");
                // The handle is already gone; the trace goes with it.
                self.paths.remove(&id);
                self.overlay.set_class(id, TripState::Complete);
                self.overlay.remove_path(id);
                self.metrics.inc_counter(TRIPS_COMPLETED, 1);
                self.events.emit(now, PlaybackEvent::TripCompleted(id));
            }
        }
    }

    /// Creates the playback handle for a trip whose path now exists and
    /// shows its trace at the start position.
    pub(crate) fn start_playback(&mut self, id: TripId) {
        let Some(trip) = self.loaded.get(id) else {
            return;
        };
        if trip.state() != TripState::NotStarted || !self.paths.contains_key(&id) {
            return;
        }
        let handle = PlaybackHandle::for_trip(trip, &self.config, self.clock);
        if self.scheduler.start(id, handle) {
            trace!(trip = %id, delay = %handle.delay, duration = %handle.duration, "playback scheduled");
            if let Some(frame) = self.trace_frame(id) {
                self.overlay.set_dash(id, frame.dash);
            }
        }
    }
}
