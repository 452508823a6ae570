//! Chunk intake: turning a delivered batch of trip records into loaded,
//! rendered, scheduled trips.

use formats::{TripChunk, TripRecord};
use streaming::{ChunkKey, SourceError, TripSource};
use tracing::{info, warn};

use crate::engine::{
    PlaybackEvent, TRIPS_ACCEPTED, TRIPS_LOADED, TRIPS_REJECTED, TRIPS_UNLOADED, TripEngine,
};
use crate::overlay::OverlaySurface;
use crate::projection::ViewportProvider;
use crate::sync::SyncError;
use crate::trip::{Trip, TripId, TripInvariantError, TripKey};

/// A trip that failed validation and was left out of the loaded set.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRejection {
    pub key: TripKey,
    pub reason: TripInvariantError,
}

impl std::fmt::Display for TripRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "trip {} rejected: {}", self.key, self.reason)
    }
}

/// Outcome of one `add_chunk` call. Partial success is normal.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeReport {
    pub chunk: ChunkKey,
    pub accepted: Vec<TripId>,
    pub rejected: Vec<TripRejection>,
    /// Set when the batch's viewport sync could not run; the accepted trips
    /// are loaded and will be placed by the next successful sync.
    pub sync_error: Option<SyncError>,
}

#[derive(Debug)]
pub enum LoadError {
    Source(SourceError),
    AlreadyLoaded(ChunkKey),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Source(e) => write!(f, "{e}"),
            LoadError::AlreadyLoaded(chunk) => write!(f, "chunk {chunk} is already loaded"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Source(e) => Some(e),
            LoadError::AlreadyLoaded(_) => None,
        }
    }
}

impl<V: ViewportProvider, O: OverlaySurface> TripEngine<V, O> {
    /// Fetches `chunk` from `source` and adds it. Blocks for as long as the
    /// source does.
    pub fn load_chunk(
        &mut self,
        source: &mut impl TripSource,
        chunk: ChunkKey,
    ) -> Result<IntakeReport, LoadError> {
        if self.is_chunk_loaded(chunk) {
            return Err(LoadError::AlreadyLoaded(chunk));
        }
        let trips = source.fetch(chunk).map_err(LoadError::Source)?;
        Ok(self.add_chunk(chunk, trips))
    }

    pub fn is_chunk_loaded(&self, chunk: ChunkKey) -> bool {
        self.loaded.iter().any(|t| t.key().chunk == chunk)
    }

    /// Adds a batch of trips.
    ///
    /// Valid trips are appended in order, then one viewport sync builds
    /// their paths, re-places the overlay and starts their playback.
    /// Invalid trips are reported and skipped; they never abort the batch.
    pub fn add_chunk(&mut self, chunk: ChunkKey, trips: TripChunk) -> IntakeReport {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for (index, record) in trips.records.into_iter().enumerate() {
            match self.admit(chunk, index, record) {
                Ok(id) => accepted.push(id),
                Err(rejection) => {
                    warn!(%rejection, "rejecting trip");
                    self.events.emit(
                        self.clock,
                        PlaybackEvent::TripRejected {
                            key: rejection.key.clone(),
                            reason: rejection.reason.to_string(),
                        },
                    );
                    rejected.push(rejection);
                }
            }
        }
        self.metrics
            .inc_counter(TRIPS_ACCEPTED, accepted.len() as u64);
        self.metrics
            .inc_counter(TRIPS_REJECTED, rejected.len() as u64);
        self.metrics
            .set_gauge(TRIPS_LOADED, self.loaded.len() as i64);

        // The batch's one sync projects the new trips along with the
        // existing ones and starts their playback.
        self.awaiting_path.extend(accepted.iter().copied());
        let sync_error = if accepted.is_empty() {
            None
        } else {
            self.sync_viewport().err()
        };

        info!(
            %chunk,
            accepted = accepted.len(),
            rejected = rejected.len(),
            loaded = self.loaded.len(),
            "chunk added"
        );
        self.events.emit(
            self.clock,
            PlaybackEvent::ChunkLoaded {
                chunk,
                accepted: accepted.len(),
                rejected: rejected.len(),
            },
        );

        IntakeReport {
            chunk,
            accepted,
            rejected,
            sync_error,
        }
    }

    fn admit(
        &mut self,
        chunk: ChunkKey,
        index: usize,
        record: TripRecord,
    ) -> Result<TripId, TripRejection> {
        let key = TripKey {
            chunk,
            index,
            feature_id: record.id.clone(),
        };
        let id = TripId(self.next_trip_id);
        let trip = Trip::from_record(id, key.clone(), record)
            .map_err(|reason| TripRejection { key, reason })?;
        self.next_trip_id += 1;
        self.loaded.push(trip);
        Ok(id)
    }

    /// Removes a trip: its playback is cancelled at once and its path
    /// disappears from the overlay.
    pub fn unload_trip(&mut self, id: TripId) -> bool {
        if self.loaded.remove(id).is_none() {
            return false;
        }
        self.scheduler.cancel(id);
        self.paths.remove(&id);
        self.awaiting_path.remove(&id);
        self.overlay.remove_path(id);

        self.metrics.inc_counter(TRIPS_UNLOADED, 1);
        self.metrics
            .set_gauge(TRIPS_LOADED, self.loaded.len() as i64);
        self.events.emit(self.clock, PlaybackEvent::TripUnloaded(id));
        true
    }

    /// Unloads every trip of `chunk` and re-places the overlay over what is
    /// left. Returns how many trips were removed.
    pub fn unload_chunk(&mut self, chunk: ChunkKey) -> usize {
        let ids = self.loaded.ids_in_chunk(chunk);
        for &id in &ids {
            self.unload_trip(id);
        }
        if !ids.is_empty() {
            if let Err(e) = self.sync_viewport() {
                warn!(%chunk, error = %e, "sync after unload failed");
            }
            info!(%chunk, removed = ids.len(), "chunk unloaded");
        }
        ids.len()
    }

    /// Accepted trips of every loaded chunk, as records.
    pub fn export_loaded(&self) -> TripChunk {
        TripChunk {
            records: self.loaded.iter().map(Trip::to_record).collect(),
        }
    }
}
