use std::collections::BTreeMap;

use formats::TripRecord;
use foundation::bounds::Aabb2;
use foundation::math::LonLat;
use streaming::ChunkKey;

/// Engine-assigned trip identity. Ids grow with load order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripId(pub u64);

impl std::fmt::Display for TripId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "trip#{}", self.0)
    }
}

/// Where a trip came from: its chunk, its position in that chunk and the
/// feature id the source gave it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripKey {
    pub chunk: ChunkKey,
    pub index: usize,
    pub feature_id: Option<String>,
}

impl std::fmt::Display for TripKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.chunk, self.index)?;
        if let Some(id) = &self.feature_id {
            write!(f, " ({id})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TripState {
    NotStarted,
    Running,
    Complete,
}

impl TripState {
    /// Style class handed to the overlay for paths in this state.
    pub fn css_class(self) -> &'static str {
        match self {
            TripState::NotStarted => "trip_not_started",
            TripState::Running => "trip_running",
            TripState::Complete => "trip_complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TripInvariantError {
    NoPoints,
    NonFiniteCoordinate { index: usize },
    InvalidStartOffset(f64),
    TimingLength { points: usize, seconds: usize },
    InvalidSeconds { index: usize, value: f64 },
    NonMonotonic { index: usize, previous: f64, value: f64 },
}

impl std::fmt::Display for TripInvariantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TripInvariantError::NoPoints => write!(f, "trip has no points"),
            TripInvariantError::NonFiniteCoordinate { index } => {
                write!(f, "point {index} has a non-finite coordinate")
            }
            TripInvariantError::InvalidStartOffset(v) => {
                write!(f, "start_offset must be finite and non-negative, got {v}")
            }
            TripInvariantError::TimingLength { points, seconds } => write!(
                f,
                "expected {} cumulative_seconds for {points} points, got {seconds}",
                points.saturating_sub(1)
            ),
            TripInvariantError::InvalidSeconds { index, value } => write!(
                f,
                "cumulative_seconds[{index}] must be finite and non-negative, got {value}"
            ),
            TripInvariantError::NonMonotonic {
                index,
                previous,
                value,
            } => write!(
                f,
                "cumulative_seconds decreases at index {index}: {previous} -> {value}"
            ),
        }
    }
}

impl std::error::Error for TripInvariantError {}

/// One validated geographic trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    id: TripId,
    key: TripKey,
    points: Vec<LonLat>,
    start_offset: f64,
    cumulative_seconds: Vec<f64>,
    state: TripState,
}

impl Trip {
    pub fn from_record(
        id: TripId,
        key: TripKey,
        record: TripRecord,
    ) -> Result<Self, TripInvariantError> {
        validate(&record)?;
        Ok(Self {
            id,
            key,
            points: record.geometry,
            start_offset: record.start_offset,
            cumulative_seconds: record.cumulative_seconds,
            state: TripState::NotStarted,
        })
    }

    pub fn id(&self) -> TripId {
        self.id
    }

    pub fn key(&self) -> &TripKey {
        &self.key
    }

    pub fn points(&self) -> &[LonLat] {
        &self.points
    }

    pub fn start_offset(&self) -> f64 {
        self.start_offset
    }

    pub fn cumulative_seconds(&self) -> &[f64] {
        &self.cumulative_seconds
    }

    /// Total trip duration in trip seconds; zero for a single-point trip.
    pub fn total_seconds(&self) -> f64 {
        self.cumulative_seconds.last().copied().unwrap_or(0.0)
    }

    pub fn state(&self) -> TripState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TripState) {
        self.state = state;
    }

    /// Geographic extent as `[lon, lat]` bounds.
    pub fn geo_bounds(&self) -> Aabb2 {
        self.points
            .iter()
            .map(|p| [p.lon_deg, p.lat_deg])
            .collect()
    }

    pub fn to_record(&self) -> TripRecord {
        TripRecord {
            id: self.key.feature_id.clone(),
            geometry: self.points.clone(),
            start_offset: self.start_offset,
            cumulative_seconds: self.cumulative_seconds.clone(),
        }
    }
}

fn validate(record: &TripRecord) -> Result<(), TripInvariantError> {
    if record.geometry.is_empty() {
        return Err(TripInvariantError::NoPoints);
    }
    if let Some(index) = record.geometry.iter().position(|p| !p.is_finite()) {
        return Err(TripInvariantError::NonFiniteCoordinate { index });
    }
    if !record.start_offset.is_finite() || record.start_offset < 0.0 {
        return Err(TripInvariantError::InvalidStartOffset(record.start_offset));
    }
    if record.cumulative_seconds.len() != record.geometry.len() - 1 {
        return Err(TripInvariantError::TimingLength {
            points: record.geometry.len(),
            seconds: record.cumulative_seconds.len(),
        });
    }

    let mut previous = 0.0;
    for (index, &value) in record.cumulative_seconds.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(TripInvariantError::InvalidSeconds { index, value });
        }
        if value < previous {
            return Err(TripInvariantError::NonMonotonic {
                index,
                previous,
                value,
            });
        }
        previous = value;
    }
    Ok(())
}

/// All trips currently added to the overlay, in load order.
#[derive(Debug, Default)]
pub struct LoadedSet {
    trips: BTreeMap<TripId, Trip>,
}

impl LoadedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    pub fn get(&self, id: TripId) -> Option<&Trip> {
        self.trips.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TripId) -> Option<&mut Trip> {
        self.trips.get_mut(&id)
    }

    /// Trips in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Trip> {
        self.trips.values()
    }

    pub fn ids_in_chunk(&self, chunk: ChunkKey) -> Vec<TripId> {
        self.trips
            .values()
            .filter(|t| t.key.chunk == chunk)
            .map(|t| t.id)
            .collect()
    }

    pub(crate) fn push(&mut self, trip: Trip) {
        self.trips.insert(trip.id, trip);
    }

    pub(crate) fn remove(&mut self, id: TripId) -> Option<Trip> {
        self.trips.remove(&id)
    }

    pub fn count_in_state(&self, state: TripState) -> usize {
        self.trips.values().filter(|t| t.state == state).count()
    }
}
