use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use formats::{TripChunk, TripChunkError};
use tracing::debug;

use crate::chunk_key::ChunkKey;

#[derive(Debug)]
pub enum SourceError {
    NotFound(ChunkKey),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        chunk: ChunkKey,
        source: TripChunkError,
    },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::NotFound(chunk) => write!(f, "no trip data for chunk {chunk}"),
            SourceError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            SourceError::Parse { chunk, source } => {
                write!(f, "failed to parse chunk {chunk}: {source}")
            }
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::NotFound(_) => None,
            SourceError::Io { source, .. } => Some(source),
            SourceError::Parse { source, .. } => Some(source),
        }
    }
}

/// Request/response access to trip batches.
///
/// A fetch may block; each successful response is handed to chunk intake as
/// one batch.
pub trait TripSource {
    fn fetch(&mut self, chunk: ChunkKey) -> Result<TripChunk, SourceError>;
}

/// Reads chunks laid out as `<root>/by-hour/day<D>/<H>/data.geojson`.
#[derive(Debug, Clone)]
pub struct DirTripSource {
    root: PathBuf,
}

impl DirTripSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, chunk: ChunkKey) -> PathBuf {
        self.root.join(chunk.relative_path())
    }
}

impl TripSource for DirTripSource {
    fn fetch(&mut self, chunk: ChunkKey) -> Result<TripChunk, SourceError> {
        let path = self.path_for(chunk);
        let payload = match fs::read_to_string(&path) {
            Ok(payload) => payload,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(chunk));
            }
            Err(source) => return Err(SourceError::Io { path, source }),
        };
        let trips = TripChunk::from_geojson_str(&payload)
            .map_err(|source| SourceError::Parse { chunk, source })?;
        debug!(%chunk, trips = trips.len(), path = %path.display(), "fetched trip chunk");
        Ok(trips)
    }
}

/// In-memory source, mostly for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemoryTripSource {
    chunks: BTreeMap<ChunkKey, TripChunk>,
}

impl MemoryTripSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chunk: ChunkKey, trips: TripChunk) {
        self.chunks.insert(chunk, trips);
    }
}

impl TripSource for MemoryTripSource {
    fn fetch(&mut self, chunk: ChunkKey) -> Result<TripChunk, SourceError> {
        self.chunks
            .get(&chunk)
            .cloned()
            .ok_or(SourceError::NotFound(chunk))
    }
}
