use std::str::FromStr;

/// Identifies one batch of trips: every trip starting in a given hour of a
/// given day.
///
/// Ordering is `(day, hour)`, so a `BTreeMap` keyed by chunk iterates in
/// playback order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkKey {
    pub day: u32,
    pub hour: u32,
}

impl ChunkKey {
    pub fn new(day: u32, hour: u32) -> Self {
        Self { day, hour }
    }

    /// Location of the chunk below a data root.
    pub fn relative_path(&self) -> String {
        format!("by-hour/day{}/{}/data.geojson", self.day, self.hour)
    }
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "day{}/{}", self.day, self.hour)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseChunkKeyError(String);

impl std::fmt::Display for ParseChunkKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid chunk key {:?} (expected DAY/HOUR, e.g. 0/13 or day0/13)",
            self.0
        )
    }
}

impl std::error::Error for ParseChunkKeyError {}

impl FromStr for ChunkKey {
    type Err = ParseChunkKeyError;

    /// Accepts `DAY/HOUR` and the display form `dayDAY/HOUR`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseChunkKeyError(s.to_string());
        let (day, hour) = s.trim().split_once('/').ok_or_else(err)?;
        let day = day.strip_prefix("day").unwrap_or(day);
        let day: u32 = day.parse().map_err(|_| err())?;
        let hour: u32 = hour.parse().map_err(|_| err())?;
        if hour > 23 {
            return Err(err());
        }
        Ok(Self { day, hour })
    }
}
