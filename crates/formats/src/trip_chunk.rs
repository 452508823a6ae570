//! GeoJSON trip chunks.
//!
//! A chunk is a `FeatureCollection` whose features are `LineString` (or, for
//! a trip that never moved, `Point`) geometries carrying the timing metadata
//! in their properties:
//!
//! ```json
//! { "type": "Feature",
//!   "geometry": { "type": "LineString", "coordinates": [[0.12, 52.2], [0.13, 52.21]] },
//!   "properties": { "start_offset": 42.0, "trip_cum_seconds": [95.0] } }
//! ```
//!
//! Only the document structure is checked here. Timing invariants belong to
//! trip intake, which rejects individual trips without failing the chunk.

use foundation::math::LonLat;
use serde::Deserialize;
use serde_json::{Map, Value};

/// One raw trip as delivered by a data source.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub id: Option<String>,
    pub geometry: Vec<LonLat>,
    /// Seconds from the playback epoch.
    pub start_offset: f64,
    /// Elapsed trip seconds at every point after the first.
    pub cumulative_seconds: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripChunk {
    pub records: Vec<TripRecord>,
}

#[derive(Debug)]
pub enum TripChunkError {
    Json(serde_json::Error),
    NotAFeatureCollection,
    InvalidFeature { index: usize, reason: String },
}

impl std::fmt::Display for TripChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TripChunkError::Json(e) => write!(f, "JSON parse error: {e}"),
            TripChunkError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            TripChunkError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for TripChunkError {}

#[derive(Debug, Deserialize)]
struct TripProperties {
    start_offset: f64,
    #[serde(default)]
    trip_cum_seconds: Vec<f64>,
}

impl TripChunk {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn from_geojson_str(payload: &str) -> Result<Self, TripChunkError> {
        let value: Value = serde_json::from_str(payload).map_err(TripChunkError::Json)?;
        Self::from_geojson_value(value)
    }

    pub fn from_geojson_value(value: Value) -> Result<Self, TripChunkError> {
        let obj = value
            .as_object()
            .ok_or(TripChunkError::NotAFeatureCollection)?;
        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(TripChunkError::NotAFeatureCollection)?;
        if ty != "FeatureCollection" {
            return Err(TripChunkError::NotAFeatureCollection);
        }

        let features_val = obj
            .get("features")
            .and_then(|v| v.as_array())
            .ok_or(TripChunkError::NotAFeatureCollection)?;

        let mut records = Vec::with_capacity(features_val.len());
        for (index, feat_val) in features_val.iter().enumerate() {
            let record = parse_feature(feat_val)
                .map_err(|reason| TripChunkError::InvalidFeature { index, reason })?;
            records.push(record);
        }

        Ok(Self { records })
    }

    pub fn to_geojson_value(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            "type".to_string(),
            Value::String("FeatureCollection".to_string()),
        );

        let features: Vec<Value> = self.records.iter().map(record_to_geojson_value).collect();
        root.insert("features".to_string(), Value::Array(features));
        Value::Object(root)
    }

    pub fn to_geojson_string_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_geojson_value())
    }
}

fn parse_feature(value: &Value) -> Result<TripRecord, String> {
    let feat = value
        .as_object()
        .ok_or_else(|| "feature must be an object".to_string())?;

    let feat_type = feat
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "feature missing type".to_string())?;
    if feat_type != "Feature" {
        return Err(format!("unexpected feature type: {feat_type}"));
    }

    let id = match feat.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let geometry_val = feat
        .get("geometry")
        .ok_or_else(|| "feature missing geometry".to_string())?;
    let geometry = parse_geometry(geometry_val)?;

    let props_val = feat
        .get("properties")
        .cloned()
        .ok_or_else(|| "feature missing properties".to_string())?;
    let props: TripProperties =
        serde_json::from_value(props_val).map_err(|e| format!("bad trip properties: {e}"))?;

    Ok(TripRecord {
        id,
        geometry,
        start_offset: props.start_offset,
        cumulative_seconds: props.trip_cum_seconds,
    })
}

fn parse_geometry(value: &Value) -> Result<Vec<LonLat>, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "geometry missing type".to_string())?;
    let coords = obj
        .get("coordinates")
        .ok_or_else(|| "geometry missing coordinates".to_string())?;

    match ty {
        "Point" => Ok(vec![parse_position(coords)?]),
        "LineString" => coords
            .as_array()
            .ok_or_else(|| "LineString coordinates must be an array".to_string())?
            .iter()
            .map(parse_position)
            .collect(),
        other => Err(format!("unsupported trip geometry: {other}")),
    }
}

fn parse_position(value: &Value) -> Result<LonLat, String> {
    let arr = value
        .as_array()
        .ok_or_else(|| "position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position needs at least [lon, lat]".to_string());
    }
    let lon = arr[0]
        .as_f64()
        .ok_or_else(|| "longitude must be a number".to_string())?;
    let lat = arr[1]
        .as_f64()
        .ok_or_else(|| "latitude must be a number".to_string())?;
    Ok(LonLat::new(lon, lat))
}

fn record_to_geojson_value(record: &TripRecord) -> Value {
    let mut geom = Map::new();
    let position = |p: &LonLat| Value::Array(vec![Value::from(p.lon_deg), Value::from(p.lat_deg)]);
    if record.geometry.len() == 1 {
        geom.insert("type".to_string(), Value::String("Point".to_string()));
        geom.insert("coordinates".to_string(), position(&record.geometry[0]));
    } else {
        geom.insert("type".to_string(), Value::String("LineString".to_string()));
        geom.insert(
            "coordinates".to_string(),
            Value::Array(record.geometry.iter().map(position).collect()),
        );
    }

    let mut props = Map::new();
    props.insert("start_offset".to_string(), Value::from(record.start_offset));
    props.insert(
        "trip_cum_seconds".to_string(),
        Value::Array(record.cumulative_seconds.iter().map(|&s| Value::from(s)).collect()),
    );

    let mut feat = Map::new();
    feat.insert("type".to_string(), Value::String("Feature".to_string()));
    if let Some(id) = &record.id {
        feat.insert("id".to_string(), Value::String(id.clone()));
    }
    feat.insert("geometry".to_string(), Value::Object(geom));
    feat.insert("properties".to_string(), Value::Object(props));
    Value::Object(feat)
}

#[cfg(test)]
mod tests {
    use super::{TripChunk, TripChunkError};
    use foundation::math::LonLat;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": 7,
                "geometry": {"type": "LineString", "coordinates": [[0.12, 52.2], [0.13, 52.21], [0.14, 52.2]]},
                "properties": {"start_offset": 30.5, "trip_cum_seconds": [12.0, 40.0], "plate": "ignored"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [0.1, 52.0]},
                "properties": {"start_offset": 0}
            }
        ]
    }"#;

    #[test]
    fn parses_trip_features() {
        let chunk = TripChunk::from_geojson_str(SAMPLE).expect("parse");
        assert_eq!(chunk.len(), 2);

        let first = &chunk.records[0];
        assert_eq!(first.id.as_deref(), Some("7"));
        assert_eq!(first.geometry[1], LonLat::new(0.13, 52.21));
        assert_eq!(first.start_offset, 30.5);
        assert_eq!(first.cumulative_seconds, vec![12.0, 40.0]);

        let parked = &chunk.records[1];
        assert_eq!(parked.geometry.len(), 1);
        assert!(parked.cumulative_seconds.is_empty());
    }

    #[test]
    fn rejects_non_collection() {
        let err = TripChunk::from_geojson_str(r#"{"type": "Feature"}"#).expect_err("not a fc");
        assert!(matches!(err, TripChunkError::NotAFeatureCollection));
    }

    #[test]
    fn reports_feature_index_on_missing_timing() {
        let payload = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0, 0]}, "properties": {}}
        ]}"#;
        match TripChunk::from_geojson_str(payload) {
            Err(TripChunkError::InvalidFeature { index, reason }) => {
                assert_eq!(index, 0);
                assert!(reason.contains("start_offset"), "{reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_polygon_geometry() {
        let payload = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Polygon", "coordinates": []},
             "properties": {"start_offset": 1}}
        ]}"#;
        let err = TripChunk::from_geojson_str(payload).expect_err("polygon");
        assert!(err.to_string().contains("unsupported trip geometry"));
    }

    #[test]
    fn export_keeps_timing_properties() {
        let chunk = TripChunk::from_geojson_str(SAMPLE).expect("parse");
        let exported = chunk.to_geojson_string_pretty().expect("export");
        let reparsed = TripChunk::from_geojson_str(&exported).expect("reparse");
        assert_eq!(reparsed, chunk);

        let value = chunk.to_geojson_value();
        let props = &value["features"][0]["properties"];
        assert_eq!(props["start_offset"], 30.5);
        assert_eq!(props["trip_cum_seconds"], serde_json::json!([12.0, 40.0]));
    }
}
