use std::env;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use foundation::math::{LonLat, Vec2};
use foundation::time::Millis;
use playback::{
    CompletionPolicy, IntakeReport, MemoryOverlay, PlaybackConfig, PlaybackEvent, TripEngine,
    TripState, Viewport, ViewportChange,
};
use runtime::{Event, Frame};
use streaming::{ChunkKey, DirTripSource};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Looping runs have no natural end; stop here unless told otherwise.
const DEFAULT_LOOP_RUN_MS: f64 = 60_000.0;
const MAX_ZOOM: f64 = 24.0;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless replay of animated trip traces")]
struct Args {
    /// Root of the by-hour chunk tree (default: $TRIPS_DATA_DIR or ./data)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Chunk to load as DAY/HOUR; repeatable (default: 0/0)
    #[arg(long = "chunk")]
    chunks: Vec<ChunkKey>,

    /// JSON playback config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Restart every trace when it reaches the end of its path
    #[arg(long = "loop")]
    looping: bool,

    /// Playback-clock milliseconds per frame
    #[arg(long, default_value_t = 50.0)]
    frame_ms: f64,

    /// Stop after this much playback time (default: when every trip is done)
    #[arg(long)]
    duration_ms: Option<f64>,

    /// Playback time at which the chunks are fetched
    #[arg(long, default_value_t = 0.0)]
    load_at_ms: f64,

    /// Map zoom level
    #[arg(long, default_value_t = 13.0)]
    zoom: f64,

    /// Map center as LON,LAT
    #[arg(long, default_value = "0.121,52.205", value_parser = parse_center)]
    center: LonLat,

    #[arg(long, default_value_t = 1024.0)]
    width: f64,

    #[arg(long, default_value_t = 768.0)]
    height: f64,

    /// Zoom in one level at this playback time, to exercise a viewport sync
    #[arg(long)]
    zoom_at: Option<f64>,

    /// Write the accepted trips back out as GeoJSON
    #[arg(long)]
    dump: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let args = Args::parse();
    check_args(&args)?;

    let data_dir = args.data_dir.clone().unwrap_or_else(|| {
        PathBuf::from(env::var("TRIPS_DATA_DIR").unwrap_or_else(|_| "data".to_string()))
    });
    let chunks = if args.chunks.is_empty() {
        vec![ChunkKey::new(0, 0)]
    } else {
        args.chunks.clone()
    };

    let mut config = match &args.config {
        Some(path) => PlaybackConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => PlaybackConfig::default(),
    };
    if args.looping {
        config.completion = CompletionPolicy::Loop;
    }
    let end = run_end(&args, config.completion);

    let viewport = Viewport::new(args.center, args.zoom, Vec2::new(args.width, args.height));
    let mut engine =
        TripEngine::new(config, viewport, MemoryOverlay::new()).map_err(|e| e.to_string())?;
    let mut source = DirTripSource::new(&data_dir);
    info!(
        data_dir = %data_dir.display(),
        chunks = chunks.len(),
        time_factor = engine.config().time_factor,
        "replay starting"
    );

    engine
        .on_viewport_change(ViewportChange::MapReady)
        .map_err(|e| e.to_string())?;

    let load_at = Millis(args.load_at_ms);
    let mut loaded = false;
    let mut zoomed = false;
    let mut frame = Frame::new(0, Millis(args.frame_ms));
    loop {
        if !loaded && frame.time >= load_at {
            load_all(&mut engine, &mut source, &chunks)?;
            loaded = true;
        }
        if let Some(at) = args.zoom_at {
            if !zoomed && frame.time >= Millis(at) {
                let zoom = engine.viewport().zoom + 1.0;
                engine.viewport_mut().set_zoom(zoom);
                engine
                    .on_viewport_change(ViewportChange::ZoomEnd)
                    .map_err(|e| e.to_string())?;
                info!(zoom, at = %frame.time, "zoomed in");
                zoomed = true;
            }
        }

        let traces = engine.step(frame);
        debug!(frame = frame.index, time = %frame.time, running = traces.len(), "frame");
        for event in engine.drain_events() {
            log_event(&event);
        }

        if frame.time >= end || (loaded && args.duration_ms.is_none() && all_done(&engine)) {
            break;
        }
        frame = frame.next();
    }

    let loaded_set = engine.loaded();
    println!(
        "replayed {} trips to {}: {} complete, {} running, {} waiting",
        loaded_set.len(),
        engine.now(),
        loaded_set.count_in_state(TripState::Complete),
        loaded_set.count_in_state(TripState::Running),
        loaded_set.count_in_state(TripState::NotStarted),
    );
    println!("{}", engine.metrics().snapshot());

    if let Some(path) = &args.dump {
        let body = engine
            .export_loaded()
            .to_geojson_string_pretty()
            .map_err(|e| e.to_string())?;
        fs::write(path, body).map_err(|e| format!("write {}: {e}", path.display()))?;
        info!(path = %path.display(), "accepted trips written");
    }
    Ok(())
}

fn check_args(args: &Args) -> Result<(), String> {
    if !(args.frame_ms.is_finite() && args.frame_ms > 0.0) {
        return Err(format!("--frame-ms must be > 0, got {}", args.frame_ms));
    }
    if !(0.0..=MAX_ZOOM).contains(&args.zoom) {
        return Err(format!("--zoom must be within 0..={MAX_ZOOM}, got {}", args.zoom));
    }
    if let Some(at) = args.zoom_at {
        if args.zoom + 1.0 > MAX_ZOOM || !at.is_finite() {
            return Err(format!("--zoom-at needs a finite time and a zoom below {MAX_ZOOM}"));
        }
    }
    if !(args.load_at_ms.is_finite() && args.load_at_ms >= 0.0) {
        return Err(format!("--load-at-ms must be >= 0, got {}", args.load_at_ms));
    }
    if let Some(ms) = args.duration_ms.filter(|ms| !ms.is_finite()) {
        return Err(format!("--duration-ms must be finite, got {ms}"));
    }
    for (name, value) in [("--width", args.width), ("--height", args.height)] {
        if !(value.is_finite() && value > 0.0) {
            return Err(format!("{name} must be > 0, got {value}"));
        }
    }
    Ok(())
}

fn run_end(args: &Args, completion: CompletionPolicy) -> Millis {
    match (args.duration_ms, completion) {
        (Some(ms), _) => Millis(ms),
        (None, CompletionPolicy::Loop) => Millis(args.load_at_ms + DEFAULT_LOOP_RUN_MS),
        (None, CompletionPolicy::OneShot) => Millis(f64::INFINITY),
    }
}

fn load_all(
    engine: &mut TripEngine<Viewport, MemoryOverlay>,
    source: &mut DirTripSource,
    chunks: &[ChunkKey],
) -> Result<(), String> {
    let mut failures = 0;
    for &chunk in chunks {
        match engine.load_chunk(source, chunk) {
            Ok(report) => {
                report_intake(&report);
                let stalled = report.sync_error.is_some()
                    && report.accepted.iter().all(|&id| engine.handle(id).is_none());
                if stalled && !report.accepted.is_empty() {
                    return Err(format!(
                        "chunk {}: {} trips loaded but none could be placed on the map",
                        report.chunk,
                        report.accepted.len()
                    ));
                }
            }
            Err(e) => {
                warn!(%chunk, error = %e, "chunk load failed");
                failures += 1;
            }
        }
    }
    if failures == chunks.len() {
        return Err(format!("none of the {} requested chunks could be loaded", chunks.len()));
    }
    Ok(())
}

fn report_intake(report: &IntakeReport) {
    info!(
        chunk = %report.chunk,
        accepted = report.accepted.len(),
        rejected = report.rejected.len(),
        "chunk loaded"
    );
    for rejection in &report.rejected {
        println!("{rejection}");
    }
    if let Some(e) = &report.sync_error {
        warn!(chunk = %report.chunk, error = %e, "trips loaded without a viewport sync");
    }
}

/// One-shot playback is over once no trip is waiting or running.
fn all_done(engine: &TripEngine<Viewport, MemoryOverlay>) -> bool {
    let loaded = engine.loaded();
    loaded.count_in_state(TripState::Complete) == loaded.len()
}

fn log_event(event: &Event<PlaybackEvent>) {
    let at = event.time;
    match &event.payload {
        PlaybackEvent::TripStarted(id) => debug!(trip = %id, %at, "started"),
        PlaybackEvent::TripCompleted(id) => debug!(trip = %id, %at, "completed"),
        PlaybackEvent::TripLooped { trip, cycle } => debug!(%trip, cycle, %at, "looped"),
        PlaybackEvent::TripUnloaded(id) => debug!(trip = %id, %at, "unloaded"),
        PlaybackEvent::ViewportSynced { paths, fallback } => {
            info!(paths, fallback, %at, "viewport synced")
        }
        PlaybackEvent::ChunkLoaded { .. } | PlaybackEvent::TripRejected { .. } => {}
    }
}

fn parse_center(s: &str) -> Result<LonLat, String> {
    let (lon, lat) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LON,LAT, got {s:?}"))?;
    let lon: f64 = lon.trim().parse().map_err(|_| format!("bad longitude {lon:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("bad latitude {lat:?}"))?;
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(format!("center out of range: {lon},{lat}"));
    }
    Ok(LonLat::new(lon, lat))
}

#[cfg(test)]
mod tests {
    use super::{Args, check_args, load_all, parse_center, run_end};
    use clap::Parser;
    use foundation::math::{LonLat, Vec2};
    use foundation::time::Millis;
    use playback::{CompletionPolicy, MemoryOverlay, PlaybackConfig, TripEngine, Viewport};
    use pretty_assertions::assert_eq;
    use std::fs;
    use streaming::{ChunkKey, DirTripSource};

    #[test]
    fn parses_center() {
        assert_eq!(parse_center("0.121, 52.205"), Ok(LonLat::new(0.121, 52.205)));
        assert!(parse_center("52.205").is_err());
        assert!(parse_center("200,0").is_err());
    }

    #[test]
    fn cli_accepts_repeated_chunks() {
        let args = Args::try_parse_from([
            "trip-replay",
            "--chunk",
            "0/7",
            "--chunk",
            "day1/23",
            "--loop",
        ])
        .expect("valid args");
        assert_eq!(args.chunks, vec![ChunkKey::new(0, 7), ChunkKey::new(1, 23)]);
        assert!(args.looping);
        assert_eq!(args.center, LonLat::new(0.121, 52.205));
        assert_eq!(run_end(&args, CompletionPolicy::Loop), Millis(60_000.0));
        assert_eq!(
            run_end(&args, CompletionPolicy::OneShot),
            Millis(f64::INFINITY)
        );
    }

    #[test]
    fn rejects_views_without_a_projection() {
        for extra in [
            ["--zoom", "NaN"],
            ["--zoom", "1e300"],
            ["--width", "0"],
            ["--height", "inf"],
            ["--load-at-ms", "NaN"],
        ] {
            let mut argv = vec!["trip-replay"];
            argv.extend(extra);
            let args = Args::try_parse_from(argv).expect("parses");
            assert!(check_args(&args).is_err(), "{extra:?} accepted");
        }
        let args = Args::try_parse_from(["trip-replay"]).expect("defaults");
        assert_eq!(check_args(&args), Ok(()));
    }

    #[test]
    fn unplaceable_chunk_is_an_error() {
        let mut root = std::env::temp_dir();
        root.push(format!("trip_replay_unplaceable_{}", std::process::id()));
        let path = root.join(ChunkKey::new(0, 0).relative_path());
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature",
                 "geometry": {"type": "LineString", "coordinates": [[0.1, 52.2], [0.2, 52.3]]},
                 "properties": {"start_offset": 0, "trip_cum_seconds": [10]}}
            ]}"#,
        )
        .expect("write chunk");

        let view = Viewport::new(
            LonLat::new(0.121, 52.205),
            f64::NAN,
            Vec2::new(800.0, 600.0),
        );
        let mut engine = TripEngine::new(PlaybackConfig::default(), view, MemoryOverlay::new())
            .expect("valid config");
        let mut source = DirTripSource::new(&root);
        let err = load_all(&mut engine, &mut source, &[ChunkKey::new(0, 0)]).expect_err("stalled");
        assert!(err.contains("none could be placed"), "{err}");
    }

    #[test]
    fn cli_rejects_bad_chunk() {
        assert!(Args::try_parse_from(["trip-replay", "--chunk", "0/24"]).is_err());
    }
}
