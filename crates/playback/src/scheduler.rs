//! Per-trip playback timing.
//!
//! Each trip gets a [`PlaybackHandle`] once its path exists. A handle never
//! stores progress: the phase is recomputed from the playback clock on every
//! tick, which is what keeps animations continuous across viewport syncs and
//! lets tests drive playback with synthetic clock values.

use std::collections::BTreeMap;

use foundation::math::Vec2;
use foundation::time::{Millis, TimeSpan};

use crate::config::{CompletionPolicy, Easing, PlaybackConfig, TimingPolicy};
use crate::overlay::DashStyle;
use crate::path::RenderedPath;
use crate::trip::{LoadedSet, Trip, TripId, TripState};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PlaybackHandle {
    pub delay: Millis,
    pub duration: Millis,
    pub trace_length: f64,
    pub started_at: Millis,
    // Last sweep cycle reported; only advances under the loop policy.
    cycle: u64,
}

/// Where a handle is at a given instant.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Phase {
    Waiting,
    /// `fraction` is linear progress through the current sweep.
    Sweeping { fraction: f64, cycle: u64 },
    Finished,
}

impl PlaybackHandle {
    pub fn for_trip(trip: &Trip, config: &PlaybackConfig, started_at: Millis) -> Self {
        let (delay, duration) = match config.timing {
            TimingPolicy::FromTrip => (
                config.scale(trip.start_offset()),
                config.scale(trip.total_seconds()),
            ),
            TimingPolicy::Fixed { duration_ms } => (Millis::ZERO, Millis(duration_ms)),
        };
        Self {
            delay,
            duration,
            trace_length: config.trace_length,
            started_at,
            cycle: 0,
        }
    }

    /// Playback-clock span of the first sweep.
    pub fn first_sweep(&self) -> TimeSpan {
        TimeSpan::starting_at(self.started_at + self.delay, self.duration)
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn phase_at(&self, now: Millis, completion: CompletionPolicy) -> Phase {
        let sweep = self.first_sweep();
        if now < sweep.start {
            return Phase::Waiting;
        }
        let duration = sweep.duration().0;
        if duration <= 0.0 {
            return Phase::Finished;
        }

        let elapsed = (now - sweep.start).0;
        match completion {
            CompletionPolicy::OneShot if sweep.contains(now) => Phase::Sweeping {
                fraction: elapsed / duration,
                cycle: 0,
            },
            CompletionPolicy::OneShot => Phase::Finished,
            CompletionPolicy::Loop => {
                let cycle = (elapsed / duration).floor();
                Phase::Sweeping {
                    fraction: (elapsed - cycle * duration) / duration,
                    cycle: cycle as u64,
                }
            }
        }
    }
}

/// Dash offset for eased progress `eased`: `+trace_length` at the start,
/// `-(path_length - trace_length)` at the end.
pub fn trace_offset(trace_length: f64, path_length: f64, eased: f64) -> f64 {
    let from = trace_length;
    let to = -(path_length - trace_length);
    from + (to - from) * eased
}

/// What the overlay shows for one trip at one instant.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TraceFrame {
    pub trip: TripId,
    pub state: TripState,
    /// Linear progress of the current sweep, in `[0, 1]`.
    pub fraction: f64,
    pub dash: DashStyle,
    /// Leading end of the trace window.
    pub head: Option<Vec2>,
}

impl TraceFrame {
    pub fn compute(
        trip: TripId,
        state: TripState,
        fraction: f64,
        path: &RenderedPath,
        trace_length: f64,
        easing: Easing,
    ) -> Self {
        let eased = easing.apply(fraction);
        let length = path.length();
        Self {
            trip,
            state,
            fraction,
            dash: DashStyle {
                dash_array: [trace_length, length],
                dash_offset: trace_offset(trace_length, length, eased),
            },
            head: path.point_at_length(length * eased),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    Started(TripId),
    Looped { trip: TripId, cycle: u64 },
    Completed(TripId),
}

/// Owns every live playback handle.
#[derive(Debug, Default)]
pub struct Scheduler {
    handles: BTreeMap<TripId, PlaybackHandle>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handle(&self, trip: TripId) -> Option<&PlaybackHandle> {
        self.handles.get(&trip)
    }

    pub fn handles(&self) -> impl Iterator<Item = (TripId, &PlaybackHandle)> {
        self.handles.iter().map(|(id, h)| (*id, h))
    }

    /// Returns `false` if the trip already has a handle.
    pub fn start(&mut self, trip: TripId, handle: PlaybackHandle) -> bool {
        if self.handles.contains_key(&trip) {
            return false;
        }
        self.handles.insert(trip, handle);
        true
    }

    /// Drops the handle; no further transitions are produced for `trip`.
    pub fn cancel(&mut self, trip: TripId) -> bool {
        self.handles.remove(&trip).is_some()
    }

    pub fn fraction_at(
        &self,
        trip: TripId,
        now: Millis,
        completion: CompletionPolicy,
    ) -> Option<f64> {
        match self.handles.get(&trip)?.phase_at(now, completion) {
            Phase::Sweeping { fraction, .. } => Some(fraction),
            Phase::Waiting | Phase::Finished => None,
        }
    }

    /// Evaluates every handle at `now` and moves trip states forward.
    ///
    /// Transitions come out in load order. A trip that crosses several
    /// states within one call reports each of them, except that a
    /// zero-duration trip goes straight to `Completed`. Finished handles are
    /// discarded.
    pub fn advance(
        &mut self,
        now: Millis,
        completion: CompletionPolicy,
        trips: &mut LoadedSet,
    ) -> Vec<Transition> {
        let mut out = Vec::new();
        let mut finished = Vec::new();

        for (&id, handle) in self.handles.iter_mut() {
            let Some(trip) = trips.get_mut(id) else {
                finished.push(id);
                continue;
            };

            match handle.phase_at(now, completion) {
                Phase::Waiting => {}
                Phase::Sweeping { cycle, .. } => {
                    if trip.state() == TripState::NotStarted {
                        trip.set_state(TripState::Running);
                        out.push(Transition::Started(id));
                    }
                    if cycle > handle.cycle {
                        handle.cycle = cycle;
                        out.push(Transition::Looped { trip: id, cycle });
                    }
                }
                Phase::Finished => {
                    if trip.state() == TripState::NotStarted && handle.duration.0 > 0.0 {
                        out.push(Transition::Started(id));
                    }
                    trip.set_state(TripState::Complete);
                    out.push(Transition::Completed(id));
                    finished.push(id);
                }
            }
        }

        for id in finished {
            self.handles.remove(&id);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{Phase, PlaybackHandle, Scheduler, TraceFrame, Transition, trace_offset};
    use crate::config::{CompletionPolicy, Easing, PlaybackConfig, TimingPolicy};
    use crate::path::RenderedPath;
    use crate::trip::tests::record;
    use crate::trip::{LoadedSet, Trip, TripId, TripKey, TripState};
    use foundation::math::Vec2;
    use foundation::time::Millis;
    use pretty_assertions::assert_eq;
    use streaming::ChunkKey;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn trip(id: u64, start_offset: f64, secs: &[f64]) -> Trip {
        let points: Vec<(f64, f64)> = (0..=secs.len())
            .map(|i| (0.1 + i as f64 * 0.01, 52.2))
            .collect();
        Trip::from_record(
            TripId(id),
            TripKey {
                chunk: ChunkKey::new(0, 0),
                index: id as usize,
                feature_id: None,
            },
            record(&points, start_offset, secs),
        )
        .expect("valid trip")
    }

    fn config(time_factor: f64, completion: CompletionPolicy) -> PlaybackConfig {
        PlaybackConfig {
            time_factor,
            completion,
            ..PlaybackConfig::default()
        }
    }

    fn setup(trips: Vec<Trip>, config: &PlaybackConfig) -> (LoadedSet, Scheduler) {
        let mut set = LoadedSet::new();
        let mut sched = Scheduler::new();
        for t in trips {
            sched.start(t.id(), PlaybackHandle::for_trip(&t, config, Millis::ZERO));
            set.push(t);
        }
        (set, sched)
    }

    fn state(set: &LoadedSet, id: u64) -> TripState {
        set.get(TripId(id)).expect("loaded").state()
    }

    #[test]
    fn handle_scales_trip_timing() {
        let t = trip(1, 5.0, &[4.0, 10.0]);
        let h = PlaybackHandle::for_trip(&t, &config(100.0, CompletionPolicy::OneShot), Millis(20.0));
        assert_eq!(h.delay, Millis(500.0));
        assert_eq!(h.duration, Millis(1000.0));
        assert_eq!(h.first_sweep().start, Millis(520.0));
        assert_eq!(h.first_sweep().end, Millis(1520.0));
    }

    #[test]
    fn fixed_timing_ignores_trip_metadata() {
        let t = trip(1, 5.0, &[10.0]);
        let cfg = PlaybackConfig {
            timing: TimingPolicy::Fixed {
                duration_ms: 60_000.0,
            },
            ..PlaybackConfig::default()
        };
        let h = PlaybackHandle::for_trip(&t, &cfg, Millis::ZERO);
        assert_eq!(h.delay, Millis::ZERO);
        assert_eq!(h.duration, Millis(60_000.0));
    }

    #[test]
    fn enters_running_and_complete_exactly_on_time() {
        let cfg = config(100.0, CompletionPolicy::OneShot);
        let (mut set, mut sched) = setup(vec![trip(1, 5.0, &[10.0])], &cfg);

        assert!(sched.advance(Millis(499.0), cfg.completion, &mut set).is_empty());
        assert_eq!(state(&set, 1), TripState::NotStarted);

        let t = sched.advance(Millis(500.0), cfg.completion, &mut set);
        assert_eq!(t, vec![Transition::Started(TripId(1))]);
        assert_eq!(state(&set, 1), TripState::Running);

        assert!(sched.advance(Millis(1499.0), cfg.completion, &mut set).is_empty());
        assert_eq!(state(&set, 1), TripState::Running);

        let t = sched.advance(Millis(1500.0), cfg.completion, &mut set);
        assert_eq!(t, vec![Transition::Completed(TripId(1))]);
        assert_eq!(state(&set, 1), TripState::Complete);
        assert!(sched.is_empty());
    }

    #[test]
    fn zero_duration_trip_is_never_running() {
        let cfg = config(100.0, CompletionPolicy::OneShot);
        let (mut set, mut sched) = setup(vec![trip(1, 0.0, &[0.0]), trip(2, 0.0, &[])], &cfg);

        let t = sched.advance(Millis::ZERO, cfg.completion, &mut set);
        assert_eq!(
            t,
            vec![
                Transition::Completed(TripId(1)),
                Transition::Completed(TripId(2))
            ]
        );
        assert_eq!(state(&set, 1), TripState::Complete);
        assert_eq!(state(&set, 2), TripState::Complete);
    }

    #[test]
    fn zero_duration_trip_completes_even_when_looping() {
        let cfg = config(100.0, CompletionPolicy::Loop);
        let (mut set, mut sched) = setup(vec![trip(1, 1.0, &[0.0])], &cfg);
        assert!(sched.advance(Millis(50.0), cfg.completion, &mut set).is_empty());
        let t = sched.advance(Millis(100.0), cfg.completion, &mut set);
        assert_eq!(t, vec![Transition::Completed(TripId(1))]);
    }

    #[test]
    fn coarse_tick_reports_start_before_completion() {
        let cfg = config(100.0, CompletionPolicy::OneShot);
        let (mut set, mut sched) = setup(vec![trip(1, 1.0, &[2.0])], &cfg);
        let t = sched.advance(Millis(10_000.0), cfg.completion, &mut set);
        assert_eq!(
            t,
            vec![
                Transition::Started(TripId(1)),
                Transition::Completed(TripId(1))
            ]
        );
    }

    #[test]
    fn looping_restarts_without_delay() {
        let cfg = config(1000.0, CompletionPolicy::Loop);
        let (mut set, mut sched) = setup(vec![trip(1, 0.0, &[1.0])], &cfg);

        sched.advance(Millis(0.0), cfg.completion, &mut set);
        let t = sched.advance(Millis(2500.0), cfg.completion, &mut set);
        assert_eq!(
            t,
            vec![Transition::Looped {
                trip: TripId(1),
                cycle: 2
            }]
        );
        assert_eq!(state(&set, 1), TripState::Running);
        let fraction = sched
            .fraction_at(TripId(1), Millis(2500.0), cfg.completion)
            .expect("sweeping");
        assert_close(fraction, 0.5, 1e-9);
        assert_eq!(sched.handle(TripId(1)).expect("kept").cycle(), 2);
    }

    #[test]
    fn looping_with_delay_only_waits_once() {
        let cfg = config(1000.0, CompletionPolicy::Loop);
        let (_, sched) = setup(vec![trip(1, 2.0, &[1.0])], &cfg);
        let h = sched.handle(TripId(1)).expect("handle");
        assert_eq!(h.phase_at(Millis(1999.0), cfg.completion), Phase::Waiting);
        assert_eq!(
            h.phase_at(Millis(3250.0), cfg.completion),
            Phase::Sweeping {
                fraction: 0.25,
                cycle: 1
            }
        );
    }

    #[test]
    fn cancelled_trip_produces_no_transitions() {
        let cfg = config(100.0, CompletionPolicy::OneShot);
        let (mut set, mut sched) = setup(vec![trip(1, 0.0, &[1.0]), trip(2, 0.0, &[1.0])], &cfg);
        assert!(sched.cancel(TripId(1)));
        assert!(!sched.cancel(TripId(1)));
        let t = sched.advance(Millis(10.0), cfg.completion, &mut set);
        assert_eq!(t, vec![Transition::Started(TripId(2))]);
        assert_eq!(state(&set, 1), TripState::NotStarted);
    }

    #[test]
    fn start_is_idempotent() {
        let cfg = PlaybackConfig::default();
        let t = trip(1, 0.0, &[1.0]);
        let mut sched = Scheduler::new();
        assert!(sched.start(t.id(), PlaybackHandle::for_trip(&t, &cfg, Millis(5.0))));
        assert!(!sched.start(t.id(), PlaybackHandle::for_trip(&t, &cfg, Millis(99.0))));
        assert_eq!(sched.handle(t.id()).expect("handle").started_at, Millis(5.0));
    }

    #[test]
    fn trace_offset_sweeps_from_start_to_end() {
        assert_eq!(trace_offset(20.0, 200.0, 0.0), 20.0);
        assert_eq!(trace_offset(20.0, 200.0, 1.0), -180.0);
        assert_eq!(trace_offset(20.0, 200.0, 0.5), -80.0);
    }

    #[test]
    fn trace_frame_tracks_head() {
        let path = RenderedPath::from_points(vec![Vec2::ZERO, Vec2::new(100.0, 0.0)]);
        let frame = TraceFrame::compute(
            TripId(1),
            TripState::Running,
            0.25,
            &path,
            20.0,
            Easing::Linear,
        );
        assert_eq!(frame.dash.dash_array, [20.0, 100.0]);
        assert_eq!(frame.dash.dash_offset, -5.0);
        assert_eq!(frame.head, Some(Vec2::new(25.0, 0.0)));
    }
}
