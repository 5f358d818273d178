//! Simulated host media
//!
//! Elements advance a virtual playhead on a tokio interval instead of decoding
//! anything. Durations come from the session, so track files end and
//! manifests run out exactly where the timeline says they do.

use shelf_core::PlaybackSession;
use shelf_playback::{
    BufferedRange, MediaBackend, MediaElement, MediaEvent, MediaEventSink, MediaSource,
    PlayStrategy, PlaybackError, Result,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Seconds of media covered by one stream fragment
const FRAGMENT_SECONDS: f64 = 10.0;

/// How far ahead of the playhead data is "downloaded"
const READ_AHEAD_SECONDS: f64 = 30.0;

/// Knobs for the simulated host
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Wall-clock interval between element updates
    pub tick: Duration,
    /// Simulated seconds per wall-clock second
    pub time_scale: f64,
    /// Stream fragment that fails once before loading
    pub fail_fragment: Option<u64>,
}

/// Hands out simulated elements for the addresses of one session
pub struct SimulatedBackend {
    durations: HashMap<String, f64>,
    options: SimOptions,
}

impl SimulatedBackend {
    /// Know every address the session can be played from, under either strategy
    pub fn for_session(session: &PlaybackSession, options: SimOptions) -> Self {
        let mut durations: HashMap<String, f64> = session
            .tracks()
            .iter()
            .map(|track| (track.resolve_address(session.id()), track.duration))
            .collect();
        durations.insert(session.manifest_address(), session.total_duration());

        Self { durations, options }
    }
}

impl MediaBackend for SimulatedBackend {
    fn create_element(
        &self,
        strategy: PlayStrategy,
        events: MediaEventSink,
    ) -> Result<Box<dyn MediaElement>> {
        let runtime = Handle::try_current()
            .map_err(|e| PlaybackError::Backend(format!("no runtime for simulated element: {e}")))?;

        let state = Arc::new(Mutex::new(SimState {
            durations: self.durations.clone(),
            fail_fragment: self.options.fail_fragment,
            ..SimState::default()
        }));

        let step = self.options.tick.as_secs_f64() * self.options.time_scale;
        let task = runtime.spawn(drive(Arc::clone(&state), events, self.options.tick, step));

        debug!(%strategy, "Simulated element created");
        Ok(Box::new(SimulatedElement { state, task }))
    }
}

#[derive(Debug, Default)]
struct SimState {
    durations: HashMap<String, f64>,
    source: Option<MediaSource>,
    duration: f64,
    announced: bool,
    playing: bool,
    position: f64,
    rate: f64,
    buffered: BufferedRange,
    next_fragment: u64,
    fail_fragment: Option<u64>,
    /// Failed fragment waiting for a retry request
    stalled_on: Option<u64>,
    ended: bool,
    released: bool,
}

impl SimState {
    fn is_manifest(&self) -> bool {
        matches!(self.source, Some(MediaSource::Manifest { .. }))
    }

    /// Advance by `step` simulated seconds and report what happened
    fn advance(&mut self, step: f64) -> Vec<MediaEvent> {
        let mut events = Vec::new();
        if self.source.is_none() || self.ended {
            return events;
        }

        if !self.announced {
            self.announced = true;
            events.push(MediaEvent::LoadedMetadata {
                duration: self.duration,
            });
            return events;
        }

        self.fill_buffer(&mut events);

        if self.playing {
            // Playback stalls at the edge of downloaded data
            let limit = self.buffered.end.min(self.duration);
            self.position = (self.position + step * self.rate).min(limit);
            events.push(MediaEvent::TimeUpdate {
                position: self.position,
            });

            if self.position >= self.duration {
                self.playing = false;
                self.ended = true;
                events.push(MediaEvent::Ended);
            }
        }

        events
    }

    fn fill_buffer(&mut self, events: &mut Vec<MediaEvent>) {
        let target = (self.position + READ_AHEAD_SECONDS).min(self.duration);
        if target <= self.buffered.end {
            return;
        }

        if !self.is_manifest() {
            self.buffered.end = target;
            events.push(MediaEvent::Progress);
            return;
        }

        if self.stalled_on.is_some() {
            return;
        }

        while (self.next_fragment as f64) * FRAGMENT_SECONDS < target {
            let fragment = self.next_fragment;
            if self.fail_fragment == Some(fragment) {
                self.fail_fragment = None;
                self.stalled_on = Some(fragment);
                events.push(MediaEvent::FragmentError {
                    fragment,
                    status: Some(503),
                });
                return;
            }

            self.next_fragment += 1;
            self.buffered.end = ((fragment + 1) as f64 * FRAGMENT_SECONDS).min(self.duration);
            events.push(MediaEvent::FragmentLoaded { fragment });
        }
    }
}

async fn drive(state: Arc<Mutex<SimState>>, sink: MediaEventSink, tick: Duration, step: f64) {
    let mut interval = tokio::time::interval(tick);
    loop {
        interval.tick().await;

        let events = {
            let mut state = lock(&state);
            if state.released {
                break;
            }
            state.advance(step)
        };

        for event in events {
            trace!(?event, "Simulated element event");
            if !sink.emit(event) {
                return;
            }
        }
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SimulatedElement {
    state: Arc<Mutex<SimState>>,
    task: JoinHandle<()>,
}

impl SimulatedElement {
    fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }
}

impl MediaElement for SimulatedElement {
    fn load(&mut self, source: &MediaSource) {
        let mut guard = self.state();
        let state = &mut *guard;
        state.duration = state
            .durations
            .get(source.address())
            .copied()
            .unwrap_or_default();
        state.position = match source {
            MediaSource::Manifest { start_position, .. } => start_position.clamp(0.0, state.duration),
            MediaSource::File { .. } => 0.0,
        };
        state.next_fragment = (state.position / FRAGMENT_SECONDS).floor() as u64;
        let start = state.next_fragment as f64 * FRAGMENT_SECONDS;
        state.buffered = BufferedRange::new(start, start);
        state.announced = false;
        state.ended = false;
        state.source = Some(source.clone());
        if state.rate == 0.0 {
            state.rate = 1.0;
        }
    }

    fn play(&mut self) {
        self.state().playing = true;
    }

    fn pause(&mut self) {
        self.state().playing = false;
    }

    fn seek(&mut self, position: f64) {
        let mut guard = self.state();
        let state = &mut *guard;
        let position = position.clamp(0.0, state.duration);
        state.position = position;
        state.ended = false;

        let inside = state.buffered.start <= position && position <= state.buffered.end;
        if !inside {
            state.next_fragment = (position / FRAGMENT_SECONDS).floor() as u64;
            let start = if state.is_manifest() {
                state.next_fragment as f64 * FRAGMENT_SECONDS
            } else {
                position
            };
            state.buffered = BufferedRange::new(start, start);
            state.stalled_on = None;
        }
    }

    fn current_time(&self) -> f64 {
        self.state().position
    }

    fn buffered(&self) -> Vec<BufferedRange> {
        let state = self.state();
        if state.buffered.end > state.buffered.start {
            vec![state.buffered]
        } else {
            Vec::new()
        }
    }

    fn set_volume(&mut self, volume: f64) {
        trace!(volume, "Simulated volume");
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.state().rate = rate;
    }

    fn retry_fragment(&mut self, fragment: u64) {
        let mut state = self.state();
        if state.stalled_on == Some(fragment) {
            state.stalled_on = None;
        }
    }

    fn release(&mut self) {
        self.state().released = true;
        self.task.abort();
    }
}
