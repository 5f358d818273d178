//! Playback engine
//!
//! Owns the session, the active adapter and the player state machine, and
//! presents a single global timeline to callers no matter how the media is
//! delivered.
//!
//! Host events and timers never touch the state directly. They are queued as
//! generation-stamped signals and applied one at a time by a pump task, so
//! the engine sees them in emission order and anything from a released
//! element, a cancelled timer or a destroyed engine is dropped.

use crate::adapter::{
    AdaptiveStreamAdapter, AdapterEvent, DirectPlayAdapter, LoadTarget, MediaAdapter,
};
use crate::buffer::buffered_until;
use crate::config::{PlayerConfig, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE};
use crate::error::{PlaybackError, Result};
use crate::events::{EventRegistry, PlayerEvent};
use crate::media::{Dispatcher, Envelope, MediaBackend, Signal};
use crate::types::PlayerState;
use shelf_core::{PlayStrategy, PlaybackSession, SessionId, Track, TrackPosition};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// MIME type announced for stream manifests
const MANIFEST_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

/// Local playback engine
///
/// Methods take `&self`; the engine can be shared behind an `Arc`. It must be
/// created inside a Tokio runtime, which runs its signal pump and timers.
///
/// # Example
///
/// ```rust,ignore
/// let engine = PlaybackEngine::new(backend, PlayerConfig::default())?;
/// let mut events = engine.subscribe();
///
/// engine.set("session-1", tracks, PlayStrategy::DirectPlay, 120.0, true)?;
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// ```
pub struct PlaybackEngine {
    inner: Arc<Mutex<EngineInner>>,
}

struct EngineInner {
    config: PlayerConfig,
    backend: Arc<dyn MediaBackend>,
    runtime: Handle,
    dispatcher: Dispatcher,
    registry: EventRegistry,

    session: Option<PlaybackSession>,
    /// Track and local offset; authoritative while no adapter is ready
    position: TrackPosition,
    adapter: Option<Box<dyn MediaAdapter>>,
    state: PlayerState,

    /// Caller wants playback running
    play_intent: bool,
    /// Report Paused rather than Loaded after the next reload
    resume_paused: bool,
    /// Play intent held when playback last failed; restored by a stream reset
    resume_after_recovery: bool,

    volume: f64,
    rate: f64,

    recovery: Option<JoinHandle<()>>,
    last_paused_update: Option<Instant>,
    pump: Option<JoinHandle<()>>,
    destroyed: bool,
}

impl PlaybackEngine {
    /// Create an engine that obtains media elements from `backend`
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or no Tokio runtime
    /// is running.
    pub fn new(backend: Arc<dyn MediaBackend>, config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            PlaybackError::Backend(format!("playback engine needs a Tokio runtime: {e}"))
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Mutex::new(EngineInner {
            volume: config.volume,
            rate: config.playback_rate,
            config,
            backend,
            runtime: runtime.clone(),
            dispatcher: Dispatcher::new(tx),
            registry: EventRegistry::default(),
            session: None,
            position: TrackPosition {
                index: 0,
                local_time: 0.0,
            },
            adapter: None,
            state: PlayerState::Uninitialized,
            play_intent: false,
            resume_paused: false,
            resume_after_recovery: false,
            recovery: None,
            last_paused_update: None,
            pump: None,
            destroyed: false,
        }));

        let pump = runtime.spawn(run_pump(Arc::downgrade(&inner), rx));
        lock(&inner).pump = Some(pump);

        Ok(Self { inner })
    }

    fn lock(&self) -> MutexGuard<'_, EngineInner> {
        lock(&self.inner)
    }

    /// Receive every event emitted from now on
    ///
    /// The receiver ends once the engine is destroyed.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PlayerEvent> {
        let mut inner = self.lock();
        if inner.destroyed {
            let (_, rx) = mpsc::unbounded_channel();
            return rx;
        }
        inner.registry.subscribe()
    }

    /// Configure a session and start loading it
    ///
    /// Replaces any previous session. `start_time` is global; the track that
    /// contains it is loaded at the matching local offset.
    ///
    /// # Errors
    /// Returns [`PlaybackError::InvalidSession`] without touching the current
    /// session if the track list is empty or malformed. Failures while
    /// loading media are reported as an [`PlayerEvent::Error`] instead.
    pub fn set(
        &self,
        session_id: impl Into<SessionId>,
        tracks: Vec<Track>,
        strategy: PlayStrategy,
        start_time: f64,
        autoplay: bool,
    ) -> Result<()> {
        let session = PlaybackSession::new(session_id.into(), tracks, strategy)?;
        self.set_session(session, start_time, autoplay)
    }

    /// Same as [`PlaybackEngine::set`] for an already validated session
    pub fn set_session(
        &self,
        session: PlaybackSession,
        start_time: f64,
        autoplay: bool,
    ) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_alive()?;
        inner.set_session(session, start_time, autoplay);
        Ok(())
    }

    /// Start or resume playback
    ///
    /// Before the media is ready this only records the intent to play.
    pub fn play(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_playable()?;
        inner.play();
        Ok(())
    }

    /// Pause playback
    pub fn pause(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_playable()?;
        inner.pause();
        Ok(())
    }

    /// Toggle between playing and paused
    pub fn play_pause(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_playable()?;
        if inner.play_intent {
            inner.pause();
        } else {
            inner.play();
        }
        Ok(())
    }

    /// Jump to a global time
    ///
    /// The target is clamped onto the timeline. With `resume_after_seek`
    /// playback continues (or starts) once the target is playable.
    ///
    /// # Errors
    /// Returns [`PlaybackError::InvalidArgument`] for a non-finite target and
    /// [`PlaybackError::InvalidState`] once playback finished or failed.
    pub fn seek(&self, time: f64, resume_after_seek: bool) -> Result<()> {
        if !time.is_finite() {
            return Err(PlaybackError::InvalidArgument(format!(
                "seek target must be finite, got {time}"
            )));
        }

        let mut inner = self.lock();
        inner.ensure_playable()?;
        inner.seek(time, resume_after_seek);
        Ok(())
    }

    /// Change the playback speed
    ///
    /// # Errors
    /// Returns [`PlaybackError::InvalidArgument`] outside 0.25 - 4.0.
    pub fn set_playback_rate(&self, rate: f64) -> Result<()> {
        if !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&rate) {
            return Err(PlaybackError::InvalidArgument(format!(
                "playback rate must be between {MIN_PLAYBACK_RATE} and {MAX_PLAYBACK_RATE}, got {rate}"
            )));
        }

        let mut inner = self.lock();
        inner.ensure_alive()?;
        inner.rate = rate;
        if let Some(adapter) = inner.adapter.as_mut() {
            adapter.set_playback_rate(rate);
        }
        debug!(rate, "Playback rate changed");
        Ok(())
    }

    /// Change the output volume, clamped to 0.0 - 1.0
    pub fn set_volume(&self, volume: f64) -> Result<()> {
        if volume.is_nan() {
            return Err(PlaybackError::InvalidArgument(
                "volume must be a number".to_string(),
            ));
        }

        let volume = volume.clamp(0.0, 1.0);
        let mut inner = self.lock();
        inner.ensure_alive()?;
        inner.volume = volume;
        if let Some(adapter) = inner.adapter.as_mut() {
            adapter.set_volume(volume);
        }
        Ok(())
    }

    /// Current global position (seconds)
    pub fn current_time(&self) -> f64 {
        self.lock().current_time()
    }

    /// Length of the whole timeline, or 0 without a session
    pub fn duration(&self) -> f64 {
        self.lock()
            .session
            .as_ref()
            .map_or(0.0, PlaybackSession::total_duration)
    }

    /// Tear down the media and rebuild it after a grace period
    ///
    /// The replacement uses the other delivery strategy and starts at the
    /// global time `start`. Play intent carries over.
    pub fn reset_stream(&self, start: f64) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_alive()?;
        let strategy = inner
            .session
            .as_ref()
            .ok_or(PlaybackError::NoSession)?
            .strategy()
            .alternate();
        inner.begin_recovery(start, strategy)
    }

    /// Like [`PlaybackEngine::reset_stream`] with an explicit strategy
    pub fn reset_stream_with(&self, start: f64, strategy: PlayStrategy) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_alive()?;
        inner.begin_recovery(start, strategy)
    }

    /// Release everything and stop emitting events
    ///
    /// Synchronous and idempotent. Pending timers are cancelled and late host
    /// callbacks are ignored; every other method fails with
    /// [`PlaybackError::Destroyed`] afterwards.
    pub fn destroy(&self) {
        self.lock().destroy();
    }

    /// Current player state
    pub fn state(&self) -> PlayerState {
        self.lock().state
    }

    /// Index of the track being played, if a session is set
    pub fn current_track_index(&self) -> Option<usize> {
        let inner = self.lock();
        inner.session.as_ref().map(|_| inner.position.index)
    }

    /// Delivery strategy of the current session
    pub fn strategy(&self) -> Option<PlayStrategy> {
        self.lock().session.as_ref().map(PlaybackSession::strategy)
    }

    /// Current output volume
    pub fn volume(&self) -> f64 {
        self.lock().volume
    }

    /// Current playback speed
    pub fn playback_rate(&self) -> f64 {
        self.lock().rate
    }

    /// Identifier of the current session
    pub fn session_id(&self) -> Option<SessionId> {
        self.lock().session.as_ref().map(|s| s.id().clone())
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn lock(inner: &Mutex<EngineInner>) -> MutexGuard<'_, EngineInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply queued signals until the engine goes away
async fn run_pump(inner: Weak<Mutex<EngineInner>>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = rx.recv().await {
        if !deliver(&inner, envelope) {
            break;
        }
    }
    trace!("Signal pump stopped");
}

fn deliver(inner: &Weak<Mutex<EngineInner>>, envelope: Envelope) -> bool {
    let Some(engine) = inner.upgrade() else {
        return false;
    };
    let mut state = lock(&engine);
    if state.destroyed {
        return false;
    }
    state.dispatch(envelope);
    true
}

/// Where a session starts: the containing track for direct play, the single
/// manifest for adaptive streams
fn initial_position(session: &PlaybackSession, start: f64) -> TrackPosition {
    match session.strategy() {
        PlayStrategy::DirectPlay => session.locate(start),
        PlayStrategy::AdaptiveStream => {
            let first = session.track(0).map_or(0.0, |t| t.start_offset);
            let start = if start.is_nan() { 0.0 } else { start };
            TrackPosition {
                index: 0,
                local_time: start.clamp(first, session.total_duration()) - first,
            }
        }
    }
}

impl EngineInner {
    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(PlaybackError::Destroyed);
        }
        Ok(())
    }

    fn ensure_playable(&self) -> Result<()> {
        self.ensure_alive()?;
        if self.session.is_none() {
            return Err(PlaybackError::NoSession);
        }
        if self.state.is_terminal() {
            return Err(PlaybackError::InvalidState(format!(
                "playback is {}",
                self.state
            )));
        }
        Ok(())
    }

    fn set_state(&mut self, state: PlayerState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "Player state changed");
        self.state = state;
        self.registry.emit(PlayerEvent::StateChange(state));
    }

    fn track_start(&self) -> f64 {
        self.session
            .as_ref()
            .and_then(|s| s.track(self.position.index))
            .map_or(0.0, |t| t.start_offset)
    }

    fn current_time(&self) -> f64 {
        let local = self
            .adapter
            .as_ref()
            .map_or(self.position.local_time, |adapter| adapter.local_time());
        self.track_start() + local
    }

    // ===== Session & adapter lifecycle =====

    fn set_session(&mut self, session: PlaybackSession, start_time: f64, autoplay: bool) {
        self.cancel_recovery();
        self.dispose_adapter();

        if session.strategy() == PlayStrategy::DirectPlay && !session.is_gapless() {
            warn!(session = %session.id(), "Track list has gaps or overlaps");
        }

        self.position = initial_position(&session, start_time);
        info!(
            session = %session.id(),
            strategy = %session.strategy(),
            tracks = session.len(),
            track = self.position.index,
            local_time = self.position.local_time,
            "Session set"
        );

        self.session = Some(session);
        self.play_intent = autoplay;
        self.resume_paused = false;
        self.resume_after_recovery = false;
        self.last_paused_update = None;

        // Announced even when already uninitialized: a new session starts here
        debug!(from = %self.state, to = %PlayerState::Uninitialized, "Player state changed");
        self.state = PlayerState::Uninitialized;
        self.registry
            .emit(PlayerEvent::StateChange(PlayerState::Uninitialized));

        self.initialize_adapter();
    }

    fn create_adapter(&self, strategy: PlayStrategy) -> Box<dyn MediaAdapter> {
        match strategy {
            PlayStrategy::DirectPlay => Box::new(DirectPlayAdapter::new(
                Arc::clone(&self.backend),
                self.dispatcher.clone(),
                self.volume,
                self.rate,
            )),
            PlayStrategy::AdaptiveStream => Box::new(AdaptiveStreamAdapter::new(
                Arc::clone(&self.backend),
                self.dispatcher.clone(),
                self.runtime.clone(),
                self.config.fragment_retry.clone(),
                self.volume,
                self.rate,
            )),
        }
    }

    fn initialize_adapter(&mut self) {
        let Some(strategy) = self.session.as_ref().map(PlaybackSession::strategy) else {
            return;
        };
        self.adapter = Some(self.create_adapter(strategy));
        if let Err(e) = self.load_current() {
            self.fail(e);
        }
    }

    /// Load the current position into the adapter and apply play intent
    fn load_current(&mut self) -> Result<()> {
        let session = self.session.as_ref().ok_or(PlaybackError::NoSession)?;
        let target = match session.strategy() {
            PlayStrategy::DirectPlay => {
                let track = session.track(self.position.index).ok_or_else(|| {
                    PlaybackError::InvalidState(format!(
                        "no track at position {}",
                        self.position.index
                    ))
                })?;
                LoadTarget {
                    address: track.resolve_address(session.id()),
                    mime_type: track.mime_type.clone(),
                }
            }
            PlayStrategy::AdaptiveStream => LoadTarget {
                address: session.manifest_address(),
                mime_type: MANIFEST_MIME_TYPE.to_string(),
            },
        };

        let adapter = self
            .adapter
            .as_mut()
            .ok_or_else(|| PlaybackError::InvalidState("no media adapter".to_string()))?;
        adapter.load(target, self.position.local_time)?;
        if self.play_intent {
            adapter.play();
        } else {
            adapter.pause();
        }
        Ok(())
    }

    fn dispose_adapter(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            adapter.dispose();
            trace!(strategy = %adapter.strategy(), "Media adapter disposed");
        }
        self.dispatcher.invalidate();
    }

    fn cancel_recovery(&mut self) {
        if let Some(task) = self.recovery.take() {
            task.abort();
            debug!("Pending stream recovery cancelled");
        }
    }

    fn begin_recovery(&mut self, start: f64, strategy: PlayStrategy) -> Result<()> {
        if !start.is_finite() {
            return Err(PlaybackError::InvalidArgument(format!(
                "recovery start must be finite, got {start}"
            )));
        }
        let session = self
            .session
            .as_ref()
            .ok_or(PlaybackError::NoSession)?
            .with_strategy(strategy);

        self.cancel_recovery();
        self.dispose_adapter();

        if self.state == PlayerState::Error {
            self.play_intent = self.resume_after_recovery;
        }
        self.resume_after_recovery = false;
        self.resume_paused = self.state == PlayerState::Paused;
        let start = start.clamp(0.0, session.total_duration());
        self.position = initial_position(&session, start);
        self.session = Some(session);
        self.set_state(PlayerState::Uninitialized);

        let grace = self.config.recovery_grace();
        info!(
            %strategy,
            start,
            grace_ms = grace.as_millis() as u64,
            "Resetting stream"
        );

        let sink = self.dispatcher.issue();
        self.recovery = Some(self.runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            sink.send(Signal::RecoveryDue);
        }));
        Ok(())
    }

    fn complete_recovery(&mut self) {
        if self.recovery.take().is_none() {
            return;
        }
        info!(
            track = self.position.index,
            local_time = self.position.local_time,
            "Rebuilding stream"
        );
        self.initialize_adapter();
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.cancel_recovery();
        self.dispose_adapter();
        self.registry.clear();
        self.session = None;
        self.play_intent = false;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        debug!("Playback engine destroyed");
    }

    // ===== Caller commands =====

    fn play(&mut self) {
        self.play_intent = true;
        self.resume_paused = false;
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        adapter.play();
        if adapter.is_ready() {
            self.set_state(PlayerState::Playing);
        }
    }

    fn pause(&mut self) {
        self.play_intent = false;
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        adapter.pause();
        if self.state == PlayerState::Playing {
            self.set_state(PlayerState::Paused);
        }
    }

    fn seek(&mut self, time: f64, resume_after_seek: bool) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let time = time.clamp(0.0, session.total_duration());
        let target = initial_position(session, time);
        let same_track = target.index == self.position.index;
        let previous = self.position;
        self.position = target;

        debug!(time, track = target.index, local_time = target.local_time, "Seeking");

        if self.adapter.is_none() {
            // Loading is pending and picks up the new position
            if resume_after_seek {
                self.play_intent = true;
            }
        } else if same_track {
            if let Some(adapter) = self.adapter.as_mut() {
                adapter.seek_local(target.local_time);
            }
            // Before ready this arms play-when-ready
            if resume_after_seek
                && matches!(
                    self.state,
                    PlayerState::Uninitialized | PlayerState::Loaded | PlayerState::Paused
                )
            {
                self.play();
            }
        } else {
            self.play_intent =
                resume_after_seek || self.play_intent || self.state == PlayerState::Playing;
            self.resume_paused = self.state == PlayerState::Paused && !self.play_intent;
            info!(from = previous.index, to = target.index, "Switching track for seek");
            if let Err(e) = self.load_current() {
                self.fail(e);
                return;
            }
        }

        self.last_paused_update = None;
        self.registry
            .emit(PlayerEvent::TimeUpdate(self.track_start() + target.local_time));
    }

    // ===== Signals =====

    fn dispatch(&mut self, envelope: Envelope) {
        if !self.dispatcher.is_current(envelope.generation) {
            trace!(generation = envelope.generation, signal = ?envelope.signal, "Dropping stale signal");
            return;
        }

        match envelope.signal {
            Signal::RecoveryDue => self.complete_recovery(),
            signal => {
                if self.state.is_terminal() {
                    trace!(state = %self.state, "Ignoring media signal");
                    return;
                }
                let event = match self.adapter.as_mut() {
                    Some(adapter) => adapter.handle_signal(signal),
                    None => return,
                };
                if let Some(event) = event {
                    self.on_adapter_event(event);
                }
            }
        }
    }

    fn on_adapter_event(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::Ready { duration } => self.on_ready(duration),
            AdapterEvent::TimeProgressed { local_time } => self.on_time_progressed(local_time),
            AdapterEvent::BufferChanged => self.on_buffer_changed(),
            AdapterEvent::Ended => self.on_ended(),
            AdapterEvent::Error(error) => self.fail(error),
        }
    }

    fn on_ready(&mut self, resource_duration: f64) {
        debug!(
            track = self.position.index,
            resource_duration, "Media ready"
        );
        self.set_state(PlayerState::Loaded);

        let total = self
            .session
            .as_ref()
            .map_or(0.0, PlaybackSession::total_duration);
        self.registry.emit(PlayerEvent::DurationChange(total));

        if self.play_intent {
            self.set_state(PlayerState::Playing);
        } else if self.resume_paused {
            self.set_state(PlayerState::Paused);
        }
        self.resume_paused = false;
    }

    fn on_time_progressed(&mut self, local_time: f64) {
        self.position.local_time = local_time;
        let global = self.track_start() + local_time;

        if self.state != PlayerState::Playing {
            let interval = self.config.paused_time_update_interval();
            let now = Instant::now();
            if let Some(last) = self.last_paused_update {
                if now.duration_since(last) < interval {
                    return;
                }
            }
            self.last_paused_update = Some(now);
        }
        self.registry.emit(PlayerEvent::TimeUpdate(global));
    }

    fn on_buffer_changed(&mut self) {
        let Some(adapter) = self.adapter.as_ref() else {
            return;
        };
        let local = buffered_until(&adapter.buffered_ranges(), adapter.local_time());
        let global = self.track_start() + local;
        self.registry.emit(PlayerEvent::BufferTimeUpdate(global));
    }

    fn on_ended(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let next = self.position.index + 1;

        if session.strategy() == PlayStrategy::DirectPlay && next < session.len() {
            info!(track = next, "Advancing to next track");
            self.resume_paused = self.state == PlayerState::Paused;
            self.position = TrackPosition {
                index: next,
                local_time: 0.0,
            };
            if let Err(e) = self.load_current() {
                self.fail(e);
            }
            return;
        }

        self.finish();
    }

    fn finish(&mut self) {
        if self.state == PlayerState::Finished {
            return;
        }
        info!("Playback finished");
        self.play_intent = false;
        self.set_state(PlayerState::Finished);
        self.registry.emit(PlayerEvent::Finished);
    }

    fn fail(&mut self, error: PlaybackError) {
        error!(error = %error, track = self.position.index, "Playback failed");
        if let Some(adapter) = self.adapter.as_ref() {
            self.position.local_time = adapter.local_time();
        }
        self.dispose_adapter();
        self.resume_after_recovery = self.play_intent;
        self.play_intent = false;
        self.set_state(PlayerState::Error);
        self.registry.emit(PlayerEvent::Error(Arc::new(error)));
    }
}
