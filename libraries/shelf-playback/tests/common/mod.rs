//! Shared helpers for engine integration tests
//!
//! `ScriptedBackend` hands out elements that record every call and expose the
//! sink they were created with, so a test can play the host's part.

#![allow(dead_code)]

use shelf_playback::{
    BufferedRange, MediaBackend, MediaElement, MediaEvent, MediaEventSink, MediaSource,
    PlayStrategy, PlaybackError, PlayerEvent, PlayerState, Result, Track,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

// ===== Scripted host =====

/// Everything a scripted element was asked to do
#[derive(Debug, Default)]
pub struct ElementState {
    pub source: Option<MediaSource>,
    pub playing: bool,
    pub position: f64,
    pub buffered: Vec<BufferedRange>,
    pub seeks: Vec<f64>,
    pub plays: usize,
    pub pauses: usize,
    pub retried: Vec<u64>,
    pub volume: Option<f64>,
    pub rate: Option<f64>,
    pub released: bool,
}

struct ScriptedElement {
    state: Arc<Mutex<ElementState>>,
}

impl MediaElement for ScriptedElement {
    fn load(&mut self, source: &MediaSource) {
        let mut state = self.state.lock().unwrap();
        state.position = match source {
            MediaSource::Manifest { start_position, .. } => *start_position,
            MediaSource::File { .. } => 0.0,
        };
        state.source = Some(source.clone());
    }

    fn play(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.playing = true;
        state.plays += 1;
    }

    fn pause(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.pauses += 1;
    }

    fn seek(&mut self, position: f64) {
        let mut state = self.state.lock().unwrap();
        state.position = position;
        state.seeks.push(position);
    }

    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().position
    }

    fn buffered(&self) -> Vec<BufferedRange> {
        self.state.lock().unwrap().buffered.clone()
    }

    fn set_volume(&mut self, volume: f64) {
        self.state.lock().unwrap().volume = Some(volume);
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.state.lock().unwrap().rate = Some(rate);
    }

    fn retry_fragment(&mut self, fragment: u64) {
        self.state.lock().unwrap().retried.push(fragment);
    }

    fn release(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.released = true;
    }
}

/// Test-side view of one created element
#[derive(Clone)]
pub struct ElementHandle {
    pub strategy: PlayStrategy,
    sink: MediaEventSink,
    state: Arc<Mutex<ElementState>>,
}

impl ElementHandle {
    pub fn state(&self) -> MutexGuard<'_, ElementState> {
        self.state.lock().unwrap()
    }

    pub fn source(&self) -> Option<MediaSource> {
        self.state().source.clone()
    }

    pub fn emit(&self, event: MediaEvent) -> bool {
        self.sink.emit(event)
    }

    /// Report metadata as a host does once the resource is playable
    pub fn ready(&self, duration: f64) {
        self.emit(MediaEvent::LoadedMetadata { duration });
    }

    /// Move the playhead and report it
    pub fn progress_to(&self, position: f64) {
        self.state().position = position;
        self.emit(MediaEvent::TimeUpdate { position });
    }

    pub fn set_buffered(&self, ranges: &[(f64, f64)]) {
        self.state().buffered = ranges
            .iter()
            .map(|&(start, end)| BufferedRange::new(start, end))
            .collect();
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    elements: Mutex<Vec<ElementHandle>>,
    fail_next: AtomicBool,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `create_element` call fail
    pub fn fail_next_create(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.elements.lock().unwrap().len()
    }

    pub fn element(&self, index: usize) -> ElementHandle {
        self.elements.lock().unwrap()[index].clone()
    }

    pub fn latest(&self) -> ElementHandle {
        self.elements
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no element created")
    }
}

impl MediaBackend for ScriptedBackend {
    fn create_element(
        &self,
        strategy: PlayStrategy,
        events: MediaEventSink,
    ) -> Result<Box<dyn MediaElement>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PlaybackError::Backend("no audio output available".to_string()));
        }

        let state = Arc::new(Mutex::new(ElementState::default()));
        self.elements.lock().unwrap().push(ElementHandle {
            strategy,
            sink: events,
            state: Arc::clone(&state),
        });
        Ok(Box::new(ScriptedElement { state }))
    }
}

// ===== Fixtures =====

/// Two chapters: [0, 100) and [100, 150)
pub fn two_tracks() -> Vec<Track> {
    vec![
        Track::new(0, 0.0, 100.0, "Chapter 1").with_mime_type("audio/mpeg"),
        Track::new(1, 100.0, 50.0, "Chapter 2").with_mime_type("audio/mpeg"),
    ]
}

// ===== Event helpers =====

/// Let the engine's pump apply everything queued so far
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<PlayerEvent>) -> PlayerEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for player event")
        .expect("event channel closed")
}

/// Everything already delivered, without waiting
pub fn drain(rx: &mut mpsc::UnboundedReceiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn states(events: &[PlayerEvent]) -> Vec<PlayerState> {
    events
        .iter()
        .filter_map(|event| match event {
            PlayerEvent::StateChange(state) => Some(*state),
            _ => None,
        })
        .collect()
}

pub fn time_updates(events: &[PlayerEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            PlayerEvent::TimeUpdate(time) => Some(*time),
            _ => None,
        })
        .collect()
}

pub fn finished_count(events: &[PlayerEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, PlayerEvent::Finished))
        .count()
}
