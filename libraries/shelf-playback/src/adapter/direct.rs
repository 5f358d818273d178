//! Direct play: each track file is its own element

use super::{AdapterEvent, LoadTarget, MediaAdapter};
use crate::buffer::BufferedRange;
use crate::error::{PlaybackError, Result};
use crate::media::{Dispatcher, MediaBackend, MediaElement, MediaEvent, MediaEventSink, MediaSource, Signal};
use shelf_core::PlayStrategy;
use std::sync::Arc;
use tracing::{debug, trace};

/// Plays one track file at a time
///
/// Every load releases the previous element and asks the backend for a new
/// one, so a late event from the old file can never be mistaken for the new
/// one. The local start position is applied by seeking once the file's
/// metadata is in.
pub(crate) struct DirectPlayAdapter {
    backend: Arc<dyn MediaBackend>,
    dispatcher: Dispatcher,
    element: Option<Box<dyn MediaElement>>,
    ready: bool,
    play_when_ready: bool,
    /// Applied when metadata arrives
    pending_seek: Option<f64>,
    /// Last known local position
    local_time: f64,
    volume: f64,
    rate: f64,
}

impl DirectPlayAdapter {
    pub fn new(backend: Arc<dyn MediaBackend>, dispatcher: Dispatcher, volume: f64, rate: f64) -> Self {
        Self {
            backend,
            dispatcher,
            element: None,
            ready: false,
            play_when_ready: false,
            pending_seek: None,
            local_time: 0.0,
            volume,
            rate,
        }
    }

    fn release_element(&mut self) {
        if let Some(mut element) = self.element.take() {
            element.release();
        }
        self.ready = false;
    }

    fn on_media_event(&mut self, event: MediaEvent) -> Option<AdapterEvent> {
        match event {
            MediaEvent::LoadedMetadata { duration } => {
                let element = self.element.as_mut()?;
                self.ready = true;
                if let Some(position) = self.pending_seek.take() {
                    if position > 0.0 {
                        element.seek(position);
                    }
                }
                if self.play_when_ready {
                    element.play();
                }
                Some(AdapterEvent::Ready { duration })
            }
            MediaEvent::TimeUpdate { position } => {
                // Hosts may report 0 before the start seek has been applied
                if !self.ready {
                    return None;
                }
                self.local_time = position;
                Some(AdapterEvent::TimeProgressed {
                    local_time: position,
                })
            }
            MediaEvent::Progress | MediaEvent::FragmentLoaded { .. } => {
                Some(AdapterEvent::BufferChanged)
            }
            MediaEvent::Ended => Some(AdapterEvent::Ended),
            MediaEvent::Error { message } => Some(AdapterEvent::Error(PlaybackError::Media(message))),
            MediaEvent::FragmentError { fragment, status } => {
                Some(AdapterEvent::Error(PlaybackError::Media(format!(
                    "track file request failed (part {fragment}, status {status:?})"
                ))))
            }
        }
    }
}

impl MediaAdapter for DirectPlayAdapter {
    fn strategy(&self) -> PlayStrategy {
        PlayStrategy::DirectPlay
    }

    fn load(&mut self, target: LoadTarget, local_start: f64) -> Result<()> {
        self.release_element();

        let sink = MediaEventSink::new(self.dispatcher.issue());
        let mut element = self.backend.create_element(PlayStrategy::DirectPlay, sink)?;
        element.set_volume(self.volume);
        element.set_playback_rate(self.rate);

        debug!(address = %target.address, local_start, "Loading track file");
        element.load(&MediaSource::File {
            address: target.address,
            mime_type: target.mime_type,
        });

        self.pending_seek = Some(local_start);
        self.local_time = local_start;
        self.element = Some(element);
        Ok(())
    }

    fn play(&mut self) {
        self.play_when_ready = true;
        if self.ready {
            if let Some(element) = self.element.as_mut() {
                element.play();
            }
        }
    }

    fn pause(&mut self) {
        self.play_when_ready = false;
        if self.ready {
            if let Some(element) = self.element.as_mut() {
                element.pause();
            }
        }
    }

    fn seek_local(&mut self, time: f64) {
        self.local_time = time;
        match self.element.as_mut() {
            Some(element) if self.ready => element.seek(time),
            _ => self.pending_seek = Some(time),
        }
    }

    fn local_time(&self) -> f64 {
        match &self.element {
            Some(element) if self.ready => element.current_time(),
            _ => self.local_time,
        }
    }

    fn buffered_ranges(&self) -> Vec<BufferedRange> {
        self.element
            .as_ref()
            .map(|element| element.buffered())
            .unwrap_or_default()
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
        if let Some(element) = self.element.as_mut() {
            element.set_volume(volume);
        }
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
        if let Some(element) = self.element.as_mut() {
            element.set_playback_rate(rate);
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn handle_signal(&mut self, signal: Signal) -> Option<AdapterEvent> {
        match signal {
            Signal::Media(event) => self.on_media_event(event),
            other => {
                trace!(?other, "Direct play ignores signal");
                None
            }
        }
    }

    fn dispose(&mut self) {
        self.release_element();
        self.play_when_ready = false;
        self.pending_seek = None;
    }
}
