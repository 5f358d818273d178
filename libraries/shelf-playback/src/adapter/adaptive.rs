//! Adaptive streaming: one element plays a manifest covering every track

use super::{AdapterEvent, LoadTarget, MediaAdapter};
use crate::buffer::BufferedRange;
use crate::error::{PlaybackError, Result};
use crate::media::{
    Dispatcher, MediaBackend, MediaElement, MediaEvent, MediaEventSink, MediaSource, Signal,
    SignalSink,
};
use crate::retry::RetryPolicy;
use shelf_core::PlayStrategy;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Plays the server's stream manifest through a single element
///
/// Failed fragments are retried with exponential backoff. Each retry is a
/// timer task that reports back through the element's own sink, so a timer
/// outliving its element is dropped as stale.
pub(crate) struct AdaptiveStreamAdapter {
    backend: Arc<dyn MediaBackend>,
    dispatcher: Dispatcher,
    runtime: Handle,
    policy: RetryPolicy,
    element: Option<Box<dyn MediaElement>>,
    /// Sink shared with the live element
    sink: Option<SignalSink>,
    ready: bool,
    play_when_ready: bool,
    pending_seek: Option<f64>,
    local_time: f64,
    volume: f64,
    rate: f64,
    /// Retries spent per fragment
    attempts: HashMap<u64, u32>,
    retry_timers: Vec<JoinHandle<()>>,
}

impl AdaptiveStreamAdapter {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        dispatcher: Dispatcher,
        runtime: Handle,
        policy: RetryPolicy,
        volume: f64,
        rate: f64,
    ) -> Self {
        Self {
            backend,
            dispatcher,
            runtime,
            policy,
            element: None,
            sink: None,
            ready: false,
            play_when_ready: false,
            pending_seek: None,
            local_time: 0.0,
            volume,
            rate,
            attempts: HashMap::new(),
            retry_timers: Vec::new(),
        }
    }

    fn cancel_retries(&mut self) {
        for timer in self.retry_timers.drain(..) {
            timer.abort();
        }
        self.attempts.clear();
    }

    fn release_element(&mut self) {
        self.cancel_retries();
        if let Some(mut element) = self.element.take() {
            element.release();
        }
        self.sink = None;
        self.ready = false;
    }

    fn schedule_retry(&mut self, fragment: u64, status: Option<u16>) -> Option<AdapterEvent> {
        if !RetryPolicy::is_retryable_status(status) {
            error!(fragment, ?status, "Fragment rejected by server");
            return Some(AdapterEvent::Error(PlaybackError::FragmentRejected {
                fragment,
                status: status.unwrap_or_default(),
            }));
        }

        let attempts = self.attempts.entry(fragment).or_insert(0);
        if !self.policy.allows_retry(*attempts) {
            error!(fragment, attempts = *attempts, "Fragment retries exhausted");
            return Some(AdapterEvent::Error(PlaybackError::FragmentRetriesExhausted {
                fragment,
                attempts: *attempts,
            }));
        }

        *attempts += 1;
        let attempt = *attempts;
        let delay = self.policy.delay_for_attempt(attempt);
        let sink = self.sink.clone()?;

        warn!(
            fragment,
            ?status,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Fragment failed, retrying"
        );

        self.retry_timers.retain(|timer| !timer.is_finished());
        self.retry_timers.push(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            sink.send(Signal::RetryFragment { fragment });
        }));
        None
    }

    fn on_media_event(&mut self, event: MediaEvent) -> Option<AdapterEvent> {
        match event {
            MediaEvent::LoadedMetadata { duration } => {
                let element = self.element.as_mut()?;
                self.ready = true;
                if let Some(position) = self.pending_seek.take() {
                    element.seek(position);
                }
                if self.play_when_ready {
                    element.play();
                }
                Some(AdapterEvent::Ready { duration })
            }
            MediaEvent::TimeUpdate { position } => {
                if !self.ready {
                    return None;
                }
                self.local_time = position;
                Some(AdapterEvent::TimeProgressed {
                    local_time: position,
                })
            }
            MediaEvent::FragmentLoaded { fragment } => {
                self.attempts.remove(&fragment);
                Some(AdapterEvent::BufferChanged)
            }
            MediaEvent::Progress => Some(AdapterEvent::BufferChanged),
            MediaEvent::FragmentError { fragment, status } => {
                self.schedule_retry(fragment, status)
            }
            MediaEvent::Ended => Some(AdapterEvent::Ended),
            MediaEvent::Error { message } => {
                Some(AdapterEvent::Error(PlaybackError::Media(message)))
            }
        }
    }
}

impl MediaAdapter for AdaptiveStreamAdapter {
    fn strategy(&self) -> PlayStrategy {
        PlayStrategy::AdaptiveStream
    }

    fn load(&mut self, target: LoadTarget, local_start: f64) -> Result<()> {
        self.release_element();

        let sink = self.dispatcher.issue();
        let mut element = self
            .backend
            .create_element(PlayStrategy::AdaptiveStream, MediaEventSink::new(sink.clone()))?;
        element.set_volume(self.volume);
        element.set_playback_rate(self.rate);

        debug!(address = %target.address, start_position = local_start, "Loading stream manifest");
        element.load(&MediaSource::Manifest {
            address: target.address,
            start_position: local_start,
        });

        self.pending_seek = None;
        self.local_time = local_start;
        self.sink = Some(sink);
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
            Signal::RetryFragment { fragment } => {
                if let Some(element) = self.element.as_mut() {
                    debug!(fragment, "Retrying fragment");
                    element.retry_fragment(fragment);
                }
                None
            }
            Signal::RecoveryDue => None,
        }
    }

    fn dispose(&mut self) {
        self.release_element();
        self.play_when_ready = false;
        self.pending_seek = None;
    }
}

impl Drop for AdaptiveStreamAdapter {
    fn drop(&mut self) {
        self.cancel_retries();
    }
}
