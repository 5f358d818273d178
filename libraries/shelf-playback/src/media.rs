//! Host media boundary
//!
//! Decoding and output belong to the host platform (a browser media element,
//! a native player, a simulator). The engine only sees it through these two
//! traits: a [`MediaBackend`] that creates elements on demand and the
//! [`MediaElement`] handles it returns.
//!
//! An element reports what happens to it through the [`MediaEventSink`] it was
//! created with. Each sink is stamped with a generation token; once the
//! element is released (or the player destroyed) the token goes stale and
//! anything the element still reports is dropped unseen.

use crate::buffer::BufferedRange;
use crate::error::Result;
use shelf_core::PlayStrategy;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What an element is asked to play
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    /// A single track file
    File {
        /// Server-relative address
        address: String,
        /// MIME type of the file
        mime_type: String,
    },

    /// A streaming manifest covering the whole item
    Manifest {
        /// Server-relative manifest address
        address: String,
        /// Where the stream should start (seconds)
        start_position: f64,
    },
}

impl MediaSource {
    /// Server-relative address of the source
    pub fn address(&self) -> &str {
        match self {
            MediaSource::File { address, .. } | MediaSource::Manifest { address, .. } => address,
        }
    }
}

/// Low-level notifications from a host element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Enough is known about the source to start playing
    LoadedMetadata {
        /// Length of the loaded resource (seconds)
        duration: f64,
    },

    /// Playback position moved
    TimeUpdate {
        /// Position within the loaded resource (seconds)
        position: f64,
    },

    /// More data was downloaded
    Progress,

    /// The loaded resource played to its end
    Ended,

    /// The resource failed to load or play
    Error {
        /// Host-provided description
        message: String,
    },

    /// A stream fragment arrived
    FragmentLoaded {
        /// Fragment sequence number
        fragment: u64,
    },

    /// A stream fragment failed to download
    FragmentError {
        /// Fragment sequence number
        fragment: u64,
        /// HTTP status, if a response was received at all
        status: Option<u16>,
    },
}

/// Playable resource owned by the host platform
///
/// Positions are in seconds on the element's own timeline.
#[cfg_attr(test, mockall::automock)]
pub trait MediaElement: Send {
    /// Start loading a source, replacing whatever was loaded
    fn load(&mut self, source: &MediaSource);

    /// Start or resume playback
    fn play(&mut self);

    /// Pause playback
    fn pause(&mut self);

    /// Jump to a position
    fn seek(&mut self, position: f64);

    /// Current position
    fn current_time(&self) -> f64;

    /// Downloaded spans, ordered and non-overlapping
    fn buffered(&self) -> Vec<BufferedRange>;

    /// Output volume (0.0 - 1.0)
    fn set_volume(&mut self, volume: f64);

    /// Playback speed multiplier
    fn set_playback_rate(&mut self, rate: f64);

    /// Request a failed stream fragment again
    ///
    /// Only called on elements playing a manifest.
    fn retry_fragment(&mut self, fragment: u64) {
        let _ = fragment;
    }

    /// Stop and free everything the element holds
    ///
    /// After this returns the element must not report further events.
    fn release(&mut self);
}

/// Factory for host media elements
#[cfg_attr(test, mockall::automock)]
pub trait MediaBackend: Send + Sync {
    /// Create an element able to play sources of the given strategy
    ///
    /// # Errors
    /// Returns an error if the host cannot provide an element.
    fn create_element(
        &self,
        strategy: PlayStrategy,
        events: MediaEventSink,
    ) -> Result<Box<dyn MediaElement>>;
}

/// Signals delivered to the engine's pump task
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Signal {
    /// Something happened to a host element
    Media(MediaEvent),

    /// A fragment retry backoff elapsed
    RetryFragment { fragment: u64 },

    /// The recovery grace period elapsed
    RecoveryDue,
}

/// A signal stamped with the generation of its source
#[derive(Debug)]
pub(crate) struct Envelope {
    pub generation: u64,
    pub signal: Signal,
}

/// Sender half bound to one generation
#[derive(Debug, Clone)]
pub(crate) struct SignalSink {
    tx: mpsc::UnboundedSender<Envelope>,
    generation: u64,
}

impl SignalSink {
    /// Returns false once the engine is gone
    pub fn send(&self, signal: Signal) -> bool {
        self.tx
            .send(Envelope {
                generation: self.generation,
                signal,
            })
            .is_ok()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Where a host element reports its [`MediaEvent`]s
#[derive(Clone)]
pub struct MediaEventSink {
    inner: SignalSink,
}

impl MediaEventSink {
    pub(crate) fn new(inner: SignalSink) -> Self {
        Self { inner }
    }

    /// Report an event
    ///
    /// Returns false if the player no longer exists. Events from a released
    /// element are accepted here but discarded by the player.
    pub fn emit(&self, event: MediaEvent) -> bool {
        self.inner.send(Signal::Media(event))
    }

    /// Generation token this sink is bound to
    pub fn generation(&self) -> u64 {
        self.inner.generation()
    }
}

impl fmt::Debug for MediaEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaEventSink")
            .field("generation", &self.inner.generation)
            .finish()
    }
}

/// Issues generation tokens and remembers the live one
///
/// Every element and every recovery timer gets a fresh token. Only signals
/// carrying the newest token are applied.
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    tx: mpsc::UnboundedSender<Envelope>,
    current: Arc<AtomicU64>,
}

impl Dispatcher {
    pub fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            tx,
            current: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Make a new token live and return a sink bound to it
    pub fn issue(&self) -> SignalSink {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        SignalSink {
            tx: self.tx.clone(),
            generation,
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current.load(Ordering::SeqCst) == generation
    }

    /// Make every issued token stale
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}
