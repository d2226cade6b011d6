// Lifecycle event notification for playback sessions
// Delivery is synchronous, in the order the transitions happen

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Session lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEvent {
    Opened,
    Started,
    Paused,
    Resumed,
    Stopped,
    /// Playback cursor moved by a seek
    PositionChanged {
        old_frame: u64,
        new_frame: u64,
    },
    /// The source ran out of frames
    ReachedEnd,
    Closed,
}

/// Session listener trait
/// Called on whichever thread performed the transition (control thread or worker),
/// so implementations should return quickly
pub trait AudioListener: Send + Sync {
    fn on_event(&self, event: &AudioEvent);
}

impl<F> AudioListener for F
where
    F: Fn(&AudioEvent) + Send + Sync,
{
    fn on_event(&self, event: &AudioEvent) {
        self(event)
    }
}

/// Handle returned by [`EventDispatcher::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener registry for one session
pub struct EventDispatcher {
    listeners: Mutex<Vec<(ListenerId, Arc<dyn AudioListener>)>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn AudioListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Returns false if the id was unknown
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn clear_listeners(&self) {
        self.listeners.lock().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn dispatch(&self, event: AudioEvent) {
        // Snapshot so listeners can re-enter the registry or the session
        let listeners: Vec<Arc<dyn AudioListener>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        log::trace!("Dispatching {:?} to {} listener(s)", event, listeners.len());
        for listener in listeners {
            listener.on_event(&event);
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
