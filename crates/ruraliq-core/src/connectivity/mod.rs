//! Connectivity tracking.
//!
//! [`ConnectivityMonitor`] holds the last-known network state and tells
//! subscribers about edges (Offline→Online, Online→Offline). It performs no
//! I/O itself; a [`ConnectivityProbe`] or the host platform feeds it through
//! [`ConnectivityMonitor::set_status`].

mod probe;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub use probe::{spawn_probe, ConnectivityProbe, HttpHealthProbe, ProbeFuture};

/// Network reachability as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityStatus {
    Online,
    Offline,
}

impl ConnectivityStatus {
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// A change between two different connectivity states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectivityStatus,
    pub to: ConnectivityStatus,
}

impl Transition {
    /// The Offline→Online edge
    pub const fn is_reconnect(self) -> bool {
        matches!(
            (self.from, self.to),
            (ConnectivityStatus::Offline, ConnectivityStatus::Online)
        )
    }
}

type Callback = Arc<dyn Fn(Transition) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    callbacks: Vec<(u64, Callback)>,
}

struct Shared {
    status: watch::Sender<ConnectivityStatus>,
    listeners: Mutex<Listeners>,
}

/// Last-known connectivity state plus transition subscribers.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    shared: Arc<Shared>,
}

impl ConnectivityMonitor {
    /// Create a monitor from the platform's initial signal.
    ///
    /// With no signal the monitor starts Online.
    pub fn new(initial: Option<ConnectivityStatus>) -> Self {
        let initial = initial.unwrap_or(ConnectivityStatus::Online);
        let (status, _) = watch::channel(initial);
        Self {
            shared: Arc::new(Shared {
                status,
                listeners: Mutex::new(Listeners::default()),
            }),
        }
    }

    /// Last-known state
    pub fn current_status(&self) -> ConnectivityStatus {
        *self.shared.status.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current_status().is_online()
    }

    /// Record a platform signal.
    ///
    /// Subscribers are called once if the state changed and not at all if it
    /// did not. Returns the transition that was fired, if any.
    pub fn set_status(&self, status: ConnectivityStatus) -> Option<Transition> {
        let previous = self.shared.status.send_replace(status);
        if previous == status {
            return None;
        }

        let transition = Transition {
            from: previous,
            to: status,
        };
        tracing::info!("Connectivity changed: {previous} -> {status}");

        // Callbacks run without the lock held so they may subscribe/unsubscribe.
        let callbacks: Vec<Callback> = self
            .listeners()
            .callbacks
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(transition);
        }

        Some(transition)
    }

    /// Register a callback for future transitions. Past transitions are not
    /// replayed. The callback stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn on_transition<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Transition) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.callbacks.push((id, Arc::new(callback)));

        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Channel view of the current state for async consumers
    pub fn watch(&self) -> watch::Receiver<ConnectivityStatus> {
        self.shared.status.subscribe()
    }

    /// Number of registered transition callbacks
    pub fn subscriber_count(&self) -> usize {
        self.listeners().callbacks.len()
    }

    fn listeners(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConnectivityMonitor")
            .field("status", &self.current_status())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle for a transition callback; dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes the callback"]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    /// Remove the callback now
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .callbacks
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
