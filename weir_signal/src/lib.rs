//! Module to signal phase changes in weir.
//!
//! The controller owns at least one long-running task -- the quota watcher --
//! and must be able to wind it down cleanly. The mechanism here has two
//! components, a `Broadcaster` and a `Watcher`. The `Broadcaster` is
//! responsible for signaling the `Watcher` that a phase has been achieved.
//! This is a one-time event; if multiple phases are tracked multiple signal
//! mechanisms are required. The `Watcher` is responsible for waiting for the
//! signal to be sent.
//!
//! There is only one `Broadcaster` and potentially many `Watcher` instances.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::perf)]
#![deny(clippy::suspicious)]
#![deny(clippy::complexity)]
#![deny(unused_extern_crates)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions)]

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use tokio::sync::{Notify, broadcast};
use tracing::info;

/// Construct a `Watcher` and `Broadcaster` pair.
#[must_use]
pub fn signal() -> (Watcher, Broadcaster) {
    // The broadcast channel is used only for its reliable closed-channel
    // semantics: dropping the sender is the signal. The Notify plus peer
    // count lets `signal_and_wait` linger until every watcher has either
    // received the signal or dropped.
    let (sender, receiver) = broadcast::channel(1);
    let peers = Arc::new(AtomicU32::new(1));
    let notify = Arc::new(Notify::new());

    let w = Watcher {
        peers: Arc::clone(&peers),
        receiver,
        notify: Arc::clone(&notify),
    };

    let b = Broadcaster {
        peers,
        sender,
        notify,
    };

    (w, b)
}

#[derive(Debug)]
/// Mechanism to notify one or more `Watcher` instances that a phase has been
/// achieved.
pub struct Broadcaster {
    /// The total number of peers subscribed to this `Broadcaster`. Used to
    /// understand when all `Watcher` instances have dropped off.
    peers: Arc<AtomicU32>,
    /// Transmission point for the signal to `Watcher` instances.
    sender: broadcast::Sender<()>,
    /// Allows the `Watchers` to notify `Broadcaster` that they have logged
    /// off.
    notify: Arc<Notify>,
}

impl Broadcaster {
    /// Send the signal through to any `Watcher` instances.
    ///
    /// Function will NOT block until all peers have ack'ed the signal.
    pub fn signal(self) {
        drop(self.sender);
    }

    /// Send the signal through to any `Watcher` instances.
    ///
    /// Function WILL block until all peers have ack'ed the signal.
    pub async fn signal_and_wait(self) {
        let Self {
            peers,
            sender,
            notify,
        } = self;
        drop(sender);

        // To avoid a lost wakeup we must register for notification before
        // checking the peer count: a peer could drop off between an early
        // check and a late registration and its notification would be missed.
        loop {
            let notified = notify.notified();
            if peers.load(Ordering::SeqCst) == 0 {
                info!("all watchers have acknowledged the signal");
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug)]
/// Mechanism to watch for phase changes, typically shutdown.
pub struct Watcher {
    /// The peer count shared with the `Broadcaster`, decremented on drop.
    peers: Arc<AtomicU32>,
    /// Reception point for the signal from the `Broadcaster`.
    receiver: broadcast::Receiver<()>,
    /// Mechanism to notify the `Broadcaster` that this `Watcher` is done.
    notify: Arc<Notify>,
}

impl Watcher {
    /// Wait for the signal to be received. Consumes the watcher; its peer
    /// registration is released once the signal lands.
    pub async fn recv(mut self) {
        // Closed is the signal; an actual payload never transits the
        // channel. Either way the phase has been achieved.
        let _ = self.receiver.recv().await;
        // Dropping `self` here decrements the peer count and wakes the
        // broadcaster, if it is waiting.
    }
}

impl Clone for Watcher {
    fn clone(&self) -> Self {
        self.peers.fetch_add(1, Ordering::SeqCst);
        Self {
            peers: Arc::clone(&self.peers),
            receiver: self.receiver.resubscribe(),
            notify: Arc::clone(&self.notify),
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.peers.fetch_sub(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}
