//! Observer pattern matching `cts-core/base/signal.h`'s contract and spec.md
//! section 6 (`stepped()`, `vehicle_spawned(vehicle)`). Receivers connect with
//! a closure and get back a handle they can later disconnect with, or
//! connect through a `Receiver` that disconnects every one of its
//! connections automatically when dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
static NEXT_RECEIVER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ReceiverId(u64);

type Callback<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

struct Slot<Args> {
    handle: ReceiverHandle,
    owner: Option<ReceiverId>,
    callback: Callback<Args>,
}

impl<Args> Clone for Slot<Args> {
    fn clone(&self) -> Self {
        Slot {
            handle: self.handle,
            owner: self.owner,
            callback: self.callback.clone(),
        }
    }
}

struct Inner<Args> {
    slots: Vec<Slot<Args>>,
}

/// A signal carrying a single argument of type `Args` to any number of
/// connected receivers, fired synchronously and in connection order.
///
/// Cloning a `Signal` duplicates its current connections into an
/// independent slot list -- the clone and the original diverge from that
/// point on, matching `cts-core`'s copy-constructor semantics rather than
/// sharing state.
pub struct Signal<Args> {
    inner: Arc<Mutex<Inner<Args>>>,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Signal {
            inner: Arc::new(Mutex::new(Inner { slots: Vec::new() })),
        }
    }
}

impl<Args> Clone for Signal<Args> {
    fn clone(&self) -> Self {
        let slots = self.inner.lock().expect("signal mutex poisoned").slots.clone();
        Signal {
            inner: Arc::new(Mutex::new(Inner { slots })),
        }
    }
}

impl<Args: 'static> Signal<Args> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect<F>(&self, callback: F) -> ReceiverHandle
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connect_owned(None, callback)
    }

    fn connect_owned<F>(&self, owner: Option<ReceiverId>, callback: F) -> ReceiverHandle
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let handle = ReceiverHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed));
        self.inner.lock().expect("signal mutex poisoned").slots.push(Slot {
            handle,
            owner,
            callback: Arc::new(callback),
        });
        handle
    }

    /// Connects through `receiver`, so that dropping `receiver` disconnects
    /// this slot (and every other slot it holds, across any number of
    /// signals) without the caller needing to keep the handle around.
    pub fn connect_receiver<F>(&self, receiver: &Receiver, callback: F) -> ReceiverHandle
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let callback: Callback<Args> = Arc::new(callback);
        let weak: Weak<Mutex<Inner<Args>>> = Arc::downgrade(&self.inner);
        let handle = Self::reconnect(&weak, receiver, receiver.id, callback.clone())
            .expect("signal's own Arc must still be alive while connecting");

        // Recorded on the receiver so that cloning it re-establishes this
        // same connection pointing at the copy (spec.md section 8: "copying
        // a receiver re-establishes its connections pointing at the copy").
        receiver.track_reconnect(move |new_receiver| {
            Self::reconnect(&weak, new_receiver, new_receiver.id, callback.clone());
        });
        handle
    }

    /// Pushes one slot owned by `owner` into this signal's inner slot list
    /// and registers a disconnector on `receiver`, shared by both the
    /// initial `connect_receiver` call and every later re-connection made
    /// when a `Receiver` is cloned.
    fn reconnect(
        inner: &Weak<Mutex<Inner<Args>>>,
        receiver: &Receiver,
        owner: ReceiverId,
        callback: Callback<Args>,
    ) -> Option<ReceiverHandle> {
        let strong = inner.upgrade()?;
        let handle = ReceiverHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed));
        strong.lock().expect("signal mutex poisoned").slots.push(Slot { handle, owner: Some(owner), callback });

        let weak = inner.clone();
        receiver.track(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().expect("signal mutex poisoned").slots.retain(|s| s.handle != handle);
            }
        });
        Some(handle)
    }

    /// Removes the receiver registered under `handle`. No-op (plus a debug
    /// assertion) if the handle is unknown, matching the programmer-precondition
    /// error-handling tier: this is a caller bug, not a runtime condition.
    pub fn disconnect(&self, handle: ReceiverHandle) {
        let mut inner = self.inner.lock().expect("signal mutex poisoned");
        let before = inner.slots.len();
        inner.slots.retain(|s| s.handle != handle);
        debug_assert!(inner.slots.len() < before, "disconnect() called with an unknown receiver handle");
    }

    /// Removes every slot owned by `receiver`, wherever it's registered.
    fn disconnect_owner(&self, owner: ReceiverId) {
        self.inner.lock().expect("signal mutex poisoned").slots.retain(|s| s.owner != Some(owner));
    }

    /// Disconnects every receiver, leaving this signal inert until something
    /// connects to it again.
    pub fn disconnect_all(&self) {
        self.inner.lock().expect("signal mutex poisoned").slots.clear();
    }

    pub fn emit(&self, args: &Args) {
        let callbacks: Vec<Callback<Args>> = self
            .inner
            .lock()
            .expect("signal mutex poisoned")
            .slots
            .iter()
            .map(|s| s.callback.clone())
            .collect();
        for callback in callbacks {
            callback(args);
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.inner.lock().expect("signal mutex poisoned").slots.len()
    }
}

/// A receiver that tracks every signal it has connected to via
/// `Signal::connect_receiver`, disconnecting all of them when dropped --
/// matching the contract that destroying a receiver leaves every signal it
/// was connected to counting it as no longer registered.
pub struct Receiver {
    id: ReceiverId,
    disconnectors: Mutex<Vec<Box<dyn Fn() + Send>>>,
    /// One entry per live connection, capturing enough to re-subscribe an
    /// equivalent slot pointing at a *different* receiver -- used only by
    /// `Clone`, so that copying a receiver re-establishes its connections
    /// pointing at the copy rather than merely duplicating the `Receiver`
    /// value with no signals actually aware of it.
    reconnectors: Mutex<Vec<Box<dyn Fn(&Receiver) + Send>>>,
}

impl Default for Receiver {
    fn default() -> Self {
        Receiver {
            id: ReceiverId(NEXT_RECEIVER.fetch_add(1, Ordering::Relaxed)),
            disconnectors: Mutex::new(Vec::new()),
            reconnectors: Mutex::new(Vec::new()),
        }
    }
}

impl Receiver {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&self, disconnect: impl Fn() + Send + 'static) {
        self.disconnectors.lock().expect("receiver mutex poisoned").push(Box::new(disconnect));
    }

    fn track_reconnect(&self, reconnect: impl Fn(&Receiver) + Send + 'static) {
        self.reconnectors.lock().expect("receiver mutex poisoned").push(Box::new(reconnect));
    }

    /// Disconnects this receiver from every signal it is currently
    /// connected to, without waiting for it to be dropped.
    pub fn disconnect_all(&self) {
        for disconnect in self.disconnectors.lock().expect("receiver mutex poisoned").drain(..) {
            disconnect();
        }
    }
}

impl Clone for Receiver {
    /// Re-establishes every connection this receiver currently holds,
    /// pointing at the new copy -- the new `Receiver` gets its own identity
    /// (so disconnecting or dropping one doesn't affect the other) but is
    /// wired into the exact same signals with equivalent callbacks.
    fn clone(&self) -> Self {
        let copy = Receiver::new();
        for reconnect in self.reconnectors.lock().expect("receiver mutex poisoned").iter() {
            reconnect(&copy);
        }
        copy
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}

/// Disconnects every slot owned by `receiver` on `signal`. Exposed for the
/// case where a caller holds both a `Signal` and a `Receiver` directly and
/// wants to sever just that pairing, rather than dropping the receiver
/// entirely.
pub fn disconnect_receiver<Args: 'static>(signal: &Signal<Args>, receiver: &Receiver) {
    signal.disconnect_owner(receiver.id);
}
