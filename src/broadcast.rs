use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

struct Outbox<E> {
    pending: VecDeque<E>,
    delivering: bool,
}

/// In-process publish/subscribe channel.
///
/// Listeners are called synchronously, in subscription order, on the thread
/// that publishes. A listener stays registered until its [`Subscription`] is
/// dropped or cancelled.
///
/// Events handed to [`Broadcaster::enqueue`] are instead delivered strictly in
/// enqueue order, by one thread at a time, when [`Broadcaster::deliver_queued`]
/// runs.
pub struct Broadcaster<E> {
    registry: Arc<Mutex<Registry<E>>>,
    outbox: Arc<Mutex<Outbox<E>>>,
}

impl<E> Clone for Broadcaster<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            outbox: Arc::clone(&self.outbox),
        }
    }
}

impl<E: 'static> Default for Broadcaster<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> Broadcaster<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
            outbox: Arc::new(Mutex::new(Outbox {
                pending: VecDeque::new(),
                delivering: false,
            })),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));

        let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
                    registry.listeners.retain(|(listener_id, _)| *listener_id != id);
                }
            })),
        }
    }

    /// Deliver `event` to every current listener.
    pub fn publish(&self, event: &E) {
        // Snapshot first so listeners may subscribe or unsubscribe while running.
        let listeners: Vec<Listener<E>> = {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            listener(event);
        }
    }

    /// Queue `event` behind every event queued before it. Nothing is
    /// delivered until [`Broadcaster::deliver_queued`] is called.
    pub fn enqueue(&self, event: E) {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .push_back(event);
    }

    /// Deliver queued events in order until the queue is empty.
    ///
    /// If another call is already delivering, including one further up this
    /// thread's stack, this returns at once and that call delivers the rest.
    pub fn deliver_queued(&self) {
        {
            let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
            if outbox.delivering {
                return;
            }
            outbox.delivering = true;
        }

        let mut delivery = Delivery {
            outbox: &self.outbox,
            finished: false,
        };
        loop {
            let next = {
                let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
                match outbox.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        outbox.delivering = false;
                        delivery.finished = true;
                        return;
                    }
                }
            };
            self.publish(&next);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }
}

/// Releases the delivery role if a listener panics mid-delivery.
struct Delivery<'a, E> {
    outbox: &'a Mutex<Outbox<E>>,
    finished: bool,
}

impl<E> Drop for Delivery<'_, E> {
    fn drop(&mut self) {
        if !self.finished {
            self.outbox
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .delivering = false;
        }
    }
}

/// Registration handle returned by [`Broadcaster::subscribe`]. Dropping it
/// removes the listener.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the listener registered for the broadcaster's whole lifetime.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
