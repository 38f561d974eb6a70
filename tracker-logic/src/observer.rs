use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

pub type SubscriptionId = u64;
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Something that can tell interested parties that it changed.
pub trait ChangeNotifier {
    fn subscribe(&self, listener: Listener) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

#[derive(Default)]
pub struct Notifier {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls every listener. The listener list is copied first, so a listener
    /// may subscribe or unsubscribe while being notified.
    pub fn notify(&self) {
        for listener in self.listeners() {
            listener();
        }
    }

    pub fn listeners(&self) -> Vec<Listener> {
        self.listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl ChangeNotifier for Notifier {
    fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let len_before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != len_before
    }
}

impl Debug for Notifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Notifies every listener of `notifiers`, calling a listener subscribed to
/// several of them only once.
pub fn notify_all(notifiers: &[&Notifier]) {
    let mut called: Vec<*const ()> = vec![];
    for notifier in notifiers {
        for listener in notifier.listeners() {
            let ptr = Arc::as_ptr(&listener) as *const ();
            if !called.contains(&ptr) {
                called.push(ptr);
                listener();
            }
        }
    }
}

/// A read-only-from-outside value with change notification.
#[derive(Debug, Default)]
pub struct Observable<T> {
    value: RwLock<T>,
    notifier: Notifier,
}

impl<T: Clone + PartialEq> Observable<T> {
    pub fn new(value: T) -> Self {
        Observable {
            value: RwLock::new(value),
            notifier: Notifier::new(),
        }
    }

    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Stores a new value and notifies listeners if it differs from the old one.
    pub fn set(&self, value: T) -> bool {
        let changed = self.replace(value);
        if changed {
            self.notifier.notify();
        }
        changed
    }

    /// Stores a new value without notifying. Returns whether it changed; the caller
    /// is responsible for calling [`Observable::notify`] later.
    pub fn replace(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    }

    pub fn notify(&self) {
        self.notifier.notify();
    }

    pub fn listener_count(&self) -> usize {
        self.notifier.listener_count()
    }
}

impl<T> ChangeNotifier for Observable<T> {
    fn subscribe(&self, listener: Listener) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }
}
