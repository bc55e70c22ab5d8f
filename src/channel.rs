//! Synchronous change notification.
//!
//! Every mutable entity owns a [`ChangeChannel`] keyed by its own field enum.
//! Emitting runs every matching callback to completion before returning, so a
//! listener never observes a half-applied mutation of the emitting entity.
//!
//! # Example
//!
//! ```
//! use grain::{ChangeChannel, ChangeEvent, ChangeRecorder};
//!
//! #[derive(Debug, Clone, Copy, PartialEq)]
//! enum Field { Weight, Time }
//!
//! let mut channel = ChangeChannel::new();
//! let recorder = ChangeRecorder::new();
//! channel.subscribe([Field::Weight], recorder.listener());
//!
//! channel.emit(ChangeEvent::new(Field::Time, None));
//! channel.emit(ChangeEvent::new(Field::Weight, Some(2.0)));
//! assert_eq!(recorder.fields(), vec![Field::Weight]);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use slab::Slab;

/// A "field changed" notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeEvent<F> {
    /// The field that changed.
    pub field: F,
    /// New numeric value, for fields that have one.
    pub value: Option<f64>,
}

impl<F> ChangeEvent<F> {
    /// Create a change event.
    pub fn new(field: F, value: Option<f64>) -> Self {
        Self { field, value }
    }
}

/// Handle returned by [`ChangeChannel::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(usize);

type Callback<F> = Box<dyn FnMut(&ChangeEvent<F>) + Send>;

struct Subscription<F> {
    /// Empty means every field.
    fields: Vec<F>,
    callback: Callback<F>,
}

/// Publish/subscribe channel for field change events.
pub struct ChangeChannel<F> {
    subscriptions: Slab<Subscription<F>>,
    /// Events buffered between `hold` and `release`/`discard`.
    held: Option<Vec<ChangeEvent<F>>>,
}

impl<F> Default for ChangeChannel<F> {
    fn default() -> Self {
        Self {
            subscriptions: Slab::new(),
            held: None,
        }
    }
}

impl<F> fmt::Debug for ChangeChannel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeChannel")
            .field("subscriptions", &self.subscriptions.len())
            .field("held", &self.held.as_ref().map(Vec::len))
            .finish()
    }
}

impl<F: PartialEq> ChangeChannel<F> {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `callback` to changes of `fields`. An empty field list
    /// subscribes to every field.
    pub fn subscribe(
        &mut self,
        fields: impl IntoIterator<Item = F>,
        callback: impl FnMut(&ChangeEvent<F>) + Send + 'static,
    ) -> SubscriptionHandle {
        let key = self.subscriptions.insert(Subscription {
            fields: fields.into_iter().collect(),
            callback: Box::new(callback),
        });
        SubscriptionHandle(key)
    }

    /// Subscribe `callback` to every field.
    pub fn subscribe_all(
        &mut self,
        callback: impl FnMut(&ChangeEvent<F>) + Send + 'static,
    ) -> SubscriptionHandle {
        self.subscribe(std::iter::empty(), callback)
    }

    /// Remove a subscription. Returns false if the handle was not active.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.subscriptions.try_remove(handle.0).is_some()
    }

    /// Deliver `event` to every subscription interested in its field, or
    /// buffer it while the channel is held.
    pub fn emit(&mut self, event: ChangeEvent<F>) {
        match self.held.as_mut() {
            Some(held) => held.push(event),
            None => self.deliver(&event),
        }
    }

    /// Buffer emitted events until [`release`](Self::release) or
    /// [`discard`](Self::discard). Holding an already held channel keeps the
    /// buffer.
    pub fn hold(&mut self) {
        self.held.get_or_insert_with(Vec::new);
    }

    /// Stop holding and deliver the buffered events in emission order.
    pub fn release(&mut self) {
        for event in self.held.take().unwrap_or_default() {
            self.deliver(&event);
        }
    }

    /// Stop holding and drop the buffered events.
    pub fn discard(&mut self) -> usize {
        self.held.take().map_or(0, |held| held.len())
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    fn deliver(&mut self, event: &ChangeEvent<F>) {
        for (_, subscription) in self.subscriptions.iter_mut() {
            if subscription.fields.is_empty() || subscription.fields.contains(&event.field) {
                (subscription.callback)(event);
            }
        }
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

/// Records change events for later inspection.
///
/// Cloning shares the underlying buffer, so one clone can be handed to a
/// channel through [`listener`](Self::listener) while another is queried.
#[derive(Debug)]
pub struct ChangeRecorder<F> {
    events: Arc<Mutex<Vec<ChangeEvent<F>>>>,
}

impl<F> Clone for ChangeRecorder<F> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<F> Default for ChangeRecorder<F> {
    fn default() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<F: Clone + Send + 'static> ChangeRecorder<F> {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that appends every event it receives to this recorder.
    pub fn listener(&self) -> impl FnMut(&ChangeEvent<F>) + Send + 'static {
        let events = self.events.clone();
        move |event: &ChangeEvent<F>| events.lock().push(event.clone())
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> Vec<ChangeEvent<F>> {
        self.events.lock().clone()
    }

    /// Recorded fields, oldest first.
    pub fn fields(&self) -> Vec<F> {
        self.events.lock().iter().map(|e| e.field.clone()).collect()
    }

    /// Take recorded events, clearing the recorder.
    pub fn take(&self) -> Vec<ChangeEvent<F>> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
