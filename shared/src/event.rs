//! Typed events with scoped subscriptions.
//!
//! An [`Event`] owns a list of handlers. Subscribing returns an [`EventHandler`] guard;
//! dropping the guard (or calling [`EventHandler::disconnect`]) removes the handler, so a
//! subscriber can never be called back after it has been torn down.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

type HandlerFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct HandlerList<T> {
    next_id: u64,
    handlers: Vec<(u64, HandlerFn<T>)>,
}

fn lock_list<T>(list: &Mutex<HandlerList<T>>) -> MutexGuard<'_, HandlerList<T>> {
    match list.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct Event<T> {
    list: Arc<Mutex<HandlerList<T>>>,
}

impl<T: 'static> Event<T> {
    pub fn new() -> Self {
        Self {
            list: Arc::new(Mutex::new(HandlerList {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    pub fn add_handler<F>(&self, handler: F) -> EventHandler
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut list = lock_list(&self.list);
            let id = list.next_id;
            list.next_id += 1;
            list.handlers.push((id, Arc::new(handler)));
            id
        };

        let weak_list: Weak<Mutex<HandlerList<T>>> = Arc::downgrade(&self.list);
        EventHandler {
            unsubscribe: Some(Box::new(move || {
                if let Some(list) = weak_list.upgrade() {
                    lock_list(&list).handlers.retain(|(handler_id, _)| *handler_id != id);
                }
            })),
        }
    }

    /// Invokes every connected handler, in subscription order.
    ///
    /// The handler list is copied before invocation, so a handler may subscribe or
    /// unsubscribe without deadlocking.
    pub fn signal(&self, args: &T) {
        let handlers: Vec<HandlerFn<T>> = lock_list(&self.list)
            .handlers
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(args);
        }
    }

    pub fn handler_count(&self) -> usize {
        lock_list(&self.list).handlers.len()
    }
}

impl<T: 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription guard returned by [`Event::add_handler`]
pub struct EventHandler {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl EventHandler {
    pub fn disconnect(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.unsubscribe.is_some()
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.disconnect();
    }
}
