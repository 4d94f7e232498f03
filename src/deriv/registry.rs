use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::event::WsConnectionStatus;

pub type MessageHandler = Arc<dyn Fn(&Value) + Send + Sync>;
pub type StatusHandler = Arc<dyn Fn(WsConnectionStatus) + Send + Sync>;

/// Handlers never run while a registry lock is held, so a poisoned lock only
/// means a panic inside registry bookkeeping; the data is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Message handlers keyed by `msg_type`, plus connection status observers.
#[derive(Default)]
pub struct HandlerRegistry {
    next_id: u64,
    by_type: HashMap<String, Vec<(u64, MessageHandler)>>,
    status: Vec<(u64, StatusHandler)>,
}

impl HandlerRegistry {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_message(&mut self, msg_type: &str, handler: MessageHandler) -> u64 {
        let id = self.next_id();
        self.by_type
            .entry(msg_type.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    pub fn add_status(&mut self, handler: StatusHandler) -> u64 {
        let id = self.next_id();
        self.status.push((id, handler));
        id
    }

    pub fn remove(&mut self, key: &SubscriptionKey, id: u64) -> bool {
        match key {
            SubscriptionKey::Message(msg_type) => {
                let Some(handlers) = self.by_type.get_mut(msg_type) else {
                    return false;
                };
                let before = handlers.len();
                handlers.retain(|(hid, _)| *hid != id);
                let removed = handlers.len() != before;
                if handlers.is_empty() {
                    self.by_type.remove(msg_type);
                }
                removed
            }
            SubscriptionKey::Status => {
                let before = self.status.len();
                self.status.retain(|(hid, _)| *hid != id);
                self.status.len() != before
            }
        }
    }

    /// Snapshot of handlers for `msg_type` (exact match only).
    pub fn message_handlers(&self, msg_type: &str) -> Vec<MessageHandler> {
        self.by_type
            .get(msg_type)
            .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    pub fn status_handlers(&self) -> Vec<StatusHandler> {
        self.status.iter().map(|(_, h)| Arc::clone(h)).collect()
    }

    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum::<usize>() + self.status.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionKey {
    Message(String),
    Status,
}

/// Handle returned by `subscribe` / `on_connection_status`.
///
/// Dropping the handle keeps the handler registered; call
/// [`Subscription::unsubscribe`] to remove it. Removal only affects frames
/// dispatched afterwards.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    registry: std::sync::Weak<Mutex<HandlerRegistry>>,
    key: SubscriptionKey,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(
        registry: &Arc<Mutex<HandlerRegistry>>,
        key: SubscriptionKey,
        id: u64,
    ) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            key,
            id,
        }
    }

    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Returns `false` if the handler was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => lock(&registry).remove(&self.key, self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}
