//! Wake registry
//!
//! Tracks which servers currently have a decoy listener. At most one entry
//! per server and at most one entry per port.

use dashmap::DashMap;
use std::sync::Arc;

use snooze_core::error::RegistryError;
use snooze_core::ServerId;

use crate::decoy::DecoyListener;

/// Active decoy listeners indexed by server
pub struct WakeRegistry {
    listeners: DashMap<ServerId, Arc<DecoyListener>>,
}

impl WakeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
        }
    }

    /// Track a freshly opened listener.
    ///
    /// On error the listener is dropped, which closes it.
    pub fn register(&self, listener: DecoyListener) -> Result<Arc<DecoyListener>, RegistryError> {
        let server_id = listener.server_id().clone();

        if let Some(holder) = self.holder_of_port(listener.port()) {
            if holder != server_id {
                return Err(RegistryError::PortClaimed {
                    port: listener.port(),
                    holder,
                });
            }
        }

        match self.listeners.entry(server_id) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                Err(RegistryError::AlreadyListening(entry.key().clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let listener = Arc::new(listener);
                entry.insert(Arc::clone(&listener));
                Ok(listener)
            }
        }
    }

    /// Remove and close the listener for `server_id`
    pub fn unregister(&self, server_id: &ServerId) -> Option<Arc<DecoyListener>> {
        let (_, listener) = self.listeners.remove(server_id)?;
        listener.close();
        Some(listener)
    }

    /// Remove the entry for `server_id` only if its listener has finished.
    ///
    /// Used for wake signals, which may arrive after a newer listener for the
    /// same server was registered.
    pub fn unregister_closed(&self, server_id: &ServerId) -> bool {
        self.listeners
            .remove_if(server_id, |_, listener| listener.is_closed())
            .is_some()
    }

    /// Whether `server_id` has a listener
    pub fn has(&self, server_id: &ServerId) -> bool {
        self.listeners.contains_key(server_id)
    }

    /// Get the listener for `server_id`
    pub fn get(&self, server_id: &ServerId) -> Option<Arc<DecoyListener>> {
        self.listeners.get(server_id).map(|r| Arc::clone(&r))
    }

    /// Server whose listener holds `port`
    pub fn holder_of_port(&self, port: u16) -> Option<ServerId> {
        self.listeners
            .iter()
            .find(|r| r.value().port() == port)
            .map(|r| r.key().clone())
    }

    /// List all listeners
    pub fn all(&self) -> Vec<Arc<DecoyListener>> {
        self.listeners.iter().map(|r| Arc::clone(&r)).collect()
    }

    /// Identifiers of all servers with a listener
    pub fn server_ids(&self) -> Vec<ServerId> {
        self.listeners.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of active listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Close and forget every listener, waiting for the ports to be released
    pub async fn close_all(&self) {
        let listeners: Vec<Arc<DecoyListener>> = self.all();
        self.listeners.clear();

        for listener in &listeners {
            listener.close();
        }
        for listener in &listeners {
            listener.wait_closed().await;
        }

        if !listeners.is_empty() {
            tracing::info!("Closed {} decoy listeners", listeners.len());
        }
    }
}

impl Default for WakeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
