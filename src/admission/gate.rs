//! Admission gate in front of the store.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::ratelimit::ClientRegistry;
use crate::store::Store;

/// A store operation requested by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Get { key: String },
    Set { key: String, value: String },
    Delete { key: String },
    List,
}

impl Operation {
    fn kind(&self) -> &'static str {
        match self {
            Operation::Get { .. } => "get",
            Operation::Set { .. } => "set",
            Operation::Delete { .. } => "delete",
            Operation::List => "list",
        }
    }
}

/// Result of an admitted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Value for a `Get`; `None` when the key is absent
    Value(Option<String>),
    /// A `Set` was applied
    Stored,
    /// Whether a `Delete` removed an existing key
    Deleted(bool),
    /// Key snapshot for a `List`
    Keys(Vec<String>),
}

/// The client's bucket had no token for this request.
#[derive(Debug, Clone, Error)]
#[error("rate limit exceeded for client {identity}")]
pub struct AdmissionDenied {
    /// The identity that was throttled
    pub identity: String,
    /// Time until the next token becomes available
    pub retry_after: Duration,
}

/// Composes the client registry with the store: every operation spends one
/// token from the caller's bucket before it may touch the store.
#[derive(Debug)]
pub struct AdmissionGate {
    registry: Arc<ClientRegistry>,
    store: Arc<Store>,
}

impl AdmissionGate {
    pub fn new(registry: Arc<ClientRegistry>, store: Arc<Store>) -> Self {
        Self { registry, store }
    }

    /// Spend one token for `identity` without touching the store.
    pub fn check(&self, identity: &str) -> Result<(), AdmissionDenied> {
        let bucket = self.registry.get_or_create(identity);

        if bucket.allow() {
            Ok(())
        } else {
            let retry_after = bucket.retry_after();
            warn!(
                client = %identity,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            Err(AdmissionDenied {
                identity: identity.to_owned(),
                retry_after,
            })
        }
    }

    /// Admit `identity` and, if a token was available, run `op` on the store.
    pub fn execute(&self, identity: &str, op: Operation) -> Result<Outcome, AdmissionDenied> {
        self.check(identity)?;
        debug!(client = %identity, op = op.kind(), "Operation admitted");
        Ok(self.apply(op))
    }

    fn apply(&self, op: Operation) -> Outcome {
        match op {
            Operation::Get { key } => Outcome::Value(self.store.get(&key)),
            Operation::Set { key, value } => {
                self.store.set(key, value);
                Outcome::Stored
            }
            Operation::Delete { key } => Outcome::Deleted(self.store.del(&key)),
            Operation::List => Outcome::Keys(self.store.keys()),
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}
