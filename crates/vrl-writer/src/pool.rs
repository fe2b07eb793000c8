use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vrl_ledger::Ledger;
use vrl_types::Identity;

use crate::config::WriterConfig;
use crate::serializer::WriteSerializer;

/// One [`WriteSerializer`] per submitting identity, spawned on first use.
pub struct WriterPool {
    ledger: Arc<dyn Ledger>,
    config: WriterConfig,
    writers: Mutex<HashMap<Identity, WriteSerializer>>,
}

impl WriterPool {
    pub fn new(ledger: Arc<dyn Ledger>, config: WriterConfig) -> Self {
        Self {
            ledger,
            config,
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// The serializer for `identity`. Must be called within a tokio runtime
    /// the first time a given identity is seen.
    pub fn writer(&self, identity: Identity) -> WriteSerializer {
        self.writers
            .lock()
            .expect("writer pool lock poisoned")
            .entry(identity)
            .or_insert_with(|| {
                WriteSerializer::spawn(self.ledger.clone(), identity, self.config.clone())
            })
            .clone()
    }

    pub fn identities(&self) -> Vec<Identity> {
        let mut ids: Vec<Identity> = self
            .writers
            .lock()
            .expect("writer pool lock poisoned")
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.writers.lock().expect("writer pool lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
