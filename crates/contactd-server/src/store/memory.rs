// SPDX-License-Identifier: Apache-2.0

use crate::{ContactStoreBackend, StoreError};
use async_trait::async_trait;
use contactd_model::{ContactDocument, ContactId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// In-process document store. The default backend when no store URL is
/// configured, and the test double everywhere else.
pub struct MemoryStore {
    documents: Mutex<HashMap<ContactId, ContactDocument>>,
    id_seed: AtomicU64,
    /// When set, upsert/delete fail as if the store were unreachable.
    pub fail_writes: AtomicBool,
    /// When set, reads stall for `read_delay` before answering.
    pub slow_reads: bool,
    pub read_delay: Duration,
    pub upsert_calls: AtomicU64,
    pub delete_calls: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            id_seed: AtomicU64::new(1),
            fail_writes: AtomicBool::new(false),
            slow_reads: false,
            read_delay: Duration::from_millis(0),
            upsert_calls: AtomicU64::new(0),
            delete_calls: AtomicU64::new(0),
        }
    }
}

impl MemoryStore {
    fn mint_id(&self) -> Result<ContactId, StoreError> {
        let seed = self.id_seed.fetch_add(1, Ordering::Relaxed);
        ContactId::parse(&format!("contact-{seed:08x}"))
            .map_err(|e| StoreError::corrupt(format!("minted id rejected: {e}")))
    }

    /// Seeds a raw document at a fixed key, bypassing upsert. Lets tests
    /// co-locate foreign record kinds in the shared collection.
    pub async fn seed_document(&self, id: ContactId, doc: ContactDocument) {
        self.documents.lock().await.insert(id, doc);
    }

    pub async fn document_count(&self) -> usize {
        self.documents.lock().await.len()
    }

    async fn stall_read(&self) {
        if self.slow_reads {
            let delay = if self.read_delay.is_zero() {
                Duration::from_millis(200)
            } else {
                self.read_delay
            };
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ContactStoreBackend for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn query_by_type(
        &self,
        doc_type: &str,
    ) -> Result<Vec<(ContactId, ContactDocument)>, StoreError> {
        self.stall_read().await;
        let documents = self.documents.lock().await;
        Ok(documents
            .iter()
            .filter(|(_, doc)| doc.doc_type == doc_type)
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect())
    }

    async fn get(&self, id: &ContactId) -> Result<Option<ContactDocument>, StoreError> {
        self.stall_read().await;
        Ok(self.documents.lock().await.get(id).cloned())
    }

    async fn upsert(
        &self,
        id: Option<&ContactId>,
        doc: &ContactDocument,
    ) -> Result<ContactId, StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::unavailable("injected write failure"));
        }
        let id = match id {
            Some(id) => id.clone(),
            None => self.mint_id()?,
        };
        self.documents.lock().await.insert(id.clone(), doc.clone());
        Ok(id)
    }

    async fn delete(&self, id: &ContactId) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::unavailable("injected write failure"));
        }
        self.documents.lock().await.remove(id);
        Ok(())
    }
}
