use crate::{ContactStoreBackend, StoreError};
use contactd_model::{Contact, ContactId, DOC_TYPE};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Data-access boundary: one long-lived backend handle, bound at bootstrap
/// and never reassigned. Every operation filters on the `"Contact"`
/// discriminator so unrelated record kinds sharing the collection never
/// leak through.
pub struct ContactContext {
    backend: Arc<dyn ContactStoreBackend>,
    store_timeout: Duration,
}

impl ContactContext {
    #[must_use]
    pub fn new(backend: Arc<dyn ContactStoreBackend>, store_timeout: Duration) -> Self {
        Self {
            backend,
            store_timeout,
        }
    }

    #[must_use]
    pub fn backend_tag(&self) -> &'static str {
        self.backend.backend_tag()
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl std::future::Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::unavailable(format!("store {op} timed out"))),
        }
    }

    /// Lists every contact-typed record, sorted by identity for stable
    /// output.
    pub async fn list(&self) -> Result<Vec<Contact>, StoreError> {
        let rows = self
            .bounded("query", self.backend.query_by_type(DOC_TYPE))
            .await?;
        let mut contacts = Vec::with_capacity(rows.len());
        for (id, doc) in rows {
            let contact = Contact::from_document(id, doc)
                .map_err(|e| StoreError::corrupt(e.to_string()))?;
            contacts.push(contact);
        }
        contacts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(contacts)
    }

    /// Lookup by store identity. A document of another record kind at the
    /// requested key does not count as a match.
    pub async fn find_by_id(&self, id: &ContactId) -> Result<Option<Contact>, StoreError> {
        let Some(doc) = self.bounded("get", self.backend.get(id)).await? else {
            return Ok(None);
        };
        if !doc.is_contact() {
            warn!(id = %id, doc_type = %doc.doc_type, "lookup hit a foreign record kind");
            return Ok(None);
        }
        Contact::from_document(id.clone(), doc)
            .map(Some)
            .map_err(|e| StoreError::corrupt(e.to_string()))
    }

    /// Upsert: the store assigns an identity when the record has none,
    /// otherwise the document at that identity is overwritten in place.
    /// Overwriting a foreign record kind is refused.
    pub async fn save(&self, contact: &Contact) -> Result<Contact, StoreError> {
        if let Some(id) = &contact.id {
            if let Some(existing) = self.bounded("get", self.backend.get(id)).await? {
                if !existing.is_contact() {
                    return Err(StoreError::conflict(format!(
                        "document {id} holds a {:?} record, refusing overwrite",
                        existing.doc_type
                    )));
                }
            }
        }
        let doc = contact.to_document();
        let id = self
            .bounded("upsert", self.backend.upsert(contact.id.as_ref(), &doc))
            .await?;
        Ok(Contact {
            id: Some(id),
            name: contact.name.clone(),
            number: contact.number.clone(),
        })
    }

    /// Delete by identity. Absent documents are not an error at this
    /// layer; handlers pre-check existence where not-found matters.
    pub async fn remove(&self, id: &ContactId) -> Result<(), StoreError> {
        self.bounded("delete", self.backend.delete(id)).await
    }

    /// One cheap round-trip, used to gate readiness at bootstrap.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.bounded("query", self.backend.query_by_type(DOC_TYPE))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use contactd_model::ContactDocument;
    use std::sync::atomic::Ordering;

    fn context() -> (Arc<MemoryStore>, ContactContext) {
        let store = Arc::new(MemoryStore::default());
        let ctx = ContactContext::new(store.clone(), Duration::from_secs(1));
        (store, ctx)
    }

    #[tokio::test]
    async fn save_without_identity_assigns_one_and_roundtrips() {
        let (_, ctx) = context();
        let saved = ctx
            .save(&Contact::new("Alice", "555-0100").expect("contact"))
            .await
            .expect("save");
        let id = saved.id.clone().expect("assigned id");
        assert!(!id.as_str().is_empty());

        let found = ctx.find_by_id(&id).await.expect("find").expect("present");
        assert_eq!(found.name, "Alice");
        assert_eq!(found.number, "555-0100");
    }

    #[tokio::test]
    async fn list_returns_exactly_the_saved_and_not_removed_contacts() {
        let (_, ctx) = context();
        let alice = ctx
            .save(&Contact::new("Alice", "555-0100").expect("contact"))
            .await
            .expect("save alice");
        ctx.save(&Contact::new("Bob", "555-0101").expect("contact"))
            .await
            .expect("save bob");

        assert_eq!(ctx.list().await.expect("list").len(), 2);

        ctx.remove(alice.id.as_ref().expect("id")).await.expect("remove");
        let rows = ctx.list().await.expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Bob");
    }

    #[tokio::test]
    async fn list_skips_foreign_record_kinds_in_the_shared_collection() {
        let (store, ctx) = context();
        let mut airline = ContactDocument::new("ACME Air", "n/a");
        airline.doc_type = "Airline".to_string();
        store
            .seed_document(ContactId::parse("airline-1").expect("id"), airline)
            .await;
        ctx.save(&Contact::new("Alice", "555-0100").expect("contact"))
            .await
            .expect("save");

        let rows = ctx.list().await.expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Alice");
    }

    #[tokio::test]
    async fn saving_with_an_existing_id_overwrites_rather_than_duplicates() {
        let (store, ctx) = context();
        let saved = ctx
            .save(&Contact::new("Alice", "555-0100").expect("contact"))
            .await
            .expect("save");

        let mut edited = saved.clone();
        edited.number = "555-0199".to_string();
        let resaved = ctx.save(&edited).await.expect("resave");

        assert_eq!(saved.id, resaved.id);
        assert_eq!(store.document_count().await, 1);
        let found = ctx
            .find_by_id(saved.id.as_ref().expect("id"))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found.number, "555-0199");
    }

    #[tokio::test]
    async fn save_refuses_to_overwrite_a_foreign_record() {
        let (store, ctx) = context();
        let id = ContactId::parse("airline-1").expect("id");
        let mut airline = ContactDocument::new("ACME Air", "n/a");
        airline.doc_type = "Airline".to_string();
        store.seed_document(id.clone(), airline).await;

        let contact = Contact::new("Alice", "555-0100").expect("contact").with_id(id);
        let err = ctx.save(&contact).await.expect_err("conflict");
        assert_eq!(err.kind, crate::StoreErrorKind::Conflict);
        assert_eq!(store.upsert_calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn remove_then_find_returns_absent() {
        let (_, ctx) = context();
        let saved = ctx
            .save(&Contact::new("Alice", "555-0100").expect("contact"))
            .await
            .expect("save");
        let id = saved.id.expect("id");
        ctx.remove(&id).await.expect("remove");
        assert!(ctx.find_by_id(&id).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn lookup_of_a_foreign_record_kind_is_absent_not_an_error() {
        let (store, ctx) = context();
        let id = ContactId::parse("airline-1").expect("id");
        let mut airline = ContactDocument::new("ACME Air", "n/a");
        airline.doc_type = "Airline".to_string();
        store.seed_document(id.clone(), airline).await;

        assert!(ctx.find_by_id(&id).await.expect("find").is_none());
    }
}
