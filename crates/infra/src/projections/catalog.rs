use std::collections::BTreeSet;

use serde_json::Value as JsonValue;

use merchstore_catalog::{ProductEvent, ProductId, ProductSnapshot};
use merchstore_core::{Price, Size};
use merchstore_events::EventEnvelope;

use super::{CursorDecision, Cursors, ProjectionError};
use crate::read_model::ReadStore;
use crate::service::CatalogLookup;

/// Queryable product read model.
///
/// `version` is the stream sequence of the last applied event; it equals the
/// aggregate version and backs the admin edit conflict check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_links: Vec<String>,
    pub about: Vec<String>,
    pub sizes: BTreeSet<Size>,
    pub archived: bool,
    pub version: u64,
}

impl CatalogRecord {
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.product_id,
            name: self.name.clone(),
            price: self.price,
            archived: self.archived,
            sizes: self.sizes.clone(),
        }
    }
}

/// Catalog projection.
///
/// Consumes published envelopes (JSON payloads) and maintains the product
/// read model behind the public catalog, cart reconciliation, and the admin
/// product list.
#[derive(Debug)]
pub struct CatalogProjection<S>
where
    S: ReadStore<ProductId, CatalogRecord>,
{
    store: S,
    cursors: Cursors,
}

impl<S> CatalogProjection<S>
where
    S: ReadStore<ProductId, CatalogRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<CatalogRecord> {
        self.store.get(product_id)
    }

    /// All products, archived included, sorted by name. Admin view.
    pub fn list_all(&self) -> Vec<CatalogRecord> {
        let mut records = self.store.list();
        records.sort_by(|a, b| a.name.cmp(&b.name).then(a.product_id.cmp(&b.product_id)));
        records
    }

    /// Products visible in the public storefront.
    pub fn list_public(&self) -> Vec<CatalogRecord> {
        let mut records = self.store.list();
        records.retain(|r| !r.archived);
        records.sort_by(|a, b| a.name.cmp(&b.name).then(a.product_id.cmp(&b.product_id)));
        records
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if self.cursors.check(aggregate_id, seq)? == CursorDecision::Skip {
            return Ok(());
        }

        let event: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let product_id = match &event {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductEdited(e) => e.product_id,
            ProductEvent::ProductArchived(e) => e.product_id,
            ProductEvent::ProductUnarchived(e) => e.product_id,
        };
        if product_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    e.product_id,
                    CatalogRecord {
                        product_id: e.product_id,
                        name: e.name,
                        price: e.price,
                        image_links: e.image_links,
                        about: e.about,
                        sizes: e.sizes,
                        archived: false,
                        version: seq,
                    },
                );
            }
            ProductEvent::ProductEdited(e) => {
                if let Some(mut record) = self.store.get(&e.product_id) {
                    record.name = e.name;
                    record.price = e.price;
                    record.image_links = e.image_links;
                    record.about = e.about;
                    record.sizes = e.sizes;
                    record.archived = e.archived;
                    record.version = seq;
                    self.store.upsert(e.product_id, record);
                }
            }
            ProductEvent::ProductArchived(e) => {
                if let Some(mut record) = self.store.get(&e.product_id) {
                    record.archived = true;
                    record.version = seq;
                    self.store.upsert(e.product_id, record);
                }
            }
            ProductEvent::ProductUnarchived(e) => {
                if let Some(mut record) = self.store.get(&e.product_id) {
                    record.archived = false;
                    record.version = seq;
                    self.store.upsert(e.product_id, record);
                }
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.reset();
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}

impl<S> CatalogLookup for CatalogProjection<S>
where
    S: ReadStore<ProductId, CatalogRecord>,
{
    fn snapshot(&self, product_id: ProductId) -> Option<ProductSnapshot> {
        self.get(&product_id).map(|record| record.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use merchstore_catalog::{ProductArchived, ProductCreated};
    use merchstore_core::AggregateId;
    use merchstore_events::Event;

    use super::*;
    use crate::read_model::InMemoryReadStore;

    fn envelope(product_id: ProductId, seq: u64, event: &ProductEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            product_id.0,
            "catalog.product".to_string(),
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn created(product_id: ProductId) -> ProductEvent {
        ProductEvent::ProductCreated(ProductCreated {
            product_id,
            name: "Beanie".to_string(),
            price: Price::from_minor_units(1200),
            image_links: vec![],
            about: vec![],
            sizes: BTreeSet::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn created_then_archived_leaves_the_public_list() {
        let projection = CatalogProjection::new(InMemoryReadStore::new());
        let id = ProductId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(id, 1, &created(id)))
            .unwrap();
        assert_eq!(projection.list_public().len(), 1);

        let archived = ProductEvent::ProductArchived(ProductArchived {
            product_id: id,
            occurred_at: Utc::now(),
        });
        projection
            .apply_envelope(&envelope(id, 2, &archived))
            .unwrap();

        assert!(projection.list_public().is_empty());
        assert_eq!(projection.list_all().len(), 1);

        let record = projection.get(&id).unwrap();
        assert!(record.archived);
        assert_eq!(record.version, 2);
        assert!(record.snapshot().archived);
    }

    #[test]
    fn duplicate_envelopes_are_ignored() {
        let projection = CatalogProjection::new(InMemoryReadStore::new());
        let id = ProductId::new(AggregateId::new());

        let env = envelope(id, 1, &created(id));
        projection.apply_envelope(&env).unwrap();
        projection.apply_envelope(&env).unwrap();

        assert_eq!(projection.list_all().len(), 1);
        assert_eq!(projection.get(&id).unwrap().version, 1);
    }

    #[test]
    fn sequence_gaps_are_rejected() {
        let projection = CatalogProjection::new(InMemoryReadStore::new());
        let id = ProductId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(id, 1, &created(id)))
            .unwrap();

        let archived = ProductEvent::ProductArchived(ProductArchived {
            product_id: id,
            occurred_at: Utc::now(),
        });
        let err = projection
            .apply_envelope(&envelope(id, 3, &archived))
            .unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::NonMonotonicSequence { last: 1, found: 3 }
        ));
    }

    #[test]
    fn event_type_names_are_stable() {
        let id = ProductId::new(AggregateId::new());
        assert_eq!(created(id).event_type(), "catalog.product.created");
    }
}
