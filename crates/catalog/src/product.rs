use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use merchstore_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Price, Size};
use merchstore_events::Event;

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Product.
///
/// A product carries the live price (minor units), presentation data, the set
/// of sizes it is offered in, and the archived flag. Stock counts live in the
/// inventory ledger, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    price: Price,
    image_links: Vec<String>,
    about: Vec<String>,
    sizes: BTreeSet<Size>,
    archived: bool,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            name: String::new(),
            price: Price::ZERO,
            image_links: Vec::new(),
            about: Vec::new(),
            sizes: BTreeSet::new(),
            archived: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn image_links(&self) -> &[String] {
        &self.image_links
    }

    pub fn about(&self) -> &[String] {
        &self.about
    }

    pub fn sizes(&self) -> &BTreeSet<Size> {
        &self.sizes
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    /// Archived products are excluded from the public catalog and checkout.
    pub fn can_be_sold(&self) -> bool {
        self.created && !self.archived
    }

    /// Whether an order line for this product must carry a size.
    pub fn requires_size(&self) -> bool {
        !self.sizes.is_empty()
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_links: Vec<String>,
    pub about: Vec<String>,
    pub sizes: BTreeSet<Size>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditProduct.
///
/// `expected_version` is the aggregate version the editor last saw. A
/// mismatch means someone else saved the product in the meantime and the
/// edit is rejected with a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditProduct {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_links: Vec<String>,
    pub about: Vec<String>,
    pub sizes: BTreeSet<Size>,
    pub archived: bool,
    pub expected_version: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UnarchiveProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnarchiveProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    EditProduct(EditProduct),
    ArchiveProduct(ArchiveProduct),
    UnarchiveProduct(UnarchiveProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_links: Vec<String>,
    pub about: Vec<String>,
    pub sizes: BTreeSet<Size>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductEdited (full snapshot of the editable fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEdited {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_links: Vec<String>,
    pub about: Vec<String>,
    pub sizes: BTreeSet<Size>,
    pub archived: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductUnarchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUnarchived {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductEdited(ProductEdited),
    ProductArchived(ProductArchived),
    ProductUnarchived(ProductUnarchived),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductEdited(_) => "catalog.product.edited",
            ProductEvent::ProductArchived(_) => "catalog.product.archived",
            ProductEvent::ProductUnarchived(_) => "catalog.product.unarchived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductEdited(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
            ProductEvent::ProductUnarchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.name = e.name.clone();
                self.price = e.price;
                self.image_links = e.image_links.clone();
                self.about = e.about.clone();
                self.sizes = e.sizes.clone();
                self.archived = false;
                self.created = true;
            }
            ProductEvent::ProductEdited(e) => {
                self.name = e.name.clone();
                self.price = e.price;
                self.image_links = e.image_links.clone();
                self.about = e.about.clone();
                self.sizes = e.sizes.clone();
                self.archived = e.archived;
            }
            ProductEvent::ProductArchived(_) => {
                self.archived = true;
            }
            ProductEvent::ProductUnarchived(_) => {
                self.archived = false;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::EditProduct(cmd) => self.handle_edit(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
            ProductCommand::UnarchiveProduct(cmd) => self.handle_unarchive(cmd),
        }
    }
}

impl Product {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn validate_fields(name: &str, price: Price) -> Result<(), DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if price.is_zero() {
            return Err(DomainError::validation("price must be positive"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        Self::validate_fields(&cmd.name, cmd.price)?;

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            name: cmd.name.clone(),
            price: cmd.price,
            image_links: cmd.image_links.clone(),
            about: cmd.about.clone(),
            sizes: cmd.sizes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_edit(&self, cmd: &EditProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if cmd.expected_version != self.version {
            return Err(DomainError::conflict(
                "product has been updated by someone else",
            ));
        }

        Self::validate_fields(&cmd.name, cmd.price)?;

        Ok(vec![ProductEvent::ProductEdited(ProductEdited {
            product_id: cmd.product_id,
            name: cmd.name.clone(),
            price: cmd.price,
            image_links: cmd.image_links.clone(),
            about: cmd.about.clone(),
            sizes: cmd.sizes.clone(),
            archived: cmd.archived,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if self.archived {
            return Err(DomainError::validation("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_unarchive(&self, cmd: &UnarchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if !self.archived {
            return Err(DomainError::validation("product is not archived"));
        }

        Ok(vec![ProductEvent::ProductUnarchived(ProductUnarchived {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_product(id: ProductId) -> Product {
        let mut product = Product::empty(id);
        let events = product
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                name: "Club Hoodie".to_string(),
                price: Price::from_minor_units(4500),
                image_links: vec!["https://img.example/hoodie.png".to_string()],
                about: vec!["80% cotton".to_string()],
                sizes: BTreeSet::from([Size::S, Size::M, Size::L]),
                occurred_at: test_time(),
            }))
            .unwrap();
        product.apply(&events[0]);
        product
    }

    #[test]
    fn create_product_emits_created_event() {
        let id = test_product_id();
        let product = created_product(id);

        assert!(product.exists());
        assert_eq!(product.name(), "Club Hoodie");
        assert_eq!(product.price(), Price::from_minor_units(4500));
        assert!(product.requires_size());
        assert!(product.can_be_sold());
        assert_eq!(product.version(), 1);
    }

    #[test]
    fn create_rejects_empty_name_and_zero_price() {
        let id = test_product_id();
        let product = Product::empty(id);

        let err = product
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                name: "  ".to_string(),
                price: Price::from_minor_units(100),
                image_links: vec![],
                about: vec![],
                sizes: BTreeSet::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = product
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                name: "Sticker".to_string(),
                price: Price::ZERO,
                image_links: vec![],
                about: vec![],
                sizes: BTreeSet::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn edit_with_stale_version_conflicts() {
        let id = test_product_id();
        let product = created_product(id);

        let edit = EditProduct {
            product_id: id,
            name: "Club Hoodie v2".to_string(),
            price: Price::from_minor_units(5000),
            image_links: vec![],
            about: vec![],
            sizes: BTreeSet::from([Size::M]),
            archived: false,
            expected_version: 0, // someone else already saved version 1
            occurred_at: test_time(),
        };

        let err = product
            .handle(&ProductCommand::EditProduct(edit))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn edit_applies_full_snapshot() {
        let id = test_product_id();
        let mut product = created_product(id);

        let events = product
            .handle(&ProductCommand::EditProduct(EditProduct {
                product_id: id,
                name: "Club Hoodie v2".to_string(),
                price: Price::from_minor_units(5000),
                image_links: vec![],
                about: vec!["90% cotton".to_string()],
                sizes: BTreeSet::from([Size::M, Size::L]),
                archived: true,
                expected_version: product.version(),
                occurred_at: test_time(),
            }))
            .unwrap();
        product.apply(&events[0]);

        assert_eq!(product.name(), "Club Hoodie v2");
        assert_eq!(product.price(), Price::from_minor_units(5000));
        assert_eq!(product.sizes(), &BTreeSet::from([Size::M, Size::L]));
        assert!(product.is_archived());
        assert!(!product.can_be_sold());
        assert_eq!(product.version(), 2);
    }

    #[test]
    fn archive_and_unarchive_round_trip() {
        let id = test_product_id();
        let mut product = created_product(id);

        let events = product
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                product_id: id,
                occurred_at: test_time(),
            }))
            .unwrap();
        product.apply(&events[0]);
        assert!(product.is_archived());

        // Archiving twice is rejected.
        let err = product
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                product_id: id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let events = product
            .handle(&ProductCommand::UnarchiveProduct(UnarchiveProduct {
                product_id: id,
                occurred_at: test_time(),
            }))
            .unwrap();
        product.apply(&events[0]);
        assert!(product.can_be_sold());
    }

    #[test]
    fn commands_against_missing_product_are_not_found() {
        let id = test_product_id();
        let product = Product::empty(id);

        let err = product
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                product_id: id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let id = test_product_id();
        let product = created_product(id);
        let before = product.clone();

        let _ = product.handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
            product_id: id,
            occurred_at: test_time(),
        }));

        assert_eq!(product, before);
    }
}
