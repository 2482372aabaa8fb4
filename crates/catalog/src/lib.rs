//! `merchstore-catalog` — product catalog domain.

pub mod product;
pub mod snapshot;

pub use product::{
    ArchiveProduct, CreateProduct, EditProduct, Product, ProductArchived, ProductCommand,
    ProductCreated, ProductEdited, ProductEvent, ProductId, ProductUnarchived, UnarchiveProduct,
};
pub use snapshot::ProductSnapshot;
