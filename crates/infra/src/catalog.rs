//! Catalog adapters.

use std::collections::HashSet;
use std::sync::RwLock;

use stockledger_core::ProductId;
use stockledger_inventory::ProductCatalog;

/// Catalog backed by an in-process set of known product ids.
///
/// Useful for tests and for deployments where the product list is loaded at
/// startup. An unavailable check (poisoned lock) reads as "unknown", keeping
/// the existence check fail-closed.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    products: RwLock<HashSet<ProductId>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            products: RwLock::new(products.into_iter().collect()),
        }
    }

    pub fn add(&self, product_id: ProductId) {
        if let Ok(mut products) = self.products.write() {
            products.insert(product_id);
        }
    }
}

impl ProductCatalog for StaticCatalog {
    fn product_exists(&self, product_id: ProductId) -> bool {
        self.products
            .read()
            .map(|products| products.contains(&product_id))
            .unwrap_or(false)
    }
}
