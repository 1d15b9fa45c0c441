//! Collaborator seam to the external product catalog.

use std::sync::Arc;

use stockledger_core::ProductId;

/// Existence check against the product catalog.
///
/// The ledger never owns product data; it only refuses to track stock for a
/// product the catalog does not know about. Implementations live with the
/// surrounding service (HTTP client, database lookup, fixture set in tests).
pub trait ProductCatalog: Send + Sync {
    fn product_exists(&self, product_id: ProductId) -> bool;
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn product_exists(&self, product_id: ProductId) -> bool {
        (**self).product_exists(product_id)
    }
}
