//! Products deleted or trashed on the store.
//!
//! Checkout POS polls this list to remove products on its side. The first
//! deletion time is kept: trashing and then deleting a product does not
//! move it forward.

use std::collections::BTreeMap;

use checkout_pos_core::ProductId;

use super::options::{get_typed, keys, set_typed};
use super::{OptionStore, RepositoryError};

/// Post type the tracker cares about.
pub const PRODUCT_POST_TYPE: &str = "product";

/// Tracker for deleted product ids, stored as one option.
pub struct DeletedProductRepository<'a> {
    options: &'a dyn OptionStore,
}

impl<'a> DeletedProductRepository<'a> {
    /// Create a new tracker.
    #[must_use]
    pub const fn new(options: &'a dyn OptionStore) -> Self {
        Self { options }
    }

    async fn load(&self) -> Result<BTreeMap<ProductId, i64>, RepositoryError> {
        Ok(get_typed(self.options, keys::DELETED_PRODUCTS)
            .await?
            .unwrap_or_default())
    }

    /// Record a deletion unless the product is already tracked.
    ///
    /// Returns whether the product was newly added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the record cannot be read or written.
    pub async fn mark_deleted(
        &self,
        product_id: ProductId,
        deleted_at: i64,
    ) -> Result<bool, RepositoryError> {
        let mut deleted = self.load().await?;
        if deleted.contains_key(&product_id) {
            return Ok(false);
        }
        deleted.insert(product_id, deleted_at);
        set_typed(self.options, keys::DELETED_PRODUCTS, &deleted).await?;
        Ok(true)
    }

    /// Forget a product that was restored from the trash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the record cannot be read or written.
    pub async fn restore(&self, product_id: ProductId) -> Result<bool, RepositoryError> {
        let mut deleted = self.load().await?;
        if deleted.remove(&product_id).is_none() {
            return Ok(false);
        }
        set_typed(self.options, keys::DELETED_PRODUCTS, &deleted).await?;
        Ok(true)
    }

    /// Products deleted strictly after `deleted_after`, or all when `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the record cannot be read.
    pub async fn list(
        &self,
        deleted_after: Option<i64>,
    ) -> Result<BTreeMap<ProductId, i64>, RepositoryError> {
        let mut deleted = self.load().await?;
        if let Some(after) = deleted_after {
            deleted.retain(|_, deleted_at| *deleted_at > after);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryOptionStore;

    #[tokio::test]
    async fn test_first_deletion_time_wins() {
        let options = MemoryOptionStore::default();
        let tracker = DeletedProductRepository::new(&options);

        assert!(tracker.mark_deleted(ProductId::new(10), 1_000).await.unwrap());
        assert!(!tracker.mark_deleted(ProductId::new(10), 2_000).await.unwrap());

        let all = tracker.list(None).await.unwrap();
        assert_eq!(all.get(&ProductId::new(10)), Some(&1_000));
    }

    #[tokio::test]
    async fn test_filter_is_strictly_after() {
        let options = MemoryOptionStore::default();
        let tracker = DeletedProductRepository::new(&options);
        tracker.mark_deleted(ProductId::new(1), 100).await.unwrap();
        tracker.mark_deleted(ProductId::new(2), 200).await.unwrap();
        tracker.mark_deleted(ProductId::new(3), 300).await.unwrap();

        let recent = tracker.list(Some(200)).await.unwrap();
        assert_eq!(recent.keys().copied().collect::<Vec<_>>(), vec![ProductId::new(3)]);
        assert_eq!(tracker.list(None).await.unwrap().len(), 3);
        assert!(tracker.list(Some(300)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_removes_entry() {
        let options = MemoryOptionStore::default();
        let tracker = DeletedProductRepository::new(&options);
        tracker.mark_deleted(ProductId::new(7), 50).await.unwrap();

        assert!(tracker.restore(ProductId::new(7)).await.unwrap());
        assert!(!tracker.restore(ProductId::new(7)).await.unwrap());
        assert!(tracker.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stored_as_object_keyed_by_id() {
        let options = MemoryOptionStore::default();
        let tracker = DeletedProductRepository::new(&options);
        tracker.mark_deleted(ProductId::new(42), 1_700_000_000).await.unwrap();

        let raw = options.get(keys::DELETED_PRODUCTS).await.unwrap().unwrap();
        assert_eq!(raw, serde_json::json!({"42": 1_700_000_000}));
    }
}
