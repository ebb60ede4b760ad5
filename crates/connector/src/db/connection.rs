//! Connection state records.
//!
//! The connection is never stored as a single flag: it is derived from the
//! owner id and the merchant details, both of which live as options.

use checkout_pos_core::{MerchantDetails, UserId};

use super::options::{get_string, get_typed, keys, set_typed};
use super::{OptionStore, RepositoryError, UserDirectory};
use crate::models::OAuthApplication;
use crate::models::oauth::OAuthApplicationRecord;

/// Snapshot of the persisted connection records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub owner_user_id: Option<UserId>,
    pub merchant: Option<MerchantDetails>,
}

/// Typed access to the connection-related options.
pub struct ConnectionRepository<'a> {
    options: &'a dyn OptionStore,
}

impl<'a> ConnectionRepository<'a> {
    /// Create a new connection repository.
    #[must_use]
    pub const fn new(options: &'a dyn OptionStore) -> Self {
        Self { options }
    }

    /// Load the connection state, resolving the owner against `users`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a record cannot be read or is corrupted.
    pub async fn load(&self, users: &dyn UserDirectory) -> Result<ConnectionState, RepositoryError> {
        let owner_user_id = self.owner().await?;
        let merchant = self.merchant().await?;

        let owner_exists = match owner_user_id {
            Some(id) => users.find(id).await?.is_some(),
            None => false,
        };
        let merchant_valid = merchant.as_ref().is_some_and(MerchantDetails::is_valid);

        Ok(ConnectionState {
            is_connected: owner_exists && merchant_valid,
            owner_user_id,
            merchant,
        })
    }

    /// Id of the connection owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the record cannot be read.
    pub async fn owner(&self) -> Result<Option<UserId>, RepositoryError> {
        get_typed(self.options, keys::OWNER_USER).await
    }

    /// Record `user_id` as the connection owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    pub async fn set_owner(&self, user_id: UserId) -> Result<(), RepositoryError> {
        set_typed(self.options, keys::OWNER_USER, &user_id).await
    }

    /// Merchant details from the last handshake.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the record cannot be read or is corrupted.
    pub async fn merchant(&self) -> Result<Option<MerchantDetails>, RepositoryError> {
        get_typed(self.options, keys::MERCHANT_DETAILS).await
    }

    /// Replace the merchant details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    pub async fn set_merchant(&self, merchant: &MerchantDetails) -> Result<(), RepositoryError> {
        set_typed(self.options, keys::MERCHANT_DETAILS, merchant).await
    }

    /// Drop the owner and merchant records.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a delete fails.
    pub async fn clear(&self) -> Result<(), RepositoryError> {
        self.options.delete(keys::MERCHANT_DETAILS).await?;
        self.options.delete(keys::OWNER_USER).await?;
        Ok(())
    }

    /// Site URL recorded at the last successful connect.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the record cannot be read.
    pub async fn connected_site_url(&self) -> Result<Option<String>, RepositoryError> {
        Ok(get_string(self.options, keys::CONNECTED_SITE_URL)
            .await?
            .filter(|url| !url.is_empty()))
    }

    /// Record the site URL the connection was made from.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    pub async fn set_connected_site_url(&self, url: &str) -> Result<(), RepositoryError> {
        set_typed(self.options, keys::CONNECTED_SITE_URL, &url).await
    }

    /// Forget the recorded site URL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the delete fails.
    pub async fn clear_connected_site_url(&self) -> Result<(), RepositoryError> {
        self.options.delete(keys::CONNECTED_SITE_URL).await?;
        Ok(())
    }

    /// The registered WooCommerce-side OAuth application.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the record cannot be read or is corrupted.
    pub async fn application(&self) -> Result<Option<OAuthApplication>, RepositoryError> {
        let record: Option<OAuthApplicationRecord> =
            get_typed(self.options, keys::OAUTH_APPLICATION).await?;
        Ok(record.map(Into::into))
    }

    /// Replace the registered OAuth application.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    pub async fn set_application(&self, app: &OAuthApplication) -> Result<(), RepositoryError> {
        set_typed(
            self.options,
            keys::OAUTH_APPLICATION,
            &OAuthApplicationRecord::from(app),
        )
        .await
    }

    /// Remove the registered OAuth application.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the delete fails.
    pub async fn delete_application(&self) -> Result<bool, RepositoryError> {
        self.options.delete(keys::OAUTH_APPLICATION).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use checkout_pos_core::UserRole;

    use super::*;
    use crate::db::{MemoryOptionStore, MemoryUserDirectory};
    use crate::models::User;

    fn merchant(email: &str) -> MerchantDetails {
        MerchantDetails {
            merchant_id: Some(1),
            owner_email: email.to_string(),
            merchant_mode: None,
            owner_phone_number: None,
            merchant_name: None,
            billing_street: None,
            billing_zip: None,
            billing_city: None,
        }
    }

    async fn directory_with(id: i64) -> MemoryUserDirectory {
        let users = MemoryUserDirectory::default();
        users
            .upsert(&User {
                id: UserId::new(id),
                email: format!("user{id}@shop.fi"),
                display_name: "Owner".to_string(),
                role: UserRole::Administrator,
            })
            .await
            .unwrap();
        users
    }

    #[tokio::test]
    async fn test_absent_records_mean_disconnected() {
        let options = MemoryOptionStore::default();
        let users = MemoryUserDirectory::default();
        let state = ConnectionRepository::new(&options).load(&users).await.unwrap();
        assert_eq!(state, ConnectionState::default());
    }

    #[tokio::test]
    async fn test_connected_requires_existing_owner_and_valid_merchant() {
        let options = MemoryOptionStore::default();
        let users = directory_with(3).await;
        let repo = ConnectionRepository::new(&options);

        repo.set_merchant(&merchant("owner@shop.fi")).await.unwrap();
        assert!(!repo.load(&users).await.unwrap().is_connected);

        repo.set_owner(UserId::new(3)).await.unwrap();
        assert!(repo.load(&users).await.unwrap().is_connected);

        users.delete(UserId::new(3)).await.unwrap();
        assert!(!repo.load(&users).await.unwrap().is_connected);
    }

    #[tokio::test]
    async fn test_invalid_stored_merchant_is_not_connected() {
        let options = MemoryOptionStore::default();
        let users = directory_with(3).await;
        let repo = ConnectionRepository::new(&options);

        repo.set_owner(UserId::new(3)).await.unwrap();
        repo.set_merchant(&merchant("")).await.unwrap();
        assert!(!repo.load(&users).await.unwrap().is_connected);
    }

    #[tokio::test]
    async fn test_clear_keeps_recorded_site_url() {
        let options = MemoryOptionStore::default();
        let repo = ConnectionRepository::new(&options);
        repo.set_owner(UserId::new(1)).await.unwrap();
        repo.set_merchant(&merchant("a@b.fi")).await.unwrap();
        repo.set_connected_site_url("https://shop.fi").await.unwrap();

        repo.clear().await.unwrap();
        assert_eq!(repo.owner().await.unwrap(), None);
        assert_eq!(repo.merchant().await.unwrap(), None);
        assert_eq!(
            repo.connected_site_url().await.unwrap().as_deref(),
            Some("https://shop.fi")
        );
    }

    #[tokio::test]
    async fn test_application_roundtrip() {
        let options = MemoryOptionStore::default();
        let repo = ConnectionRepository::new(&options);
        let app = OAuthApplication::generate("https://cb.local/?domain=shop.fi".to_string());
        repo.set_application(&app).await.unwrap();

        let stored = repo.application().await.unwrap().unwrap();
        assert_eq!(stored.consumer_key, app.consumer_key);
        assert!(repo.delete_application().await.unwrap());
        assert!(repo.application().await.unwrap().is_none());
    }
}
