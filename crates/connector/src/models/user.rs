//! WordPress user domain types.

use serde::{Deserialize, Serialize};

use checkout_pos_core::{UserId, UserRole};

/// A user of the host site, as mirrored into the connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// WordPress user id.
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
}

impl User {
    /// Whether the user may manage the Checkout POS connection.
    ///
    /// Maps to the `manage_woocommerce` capability.
    #[must_use]
    pub const fn can_manage_connection(&self) -> bool {
        self.role.can_manage_store()
    }
}
