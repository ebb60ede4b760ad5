//! Role, setting, and severity enums.

use serde::{Deserialize, Serialize};

/// WordPress user role, as reported by the host site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "kis.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Site administrator.
    Administrator,
    /// WooCommerce shop manager.
    ShopManager,
    Editor,
    Author,
    Customer,
}

impl UserRole {
    /// Whether the role carries the `manage_woocommerce` capability.
    ///
    /// The same capability gates connection management and the REST
    /// endpoints exposed to Checkout POS.
    #[must_use]
    pub const fn can_manage_store(self) -> bool {
        matches!(self, Self::Administrator | Self::ShopManager)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Administrator => write!(f, "administrator"),
            Self::ShopManager => write!(f, "shop_manager"),
            Self::Editor => write!(f, "editor"),
            Self::Author => write!(f, "author"),
            Self::Customer => write!(f, "customer"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "administrator" => Ok(Self::Administrator),
            "shop_manager" => Ok(Self::ShopManager),
            "editor" => Ok(Self::Editor),
            "author" => Ok(Self::Author),
            "customer" => Ok(Self::Customer),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

/// Which kind of record a sync direction applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTarget {
    Product,
    Order,
    Stock,
}

impl SyncTarget {
    /// Option key holding the direction for this target.
    #[must_use]
    pub const fn option_key(self) -> &'static str {
        match self {
            Self::Product => "kis_product_sync_direction",
            Self::Order => "kis_order_sync_direction",
            Self::Stock => "kis_stock_sync_direction",
        }
    }

    /// Directions an admin may pick for this target.
    ///
    /// Only orders can sync both ways.
    #[must_use]
    pub const fn allowed(self) -> &'static [SyncDirection] {
        match self {
            Self::Product | Self::Stock => &[
                SyncDirection::WooToKassa,
                SyncDirection::KassaToWoo,
                SyncDirection::Off,
            ],
            Self::Order => &[
                SyncDirection::WooToKassa,
                SyncDirection::KassaToWoo,
                SyncDirection::Both,
                SyncDirection::Off,
            ],
        }
    }

    /// Whether `direction` may be stored for this target.
    #[must_use]
    pub fn accepts(self, direction: SyncDirection) -> bool {
        self.allowed().contains(&direction)
    }
}

/// Synchronisation direction between WooCommerce and Checkout POS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    WooToKassa,
    KassaToWoo,
    Both,
    #[default]
    Off,
}

impl SyncDirection {
    /// Stored option value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WooToKassa => "woo_to_kassa",
            Self::KassaToWoo => "kassa_to_woo",
            Self::Both => "both",
            Self::Off => "off",
        }
    }

    /// Label shown on the settings page.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WooToKassa => "WooCommerce to Checkout POS",
            Self::KassaToWoo => "Checkout POS to WooCommerce",
            Self::Both => "Both ways",
            Self::Off => "Off",
        }
    }
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "woo_to_kassa" => Ok(Self::WooToKassa),
            "kassa_to_woo" => Ok(Self::KassaToWoo),
            "both" => Ok(Self::Both),
            "off" => Ok(Self::Off),
            _ => Err(format!("invalid sync direction: {s}")),
        }
    }
}

/// Remote Checkout POS environment selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    Test,
}

impl Environment {
    /// Interpret the stored `kis_test_environment_enabled` option.
    ///
    /// Anything but `"yes"` selects production.
    #[must_use]
    pub fn from_test_flag(value: &str) -> Self {
        if value == "yes" {
            Self::Test
        } else {
            Self::Production
        }
    }

    /// Value stored in `kis_test_environment_enabled`.
    #[must_use]
    pub const fn test_flag(self) -> &'static str {
        match self {
            Self::Production => "no",
            Self::Test => "yes",
        }
    }

    /// Root URL every default endpoint hangs off.
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Production => "https://woocommerce.prod.op-kassa.fi/prod/",
            Self::Test => "https://woocommerce.qa.op-kassa.fi/qa/",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// Severity of a system audit message.
///
/// Ordering follows display order: errors first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Error,
    Warning,
    Success,
}

impl AuditSeverity {
    /// All severities in display order.
    pub const ALL: [Self; 3] = [Self::Error, Self::Warning, Self::Success];
}

impl std::fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Success => write!(f, "success"),
        }
    }
}
