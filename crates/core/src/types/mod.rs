//! Core types for the Checkout POS connector.

pub mod id;
pub mod merchant;
pub mod status;

pub use id::*;
pub use merchant::{MerchantDetails, MerchantError};
pub use status::*;
