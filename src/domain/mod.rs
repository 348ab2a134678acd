//! Wallet domain types.
//!
//! This module provides:
//! - Lossless amounts via the Decimal wrapper
//! - Primitives: UserId, PurchaseId, Currency, PaymentMethod
//! - Wallet, Purchase and BonusInfo with their camelCase JSON shapes

pub mod bonus;
pub mod decimal;
pub mod primitives;
pub mod purchase;
pub mod wallet;

pub use bonus::{bonus_percentage, BonusInfo, BonusInfoError, TierMultiplier};
pub use decimal::Decimal;
pub use primitives::{Currency, PaymentMethod, PaymentMethodParseError, PurchaseId, UserId};
pub use purchase::{Purchase, PurchaseStatus, StatusTransitionError};
pub use wallet::Wallet;
