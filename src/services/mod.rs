pub mod auth;
pub mod checkout;
pub mod dispatch;
pub mod inventory;
pub mod reconciliation;
