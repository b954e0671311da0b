//! HTTP handlers, one module per resource.
//!
//! Handlers stay thin: extract, call the repository (or a service in `checkout`), map to
//! a response. Every fallible handler returns `crate::error::Result`, so failures are
//! rendered by `AppError`'s `IntoResponse`.

pub mod auth;
pub mod categories;
pub mod checkout;
pub mod images;
pub mod products;
pub mod purchase_products;
pub mod purchases;
pub mod roles;
pub mod users;
