// app/src/lib.rs

//! Storefront checkout and payment reconciliation service.
//!
//! `POST /api/v1/checkout/session` stores an order with its items and opens a
//! hosted Stripe Checkout Session; `POST /api/v1/webhooks/stripe` moves the
//! order to `confirmed/paid` or `cancelled/failed` when the provider reports
//! the session's fate. Both flows run as `flowline` pipelines.

pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod web;

pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use state::AppState;
