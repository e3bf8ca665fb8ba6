// app/src/services/mod.rs

pub mod signature;
pub mod stripe;

pub use stripe::{CheckoutGateway, CheckoutSession, CheckoutSessionRequest, ProviderLineItem, StripeClient};
