// app/src/models/mod.rs

//! Rows of the orders schema and the checkout payload.

pub mod checkout;
pub mod order;
pub mod order_item;
pub mod processed_event;

pub use checkout::{CheckoutRequest, OrderData, ValidatedCheckout};
pub use order::{Address, NewOrder, Order, OrderState, OrderStatus, PaymentStatus};
pub use order_item::{NewOrderItem, OrderItem};
pub use processed_event::{ProcessedEvent, SaveResult};
