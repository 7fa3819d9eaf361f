//! Domain module
//!
//! Core domain types and business logic.

pub mod context;
pub mod error;
pub mod events;
pub mod money;

pub use context::{ActorRole, OperationContext};
pub use error::DomainError;
pub use events::{
    OrderEvent, OrderLineItem, PaymentMethod, ProductChanges, ProductEvent, ShippingAddress,
    UserEvent,
};
pub use money::{Money, MoneyError};
