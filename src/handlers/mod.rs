//! Command Handlers module
//!
//! CQRS Command handlers that orchestrate business operations.
//! Each handler coordinates aggregates, event store, and projections.

mod auth;
mod checkout;
mod commands;
mod order;
mod password_reset;
mod product;

pub use auth::{LoginHandler, LogoutHandler, RefreshHandler, RegisterHandler};
pub use checkout::CheckoutHandler;
pub use commands::*;
pub use order::{CancelOrderHandler, CompleteOrderHandler, RefundOrderHandler, ShipOrderHandler};
pub use password_reset::{RequestPasswordResetHandler, ResetPasswordHandler, VerifyEmailHandler};
pub use product::{
    AssociateImageHandler, CreateProductHandler, DeleteProductHandler, UpdateProductHandler, UpdateStockHandler,
};
