//! Billing session: connection lifecycle, purchase correlation and result
//! normalization on top of a platform [`BillingBackend`].

use async_trait::async_trait;

use crate::models::{ProductKind, PurchaseRequest, Transaction};

mod connection;
mod listener;
pub mod raw;
pub mod response;
mod session;

pub use connection::{BillingConnection, ConnectionState};
pub use raw::{BillingResult, PurchaseUpdate, RawProduct, RawTransaction};
pub use session::{BillingSession, UnsolicitedHandler};

/// Establishes connections to the platform billing service.
#[async_trait]
pub trait BillingBackend: Send + Sync + 'static {
    type Client: BillingClient;

    /// Run the platform setup handshake. A non-OK setup result is reported as
    /// [`crate::Error::Billing`].
    async fn connect(&self) -> crate::Result<Self::Client>;
}

/// A connected billing client. Purchase outcomes are not returned from
/// [`BillingClient::launch_purchase`]; they arrive through
/// [`BillingSession::purchases_updated`].
#[async_trait]
pub trait BillingClient: Send + Sync + 'static {
    async fn query_products(
        &self,
        product_ids: &[String],
        kind: ProductKind,
    ) -> crate::Result<Vec<RawProduct>>;

    async fn launch_purchase(&self, request: &PurchaseRequest) -> crate::Result<BillingResult>;

    async fn query_purchases(&self, kind: ProductKind) -> crate::Result<Vec<RawTransaction>>;

    /// Play `acknowledgePurchase` / StoreKit `Transaction.finish()`.
    async fn acknowledge(&self, transaction: &Transaction) -> crate::Result<BillingResult>;

    /// Play `consumeAsync` / StoreKit `Transaction.finish()`.
    async fn consume(&self, transaction: &Transaction) -> crate::Result<BillingResult>;
}
