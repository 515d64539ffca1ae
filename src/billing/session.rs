use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use super::connection::{BillingConnection, ConnectionState};
use super::listener::{Dispatch, PurchaseListeners};
use super::response::{self, BillingResponseCode};
use super::{BillingBackend, BillingClient, PurchaseUpdate};
use crate::models::*;
use crate::{Error, Result};

/// Receives completed transactions that arrive while no purchase is waiting,
/// e.g. a pending purchase approved later or a renewal.
pub type UnsolicitedHandler = Box<dyn Fn(Vec<Transaction>) + Send + Sync>;

pub struct BillingSession<B: BillingBackend> {
    connection: BillingConnection<B>,
    listeners: PurchaseListeners,
    purchase_timeout: Duration,
    unsolicited: RwLock<Option<UnsolicitedHandler>>,
}

impl<B: BillingBackend> BillingSession<B> {
    pub fn new(backend: B, purchase_timeout: Duration) -> Self {
        Self {
            connection: BillingConnection::new(backend),
            listeners: PurchaseListeners::default(),
            purchase_timeout,
            unsolicited: RwLock::new(None),
        }
    }

    pub fn on_unsolicited<F>(&self, handler: F)
    where
        F: Fn(Vec<Transaction>) + Send + Sync + 'static,
    {
        *self
            .unsolicited
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(handler));
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub fn purchase_in_flight(&self) -> bool {
        self.listeners.is_waiting()
    }

    /// Run `op` on the connected client, reconnecting once if the platform
    /// reports the service went away mid-call.
    async fn with_client<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(Arc<B::Client>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let client = self.connection.client().await?;
        match op(client).await {
            Err(Error::Billing(err)) if err.code == StoreErrorCode::ServiceDisconnected => {
                log::warn!("billing service dropped during call, reconnecting");
                self.connection.disconnected();
                let client = self.connection.client().await?;
                op(client).await
            }
            other => other,
        }
    }

    pub async fn get_products(
        &self,
        product_ids: &[String],
        kind: ProductKind,
    ) -> Result<Vec<Product>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw = self
            .with_client(|client| async move { client.query_products(product_ids, kind).await })
            .await?;

        let found = raw.len();
        if found < product_ids.len() {
            log::debug!(
                "store returned {found} of {} requested products",
                product_ids.len()
            );
        }
        Ok(raw.into_iter().map(|product| product.normalize()).collect())
    }

    /// Launch the purchase flow and wait for the platform to report back.
    ///
    /// A [`PurchaseOutcome::Success`] transaction must still be passed to
    /// [`BillingSession::finish_transaction`], or the store refunds it.
    pub async fn purchase(&self, request: &PurchaseRequest) -> Result<PurchaseOutcome> {
        let client = self.connection.client().await?;

        // Registered before launching so an immediate callback is not lost.
        let ticket = self.listeners.register(&request.product_id)?;

        log::info!("launching purchase flow for {}", request.product_id);
        let launch = match client.launch_purchase(request).await {
            Ok(launch) => launch,
            Err(err) => {
                self.listeners.release(ticket.id);
                return Err(err);
            }
        };
        if !launch.is_ok() {
            self.listeners.release(ticket.id);
            if launch.code() == BillingResponseCode::ServiceDisconnected {
                self.connection.disconnected();
            }
            log::warn!(
                "purchase flow for {} did not launch: {:?}",
                request.product_id,
                launch.code()
            );
            return Ok(response::launch_outcome(&launch));
        }

        let outcome = match tokio::time::timeout(self.purchase_timeout, ticket.receiver).await {
            Ok(Ok(update)) => response::normalize(update, &request.product_id),
            Ok(Err(_)) => PurchaseOutcome::failed(
                StoreErrorCode::ServiceDisconnected,
                "billing service disconnected before the purchase completed",
            ),
            Err(_) => {
                self.listeners.release(ticket.id);
                PurchaseOutcome::failed(
                    StoreErrorCode::ServiceTimeout,
                    format!(
                        "no purchase result within {}s",
                        self.purchase_timeout.as_secs()
                    ),
                )
            }
        };

        match &outcome {
            PurchaseOutcome::Success { transaction } => {
                log::info!("purchase {} completed for {}", transaction.id, request.product_id)
            }
            PurchaseOutcome::UserCancelled => {
                log::info!("purchase of {} cancelled by user", request.product_id)
            }
            PurchaseOutcome::Failed { error } => {
                log::warn!("purchase of {} failed: {error}", request.product_id)
            }
        }
        Ok(outcome)
    }

    /// Entry point for the native purchases-updated listener. Completed
    /// transactions the waiting purchase did not ask for go to the
    /// unsolicited handler.
    pub fn purchases_updated(&self, update: PurchaseUpdate) {
        let transactions = match self.listeners.dispatch(update.clone()) {
            Dispatch::Unclaimed(update) => response::transactions(update),
            Dispatch::Delivered { product_id } => response::transactions(update)
                .into_iter()
                .filter(|transaction| !transaction.product_ids.contains(&product_id))
                .collect(),
        };
        if transactions.is_empty() {
            log::debug!("no completed transactions left to hand off");
            return;
        }
        log::info!(
            "received {} transaction(s) outside a purchase flow",
            transactions.len()
        );
        if let Some(handler) = self
            .unsolicited
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            handler(transactions);
        }
    }

    /// Entry point for the native service-disconnected listener. A purchase
    /// still waiting fails with [`StoreErrorCode::ServiceDisconnected`].
    pub fn service_disconnected(&self) {
        self.connection.disconnected();
        self.listeners.clear();
    }

    /// Acknowledge (or consume) a transaction. Must be called for every
    /// successful purchase once the entitlement has been granted.
    pub async fn finish_transaction(&self, transaction: &Transaction, consumable: bool) -> Result<()> {
        if transaction.state == TransactionState::Pending {
            return Err(Error::Billing(PurchaseError::new(
                StoreErrorCode::Pending,
                "pending transactions cannot be finished",
            )));
        }
        if transaction.acknowledged && !consumable {
            log::debug!("transaction {} already acknowledged", transaction.id);
            return Ok(());
        }

        self.with_client(|client| async move {
            let result = if consumable {
                client.consume(transaction).await?
            } else {
                client.acknowledge(transaction).await?
            };
            result.into_result()
        })
        .await?;

        log::info!("finished transaction {}", transaction.id);
        Ok(())
    }

    /// Transactions the user currently owns. Unverified, revoked and expired
    /// StoreKit transactions are left out.
    pub async fn restore_purchases(&self, kind: ProductKind) -> Result<Vec<Transaction>> {
        let raw = self
            .with_client(|client| async move { client.query_purchases(kind).await })
            .await?;

        let now = Utc::now().timestamp_millis();
        let found = raw.len();
        let owned: Vec<Transaction> = raw
            .into_iter()
            .filter(|transaction| transaction.is_entitled(now))
            .map(|transaction| transaction.normalize())
            .collect();
        if owned.len() < found {
            log::warn!(
                "skipped {} restored transaction(s) that are unverified, revoked or expired",
                found - owned.len()
            );
        }
        Ok(owned)
    }
}
