//! Cross-platform store services for Tauri: StoreKit on iOS, Play Billing and
//! Play review/update on Android, behind one set of commands.
//!
//! Prompt timestamps are kept with `tauri-plugin-store`, which the host app
//! must register alongside this plugin.

use std::sync::Arc;

use tauri::{
  plugin::{Builder, TauriPlugin},
  AppHandle, Emitter, Manager, Runtime,
};
use tauri_plugin_store::StoreExt;

pub use models::*;

#[cfg(desktop)]
mod desktop;
#[cfg(mobile)]
mod mobile;

pub mod billing;
mod commands;
mod config;
mod error;
mod install_source;
mod models;
pub mod platform;
pub mod prompts;

pub use billing::ConnectionState;
pub use config::Config;
pub use error::{Error, Result};

#[cfg(desktop)]
use desktop::{Unsupported as Billing, Unsupported as Bridge};
#[cfg(mobile)]
use mobile::{NativeBilling as Billing, NativeBridge as Bridge};

use billing::BillingSession;
use platform::StoreBridge;
use prompts::{ReviewPrompter, UpdatePrompter};

/// Event emitted with `Vec<Transaction>` when completed transactions arrive
/// outside a purchase call. They still need to be finished.
pub const TRANSACTIONS_EVENT: &str = "store-services://transactions";

/// Access to the store APIs.
pub struct StoreServices<R: Runtime> {
  app: AppHandle<R>,
  billing: Arc<BillingSession<Billing<R>>>,
  bridge: Bridge<R>,
  review: ReviewPrompter,
  update: UpdatePrompter,
  store_path: String,
}

impl<R: Runtime> StoreServices<R> {
  fn timestamps(&self) -> Result<Arc<tauri_plugin_store::Store<R>>> {
    self.app.store(&self.store_path).map_err(Into::into)
  }

  pub async fn get_products(&self, product_ids: Vec<String>, kind: ProductKind) -> Result<GetProductsResponse> {
    let products = self.billing.get_products(&product_ids, kind).await?;
    Ok(GetProductsResponse { products })
  }

  /// A successful purchase must be passed to
  /// [`StoreServices::finish_transaction`] or the store will refund it.
  pub async fn purchase(&self, request: PurchaseRequest) -> Result<PurchaseOutcome> {
    self.billing.purchase(&request).await
  }

  pub async fn finish_transaction(&self, transaction: Transaction, consumable: bool) -> Result<FinishTransactionResponse> {
    self.billing.finish_transaction(&transaction, consumable).await?;
    Ok(FinishTransactionResponse { success: true })
  }

  pub async fn restore_purchases(&self, kind: ProductKind) -> Result<RestorePurchasesResponse> {
    let transactions = self.billing.restore_purchases(kind).await?;
    Ok(RestorePurchasesResponse { transactions })
  }

  pub fn billing_state(&self) -> ConnectionState {
    self.billing.state()
  }

  pub async fn installation_source(&self) -> Result<InstallationSourceResponse> {
    let info = self.bridge.installer_info().await?;
    Ok(InstallationSourceResponse {
      source: InstallationSource::classify(&info),
    })
  }

  pub async fn request_review(&self) -> Result<RequestReviewResponse> {
    let store = self.timestamps()?;
    let requested = self.review.request(&self.bridge, &*store).await?;
    Ok(RequestReviewResponse { requested })
  }

  pub async fn check_for_update(&self) -> Result<AppUpdateInfo> {
    self.update.check(&self.bridge).await
  }

  pub async fn prompt_for_update(&self, kind: UpdateKind) -> Result<PromptForUpdateResponse> {
    let store = self.timestamps()?;
    let started = self.update.prompt(&self.bridge, &*store, kind).await?;
    Ok(PromptForUpdateResponse { started })
  }

  pub async fn complete_update(&self) -> Result<()> {
    self.update.complete(&self.bridge).await
  }
}

/// Extensions to [`tauri::App`], [`tauri::AppHandle`] and [`tauri::Window`] to access the store APIs.
pub trait StoreServicesExt<R: Runtime> {
  fn store_services(&self) -> &StoreServices<R>;
}

impl<R: Runtime, T: Manager<R>> crate::StoreServicesExt<R> for T {
  fn store_services(&self) -> &StoreServices<R> {
    self.state::<StoreServices<R>>().inner()
  }
}

/// Initializes the plugin.
pub fn init<R: Runtime>() -> TauriPlugin<R, Option<Config>> {
  Builder::<R, Option<Config>>::new("store-services")
    .invoke_handler(tauri::generate_handler![
      commands::get_products,
      commands::purchase,
      commands::finish_transaction,
      commands::restore_purchases,
      commands::billing_state,
      commands::installation_source,
      commands::request_review,
      commands::check_for_update,
      commands::prompt_for_update,
      commands::complete_update,
    ])
    .setup(|app, api| {
      let config = api.config().clone().unwrap_or_default();

      #[cfg(mobile)]
      let (billing, bridge) = mobile::init(app, api)?;
      #[cfg(desktop)]
      let (billing, bridge) = desktop::init(app, api)?;

      let listener = billing.clone();
      let session = Arc::new(BillingSession::new(billing, config.purchase_timeout()));
      listener.listen(Arc::downgrade(&session))?;

      let emitter = app.clone();
      session.on_unsolicited(move |transactions| {
        if let Err(err) = emitter.emit(TRANSACTIONS_EVENT, &transactions) {
          log::error!("failed to emit transaction update: {err}");
        }
      });

      app.manage(StoreServices {
        app: app.clone(),
        billing: session,
        bridge,
        review: ReviewPrompter::new(config.review_interval(), config.review_delay()),
        update: UpdatePrompter::new(config.update_prompt_interval(), config.urgent_update_priority),
        store_path: config.store_path,
      });
      Ok(())
    })
    .build()
}
