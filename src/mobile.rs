use std::sync::Weak;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tauri::{
    ipc::{Channel, InvokeResponseBody},
    plugin::{PluginApi, PluginHandle},
    AppHandle, Runtime,
};

use crate::billing::raw::{QueryProductsResponse, QueryPurchasesResponse};
use crate::billing::{
    BillingBackend, BillingClient, BillingResult, BillingSession, PurchaseUpdate, RawProduct,
    RawTransaction,
};
use crate::models::*;
use crate::platform::{RawInstallerInfo, RawUpdateInfo, StoreBridge};

#[cfg(target_os = "android")]
const PLUGIN_IDENTIFIER: &str = "app.tauri.storeservices";

#[cfg(target_os = "ios")]
tauri::ios_plugin_binding!(init_plugin_store_services);

// initializes the Kotlin or Swift plugin classes
pub fn init<R: Runtime, C: DeserializeOwned>(
    _app: &AppHandle<R>,
    api: PluginApi<R, C>,
) -> crate::Result<(NativeBilling<R>, NativeBridge<R>)> {
    #[cfg(target_os = "android")]
    let handle = api.register_android_plugin(PLUGIN_IDENTIFIER, "StoreServicesPlugin")?;
    #[cfg(target_os = "ios")]
    let handle = api.register_ios_plugin(init_plugin_store_services)?;

    Ok((NativeBilling(handle.clone()), NativeBridge(handle)))
}

/// `run_mobile_plugin` blocks until the native side resolves, so it runs off
/// the async workers.
async fn invoke<R, P, T>(handle: &PluginHandle<R>, command: &'static str, payload: P) -> crate::Result<T>
where
    R: Runtime,
    P: Serialize + Send + 'static,
    T: DeserializeOwned + Send + 'static,
{
    let handle = handle.clone();
    tauri::async_runtime::spawn_blocking(move || handle.run_mobile_plugin(command, payload))
        .await?
        .map_err(Into::into)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryProductsArgs<'a> {
    product_ids: &'a [String],
    product_type: ProductKind,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KindArgs {
    product_type: ProductKind,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenArgs {
    purchase_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateArgs {
    kind: UpdateKind,
}

#[derive(Serialize)]
struct ListenerArgs {
    handler: Channel,
}

/// Native billing connection. Cloning shares the plugin handle.
pub struct NativeBilling<R: Runtime>(PluginHandle<R>);

impl<R: Runtime> Clone for NativeBilling<R> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<R: Runtime> NativeBilling<R> {
    /// Route the native purchases-updated and service-disconnected callbacks
    /// into `session`.
    pub fn listen(&self, session: Weak<BillingSession<Self>>) -> crate::Result<()> {
        let updates = session.clone();
        let on_update = Channel::new(move |body| {
            let Some(session) = updates.upgrade() else {
                return Ok(());
            };
            match decode::<PurchaseUpdate>(body) {
                Ok(update) => session.purchases_updated(update),
                Err(err) => log::error!("malformed purchase update from native side: {err}"),
            }
            Ok(())
        });
        self.0.run_mobile_plugin::<serde_json::Value>(
            "setPurchasesUpdatedListener",
            ListenerArgs { handler: on_update },
        )?;

        let on_disconnect = Channel::new(move |_body| {
            if let Some(session) = session.upgrade() {
                session.service_disconnected();
            }
            Ok(())
        });
        self.0.run_mobile_plugin::<serde_json::Value>(
            "setServiceDisconnectedListener",
            ListenerArgs {
                handler: on_disconnect,
            },
        )?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(body: InvokeResponseBody) -> serde_json::Result<T> {
    match body {
        InvokeResponseBody::Json(json) => serde_json::from_str(&json),
        InvokeResponseBody::Raw(bytes) => serde_json::from_slice(&bytes),
    }
}

#[async_trait]
impl<R: Runtime> BillingBackend for NativeBilling<R> {
    type Client = NativeBillingClient<R>;

    async fn connect(&self) -> crate::Result<Self::Client> {
        let result: BillingResult = invoke(&self.0, "startConnection", ()).await?;
        result.into_result()?;
        Ok(NativeBillingClient(self.0.clone()))
    }
}

pub struct NativeBillingClient<R: Runtime>(PluginHandle<R>);

#[async_trait]
impl<R: Runtime> BillingClient for NativeBillingClient<R> {
    async fn query_products(
        &self,
        product_ids: &[String],
        kind: ProductKind,
    ) -> crate::Result<Vec<RawProduct>> {
        // Serialized up front so the payload does not borrow across threads.
        let payload = serde_json::to_value(QueryProductsArgs {
            product_ids,
            product_type: kind,
        })?;
        let response: QueryProductsResponse = invoke(&self.0, "queryProducts", payload).await?;
        response.result.into_result()?;
        Ok(response.products)
    }

    async fn launch_purchase(&self, request: &PurchaseRequest) -> crate::Result<BillingResult> {
        invoke(&self.0, "launchPurchaseFlow", request.clone()).await
    }

    async fn query_purchases(&self, kind: ProductKind) -> crate::Result<Vec<RawTransaction>> {
        let response: QueryPurchasesResponse =
            invoke(&self.0, "queryPurchases", KindArgs { product_type: kind }).await?;
        response.result.into_result()?;
        Ok(response.purchases)
    }

    async fn acknowledge(&self, transaction: &Transaction) -> crate::Result<BillingResult> {
        let args = TokenArgs {
            purchase_token: transaction.purchase_token.clone(),
        };
        invoke(&self.0, "acknowledgePurchase", args).await
    }

    async fn consume(&self, transaction: &Transaction) -> crate::Result<BillingResult> {
        let args = TokenArgs {
            purchase_token: transaction.purchase_token.clone(),
        };
        invoke(&self.0, "consumePurchase", args).await
    }
}

/// Review, update and installer calls.
pub struct NativeBridge<R: Runtime>(PluginHandle<R>);

#[async_trait]
impl<R: Runtime> StoreBridge for NativeBridge<R> {
    async fn request_review(&self) -> crate::Result<()> {
        let _: serde_json::Value = invoke(&self.0, "requestReview", ()).await?;
        Ok(())
    }

    async fn app_update_info(&self) -> crate::Result<RawUpdateInfo> {
        invoke(&self.0, "getAppUpdateInfo", ()).await
    }

    async fn start_update(&self, kind: UpdateKind) -> crate::Result<()> {
        let result: BillingResult = invoke(&self.0, "startUpdateFlow", UpdateArgs { kind }).await?;
        result.into_result()
    }

    async fn complete_update(&self) -> crate::Result<()> {
        let _: serde_json::Value = invoke(&self.0, "completeUpdate", ()).await?;
        Ok(())
    }

    async fn installer_info(&self) -> crate::Result<RawInstallerInfo> {
        invoke(&self.0, "getInstallerInfo", ()).await
    }
}
