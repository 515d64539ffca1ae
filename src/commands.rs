use tauri::{command, AppHandle, Runtime};

use crate::models::*;
use crate::{ConnectionState, Result, StoreServicesExt};

#[command]
pub(crate) async fn get_products<R: Runtime>(
    app: AppHandle<R>,
    payload: GetProductsRequest,
) -> Result<GetProductsResponse> {
    app.store_services()
        .get_products(payload.product_ids, payload.product_type)
        .await
}

#[command]
pub(crate) async fn purchase<R: Runtime>(
    app: AppHandle<R>,
    payload: PurchaseRequest,
) -> Result<PurchaseOutcome> {
    app.store_services().purchase(payload).await
}

#[command]
pub(crate) async fn finish_transaction<R: Runtime>(
    app: AppHandle<R>,
    payload: FinishTransactionRequest,
) -> Result<FinishTransactionResponse> {
    app.store_services()
        .finish_transaction(payload.transaction, payload.consumable)
        .await
}

#[command]
pub(crate) async fn restore_purchases<R: Runtime>(
    app: AppHandle<R>,
    payload: RestorePurchasesRequest,
) -> Result<RestorePurchasesResponse> {
    app.store_services()
        .restore_purchases(payload.product_type)
        .await
}

#[command]
pub(crate) async fn billing_state<R: Runtime>(app: AppHandle<R>) -> Result<ConnectionState> {
    Ok(app.store_services().billing_state())
}

#[command]
pub(crate) async fn installation_source<R: Runtime>(
    app: AppHandle<R>,
) -> Result<InstallationSourceResponse> {
    app.store_services().installation_source().await
}

#[command]
pub(crate) async fn request_review<R: Runtime>(app: AppHandle<R>) -> Result<RequestReviewResponse> {
    app.store_services().request_review().await
}

#[command]
pub(crate) async fn check_for_update<R: Runtime>(app: AppHandle<R>) -> Result<AppUpdateInfo> {
    app.store_services().check_for_update().await
}

#[command]
pub(crate) async fn prompt_for_update<R: Runtime>(
    app: AppHandle<R>,
    payload: PromptForUpdateRequest,
) -> Result<PromptForUpdateResponse> {
    app.store_services().prompt_for_update(payload.kind).await
}

#[command]
pub(crate) async fn complete_update<R: Runtime>(app: AppHandle<R>) -> Result<()> {
    app.store_services().complete_update().await
}
