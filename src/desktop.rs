use std::sync::Weak;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tauri::{plugin::PluginApi, AppHandle, Runtime};

use crate::billing::{
    BillingBackend, BillingClient, BillingResult, BillingSession, RawProduct, RawTransaction,
};
use crate::models::*;
use crate::platform::{RawInstallerInfo, RawUpdateInfo, StoreBridge};

pub fn init<R: Runtime, C: DeserializeOwned>(
    app: &AppHandle<R>,
    _api: PluginApi<R, C>,
) -> crate::Result<(Unsupported<R>, Unsupported<R>)> {
    Ok((Unsupported(app.clone()), Unsupported(app.clone())))
}

/// Desktop stand-in: every store call fails with
/// [`crate::Error::UnsupportedPlatform`].
pub struct Unsupported<R: Runtime>(AppHandle<R>);

impl<R: Runtime> Clone for Unsupported<R> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<R: Runtime> Unsupported<R> {
    pub fn listen(&self, _session: Weak<BillingSession<Self>>) -> crate::Result<()> {
        Ok(())
    }
}

/// Never constructed; desktop billing cannot connect.
pub enum NoClient {}

#[async_trait]
impl<R: Runtime> BillingBackend for Unsupported<R> {
    type Client = NoClient;

    async fn connect(&self) -> crate::Result<Self::Client> {
        Err(crate::Error::UnsupportedPlatform)
    }
}

#[async_trait]
impl BillingClient for NoClient {
    async fn query_products(
        &self,
        _product_ids: &[String],
        _kind: ProductKind,
    ) -> crate::Result<Vec<RawProduct>> {
        match *self {}
    }

    async fn launch_purchase(&self, _request: &PurchaseRequest) -> crate::Result<BillingResult> {
        match *self {}
    }

    async fn query_purchases(&self, _kind: ProductKind) -> crate::Result<Vec<RawTransaction>> {
        match *self {}
    }

    async fn acknowledge(&self, _transaction: &Transaction) -> crate::Result<BillingResult> {
        match *self {}
    }

    async fn consume(&self, _transaction: &Transaction) -> crate::Result<BillingResult> {
        match *self {}
    }
}

#[async_trait]
impl<R: Runtime> StoreBridge for Unsupported<R> {
    async fn request_review(&self) -> crate::Result<()> {
        Err(crate::Error::UnsupportedPlatform)
    }

    async fn app_update_info(&self) -> crate::Result<RawUpdateInfo> {
        Err(crate::Error::UnsupportedPlatform)
    }

    async fn start_update(&self, _kind: UpdateKind) -> crate::Result<()> {
        Err(crate::Error::UnsupportedPlatform)
    }

    async fn complete_update(&self) -> crate::Result<()> {
        Err(crate::Error::UnsupportedPlatform)
    }

    async fn installer_info(&self) -> crate::Result<RawInstallerInfo> {
        Err(crate::Error::UnsupportedPlatform)
    }
}
