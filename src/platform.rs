use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::UpdateKind;

/// Play `AppUpdateInfo` as the native side reports it. The Swift side fills
/// the same shape from its App Store version lookup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUpdateInfo {
    pub update_availability: i32,
    #[serde(default)]
    pub available_version_code: Option<i64>,
    #[serde(default)]
    pub client_version_staleness_days: Option<i32>,
    #[serde(default)]
    pub update_priority: i32,
    #[serde(default)]
    pub immediate_allowed: bool,
    #[serde(default)]
    pub flexible_allowed: bool,
    #[serde(default)]
    pub install_status: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "platform", rename_all = "camelCase")]
pub enum RawInstallerInfo {
    #[serde(rename_all = "camelCase")]
    Android {
        #[serde(default)]
        installer_package: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Ios {
        /// Last path component of `Bundle.main.appStoreReceiptURL`.
        #[serde(default)]
        receipt: Option<String>,
        #[serde(default)]
        simulator: bool,
    },
}

/// Non-billing store calls: review sheet, in-app updates, installer lookup.
#[async_trait]
pub trait StoreBridge: Send + Sync + 'static {
    async fn request_review(&self) -> crate::Result<()>;

    async fn app_update_info(&self) -> crate::Result<RawUpdateInfo>;

    async fn start_update(&self, kind: UpdateKind) -> crate::Result<()>;

    async fn complete_update(&self) -> crate::Result<()>;

    async fn installer_info(&self) -> crate::Result<RawInstallerInfo>;
}
