use serde::{Deserialize, Serialize};

/// Which store a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StorePlatform {
    Play,
    StoreKit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    Inapp,
    #[default]
    Subs,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Inapp => "inapp",
            ProductKind::Subs => "subs",
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetProductsRequest {
    pub product_ids: Vec<String>,
    #[serde(default)]
    pub product_type: ProductKind,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub formatted: String,
    pub currency_code: String,
    pub amount_micros: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPhase {
    pub formatted_price: String,
    pub price_currency_code: String,
    pub price_amount_micros: i64,
    /// ISO 8601 period, e.g. `P1M`.
    pub billing_period: String,
    pub billing_cycle_count: i32,
    pub recurrence_mode: RecurrenceMode,
}

/// Mirrors Play's `ProductDetails.RecurrenceMode` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceMode {
    InfiniteRecurring = 1,
    FiniteRecurring = 2,
    NonRecurring = 3,
}

impl Serialize for RecurrenceMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(*self as i32)
    }
}

impl<'de> Deserialize<'de> for RecurrenceMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i32::deserialize(deserializer)?;
        match value {
            1 => Ok(RecurrenceMode::InfiniteRecurring),
            2 => Ok(RecurrenceMode::FiniteRecurring),
            3 => Ok(RecurrenceMode::NonRecurring),
            _ => Err(serde::de::Error::custom(format!(
                "Invalid recurrence mode: {value}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    /// Token to pass back in [`PurchaseOptions::offer_token`].
    pub token: String,
    pub base_plan_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,
    pub pricing_phases: Vec<PricingPhase>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub kind: ProductKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offers: Vec<Offer>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetProductsResponse {
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscated_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscated_profile_id: Option<String>,
    /// StoreKit `appAccountToken`, a UUID string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_account_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub product_id: String,
    #[serde(default)]
    pub product_type: ProductKind,
    #[serde(flatten)]
    pub options: PurchaseOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionState {
    Purchased,
    Pending,
    Unspecified,
}

/// A store transaction. Successful purchases stay unacknowledged until
/// [`crate::StoreServices::finish_transaction`] is called.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub product_ids: Vec<String>,
    /// Handle used to acknowledge, consume or finish the transaction.
    pub purchase_token: String,
    pub purchase_time: i64,
    pub state: TransactionState,
    pub acknowledged: bool,
    pub auto_renewing: bool,
    pub platform: StorePlatform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Normalized failure reasons shared by both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreErrorCode {
    ServiceUnavailable,
    ServiceDisconnected,
    ServiceTimeout,
    BillingUnavailable,
    ItemUnavailable,
    DeveloperError,
    AlreadyOwned,
    NotOwned,
    NetworkError,
    FeatureNotSupported,
    UserCancelled,
    Pending,
    Unverified,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{message} ({code:?})")]
pub struct PurchaseError {
    pub code: StoreErrorCode,
    /// Raw platform code when the store reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_code: Option<i32>,
    pub message: String,
}

impl PurchaseError {
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            platform_code: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PurchaseOutcome {
    Success { transaction: Transaction },
    UserCancelled,
    Failed { error: PurchaseError },
}

impl PurchaseOutcome {
    pub fn failed(code: StoreErrorCode, message: impl Into<String>) -> Self {
        PurchaseOutcome::Failed {
            error: PurchaseError::new(code, message),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishTransactionRequest {
    pub transaction: Transaction,
    #[serde(default)]
    pub consumable: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishTransactionResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePurchasesRequest {
    #[serde(default)]
    pub product_type: ProductKind,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePurchasesResponse {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallationSource {
    AppStore,
    TestFlight,
    PlayStore,
    AmazonAppstore,
    Sideloaded,
    Debug,
    Unknown,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationSourceResponse {
    pub source: InstallationSource,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestReviewResponse {
    pub requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateKind {
    Immediate,
    Flexible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateAvailability {
    Unknown,
    NotAvailable,
    Available,
    InProgress,
}

impl UpdateAvailability {
    /// Play `UpdateAvailability` constants.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => UpdateAvailability::NotAvailable,
            2 => UpdateAvailability::Available,
            3 => UpdateAvailability::InProgress,
            _ => UpdateAvailability::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallStatus {
    Unknown,
    Pending,
    Downloading,
    Downloaded,
    Installing,
    Installed,
    Failed,
    Canceled,
}

impl InstallStatus {
    /// Play `InstallStatus` constants.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => InstallStatus::Pending,
            2 => InstallStatus::Downloading,
            3 => InstallStatus::Installing,
            4 => InstallStatus::Installed,
            5 => InstallStatus::Failed,
            6 => InstallStatus::Canceled,
            11 => InstallStatus::Downloaded,
            _ => InstallStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUpdateInfo {
    pub availability: UpdateAvailability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_version_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staleness_days: Option<i32>,
    pub priority: i32,
    pub immediate_allowed: bool,
    pub flexible_allowed: bool,
    pub install_status: InstallStatus,
}

impl AppUpdateInfo {
    pub fn is_available(&self) -> bool {
        self.availability == UpdateAvailability::Available
    }

    pub fn allows(&self, kind: UpdateKind) -> bool {
        match kind {
            UpdateKind::Immediate => self.immediate_allowed,
            UpdateKind::Flexible => self.flexible_allowed,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptForUpdateRequest {
    pub kind: UpdateKind,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptForUpdateResponse {
    pub started: bool,
}
