//! Translation of platform response codes into [`PurchaseOutcome`].

use chrono::Utc;

use crate::billing::raw::{BillingResult, PlayPurchaseState, PurchaseUpdate, StoreKitPurchaseResult};
use crate::models::*;

/// Play Billing `BillingResponseCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingResponseCode {
    ServiceTimeout,
    FeatureNotSupported,
    ServiceDisconnected,
    Ok,
    UserCanceled,
    ServiceUnavailable,
    BillingUnavailable,
    ItemUnavailable,
    DeveloperError,
    Error,
    ItemAlreadyOwned,
    ItemNotOwned,
    NetworkError,
    Unrecognized(i32),
}

impl BillingResponseCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            -3 => BillingResponseCode::ServiceTimeout,
            -2 => BillingResponseCode::FeatureNotSupported,
            -1 => BillingResponseCode::ServiceDisconnected,
            0 => BillingResponseCode::Ok,
            1 => BillingResponseCode::UserCanceled,
            2 => BillingResponseCode::ServiceUnavailable,
            3 => BillingResponseCode::BillingUnavailable,
            4 => BillingResponseCode::ItemUnavailable,
            5 => BillingResponseCode::DeveloperError,
            6 => BillingResponseCode::Error,
            7 => BillingResponseCode::ItemAlreadyOwned,
            8 => BillingResponseCode::ItemNotOwned,
            12 => BillingResponseCode::NetworkError,
            other => BillingResponseCode::Unrecognized(other),
        }
    }

    pub fn error_code(self) -> StoreErrorCode {
        match self {
            BillingResponseCode::ServiceTimeout => StoreErrorCode::ServiceTimeout,
            BillingResponseCode::FeatureNotSupported => StoreErrorCode::FeatureNotSupported,
            BillingResponseCode::ServiceDisconnected => StoreErrorCode::ServiceDisconnected,
            BillingResponseCode::UserCanceled => StoreErrorCode::UserCancelled,
            BillingResponseCode::ServiceUnavailable => StoreErrorCode::ServiceUnavailable,
            BillingResponseCode::BillingUnavailable => StoreErrorCode::BillingUnavailable,
            BillingResponseCode::ItemUnavailable => StoreErrorCode::ItemUnavailable,
            BillingResponseCode::DeveloperError => StoreErrorCode::DeveloperError,
            BillingResponseCode::ItemAlreadyOwned => StoreErrorCode::AlreadyOwned,
            BillingResponseCode::ItemNotOwned => StoreErrorCode::NotOwned,
            BillingResponseCode::NetworkError => StoreErrorCode::NetworkError,
            BillingResponseCode::Ok
            | BillingResponseCode::Error
            | BillingResponseCode::Unrecognized(_) => StoreErrorCode::Unknown,
        }
    }
}

/// Map a `StoreKitError` / `Product.PurchaseError` case name.
pub fn storekit_error_code(name: &str) -> StoreErrorCode {
    match name {
        "networkError" => StoreErrorCode::NetworkError,
        "systemError" => StoreErrorCode::ServiceUnavailable,
        "notAvailableInStorefront" | "productUnavailable" | "invalidOfferIdentifier" => {
            StoreErrorCode::ItemUnavailable
        }
        "notEntitled" | "purchaseNotAllowed" | "ineligibleForOffer" => {
            StoreErrorCode::BillingUnavailable
        }
        "invalidOfferPrice" | "invalidOfferSignature" | "missingOfferParameters"
        | "invalidQuantity" => StoreErrorCode::DeveloperError,
        "userCancelled" => StoreErrorCode::UserCancelled,
        "unsupported" => StoreErrorCode::FeatureNotSupported,
        _ => StoreErrorCode::Unknown,
    }
}

impl BillingResult {
    pub fn code(&self) -> BillingResponseCode {
        BillingResponseCode::from_code(self.response_code)
    }

    pub fn is_ok(&self) -> bool {
        self.code() == BillingResponseCode::Ok
    }

    pub fn to_error(&self) -> PurchaseError {
        let message = if self.debug_message.is_empty() {
            format!("billing call failed with response code {}", self.response_code)
        } else {
            self.debug_message.clone()
        };
        PurchaseError {
            code: self.code().error_code(),
            platform_code: Some(self.response_code),
            message,
        }
    }

    /// `Ok(())` for `OK`, otherwise the normalized error.
    pub fn into_result(self) -> crate::Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(crate::Error::Billing(self.to_error()))
        }
    }
}

/// Outcome for a purchase flow that failed to launch.
pub fn launch_outcome(result: &BillingResult) -> PurchaseOutcome {
    match result.code() {
        BillingResponseCode::UserCanceled => PurchaseOutcome::UserCancelled,
        _ => PurchaseOutcome::Failed {
            error: result.to_error(),
        },
    }
}

/// Resolve the update the native listener delivered for `product_id`.
pub fn normalize(update: PurchaseUpdate, product_id: &str) -> PurchaseOutcome {
    match update {
        PurchaseUpdate::Play {
            response_code,
            debug_message,
            purchases,
        } => {
            let result = BillingResult {
                response_code,
                debug_message,
            };
            match result.code() {
                BillingResponseCode::Ok => {
                    let purchase = purchases
                        .into_iter()
                        .find(|purchase| purchase.products.iter().any(|id| id == product_id));
                    match purchase {
                        Some(purchase) if purchase.purchase_state == PlayPurchaseState::Pending => {
                            PurchaseOutcome::Failed {
                                error: PurchaseError {
                                    code: StoreErrorCode::Pending,
                                    platform_code: Some(response_code),
                                    message: "purchase is pending and cannot be used yet".into(),
                                },
                            }
                        }
                        Some(purchase) => PurchaseOutcome::Success {
                            transaction: purchase.normalize(),
                        },
                        None => PurchaseOutcome::failed(
                            StoreErrorCode::Unknown,
                            format!("store returned no purchase for {product_id}"),
                        ),
                    }
                }
                BillingResponseCode::UserCanceled => PurchaseOutcome::UserCancelled,
                _ => PurchaseOutcome::Failed {
                    error: result.to_error(),
                },
            }
        }
        PurchaseUpdate::StoreKit {
            result,
            transaction,
            error,
            message,
        } => match result {
            StoreKitPurchaseResult::Success => match transaction {
                Some(transaction) if transaction.verified => PurchaseOutcome::Success {
                    transaction: transaction.normalize(),
                },
                Some(_) => PurchaseOutcome::failed(
                    StoreErrorCode::Unverified,
                    "transaction failed StoreKit verification",
                ),
                None => PurchaseOutcome::failed(
                    StoreErrorCode::Unknown,
                    format!("store returned no transaction for {product_id}"),
                ),
            },
            StoreKitPurchaseResult::UserCancelled => PurchaseOutcome::UserCancelled,
            StoreKitPurchaseResult::Pending => PurchaseOutcome::failed(
                StoreErrorCode::Pending,
                "purchase is awaiting approval",
            ),
            StoreKitPurchaseResult::Error => {
                let code = error
                    .as_deref()
                    .map(storekit_error_code)
                    .unwrap_or(StoreErrorCode::Unknown);
                if code == StoreErrorCode::UserCancelled {
                    return PurchaseOutcome::UserCancelled;
                }
                PurchaseOutcome::failed(
                    code,
                    message
                        .or(error)
                        .unwrap_or_else(|| "purchase failed".to_string()),
                )
            }
        },
    }
}

/// Whether `update` answers a purchase flow for `product_id`. Failures and
/// cancellations carry no product and answer whichever flow is open; a
/// completed purchase of another product (say, a pending one approved later)
/// does not.
pub fn concerns(update: &PurchaseUpdate, product_id: &str) -> bool {
    match update {
        PurchaseUpdate::Play {
            response_code,
            purchases,
            ..
        } => {
            BillingResponseCode::from_code(*response_code) != BillingResponseCode::Ok
                || purchases.is_empty()
                || purchases
                    .iter()
                    .any(|purchase| purchase.products.iter().any(|id| id == product_id))
        }
        PurchaseUpdate::StoreKit {
            result: StoreKitPurchaseResult::Success,
            transaction: Some(transaction),
            ..
        } => transaction.product_id == product_id,
        PurchaseUpdate::StoreKit { .. } => true,
    }
}

/// Every completed transaction carried by an update, regardless of which
/// product was requested. Used for updates nobody is waiting on.
pub fn transactions(update: PurchaseUpdate) -> Vec<Transaction> {
    match update {
        PurchaseUpdate::Play {
            response_code,
            purchases,
            ..
        } if BillingResponseCode::from_code(response_code) == BillingResponseCode::Ok => purchases
            .into_iter()
            .filter(|purchase| purchase.purchase_state == PlayPurchaseState::Purchased)
            .map(|purchase| purchase.normalize())
            .collect(),
        PurchaseUpdate::StoreKit {
            result: StoreKitPurchaseResult::Success,
            transaction: Some(transaction),
            ..
        } if transaction.is_entitled(Utc::now().timestamp_millis()) => {
            vec![transaction.normalize()]
        }
        _ => Vec::new(),
    }
}
