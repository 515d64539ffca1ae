//! Platform-shaped records as the Kotlin and Swift halves of the plugin send
//! them, plus their translation into the normalized [`crate::models`] types.

use serde::{Deserialize, Serialize};

use crate::models::*;

/// Outcome of a single billing call, in Play's `BillingResponseCode` space.
/// The Swift side reports `0` on success and maps its failures onto the same
/// codes for calls that are not purchase flows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingResult {
    pub response_code: i32,
    #[serde(default)]
    pub debug_message: String,
}

impl BillingResult {
    pub fn ok() -> Self {
        Self {
            response_code: 0,
            debug_message: String::new(),
        }
    }

    pub fn with_code(response_code: i32, debug_message: impl Into<String>) -> Self {
        Self {
            response_code,
            debug_message: debug_message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "platform", rename_all = "camelCase")]
pub enum RawProduct {
    Play(PlayProductDetails),
    StoreKit(StoreKitProduct),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayProductDetails {
    pub product_id: String,
    pub product_type: String,
    #[serde(default)]
    pub name: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub one_time_purchase_offer_details: Option<PlayOneTimeOffer>,
    #[serde(default)]
    pub subscription_offer_details: Option<Vec<PlaySubscriptionOffer>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayOneTimeOffer {
    pub formatted_price: String,
    pub price_amount_micros: i64,
    pub price_currency_code: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaySubscriptionOffer {
    pub offer_token: String,
    pub base_plan_id: String,
    pub offer_id: Option<String>,
    pub pricing_phases: Vec<PricingPhase>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreKitProduct {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub display_price: String,
    /// `Decimal` rendered as a string so no precision is lost on the way.
    pub price: String,
    #[serde(default)]
    pub currency_code: Option<String>,
    /// `consumable`, `nonConsumable`, `autoRenewable` or `nonRenewable`.
    #[serde(rename = "type")]
    pub product_type: String,
    #[serde(default)]
    pub subscription: Option<StoreKitSubscription>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreKitSubscription {
    pub subscription_group_id: String,
    pub subscription_period: StoreKitPeriod,
    #[serde(default)]
    pub introductory_offer: Option<StoreKitOffer>,
    #[serde(default)]
    pub promotional_offers: Vec<StoreKitOffer>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreKitPeriod {
    pub unit: StoreKitPeriodUnit,
    pub value: i32,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreKitPeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

impl StoreKitPeriod {
    /// Render as an ISO 8601 duration, the format Play uses for billing periods.
    pub fn to_iso8601(self) -> String {
        let unit = match self.unit {
            StoreKitPeriodUnit::Day => "D",
            StoreKitPeriodUnit::Week => "W",
            StoreKitPeriodUnit::Month => "M",
            StoreKitPeriodUnit::Year => "Y",
        };
        format!("P{}{}", self.value, unit)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreKitOffer {
    /// Absent for introductory offers.
    #[serde(default)]
    pub id: Option<String>,
    pub display_price: String,
    pub price: String,
    pub period: StoreKitPeriod,
    pub period_count: i32,
    /// `freeTrial`, `payAsYouGo` or `payUpFront`.
    pub payment_mode: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "platform", rename_all = "camelCase")]
pub enum RawTransaction {
    Play(PlayPurchase),
    StoreKit(StoreKitTransaction),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayPurchase {
    #[serde(default)]
    pub order_id: Option<String>,
    pub products: Vec<String>,
    pub purchase_token: String,
    pub purchase_time: i64,
    pub purchase_state: PlayPurchaseState,
    #[serde(default)]
    pub is_acknowledged: bool,
    #[serde(default)]
    pub is_auto_renewing: bool,
    #[serde(default)]
    pub original_json: String,
    #[serde(default)]
    pub signature: String,
}

/// Play's `Purchase.PurchaseState` constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayPurchaseState {
    Unspecified = 0,
    Purchased = 1,
    Pending = 2,
}

impl Serialize for PlayPurchaseState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(*self as i32)
    }
}

impl<'de> Deserialize<'de> for PlayPurchaseState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i32::deserialize(deserializer)?;
        match value {
            0 => Ok(PlayPurchaseState::Unspecified),
            1 => Ok(PlayPurchaseState::Purchased),
            2 => Ok(PlayPurchaseState::Pending),
            _ => Err(serde::de::Error::custom(format!(
                "Invalid purchase state: {value}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreKitTransaction {
    pub id: u64,
    pub original_id: u64,
    pub product_id: String,
    /// Milliseconds since the unix epoch.
    pub purchase_date: i64,
    #[serde(default)]
    pub revocation_date: Option<i64>,
    #[serde(default)]
    pub expiration_date: Option<i64>,
    #[serde(default)]
    pub will_auto_renew: bool,
    #[serde(default)]
    pub finished: bool,
    /// Result of StoreKit's JWS verification.
    pub verified: bool,
    #[serde(default)]
    pub json_representation: Option<String>,
}

/// Payload of the native purchases-updated listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "platform", rename_all = "camelCase")]
pub enum PurchaseUpdate {
    #[serde(rename_all = "camelCase")]
    Play {
        response_code: i32,
        #[serde(default)]
        debug_message: String,
        #[serde(default)]
        purchases: Vec<PlayPurchase>,
    },
    #[serde(rename_all = "camelCase")]
    StoreKit {
        result: StoreKitPurchaseResult,
        #[serde(default)]
        transaction: Option<StoreKitTransaction>,
        /// `StoreKitError` case name when `result` is `error`.
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreKitPurchaseResult {
    Success,
    UserCancelled,
    Pending,
    Error,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryProductsResponse {
    #[serde(flatten)]
    pub result: BillingResult,
    #[serde(default)]
    pub products: Vec<RawProduct>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPurchasesResponse {
    #[serde(flatten)]
    pub result: BillingResult,
    #[serde(default)]
    pub purchases: Vec<RawTransaction>,
}

/// Parse a decimal string such as `"4.99"` into micro-units without going
/// through floating point. Digits past the sixth decimal are truncated.
pub fn decimal_to_micros(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, value) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut micros = 0i64;
    for (i, digit) in fraction.chars().take(6).enumerate() {
        micros += i64::from(digit.to_digit(10)?) * 10i64.pow(5 - i as u32);
    }
    let total = whole.checked_mul(1_000_000)?.checked_add(micros)?;
    Some(if negative { -total } else { total })
}

impl RawProduct {
    pub fn normalize(self) -> Product {
        match self {
            RawProduct::Play(details) => details.normalize(),
            RawProduct::StoreKit(product) => product.normalize(),
        }
    }
}

impl PlayProductDetails {
    fn normalize(self) -> Product {
        let kind = if self.product_type == "subs" {
            ProductKind::Subs
        } else {
            ProductKind::Inapp
        };

        let offers: Vec<Offer> = self
            .subscription_offer_details
            .unwrap_or_default()
            .into_iter()
            .map(|offer| Offer {
                token: offer.offer_token,
                base_plan_id: offer.base_plan_id,
                offer_id: offer.offer_id,
                pricing_phases: offer.pricing_phases,
            })
            .collect();

        // Subscriptions carry no one-time price; the base plan's recurring
        // phase is the price the user pays once any offer runs out.
        let price = match self.one_time_purchase_offer_details {
            Some(details) => Some(Price {
                formatted: details.formatted_price,
                currency_code: details.price_currency_code,
                amount_micros: details.price_amount_micros,
            }),
            None => offers
                .iter()
                .find(|offer| offer.offer_id.is_none())
                .or_else(|| offers.first())
                .and_then(|offer| offer.pricing_phases.last())
                .map(|phase| Price {
                    formatted: phase.formatted_price.clone(),
                    currency_code: phase.price_currency_code.clone(),
                    amount_micros: phase.price_amount_micros,
                }),
        };

        let display_name = if self.name.is_empty() {
            self.title
        } else {
            self.name
        };

        Product {
            id: self.product_id,
            display_name,
            description: self.description,
            kind,
            price,
            offers,
        }
    }
}

impl StoreKitProduct {
    fn normalize(self) -> Product {
        let currency_code = self.currency_code.unwrap_or_default();
        let amount_micros = decimal_to_micros(&self.price).unwrap_or_else(|| {
            log::warn!("unparseable StoreKit price {:?} for {}", self.price, self.id);
            0
        });
        let kind = match self.product_type.as_str() {
            "autoRenewable" => ProductKind::Subs,
            _ => ProductKind::Inapp,
        };

        let offers = match &self.subscription {
            Some(subscription) => {
                let base = PricingPhase {
                    formatted_price: self.display_price.clone(),
                    price_currency_code: currency_code.clone(),
                    price_amount_micros: amount_micros,
                    billing_period: subscription.subscription_period.to_iso8601(),
                    billing_cycle_count: 0,
                    recurrence_mode: RecurrenceMode::InfiniteRecurring,
                };

                let discounted = |offer: &StoreKitOffer| {
                    let phase = offer_phase(offer, &currency_code);
                    Offer {
                        token: offer.id.clone().unwrap_or_else(|| self.id.clone()),
                        base_plan_id: subscription.subscription_group_id.clone(),
                        offer_id: Some(offer.id.clone().unwrap_or_else(|| "introductory".into())),
                        pricing_phases: vec![phase, base.clone()],
                    }
                };

                let mut offers: Vec<Offer> = subscription
                    .introductory_offer
                    .iter()
                    .chain(subscription.promotional_offers.iter())
                    .map(discounted)
                    .collect();
                offers.push(Offer {
                    token: self.id.clone(),
                    base_plan_id: subscription.subscription_group_id.clone(),
                    offer_id: None,
                    pricing_phases: vec![base],
                });
                offers
            }
            None => Vec::new(),
        };

        Product {
            id: self.id,
            display_name: self.display_name,
            description: self.description,
            kind,
            price: Some(Price {
                formatted: self.display_price,
                currency_code,
                amount_micros,
            }),
            offers,
        }
    }
}

fn offer_phase(offer: &StoreKitOffer, currency_code: &str) -> PricingPhase {
    let recurrence_mode = match offer.payment_mode.as_str() {
        "payUpFront" => RecurrenceMode::NonRecurring,
        _ => RecurrenceMode::FiniteRecurring,
    };
    PricingPhase {
        formatted_price: offer.display_price.clone(),
        price_currency_code: currency_code.to_string(),
        price_amount_micros: decimal_to_micros(&offer.price).unwrap_or(0),
        billing_period: offer.period.to_iso8601(),
        billing_cycle_count: offer.period_count,
        recurrence_mode,
    }
}

impl RawTransaction {
    /// Whether the user still owns what this transaction granted at `now`
    /// (milliseconds since the unix epoch). Play only reports owned purchases.
    pub fn is_entitled(&self, now: i64) -> bool {
        match self {
            RawTransaction::Play(_) => true,
            RawTransaction::StoreKit(transaction) => transaction.is_entitled(now),
        }
    }

    pub fn normalize(self) -> Transaction {
        match self {
            RawTransaction::Play(purchase) => purchase.normalize(),
            RawTransaction::StoreKit(transaction) => transaction.normalize(),
        }
    }
}

impl PlayPurchase {
    pub fn normalize(self) -> Transaction {
        let state = match self.purchase_state {
            PlayPurchaseState::Purchased => TransactionState::Purchased,
            PlayPurchaseState::Pending => TransactionState::Pending,
            PlayPurchaseState::Unspecified => TransactionState::Unspecified,
        };
        // Pending purchases have no order id yet.
        let id = self
            .order_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.purchase_token.clone());

        Transaction {
            id,
            product_ids: self.products,
            purchase_token: self.purchase_token,
            purchase_time: self.purchase_time,
            state,
            acknowledged: self.is_acknowledged,
            auto_renewing: self.is_auto_renewing,
            platform: StorePlatform::Play,
            original_json: Some(self.original_json).filter(|json| !json.is_empty()),
            signature: Some(self.signature).filter(|sig| !sig.is_empty()),
        }
    }
}

impl StoreKitTransaction {
    /// Verified, not refunded or revoked, and not past its expiration.
    pub fn is_entitled(&self, now: i64) -> bool {
        self.verified
            && self.revocation_date.is_none()
            && self.expiration_date.map_or(true, |expires| expires > now)
    }

    pub fn normalize(self) -> Transaction {
        Transaction {
            id: self.id.to_string(),
            product_ids: vec![self.product_id],
            purchase_token: self.id.to_string(),
            purchase_time: self.purchase_date,
            state: TransactionState::Purchased,
            acknowledged: self.finished,
            auto_renewing: self.will_auto_renew,
            platform: StorePlatform::StoreKit,
            original_json: self.json_representation,
            signature: None,
        }
    }
}
