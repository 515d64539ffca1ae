use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tauri_plugin_store_services::billing::{
    BillingBackend, BillingClient, BillingResult, BillingSession, ConnectionState, PurchaseUpdate,
    RawProduct, RawTransaction,
};
use tauri_plugin_store_services::*;
use tokio::sync::mpsc;

/// Scripted store: queued response codes are consumed in order, an empty
/// queue answers OK.
struct FakeStore {
    connects: AtomicUsize,
    setup_codes: Mutex<VecDeque<i32>>,
    launch_codes: Mutex<VecDeque<i32>>,
    query_codes: Mutex<VecDeque<i32>>,
    connect_delay: Mutex<Duration>,
    owned: Mutex<Vec<serde_json::Value>>,
    finished: Mutex<Vec<(String, bool)>>,
    launched: mpsc::UnboundedSender<String>,
}

impl FakeStore {
    fn next(queue: &Mutex<VecDeque<i32>>) -> BillingResult {
        let code = queue.lock().unwrap().pop_front().unwrap_or(0);
        BillingResult::with_code(code, "")
    }
}

struct FakeBackend(Arc<FakeStore>);

struct FakeClient(Arc<FakeStore>);

#[async_trait]
impl BillingBackend for FakeBackend {
    type Client = FakeClient;

    async fn connect(&self) -> Result<FakeClient> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.0.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        FakeStore::next(&self.0.setup_codes).into_result()?;
        Ok(FakeClient(self.0.clone()))
    }
}

#[async_trait]
impl BillingClient for FakeClient {
    async fn query_products(
        &self,
        product_ids: &[String],
        kind: ProductKind,
    ) -> Result<Vec<RawProduct>> {
        FakeStore::next(&self.0.query_codes).into_result()?;
        Ok(product_ids
            .iter()
            .map(|id| {
                serde_json::from_value(json!({
                    "platform": "play",
                    "productId": id,
                    "productType": kind.as_str(),
                    "title": id,
                    "description": "",
                    "oneTimePurchaseOfferDetails": {
                        "formattedPrice": "$0.99",
                        "priceAmountMicros": 990000,
                        "priceCurrencyCode": "USD"
                    }
                }))
                .unwrap()
            })
            .collect())
    }

    async fn launch_purchase(&self, request: &PurchaseRequest) -> Result<BillingResult> {
        let _ = self.0.launched.send(request.product_id.clone());
        Ok(FakeStore::next(&self.0.launch_codes))
    }

    async fn query_purchases(&self, _kind: ProductKind) -> Result<Vec<RawTransaction>> {
        FakeStore::next(&self.0.query_codes).into_result()?;
        Ok(self
            .0
            .owned
            .lock()
            .unwrap()
            .iter()
            .map(|value| serde_json::from_value(value.clone()).unwrap())
            .collect())
    }

    async fn acknowledge(&self, transaction: &Transaction) -> Result<BillingResult> {
        self.0
            .finished
            .lock()
            .unwrap()
            .push((transaction.purchase_token.clone(), false));
        Ok(BillingResult::ok())
    }

    async fn consume(&self, transaction: &Transaction) -> Result<BillingResult> {
        self.0
            .finished
            .lock()
            .unwrap()
            .push((transaction.purchase_token.clone(), true));
        Ok(BillingResult::ok())
    }
}

struct Harness {
    store: Arc<FakeStore>,
    session: Arc<BillingSession<FakeBackend>>,
    launched: mpsc::UnboundedReceiver<String>,
}

fn harness(timeout: Duration) -> Harness {
    let (tx, launched) = mpsc::unbounded_channel();
    let store = Arc::new(FakeStore {
        connects: AtomicUsize::new(0),
        setup_codes: Mutex::new(VecDeque::new()),
        launch_codes: Mutex::new(VecDeque::new()),
        query_codes: Mutex::new(VecDeque::new()),
        connect_delay: Mutex::new(Duration::ZERO),
        owned: Mutex::new(vec![storekit_transaction(42, json!({}))]),
        finished: Mutex::new(Vec::new()),
        launched: tx,
    });
    let session = Arc::new(BillingSession::new(FakeBackend(store.clone()), timeout));
    Harness {
        store,
        session,
        launched,
    }
}

fn request(product_id: &str) -> PurchaseRequest {
    PurchaseRequest {
        product_id: product_id.to_string(),
        product_type: ProductKind::Inapp,
        options: PurchaseOptions::default(),
    }
}

fn play_update(code: i32, product_id: &str) -> PurchaseUpdate {
    serde_json::from_value(json!({
        "platform": "play",
        "responseCode": code,
        "purchases": [{
            "orderId": "GPA.0001",
            "products": [product_id],
            "purchaseToken": "token-1",
            "purchaseTime": 1_700_000_000_000i64,
            "purchaseState": 1,
            "isAcknowledged": false
        }]
    }))
    .unwrap()
}

/// A finished, verified StoreKit transaction for "premium", with `extra`
/// fields merged over it.
fn storekit_transaction(id: u64, extra: serde_json::Value) -> serde_json::Value {
    let mut value = json!({
        "platform": "storeKit",
        "id": id,
        "originalId": 40u64,
        "productId": "premium",
        "purchaseDate": 1_700_000_000_000i64,
        "finished": true,
        "verified": true
    });
    if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        base.extend(extra.clone());
    }
    value
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn connection_is_cached_between_calls() {
    let h = harness(Duration::from_secs(60));
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    let state = h.session.subscribe();

    let products = h
        .session
        .get_products(&ids(&["coins", "gems"]), ProductKind::Inapp)
        .await
        .unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].price.as_ref().unwrap().amount_micros, 990_000);

    h.session
        .get_products(&ids(&["coins"]), ProductKind::Inapp)
        .await
        .unwrap();
    assert_eq!(h.store.connects.load(Ordering::SeqCst), 1);
    assert_eq!(*state.borrow(), ConnectionState::Ready);
}

#[tokio::test]
async fn empty_product_list_does_not_connect() {
    let h = harness(Duration::from_secs(60));
    let products = h.session.get_products(&[], ProductKind::Subs).await.unwrap();
    assert!(products.is_empty());
    assert_eq!(h.store.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn setup_failure_is_normalized_and_retried_next_call() {
    let h = harness(Duration::from_secs(60));
    h.store.setup_codes.lock().unwrap().push_back(3);

    match h.session.get_products(&ids(&["coins"]), ProductKind::Inapp).await {
        Err(Error::Billing(err)) => {
            assert_eq!(err.code, StoreErrorCode::BillingUnavailable);
            assert_eq!(err.platform_code, Some(3));
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(h.session.state(), ConnectionState::Disconnected);

    h.session
        .get_products(&ids(&["coins"]), ProductKind::Inapp)
        .await
        .unwrap();
    assert_eq!(h.store.connects.load(Ordering::SeqCst), 2);
    assert_eq!(h.session.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn service_disconnect_drops_cached_client() {
    let h = harness(Duration::from_secs(60));
    h.session.restore_purchases(ProductKind::Subs).await.unwrap();

    h.session.service_disconnected();
    assert_eq!(h.session.state(), ConnectionState::Disconnected);

    h.session.restore_purchases(ProductKind::Subs).await.unwrap();
    assert_eq!(h.store.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn call_is_retried_once_after_service_disconnected_code() {
    let h = harness(Duration::from_secs(60));
    h.store.query_codes.lock().unwrap().push_back(-1);

    let transactions = h.session.restore_purchases(ProductKind::Subs).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].platform, StorePlatform::StoreKit);
    assert!(transactions[0].acknowledged);
    assert_eq!(h.store.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn purchase_resolves_through_listener() {
    let mut h = harness(Duration::from_secs(60));
    let session = h.session.clone();
    let pending = tokio::spawn(async move { session.purchase(&request("premium")).await });

    assert_eq!(h.launched.recv().await.as_deref(), Some("premium"));
    assert!(h.session.purchase_in_flight());
    h.session.purchases_updated(play_update(0, "premium"));

    match pending.await.unwrap().unwrap() {
        PurchaseOutcome::Success { transaction } => {
            assert_eq!(transaction.id, "GPA.0001");
            assert!(!transaction.acknowledged);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!h.session.purchase_in_flight());
}

#[tokio::test]
async fn second_purchase_is_rejected_while_one_is_in_flight() {
    let mut h = harness(Duration::from_secs(60));
    let session = h.session.clone();
    let pending = tokio::spawn(async move { session.purchase(&request("premium")).await });
    h.launched.recv().await.unwrap();

    assert!(matches!(
        h.session.purchase(&request("coins")).await,
        Err(Error::PurchaseInProgress)
    ));

    h.session.purchases_updated(play_update(1, "premium"));
    assert_eq!(
        pending.await.unwrap().unwrap(),
        PurchaseOutcome::UserCancelled
    );

    // The slot is free again once the first purchase resolved.
    h.store.launch_codes.lock().unwrap().push_back(1);
    assert_eq!(
        h.session.purchase(&request("coins")).await.unwrap(),
        PurchaseOutcome::UserCancelled
    );
}

#[tokio::test]
async fn failed_launch_resolves_without_waiting() {
    let h = harness(Duration::from_secs(60));
    h.store.launch_codes.lock().unwrap().push_back(7);

    match h.session.purchase(&request("premium")).await.unwrap() {
        PurchaseOutcome::Failed { error } => assert_eq!(error.code, StoreErrorCode::AlreadyOwned),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!h.session.purchase_in_flight());
}

#[tokio::test(start_paused = true)]
async fn purchase_times_out_without_callback() {
    let h = harness(Duration::from_secs(5));

    match h.session.purchase(&request("premium")).await.unwrap() {
        PurchaseOutcome::Failed { error } => assert_eq!(error.code, StoreErrorCode::ServiceTimeout),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!h.session.purchase_in_flight());
}

#[tokio::test]
async fn disconnect_fails_waiting_purchase() {
    let mut h = harness(Duration::from_secs(60));
    let session = h.session.clone();
    let pending = tokio::spawn(async move { session.purchase(&request("premium")).await });
    h.launched.recv().await.unwrap();

    h.session.service_disconnected();

    match pending.await.unwrap().unwrap() {
        PurchaseOutcome::Failed { error } => {
            assert_eq!(error.code, StoreErrorCode::ServiceDisconnected)
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn updates_without_a_waiting_purchase_reach_the_handler() {
    let h = harness(Duration::from_secs(60));
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    h.session
        .on_unsolicited(move |transactions| sink.lock().unwrap().extend(transactions));

    h.session.purchases_updated(play_update(0, "premium"));
    h.session.purchases_updated(play_update(6, "premium"));

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].product_ids, vec!["premium".to_string()]);
}

#[tokio::test]
async fn finishing_acknowledges_or_consumes() {
    let mut h = harness(Duration::from_secs(60));
    let session = h.session.clone();
    let pending = tokio::spawn(async move { session.purchase(&request("premium")).await });
    h.launched.recv().await.unwrap();
    h.session.purchases_updated(play_update(0, "premium"));

    let PurchaseOutcome::Success { mut transaction } = pending.await.unwrap().unwrap() else {
        panic!("purchase did not succeed");
    };

    h.session.finish_transaction(&transaction, false).await.unwrap();
    h.session.finish_transaction(&transaction, true).await.unwrap();

    transaction.acknowledged = true;
    h.session.finish_transaction(&transaction, false).await.unwrap();

    assert_eq!(
        *h.store.finished.lock().unwrap(),
        vec![("token-1".to_string(), false), ("token-1".to_string(), true)]
    );

    transaction.state = TransactionState::Pending;
    assert!(matches!(
        h.session.finish_transaction(&transaction, false).await,
        Err(Error::Billing(err)) if err.code == StoreErrorCode::Pending
    ));
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_connection_attempt() {
    let h = harness(Duration::from_secs(60));
    *h.store.connect_delay.lock().unwrap() = Duration::from_millis(500);

    let coins = ids(&["coins"]);
    let gems = ids(&["gems"]);
    let (first, second) = tokio::join!(
        h.session.get_products(&coins, ProductKind::Inapp),
        h.session.get_products(&gems, ProductKind::Inapp)
    );
    assert_eq!(first.unwrap()[0].id, "coins");
    assert_eq!(second.unwrap()[0].id, "gems");
    assert_eq!(h.store.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disconnected_launch_drops_cached_client() {
    let h = harness(Duration::from_secs(60));
    h.store.launch_codes.lock().unwrap().push_back(-1);

    match h.session.purchase(&request("premium")).await.unwrap() {
        PurchaseOutcome::Failed { error } => {
            assert_eq!(error.code, StoreErrorCode::ServiceDisconnected)
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert!(!h.session.purchase_in_flight());

    h.session.restore_purchases(ProductKind::Subs).await.unwrap();
    assert_eq!(h.store.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn restore_skips_unverified_and_revoked_transactions() {
    let h = harness(Duration::from_secs(60));
    *h.store.owned.lock().unwrap() = vec![
        storekit_transaction(1, json!({ "verified": false })),
        storekit_transaction(2, json!({ "revocationDate": 1_700_000_100_000i64 })),
        storekit_transaction(3, json!({ "expirationDate": 1_700_000_100_000i64 })),
        storekit_transaction(4, json!({})),
    ];

    let restored = h.session.restore_purchases(ProductKind::Inapp).await.unwrap();
    let restored: Vec<_> = restored.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(restored, vec!["4"]);
}

#[tokio::test]
async fn completed_purchase_of_another_product_is_handed_off() {
    let mut h = harness(Duration::from_secs(60));
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    h.session
        .on_unsolicited(move |transactions| sink.lock().unwrap().extend(transactions));

    let session = h.session.clone();
    let pending = tokio::spawn(async move { session.purchase(&request("premium")).await });
    h.launched.recv().await.unwrap();

    // An earlier pending purchase of "coins" completes while "premium" is open.
    h.session.purchases_updated(play_update(0, "coins"));
    assert!(h.session.purchase_in_flight());
    assert_eq!(received.lock().unwrap().len(), 1);
    assert_eq!(received.lock().unwrap()[0].product_ids, vec!["coins".to_string()]);

    h.session.purchases_updated(play_update(0, "premium"));
    match pending.await.unwrap().unwrap() {
        PurchaseOutcome::Success { transaction } => {
            assert_eq!(transaction.product_ids, vec!["premium".to_string()])
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_purchase_frees_the_slot_for_the_next_one() {
    let mut h = harness(Duration::from_secs(5));
    assert!(matches!(
        h.session.purchase(&request("premium")).await.unwrap(),
        PurchaseOutcome::Failed { error } if error.code == StoreErrorCode::ServiceTimeout
    ));
    h.launched.recv().await.unwrap();

    let session = h.session.clone();
    let pending = tokio::spawn(async move { session.purchase(&request("coins")).await });
    assert_eq!(h.launched.recv().await.as_deref(), Some("coins"));
    h.session.purchases_updated(play_update(0, "coins"));
    assert!(matches!(
        pending.await.unwrap().unwrap(),
        PurchaseOutcome::Success { .. }
    ));
}
