#![allow(dead_code)]

use async_trait::async_trait;
use bookstore_orders::domain::pricing::BookPrice;
use bookstore_orders::gateway::{GatewayError, PaymentGateway, PaymentRequest, Verification};
use bookstore_orders::publisher::EventPublisher;
use bookstore_orders::services::{CartManager, OrderLifecycle, OrderQueries, PaymentCoordinator, PromoEngine};
use bookstore_orders::store::{BookListing, CatalogReader, MemoryStore, OrderStore, OrderTx};
use bookstore_orders::{Availability, GatewayReceipt, NewPromo, Order, Promo};
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

pub const CALLBACK_URL: &str = "http://localhost:8083/payment/zarinpal/check";

/// Gateway double: issues sequential authorities and answers verification
/// with whatever the test scripted. `hold_verify` parks the next verification
/// until `release_verify`.
pub struct ScriptedGateway {
    issued: AtomicU32,
    verify_with: Mutex<Verification>,
    hold: AtomicBool,
    entered: Notify,
    released: Notify,
    pub requests: Mutex<Vec<PaymentRequest>>,
    pub verifications: Mutex<Vec<(String, u64)>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            issued: AtomicU32::new(0),
            verify_with: Mutex::new(Verification { code: 100, ref_id: Some("REF-1".into()) }),
            hold: AtomicBool::new(false),
            entered: Notify::new(),
            released: Notify::new(),
            requests: Mutex::new(Vec::new()),
            verifications: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedGateway {
    pub fn answer_verify(&self, code: i32, ref_id: Option<&str>) {
        *self.verify_with.lock().unwrap() = Verification { code, ref_id: ref_id.map(str::to_string) };
    }

    pub fn verify_calls(&self) -> usize { self.verifications.lock().unwrap().len() }

    pub fn hold_verify(&self) { self.hold.store(true, Ordering::SeqCst) }

    /// Resolves once a held verification is waiting.
    pub async fn verify_entered(&self) { self.entered.notified().await }

    pub fn release_verify(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.released.notify_one();
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn request(&self, request: &PaymentRequest) -> Result<String, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("A{n:035}"))
    }

    async fn verify(&self, authority: &str, amount: u64) -> Result<Verification, GatewayError> {
        self.verifications.lock().unwrap().push((authority.to_string(), amount));
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.released.notified().await;
        }
        Ok(self.verify_with.lock().unwrap().clone())
    }

    fn pay_url(&self, authority: &str) -> String {
        format!("https://sandbox.zarinpal.com/pg/StartPay/{authority}")
    }
}

pub struct Fixture {
    pub store: MemoryStore,
    pub gateway: Arc<ScriptedGateway>,
    pub cart: CartManager,
    pub promos: PromoEngine,
    pub lifecycle: OrderLifecycle,
    pub payments: PaymentCoordinator,
    pub queries: OrderQueries,
}

impl Fixture {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let gateway = Arc::new(ScriptedGateway::default());
        let shared: Arc<dyn OrderStore> = Arc::new(store.clone());
        let events = EventPublisher::disabled();
        Self {
            cart: CartManager::new(shared.clone(), events.clone()),
            promos: PromoEngine::new(shared.clone(), events.clone()),
            lifecycle: OrderLifecycle::new(shared.clone(), events.clone()),
            payments: PaymentCoordinator::new(shared.clone(), gateway.clone(), events, CALLBACK_URL),
            queries: OrderQueries::new(shared),
            store,
            gateway,
        }
    }

    pub async fn user(&self) -> Uuid {
        self.store.add_user(&format!("{}@books.test", Uuid::new_v4().simple())).await
    }

    /// A user with a phone and an address on file. Returns (user, phone, address).
    pub async fn shipping_user(&self) -> (Uuid, Uuid, Uuid) {
        let user = self.user().await;
        let phone = self.store.add_phone(user, "09120000000").await;
        let address = self.store.add_address(user).await;
        (user, phone, address)
    }

    pub async fn book(&self, availability: Availability, price: BookPrice, stock: u32) -> Uuid {
        self.store.add_book(BookListing {
            id: Uuid::now_v7(),
            title: "The Blind Owl".into(),
            availability,
            price,
            stock,
            file: Some("books/blind-owl.epub".into()),
        }).await
    }

    /// Scenario 1 book: digital only, 50000 at 10 % off.
    pub async fn digital_book(&self) -> Uuid {
        self.book(Availability::Digital, BookPrice { digital_price: 50_000, digital_discount: 10, ..Default::default() }, 0).await
    }

    /// Scenario 2 book: sold as a bundle, 5 copies in stock.
    pub async fn bundle_book(&self) -> Uuid {
        let price = BookPrice { digital_price: 30_000, digital_discount: 0, physical_price: 100_000, physical_discount: 20 };
        self.book(Availability::Bundle, price, 5).await
    }

    pub async fn promo(&self, owner: Uuid, code: &str, limit: u32, percentage: u8, max_discount: Option<u64>) -> Promo {
        let promo = NewPromo::new(code, Utc::now() + Duration::days(7), limit, percentage, max_discount).unwrap();
        self.promos.create_promo(owner, promo).await.unwrap()
    }

    pub async fn stock(&self, book_id: Uuid) -> u32 {
        let mut tx = self.store.begin().await.unwrap();
        tx.book(book_id).await.unwrap().unwrap().stock
    }

    pub async fn promo_limit(&self, promo_id: Uuid) -> u32 {
        let mut tx = self.store.begin().await.unwrap();
        tx.promo(promo_id).await.unwrap().unwrap().limit
    }

    pub async fn order(&self, order_id: Uuid) -> Option<Order> {
        let mut tx = self.store.begin().await.unwrap();
        tx.order(order_id).await.unwrap()
    }

    pub async fn receipt(&self, order_id: Uuid) -> Option<GatewayReceipt> {
        let mut tx = self.store.begin().await.unwrap();
        tx.receipt_of_order(order_id).await.unwrap()
    }

    /// Scenario 2 and 3: a bundle order of two copies with a capped 50 % promo, contact set.
    /// Returns (user, order_id, promo).
    pub async fn priced_physical_order(&self) -> (Uuid, Uuid, Promo) {
        let (user, phone, address) = self.shipping_user().await;
        let book = self.bundle_book().await;
        let cart = self.cart.add_item(user, bookstore_orders::services::AddItem {
            book_id: book,
            kind: bookstore_orders::RequestedKind::Bundle,
            quantity: 2,
        }).await.unwrap();
        let order_id = cart.order.id;
        let promo = self.promo(user, "HALF", 1, 50, Some(40_000)).await;
        self.promos.apply_to_order(user, order_id, "HALF").await.unwrap();
        self.cart.set_phone(user, order_id, phone).await.unwrap();
        self.cart.set_address(user, order_id, address).await.unwrap();
        (user, order_id, promo)
    }
}
