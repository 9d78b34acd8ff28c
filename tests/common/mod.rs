//! In-memory host doubles shared by the integration tests.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use covepay_gateway::{
    errors::{CustomResult, SchedulerError, StorageError},
    DeferredTaskInterface, OrderPaymentStatus, OrderRecord, OrderStorageInterface,
    ScheduledWebhookTask, StoredCard,
};
use secrecy::SecretString;

pub const SHARED_SECRET: &str = "app_key_secret";

/// In-memory order/payment-method store.
#[derive(Default)]
pub struct MockStore {
    pub orders: Mutex<HashMap<u64, OrderRecord>>,
    pub cards: Mutex<HashMap<String, StoredCard>>,
    pub saved_methods: Mutex<Vec<(u64, StoredCard)>>,
}

impl MockStore {
    pub fn with_order(order: OrderRecord) -> Self {
        let store = Self::default();
        store.orders.lock().expect("lock").insert(order.id, order);
        store
    }

    pub fn order_status(&self, order_id: u64) -> Option<OrderPaymentStatus> {
        self.orders
            .lock()
            .expect("lock")
            .get(&order_id)
            .map(|order| order.status)
    }
}

#[async_trait]
impl OrderStorageInterface for MockStore {
    async fn find_order(&self, order_id: u64) -> CustomResult<Option<OrderRecord>, StorageError> {
        Ok(self.orders.lock().expect("lock").get(&order_id).cloned())
    }

    async fn update_order_payment_status(
        &self,
        order_id: u64,
        status: OrderPaymentStatus,
        transaction_id: Option<String>,
    ) -> CustomResult<(), StorageError> {
        let mut orders = self.orders.lock().expect("lock");
        let order = orders
            .get_mut(&order_id)
            .ok_or(error_stack::report!(StorageError::NotFound { entity: "order" }))?;
        order.status = status;
        if transaction_id.is_some() {
            order.transaction_id = transaction_id;
        }
        Ok(())
    }

    async fn save_payment_method(
        &self,
        customer_id: u64,
        card: StoredCard,
    ) -> CustomResult<(), StorageError> {
        self.cards
            .lock()
            .expect("lock")
            .insert(card.card_id.clone(), card.clone());
        self.saved_methods
            .lock()
            .expect("lock")
            .push((customer_id, card));
        Ok(())
    }

    async fn find_card(&self, card_id: &str) -> CustomResult<Option<StoredCard>, StorageError> {
        Ok(self.cards.lock().expect("lock").get(card_id).cloned())
    }

    async fn update_card(&self, card: StoredCard) -> CustomResult<(), StorageError> {
        self.cards
            .lock()
            .expect("lock")
            .insert(card.card_id.clone(), card);
        Ok(())
    }
}

/// Captures scheduled tasks instead of running them.
#[derive(Default)]
pub struct MockScheduler {
    pub tasks: Mutex<Vec<(ScheduledWebhookTask, Duration)>>,
}

impl MockScheduler {
    pub fn scheduled(&self) -> Vec<ScheduledWebhookTask> {
        self.tasks
            .lock()
            .expect("lock")
            .iter()
            .map(|(task, _)| task.clone())
            .collect()
    }
}

#[async_trait]
impl DeferredTaskInterface for MockScheduler {
    async fn schedule(
        &self,
        task: ScheduledWebhookTask,
        delay: Duration,
    ) -> CustomResult<(), SchedulerError> {
        self.tasks.lock().expect("lock").push((task, delay));
        Ok(())
    }
}

pub fn settings_with_base_url(base_url: &str) -> covepay_gateway::CovepaySettings {
    covepay_gateway::CovepaySettings {
        environment: covepay_gateway::Environment::Staging,
        base_url: Some(base_url.to_string()),
        app_id: "app_1".to_string(),
        app_key: SecretString::new("key_1".to_string()),
        shared_secret: SecretString::new(SHARED_SECRET.to_string()),
        company_id: None,
        force_3ds_challenge: false,
        tokenize_cards: false,
        wallet_refunds_enabled: false,
    }
}

/// Hex HMAC-SHA-256 of the whitespace-stripped body, as the processor sends
/// it in the `Hash` header.
pub fn webhook_hash(body: &str) -> String {
    use covepay_gateway::crypto::SignMessage;

    let stripped: Vec<u8> = body
        .bytes()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect();
    hex::encode(
        covepay_gateway::crypto::HmacSha256
            .sign_message(SHARED_SECRET.as_bytes(), &stripped)
            .expect("signature"),
    )
}
