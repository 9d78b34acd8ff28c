//! Host-facing interfaces.
//!
//! The e-commerce host's order, customer, and payment-method persistence is
//! an opaque store behind [`OrderStorageInterface`]; its background task
//! queue is a deferred-invocation facility behind [`DeferredTaskInterface`].
//! Neither is a trust boundary for webhook payloads: anything scheduled is
//! re-verified when it runs.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{CustomResult, SchedulerError, StorageError};

/// Payment state of a host order.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderPaymentStatus {
    /// Checkout started, nothing confirmed yet.
    Pending,
    /// Shopper returned from the hosted page; the authoritative webhook has
    /// not arrived.
    Processing,
    /// Payment confirmed by webhook.
    Succeeded,
    /// Payment declined or failed.
    Failed,
    /// Cancelled by operator action.
    Cancelled,
    /// Captured by operator action.
    Captured,
    /// Refunded by operator action.
    Refunded,
}

/// A host order as this integration sees it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OrderRecord {
    /// Host order id.
    pub id: u64,
    /// Host-side secret key used to verify incoming order references.
    pub order_key: String,
    /// Host customer id the order belongs to.
    pub customer_id: u64,
    /// Current payment state.
    pub status: OrderPaymentStatus,
    /// Processor transaction id, once known.
    pub transaction_id: Option<String>,
}

/// A stored payment method as persisted against a host customer.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct StoredCard {
    /// Processor card id.
    pub card_id: String,
    /// Cardholder name.
    pub holder_name: Option<String>,
    /// Card scheme.
    pub scheme: Option<String>,
    /// Masked number for display.
    pub masked_number: Option<String>,
    /// Expiry month.
    pub expiry_month: Option<u32>,
    /// Expiry year.
    pub expiry_year: Option<u32>,
}

/// Payload handed to the deferred-task facility for later webhook
/// processing. Carries the original bytes and hash so the handler can
/// re-verify; queued data is never trusted as pre-verified.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ScheduledWebhookTask {
    /// Hook name the host dispatches the task under.
    pub hook: String,
    /// The webhook body exactly as received.
    pub raw_body: String,
    /// The hash header exactly as received.
    pub supplied_hash: String,
}

/// Read/write operations on host order and payment-method state.
#[async_trait]
pub trait OrderStorageInterface: Send + Sync {
    /// Looks up an order by host id.
    async fn find_order(&self, order_id: u64) -> CustomResult<Option<OrderRecord>, StorageError>;

    /// Sets an order's payment status, recording the processor transaction
    /// id when one is known. Setting the same status twice is harmless.
    async fn update_order_payment_status(
        &self,
        order_id: u64,
        status: OrderPaymentStatus,
        transaction_id: Option<String>,
    ) -> CustomResult<(), StorageError>;

    /// Persists a payment method against a host customer.
    async fn save_payment_method(
        &self,
        customer_id: u64,
        card: StoredCard,
    ) -> CustomResult<(), StorageError>;

    /// Looks up a stored card by processor card id.
    async fn find_card(&self, card_id: &str) -> CustomResult<Option<StoredCard>, StorageError>;

    /// Replaces a stored card's metadata in place.
    async fn update_card(&self, card: StoredCard) -> CustomResult<(), StorageError>;
}

/// The host's deferred-invocation facility: run a task after a delay.
#[async_trait]
pub trait DeferredTaskInterface: Send + Sync {
    /// Enqueues a task to run after `delay`.
    async fn schedule(
        &self,
        task: ScheduledWebhookTask,
        delay: Duration,
    ) -> CustomResult<(), SchedulerError>;
}
