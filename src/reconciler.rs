//! Order and payment-method reconciliation.
//!
//! Verified incoming data meets remote API results here and becomes host
//! state: order payment transitions, stored payment methods, and operator
//! actions. Webhooks are the ordering source of truth; the redirect path is
//! best-effort UX and never performs the authoritative status change.

use std::sync::Arc;

use error_stack::{report, ResultExt};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::{
    connector::Covepay,
    consts,
    errors::{CustomResult, OrderActionError, WebhookError},
    storage::{
        DeferredTaskInterface, OrderPaymentStatus, OrderRecord, OrderStorageInterface,
        ScheduledWebhookTask, StoredCard,
    },
    webhooks::{RedirectData, WebhookData, WebhookType, WebhookVerifier},
};

/// Composite order reference `"<numeric_id>-<verification_key>"` carried on
/// payment links and incoming data.
///
/// A reference is valid only when it splits into exactly two hyphen-separated
/// segments; keys minted by this crate are therefore hyphen-free.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderLink {
    id: u64,
    key: String,
}

impl OrderLink {
    /// Parses a composite reference. `None` unless the reference splits into
    /// exactly one numeric id and one key segment.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<&str> = raw.split('-').collect();
        match segments.as_slice() {
            [id, key] if !key.is_empty() => Some(Self {
                id: id.parse().ok()?,
                key: (*key).to_string(),
            }),
            _ => None,
        }
    }

    /// Link for an existing order, carrying the order's own secret key.
    pub fn for_order(order: &OrderRecord) -> Self {
        Self {
            id: order.id,
            key: order.order_key.clone(),
        }
    }

    /// Mints a link for a save-card flow against a host customer. The key is
    /// prefixed `add_payment_method_` and contains no hyphens.
    pub fn for_payment_method_flow(customer_id: u64) -> Self {
        Self {
            id: customer_id,
            key: format!(
                "{}_{}",
                consts::ADD_PAYMENT_METHOD_PREFIX,
                uuid::Uuid::new_v4().simple()
            ),
        }
    }

    /// Numeric host id (order id, or customer id for save-card flows).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Verification key segment.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the link belongs to a save-card flow.
    pub fn is_for_payment_method(&self) -> bool {
        self.key.starts_with(consts::ADD_PAYMENT_METHOD_PREFIX)
    }

    /// The composite `"<id>-<key>"` form.
    pub fn composite(&self) -> String {
        format!("{}-{}", self.id, self.key)
    }
}

/// Broad outcome classes a processor transaction status maps to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TransactionOutcome {
    /// Payment went through.
    Success,
    /// Payment declined or failed.
    Declined,
    /// Still in flight.
    Pending,
}

/// Maps a processor transaction status string onto an outcome class.
/// Unrecognized statuses are treated as pending and logged.
pub fn interpret_transaction_status(raw_status: &str) -> TransactionOutcome {
    match raw_status.to_uppercase().as_str() {
        "SUCCESS" | "COMPLETE" | "CAPTURED" => TransactionOutcome::Success,
        "DECLINED" | "FAILED" | "CANCELLED" => TransactionOutcome::Declined,
        "PENDING" | "IN_PROGRESS" | "PROCESSING" => TransactionOutcome::Pending,
        _ => {
            tracing::warn!("Unknown transaction status: {}", raw_status);
            TransactionOutcome::Pending
        }
    }
}

/// Status flag attached to browser redirects for the UI to render a notice.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RedirectStatus {
    /// Flow completed as far as the browser can tell.
    Success,
    /// Flow still pending; the webhook will settle it.
    Pending,
    /// Flow failed or could not be verified.
    Failed,
}

/// Where the host should 303 the browser after a redirect callback.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RedirectOutcome {
    /// Show the order confirmation page.
    OrderConfirmation {
        /// Host order id to confirm.
        order_id: u64,
    },
    /// Show the saved payment methods page with a status flag.
    PaymentMethods {
        /// Flag for the UI notice.
        status: RedirectStatus,
    },
    /// Fall back to checkout with a status flag.
    Checkout {
        /// Flag for the UI notice.
        status: RedirectStatus,
    },
}

/// Body returned to the processor for an accepted webhook.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct WebhookAck {
    /// Always `true` on the success path.
    pub success: bool,
    /// Fixed ack message.
    pub message: String,
}

impl WebhookAck {
    /// The fixed success ack.
    pub fn ok() -> Self {
        Self {
            success: true,
            message: consts::WEBHOOK_PROCESSED_MESSAGE.to_string(),
        }
    }
}

/// Applies verified incoming data and remote results to host state.
#[derive(Clone)]
pub struct Reconciler {
    client: Covepay,
    verifier: WebhookVerifier,
    store: Arc<dyn OrderStorageInterface>,
    scheduler: Arc<dyn DeferredTaskInterface>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler over the client and host interfaces. The
    /// verifier shares the client's configured secret.
    pub fn new(
        client: Covepay,
        store: Arc<dyn OrderStorageInterface>,
        scheduler: Arc<dyn DeferredTaskInterface>,
    ) -> Self {
        let verifier = WebhookVerifier::new(client.settings().shared_secret.clone());
        Self {
            client,
            verifier,
            store,
            scheduler,
        }
    }

    /// The verifier used for incoming data.
    pub fn verifier(&self) -> &WebhookVerifier {
        &self.verifier
    }

    /// Handles a webhook delivery.
    ///
    /// Returns the fixed ack on acceptance; any failure maps to an HTTP 400
    /// with the error's `Display` message as the body. Status updates and
    /// save-card flows are not applied inline; they are scheduled for
    /// deferred processing carrying the original payload and hash.
    #[instrument(skip(self, raw_body, supplied_hash))]
    pub async fn process_webhook(
        &self,
        raw_body: &[u8],
        supplied_hash: &str,
    ) -> CustomResult<WebhookAck, WebhookError> {
        let data = self.verify(raw_body, supplied_hash)?;

        match data.webhook_type() {
            WebhookType::StatusUpdate => {
                // Reject unknown orders and bad keys immediately; the
                // transition itself runs deferred and re-verifies.
                self.find_verified_order(&data).await?;
                self.defer(raw_body, supplied_hash).await?;
            }
            WebhookType::CardNew => {
                let link = parse_order_link(&data)?;
                if link.is_for_payment_method() {
                    self.defer(raw_body, supplied_hash).await?;
                } else {
                    let order = self.find_verified_order(&data).await?;
                    self.save_card_from_webhook(order.customer_id, &data).await?;
                }
            }
            WebhookType::CardUpdate => {
                self.apply_card_update(&data).await?;
            }
        }
        Ok(WebhookAck::ok())
    }

    /// Handles a deferred webhook task when the host scheduler fires it.
    ///
    /// The queue is not a trust boundary: verification runs again from the
    /// original bytes before anything is applied.
    #[instrument(skip(self, task))]
    pub async fn process_scheduled_webhook(
        &self,
        task: &ScheduledWebhookTask,
    ) -> CustomResult<WebhookAck, WebhookError> {
        let data = self.verify(task.raw_body.as_bytes(), &task.supplied_hash)?;

        match data.webhook_type() {
            WebhookType::StatusUpdate => self.apply_status_update(&data).await?,
            WebhookType::CardNew => {
                let link = parse_order_link(&data)?;
                if link.is_for_payment_method() {
                    // Save-card flow: the numeric segment is the customer id.
                    self.save_card_from_webhook(link.id(), &data).await?;
                } else {
                    let order = self.find_verified_order(&data).await?;
                    self.save_card_from_webhook(order.customer_id, &data).await?;
                }
            }
            WebhookType::CardUpdate => self.apply_card_update(&data).await?,
        }
        Ok(WebhookAck::ok())
    }

    /// Handles the browser returning from the hosted payment page.
    ///
    /// Best-effort only: failures never surface to the shopper as errors,
    /// they fall back to a redirect target with a status flag. The
    /// authoritative status change always comes from the webhook path.
    #[instrument(skip(self, raw_query))]
    pub async fn process_redirect(&self, raw_query: &Value) -> RedirectOutcome {
        let data = match self.verifier.get_redirect_data(raw_query) {
            Ok(data) => data,
            Err(_) => {
                return RedirectOutcome::Checkout {
                    status: RedirectStatus::Failed,
                }
            }
        };

        let Some(link) = OrderLink::parse(data.order_id()) else {
            return RedirectOutcome::Checkout {
                status: RedirectStatus::Failed,
            };
        };

        let outcome = interpret_transaction_status(data.transaction_status());

        if link.is_for_payment_method() {
            let status = match outcome {
                TransactionOutcome::Success => RedirectStatus::Success,
                TransactionOutcome::Pending => RedirectStatus::Pending,
                TransactionOutcome::Declined => RedirectStatus::Failed,
            };
            return RedirectOutcome::PaymentMethods { status };
        }

        let order = match self.store.find_order(link.id()).await {
            Ok(Some(order)) if order.order_key == link.key() => order,
            _ => {
                return RedirectOutcome::Checkout {
                    status: RedirectStatus::Failed,
                }
            }
        };

        if outcome == TransactionOutcome::Declined {
            return RedirectOutcome::Checkout {
                status: RedirectStatus::Failed,
            };
        }

        // Show the confirmation page right away; the webhook settles the
        // order for real. Storage failures here must not break the redirect.
        if order.status == OrderPaymentStatus::Pending {
            if let Err(error) = self
                .store
                .update_order_payment_status(
                    order.id,
                    OrderPaymentStatus::Processing,
                    Some(data.transaction_id().to_string()),
                )
                .await
            {
                tracing::warn!(?error, order_id = order.id, "redirect status update failed");
            }
        }

        RedirectOutcome::OrderConfirmation { order_id: order.id }
    }

    /// Operator action: capture an authorized transaction.
    #[instrument(skip(self))]
    pub async fn capture_order(
        &self,
        order_id: u64,
        amount: Option<i64>,
    ) -> CustomResult<(), OrderActionError> {
        let (order, transaction_id) = self.order_with_transaction(order_id).await?;
        let response = self
            .client
            .capture_transaction(&transaction_id, amount)
            .await
            .change_context(OrderActionError::Authentication)?;

        if !response.is_success() {
            return Err(report!(OrderActionError::Remote {
                notice: response.error_message_formatted(true),
            }));
        }
        self.store
            .update_order_payment_status(order.id, OrderPaymentStatus::Captured, Some(transaction_id))
            .await
            .change_context(OrderActionError::Storage)?;
        Ok(())
    }

    /// Operator action: cancel an uncaptured transaction.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: u64) -> CustomResult<(), OrderActionError> {
        let (order, transaction_id) = self.order_with_transaction(order_id).await?;
        let response = self
            .client
            .cancel_transaction(&transaction_id)
            .await
            .change_context(OrderActionError::Authentication)?;

        if !response.is_success() {
            return Err(report!(OrderActionError::Remote {
                notice: response.error_message_formatted(true),
            }));
        }
        self.store
            .update_order_payment_status(order.id, OrderPaymentStatus::Cancelled, Some(transaction_id))
            .await
            .change_context(OrderActionError::Storage)?;
        Ok(())
    }

    /// Operator action: refund a captured transaction, fully or partially.
    ///
    /// Fetches transaction detail first; wallet-funded transactions are
    /// refused when wallet refunds are disabled in configuration.
    #[instrument(skip(self))]
    pub async fn refund_order(
        &self,
        order_id: u64,
        amount: Option<i64>,
    ) -> CustomResult<(), OrderActionError> {
        let (order, transaction_id) = self.order_with_transaction(order_id).await?;

        let detail = self
            .client
            .get_transaction(&transaction_id, Some(&["transaction_id", "status", "payment_source"]))
            .await
            .change_context(OrderActionError::Authentication)?;
        if detail.is_wallet_funded() && !self.client.settings().wallet_refunds_enabled {
            return Err(report!(OrderActionError::WalletRefundsDisabled));
        }

        let response = self
            .client
            .refund_transaction(&transaction_id, amount)
            .await
            .change_context(OrderActionError::Authentication)?;

        if !response.is_success() {
            return Err(report!(OrderActionError::Remote {
                notice: response.error_message_formatted(true),
            }));
        }
        self.store
            .update_order_payment_status(order.id, OrderPaymentStatus::Refunded, Some(transaction_id))
            .await
            .change_context(OrderActionError::Storage)?;
        Ok(())
    }

    fn verify(
        &self,
        raw_body: &[u8],
        supplied_hash: &str,
    ) -> CustomResult<WebhookData, WebhookError> {
        self.verifier
            .get_webhook_data(raw_body, supplied_hash)
            .map_err(|error| {
                let verification = error.current_context().clone();
                error.change_context(WebhookError::Verification(verification))
            })
    }

    async fn defer(&self, raw_body: &[u8], supplied_hash: &str) -> CustomResult<(), WebhookError> {
        let task = ScheduledWebhookTask {
            hook: consts::DEFERRED_WEBHOOK_HOOK.to_string(),
            raw_body: String::from_utf8_lossy(raw_body).into_owned(),
            supplied_hash: supplied_hash.to_string(),
        };
        self.scheduler
            .schedule(task, consts::DEFERRED_WEBHOOK_DELAY)
            .await
            .change_context(WebhookError::SchedulingFailed)
    }

    async fn find_verified_order(
        &self,
        data: &WebhookData,
    ) -> CustomResult<OrderRecord, WebhookError> {
        let link = parse_order_link(data)?;
        let order = self
            .store
            .find_order(link.id())
            .await
            .change_context(WebhookError::Storage)?
            .ok_or_else(|| report!(WebhookError::OrderNotFound))?;
        if order.order_key != link.key() {
            return Err(report!(WebhookError::OrderKeyInvalid));
        }
        Ok(order)
    }

    async fn apply_status_update(&self, data: &WebhookData) -> CustomResult<(), WebhookError> {
        let order = self.find_verified_order(data).await?;
        let outcome = interpret_transaction_status(data.transaction_status().unwrap_or_default());
        let new_status = match outcome {
            TransactionOutcome::Success => OrderPaymentStatus::Succeeded,
            TransactionOutcome::Declined => OrderPaymentStatus::Failed,
            TransactionOutcome::Pending => OrderPaymentStatus::Processing,
        };

        if order.status == new_status {
            tracing::info!(
                order_id = order.id,
                status = %new_status,
                "order already in webhook status, nothing to apply"
            );
            return Ok(());
        }

        self.store
            .update_order_payment_status(
                order.id,
                new_status,
                data.transaction_id().map(str::to_string),
            )
            .await
            .change_context(WebhookError::Storage)
    }

    async fn save_card_from_webhook(
        &self,
        customer_id: u64,
        data: &WebhookData,
    ) -> CustomResult<(), WebhookError> {
        let card_id = data.card_id().unwrap_or_default().to_string();

        // Enrich from the processor when possible; a failed detail fetch
        // still leaves a usable minimal record.
        let card = match self.client.get_card(&card_id, None).await {
            Ok(response) if response.is_success() => {
                let detail = response.card();
                StoredCard {
                    card_id: card_id.clone(),
                    holder_name: detail.and_then(|card| card.holder_name.clone()),
                    scheme: detail.and_then(|card| card.scheme.clone()),
                    masked_number: detail.and_then(|card| card.number.clone()),
                    expiry_month: detail.and_then(|card| card.expiry_month),
                    expiry_year: detail.and_then(|card| card.expiry_year),
                }
            }
            Ok(response) => {
                tracing::warn!(
                    card_id = %card_id,
                    error = %response.error_message_formatted(false),
                    "card detail fetch failed, storing minimal record"
                );
                StoredCard {
                    card_id: card_id.clone(),
                    ..StoredCard::default()
                }
            }
            Err(error) => {
                tracing::warn!(card_id = %card_id, ?error, "card detail fetch failed, storing minimal record");
                StoredCard {
                    card_id: card_id.clone(),
                    ..StoredCard::default()
                }
            }
        };

        self.store
            .save_payment_method(customer_id, card)
            .await
            .change_context(WebhookError::Storage)
    }

    async fn apply_card_update(&self, data: &WebhookData) -> CustomResult<(), WebhookError> {
        let card_id = data.card_id().unwrap_or_default();
        let existing = self
            .store
            .find_card(card_id)
            .await
            .change_context(WebhookError::Storage)?
            .ok_or_else(|| report!(WebhookError::CardNotFound))?;

        let nested = &data.raw_payload()["webhook_body"]["card"];
        let updated = StoredCard {
            card_id: existing.card_id.clone(),
            holder_name: string_field(nested, "holder_name").or(existing.holder_name),
            scheme: string_field(nested, "scheme").or(existing.scheme),
            masked_number: string_field(nested, "number").or(existing.masked_number),
            expiry_month: u32_field(nested, "expiry_month").or(existing.expiry_month),
            expiry_year: u32_field(nested, "expiry_year").or(existing.expiry_year),
        };

        self.store
            .update_card(updated)
            .await
            .change_context(WebhookError::Storage)
    }

    async fn order_with_transaction(
        &self,
        order_id: u64,
    ) -> CustomResult<(OrderRecord, String), OrderActionError> {
        let order = self
            .store
            .find_order(order_id)
            .await
            .change_context(OrderActionError::Storage)?
            .ok_or_else(|| report!(OrderActionError::OrderNotFound))?;
        let transaction_id = order
            .transaction_id
            .clone()
            .ok_or_else(|| report!(OrderActionError::MissingTransaction))?;
        Ok((order, transaction_id))
    }
}

fn parse_order_link(data: &WebhookData) -> CustomResult<OrderLink, WebhookError> {
    data.order_id()
        .and_then(OrderLink::parse)
        .ok_or_else(|| report!(WebhookError::InvalidOrderReference))
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn u32_field(value: &Value, field: &str) -> Option<u32> {
    value
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|number| u32::try_from(number).ok())
}
