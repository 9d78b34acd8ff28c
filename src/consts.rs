//! Constants shared across the integration.

use std::time::Duration;

/// Header names used on inbound and outbound requests.
pub mod headers {
    /// Authorization header carrying `<type> <token>`.
    pub const AUTHORIZATION: &str = "Authorization";
    /// Content type of outbound request bodies.
    pub const CONTENT_TYPE: &str = "Content-Type";
    /// Processor-side tenant selector.
    pub const COMPANY_ID: &str = "Company-Id";
    /// HMAC digest of the webhook body, hex encoded.
    pub const HASH: &str = "Hash";
}

/// Content type of every request and response body on this API.
pub const APPLICATION_JSON: &str = "application/json";

/// Endpoint path segments.
pub mod endpoints {
    /// Bearer-token issuance.
    pub const LOGIN: &str = "login";
    /// Hosted checkout links.
    pub const PAYMENT_LINKS: &str = "payment-links";
    /// Transactions collection.
    pub const TRANSACTIONS: &str = "transactions";
    /// Capture sub-endpoint under a transaction.
    pub const CAPTURE: &str = "capture";
    /// Unified refund/cancel sub-endpoint under a transaction.
    pub const REVERSAL: &str = "reversal";
    /// Customers collection.
    pub const CUSTOMERS: &str = "customers";
    /// Stored cards collection.
    pub const CARDS: &str = "cards";
}

/// Query parameter selecting which response fields to return.
pub const FILTER_QUERY_KEY: &str = "filter";

/// Ack message returned to the processor for an accepted webhook.
pub const WEBHOOK_PROCESSED_MESSAGE: &str = "Webhook processed successfully.";

/// Normalizer message for a 2xx exchange whose body is empty or not JSON.
pub const INVALID_RESPONSE_BODY: &str = "Invalid response body.";

/// Prefix classifying an order-link key as a save-card flow.
pub const ADD_PAYMENT_METHOD_PREFIX: &str = "add_payment_method";

/// Hook name under which deferred webhook processing is scheduled.
pub const DEFERRED_WEBHOOK_HOOK: &str = "covepay_process_webhook";

/// Delay before a deferred webhook task runs.
pub const DEFERRED_WEBHOOK_DELAY: Duration = Duration::from_secs(30);

/// Currency used by the zero-amount credential probe.
pub const CREDENTIAL_PROBE_CURRENCY: &str = "USD";

/// Payment reference used by the zero-amount credential probe.
pub const CREDENTIAL_PROBE_REFERENCE: &str = "connection-check";
