//! Covepay hosted-payment integration for e-commerce checkout and order
//! management.
//!
//! The host glue (routing, settings screens, rendering) calls into four
//! pieces: the [`webhooks::WebhookVerifier`] authenticates and parses
//! incoming redirect and webhook data, the [`connector::Covepay`] client
//! makes authenticated calls against the processor API, the
//! [`responses::ApiResponse`] normalizer folds every call outcome into one
//! uniform value, and the [`reconciler::Reconciler`] turns verified data and
//! remote results into host order and payment-method state.

#![forbid(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

/// Integration settings.
pub mod configs;
/// Remote API client.
pub mod connector;
/// Constants used throughout the integration.
pub mod consts;
/// Keyed-hash primitives.
pub mod crypto;
/// Error taxonomy.
pub mod errors;
/// Parsing extension traits.
pub mod ext_traits;
/// Outbound request construction.
pub mod request;
/// Order and payment-method reconciliation.
pub mod reconciler;
/// Response normalization.
pub mod responses;
/// Host-facing storage and scheduling interfaces.
pub mod storage;
/// Incoming data verification.
pub mod webhooks;

pub use configs::{CovepaySettings, Environment};
pub use connector::Covepay;
pub use reconciler::{OrderLink, Reconciler, RedirectOutcome, RedirectStatus, WebhookAck};
pub use responses::{ApiResponse, ResponseStatus};
pub use storage::{
    DeferredTaskInterface, OrderPaymentStatus, OrderRecord, OrderStorageInterface,
    ScheduledWebhookTask, StoredCard,
};
pub use webhooks::{IncomingDataKind, RedirectData, WebhookData, WebhookType, WebhookVerifier};
