//! Errors and error-handling utilities.

/// Type alias for `error_stack::Result`.
pub type CustomResult<T, E> = error_stack::Result<T, E>;

/// Errors from cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Signing a message failed.
    #[error("Failed to sign message")]
    MessageSigningFailed,
    /// Verifying a signature failed.
    #[error("Failed to verify signature")]
    SignatureVerificationFailed,
    /// The supplied signature could not be decoded.
    #[error("Failed to decode signature")]
    SignatureDecodingFailed,
}

/// Errors while parsing wire payloads.
#[derive(Debug, thiserror::Error)]
pub enum ParsingError {
    /// Deserializing bytes into the named type failed.
    #[error("Failed to parse {0}")]
    StructParseFailure(&'static str),
    /// Serializing the named type to JSON failed.
    #[error("Failed to serialize {0}")]
    EncodeFailure(&'static str),
}

/// Authentication failures against the remote processor.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer token could be obtained with the configured credentials.
    #[error("Failed to obtain an access token")]
    AccessTokenFetchFailed,
}

/// Configuration and input-format validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The value did not match the expected format.
    #[error("Invalid value: {message}")]
    InvalidValue {
        /// Human-readable description of the failure.
        message: String,
    },
    /// A required configuration field is empty.
    #[error("Missing required field: {field_name}")]
    MissingRequiredField {
        /// Name of the empty field.
        field_name: &'static str,
    },
}

/// Failures authenticating or parsing incoming redirect/webhook data.
///
/// The `Display` output of each variant is the exact message surfaced to the
/// caller and written to the log.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// Redirect query data is missing required fields.
    #[error("Missing required fields in redirect_data: \"{}\".", .0.join(", "))]
    MissingRedirectFields(Vec<String>),
    /// The redirect hash did not match the recomputed value.
    #[error("Redirect data hash is invalid.")]
    InvalidRedirectHash,
    /// The webhook HMAC did not match the supplied signature.
    #[error("Webhook hash is invalid.")]
    InvalidWebhookHash,
    /// The webhook body could not be decoded into a non-empty JSON value.
    #[error("Webhook data is invalid.")]
    InvalidWebhookData,
    /// The webhook envelope is missing required fields.
    #[error("Missing required fields in webhook: \"{}\".", .0.join(", "))]
    MissingWebhookFields(Vec<String>),
    /// The webhook body is missing fields required for its type.
    #[error("Missing required fields in webhook_body: \"{}\".", .0.join(", "))]
    MissingWebhookBodyFields(Vec<String>),
    /// The webhook type is not one this integration handles.
    #[error("Wrong webhook type sent. Webhook type \"{webhook_type}\". Webhook ID: {webhook_id}.")]
    WrongWebhookType {
        /// The unrecognized type string as received.
        webhook_type: String,
        /// Webhook id, for correlation in the processor dashboard.
        webhook_id: String,
    },
}

/// Failures reading or writing host order/payment-method state.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record does not exist.
    #[error("Record not found: {entity}")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
    },
    /// The underlying store rejected the operation.
    #[error("Storage operation failed")]
    OperationFailed,
}

/// Failures handing a task to the host's deferred-invocation facility.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The task could not be enqueued.
    #[error("Failed to schedule deferred task")]
    ScheduleFailed,
}

/// Webhook-processing failures, surfaced to the host as an HTTP 400 with the
/// `Display` message as the error body.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Authentication or parsing of the payload failed; carries the precise
    /// verification message.
    #[error("{0}")]
    Verification(VerificationError),
    /// The order reference did not split into an id and key.
    #[error("Order reference in incoming data is invalid.")]
    InvalidOrderReference,
    /// No order exists for the referenced id.
    #[error("Order not found for incoming data.")]
    OrderNotFound,
    /// The order key in the payload does not match the stored order key.
    #[error("Order key in incoming data is invalid.")]
    OrderKeyInvalid,
    /// No stored card exists for the referenced card id.
    #[error("Stored card not found.")]
    CardNotFound,
    /// Host storage failed while applying the webhook.
    #[error("Failed to read or write host order state")]
    Storage,
    /// Deferred processing could not be scheduled.
    #[error("Failed to schedule deferred webhook processing")]
    SchedulingFailed,
}

/// Failures of operator-triggered order actions (capture, cancel, refund).
///
/// The `Display` output is suitable for an admin-facing notice.
#[derive(Debug, thiserror::Error)]
pub enum OrderActionError {
    /// The order does not exist.
    #[error("Order not found.")]
    OrderNotFound,
    /// The order has no processor transaction to act on.
    #[error("Order has no transaction to act on.")]
    MissingTransaction,
    /// No access token could be obtained for the remote call.
    #[error("Could not authenticate with the payment processor.")]
    Authentication,
    /// The processor rejected the action; carries the formatted error block.
    #[error("{notice}")]
    Remote {
        /// Formatted error message including invalid-parameter detail.
        notice: String,
    },
    /// Refunds of wallet-funded transactions are disabled by configuration.
    #[error("Refunds for wallet payments are disabled.")]
    WalletRefundsDisabled,
    /// Host storage failed while recording the action outcome.
    #[error("Failed to update the order after the remote action")]
    Storage,
}
