//! Incoming data verification.
//!
//! Two inbound shapes reach this integration: redirect-callback query data
//! from the shopper's browser and webhook JSON from the processor. Both are
//! authenticated with a keyed hash before any business logic sees them; an
//! unauthenticated payload never becomes a [`RedirectData`] or
//! [`WebhookData`]. The webhook HMAC is computed over the original bytes
//! (whitespace stripped), never over sanitized data.

use error_stack::report;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::{
    crypto::{self, VerifySignature},
    errors::{CustomResult, VerificationError},
    ext_traits::ByteSliceExt,
};

/// Which inbound shape a verified payload came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum IncomingDataKind {
    /// Browser return-trip from the hosted payment page.
    Redirect,
    /// Server-to-server notification from the processor.
    Webhook,
}

/// Webhook notification types this integration handles.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum WebhookType {
    /// Transaction status changed.
    StatusUpdate,
    /// A card was tokenized.
    CardNew,
    /// A stored card's metadata changed.
    CardUpdate,
}

const REDIRECT_REQUIRED_FIELDS: [&str; 5] =
    ["status", "transaction_id", "order_id", "timestamp", "hash"];
const WEBHOOK_REQUIRED_FIELDS: [&str; 4] = ["webhook_type", "webhook_id", "timestamp", "webhook_body"];
const STATUS_UPDATE_BODY_FIELDS: [&str; 3] = ["transaction_id", "status", "order_id"];
const CARD_NEW_BODY_FIELDS: [&str; 4] = ["transaction_id", "status", "order_id", "card_id"];
const CARD_UPDATE_BODY_FIELDS: [&str; 4] = ["card_id", "update_type", "update_detail", "card"];
const CARD_NESTED_FIELDS: [&str; 5] = [
    "holder_name",
    "scheme",
    "number",
    "expiry_month",
    "expiry_year",
];

/// Verified redirect-callback data. Immutable after construction.
#[derive(Clone, Debug)]
pub struct RedirectData {
    transaction_id: String,
    transaction_status: String,
    order_id: String,
    timestamp: i64,
    card_id: Option<String>,
    raw_payload: Value,
}

impl RedirectData {
    /// Always [`IncomingDataKind::Redirect`].
    pub fn kind(&self) -> IncomingDataKind {
        IncomingDataKind::Redirect
    }

    /// Processor transaction id.
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Transaction status string as sent.
    pub fn transaction_status(&self) -> &str {
        &self.transaction_status
    }

    /// Composite order link (`"<id>-<key>"`).
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Unix seconds the callback was issued at.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Tokenized card id, when the flow produced one.
    pub fn card_id(&self) -> Option<&str> {
        self.card_id.as_deref()
    }

    /// The sanitized payload, retained for logging.
    pub fn raw_payload(&self) -> &Value {
        &self.raw_payload
    }
}

/// Verified webhook data. Immutable after construction.
#[derive(Clone, Debug)]
pub struct WebhookData {
    webhook_type: WebhookType,
    webhook_id: String,
    timestamp: i64,
    transaction_id: Option<String>,
    transaction_status: Option<String>,
    order_id: Option<String>,
    card_id: Option<String>,
    raw_payload: Value,
}

impl WebhookData {
    /// Always [`IncomingDataKind::Webhook`].
    pub fn kind(&self) -> IncomingDataKind {
        IncomingDataKind::Webhook
    }

    /// Notification type.
    pub fn webhook_type(&self) -> WebhookType {
        self.webhook_type
    }

    /// Processor-assigned webhook id.
    pub fn webhook_id(&self) -> &str {
        &self.webhook_id
    }

    /// Unix seconds the webhook was issued at.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Processor transaction id; set for status updates and new cards.
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    /// Transaction status string; set for status updates and new cards.
    pub fn transaction_status(&self) -> Option<&str> {
        self.transaction_status.as_deref()
    }

    /// Composite order link; set for status updates and new cards.
    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }

    /// Tokenized card id; set for new cards and card updates, always from
    /// the top-level `webhook_body.card_id`.
    pub fn card_id(&self) -> Option<&str> {
        self.card_id.as_deref()
    }

    /// The sanitized payload, retained for logging.
    pub fn raw_payload(&self) -> &Value {
        &self.raw_payload
    }
}

/// Authenticates and parses inbound callback data.
#[derive(Clone, Debug)]
pub struct WebhookVerifier {
    shared_secret: SecretString,
}

impl WebhookVerifier {
    /// Creates a verifier over the configured shared secret.
    pub fn new(shared_secret: SecretString) -> Self {
        Self { shared_secret }
    }

    /// Verifies and parses redirect-callback query data.
    ///
    /// Sanitizes string leaves, requires the redirect field set, recomputes
    /// the double-SHA-256 hash over the verified fields and compares it to
    /// the supplied hash in constant time.
    pub fn get_redirect_data(&self, raw_query: &Value) -> CustomResult<RedirectData, VerificationError> {
        let result = self.verify_redirect(raw_query);
        match &result {
            Ok(data) => tracing::debug!(redirect_data = ?data.raw_payload()),
            Err(error) => tracing::error!(error = %error.current_context(), "redirect data verification failed"),
        }
        result
    }

    fn verify_redirect(&self, raw_query: &Value) -> CustomResult<RedirectData, VerificationError> {
        let sanitized = sanitize_value(raw_query);

        let mut missing: Vec<String> = Vec::new();
        for field in REDIRECT_REQUIRED_FIELDS {
            if field_as_string(&sanitized, field).is_none() {
                missing.push(field.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(report!(VerificationError::MissingRedirectFields(missing)));
        }

        // All five are present; unwraps above were just filtered out.
        let status = field_as_string(&sanitized, "status").unwrap_or_default();
        let transaction_id = field_as_string(&sanitized, "transaction_id").unwrap_or_default();
        let order_id = field_as_string(&sanitized, "order_id").unwrap_or_default();
        let timestamp_raw = field_as_string(&sanitized, "timestamp").unwrap_or_default();
        let supplied_hash = field_as_string(&sanitized, "hash").unwrap_or_default();

        let timestamp: i64 = timestamp_raw.parse().map_err(|_| {
            report!(VerificationError::MissingRedirectFields(vec![
                "timestamp".to_string()
            ]))
        })?;

        let secret = self.shared_secret.expose_secret();
        if secret.is_empty() {
            return Err(report!(VerificationError::InvalidRedirectHash));
        }

        let pre_image = format!("{status}{transaction_id}{order_id}{timestamp_raw}");
        let inner_hash = crypto::sha256_hex(pre_image.as_bytes())
            .map_err(|_| report!(VerificationError::InvalidRedirectHash))?;
        let expected = crypto::sha256_hex(format!("{inner_hash}{secret}").as_bytes())
            .map_err(|_| report!(VerificationError::InvalidRedirectHash))?;

        if !crypto::constant_time_eq(expected.as_bytes(), supplied_hash.to_lowercase().as_bytes()) {
            return Err(report!(VerificationError::InvalidRedirectHash));
        }

        Ok(RedirectData {
            transaction_id,
            transaction_status: status,
            order_id,
            timestamp,
            card_id: field_as_string(&sanitized, "card_id"),
            raw_payload: sanitized,
        })
    }

    /// Verifies and parses a webhook delivery.
    ///
    /// The HMAC is checked over the whitespace-stripped original bytes
    /// before anything is parsed, so intermediaries reformatting the JSON
    /// cannot break verification and sanitization cannot weaken it.
    pub fn get_webhook_data(
        &self,
        raw_body: &[u8],
        supplied_hash: &str,
    ) -> CustomResult<WebhookData, VerificationError> {
        let result = self.verify_webhook(raw_body, supplied_hash);
        match &result {
            Ok(data) => tracing::debug!(webhook_data = ?data.raw_payload()),
            Err(error) => tracing::error!(error = %error.current_context(), "webhook verification failed"),
        }
        result
    }

    fn verify_webhook(
        &self,
        raw_body: &[u8],
        supplied_hash: &str,
    ) -> CustomResult<WebhookData, VerificationError> {
        let secret = self.shared_secret.expose_secret();
        if secret.is_empty() {
            return Err(report!(VerificationError::InvalidWebhookHash));
        }

        let signature = hex::decode(supplied_hash)
            .map_err(|_| report!(VerificationError::InvalidWebhookHash))?;
        let stripped: Vec<u8> = raw_body
            .iter()
            .copied()
            .filter(|byte| !byte.is_ascii_whitespace())
            .collect();
        let verified = crypto::HmacSha256
            .verify_signature(secret.as_bytes(), &signature, &stripped)
            .map_err(|_| report!(VerificationError::InvalidWebhookHash))?;
        if !verified {
            return Err(report!(VerificationError::InvalidWebhookHash));
        }

        let parsed: Value = raw_body
            .parse_struct("WebhookPayload")
            .map_err(|_| report!(VerificationError::InvalidWebhookData))?;
        if !parsed.is_object() {
            return Err(report!(VerificationError::InvalidWebhookData));
        }
        let sanitized = sanitize_value(&parsed);

        let mut missing: Vec<String> = Vec::new();
        for field in WEBHOOK_REQUIRED_FIELDS {
            let absent = match field {
                "webhook_body" => !sanitized.get("webhook_body").is_some_and(Value::is_object),
                "timestamp" => field_as_i64(&sanitized, "timestamp").is_none(),
                name => field_as_string(&sanitized, name).is_none(),
            };
            if absent {
                missing.push(field.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(report!(VerificationError::MissingWebhookFields(missing)));
        }

        let type_raw = field_as_string(&sanitized, "webhook_type").unwrap_or_default();
        let webhook_id = field_as_string(&sanitized, "webhook_id").unwrap_or_default();
        let timestamp = field_as_i64(&sanitized, "timestamp").unwrap_or_default();

        let webhook_type: WebhookType = type_raw.parse().map_err(|_| {
            report!(VerificationError::WrongWebhookType {
                webhook_type: type_raw.clone(),
                webhook_id: webhook_id.clone(),
            })
        })?;

        let body = sanitized
            .get("webhook_body")
            .cloned()
            .unwrap_or(Value::Null);
        validate_webhook_body(webhook_type, &body)?;

        let carries_transaction = matches!(
            webhook_type,
            WebhookType::StatusUpdate | WebhookType::CardNew
        );
        let carries_card = matches!(webhook_type, WebhookType::CardNew | WebhookType::CardUpdate);

        Ok(WebhookData {
            webhook_type,
            webhook_id,
            timestamp,
            transaction_id: carries_transaction
                .then(|| field_as_string(&body, "transaction_id"))
                .flatten(),
            transaction_status: carries_transaction
                .then(|| field_as_string(&body, "status"))
                .flatten(),
            order_id: carries_transaction
                .then(|| field_as_string(&body, "order_id"))
                .flatten(),
            card_id: carries_card
                .then(|| field_as_string(&body, "card_id"))
                .flatten(),
            raw_payload: sanitized,
        })
    }
}

fn validate_webhook_body(
    webhook_type: WebhookType,
    body: &Value,
) -> CustomResult<(), VerificationError> {
    let required: &[&str] = match webhook_type {
        WebhookType::StatusUpdate => &STATUS_UPDATE_BODY_FIELDS,
        WebhookType::CardNew => &CARD_NEW_BODY_FIELDS,
        WebhookType::CardUpdate => &CARD_UPDATE_BODY_FIELDS,
    };

    let mut missing: Vec<String> = Vec::new();
    for &field in required {
        let absent = match field {
            "card" => !body.get("card").is_some_and(Value::is_object),
            name => field_as_string(body, name).is_none(),
        };
        if absent {
            missing.push(field.to_string());
        }
    }

    if webhook_type == WebhookType::CardUpdate {
        if let Some(card) = body.get("card").filter(|card| card.is_object()) {
            for field in CARD_NESTED_FIELDS {
                if card.get(field).map_or(true, Value::is_null) {
                    missing.push(field.to_string());
                }
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(report!(VerificationError::MissingWebhookBodyFields(missing)))
    }
}

/// Normalizes a decoded payload into one canonical representation with all
/// string leaves cleaned. Numbers and booleans pass through unchanged.
fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(clean_string(text)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        Value::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, item)| (key.clone(), sanitize_value(item)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn clean_string(text: &str) -> String {
    text.chars()
        .filter(|character| !character.is_control() && *character != '<' && *character != '>')
        .collect::<String>()
        .trim()
        .to_string()
}

fn field_as_string(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn field_as_i64(value: &Value, field: &str) -> Option<i64> {
    match value.get(field)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SignMessage;
    use serde_json::json;

    const SECRET: &str = "app_key_secret";

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SecretString::new(SECRET.to_string()))
    }

    fn redirect_hash(status: &str, transaction_id: &str, order_id: &str, timestamp: &str) -> String {
        let inner =
            crypto::sha256_hex(format!("{status}{transaction_id}{order_id}{timestamp}").as_bytes())
                .expect("digest");
        crypto::sha256_hex(format!("{inner}{SECRET}").as_bytes()).expect("digest")
    }

    fn redirect_query() -> Value {
        json!({
            "status": "success",
            "transaction_id": "t1",
            "order_id": "123-wc_order_key",
            "timestamp": "1700000000",
            "hash": redirect_hash("success", "t1", "123-wc_order_key", "1700000000"),
        })
    }

    fn webhook_hash(body: &str) -> String {
        let stripped: Vec<u8> = body
            .bytes()
            .filter(|byte| !byte.is_ascii_whitespace())
            .collect();
        hex::encode(
            crypto::HmacSha256
                .sign_message(SECRET.as_bytes(), &stripped)
                .expect("signature"),
        )
    }

    #[test]
    fn redirect_round_trip() {
        let data = verifier()
            .get_redirect_data(&redirect_query())
            .expect("verified redirect data");
        assert_eq!(data.kind(), IncomingDataKind::Redirect);
        assert_eq!(data.transaction_status(), "success");
        assert_eq!(data.transaction_id(), "t1");
        assert_eq!(data.order_id(), "123-wc_order_key");
        assert_eq!(data.timestamp(), 1_700_000_000);
        assert!(data.card_id().is_none());
    }

    #[test]
    fn redirect_mutation_flips_verification() {
        let mut query = redirect_query();
        query["transaction_id"] = Value::from("t2");
        let error = verifier()
            .get_redirect_data(&query)
            .expect_err("mutated field must fail");
        assert_eq!(
            error.current_context(),
            &VerificationError::InvalidRedirectHash
        );

        let mut query = redirect_query();
        query["status"] = Value::from("Success");
        assert!(verifier().get_redirect_data(&query).is_err());
    }

    #[test]
    fn redirect_missing_fields_are_named() {
        for field in REDIRECT_REQUIRED_FIELDS {
            let mut query = redirect_query();
            query.as_object_mut().expect("object").remove(field);
            let error = verifier()
                .get_redirect_data(&query)
                .expect_err("missing field must fail");
            assert_eq!(
                error.current_context(),
                &VerificationError::MissingRedirectFields(vec![field.to_string()]),
                "field: {field}"
            );
            assert_eq!(
                error.current_context().to_string(),
                format!("Missing required fields in redirect_data: \"{field}\".")
            );
        }
    }

    #[test]
    fn redirect_empty_secret_always_fails() {
        let empty = WebhookVerifier::new(SecretString::new(String::new()));
        let error = empty
            .get_redirect_data(&redirect_query())
            .expect_err("empty secret must fail");
        assert_eq!(
            error.current_context(),
            &VerificationError::InvalidRedirectHash
        );
    }

    #[test]
    fn webhook_round_trip_and_whitespace_insensitivity() {
        let compact = r#"{"webhook_type":"status_update","webhook_id":"w1","timestamp":1700000000,"webhook_body":{"transaction_id":"t1","status":"success","order_id":"123-wc_order_key"}}"#;
        let hash = webhook_hash(compact);

        let data = verifier()
            .get_webhook_data(compact.as_bytes(), &hash)
            .expect("verified webhook data");
        assert_eq!(data.kind(), IncomingDataKind::Webhook);
        assert_eq!(data.webhook_type(), WebhookType::StatusUpdate);
        assert_eq!(data.webhook_id(), "w1");
        assert_eq!(data.timestamp(), 1_700_000_000);
        assert_eq!(data.transaction_id(), Some("t1"));
        assert_eq!(data.transaction_status(), Some("success"));
        assert_eq!(data.order_id(), Some("123-wc_order_key"));
        assert!(data.card_id().is_none());

        // Same hash still verifies a reformatted body.
        let pretty = serde_json::to_string_pretty(
            &serde_json::from_str::<Value>(compact).expect("valid json"),
        )
        .expect("serializable");
        assert!(verifier().get_webhook_data(pretty.as_bytes(), &hash).is_ok());

        // Any non-whitespace change breaks it.
        let tampered = compact.replace("success", "declined");
        let error = verifier()
            .get_webhook_data(tampered.as_bytes(), &hash)
            .expect_err("tampered body must fail");
        assert_eq!(
            error.current_context(),
            &VerificationError::InvalidWebhookHash
        );
    }

    #[test]
    fn webhook_empty_secret_always_fails() {
        let body = r#"{"webhook_type":"status_update"}"#;
        let empty = WebhookVerifier::new(SecretString::new(String::new()));
        assert!(empty.get_webhook_data(body.as_bytes(), &webhook_hash(body)).is_err());
    }

    #[test]
    fn webhook_invalid_json_after_valid_hash() {
        let body = "not json";
        let error = verifier()
            .get_webhook_data(body.as_bytes(), &webhook_hash(body))
            .expect_err("invalid json must fail");
        assert_eq!(
            error.current_context(),
            &VerificationError::InvalidWebhookData
        );
    }

    #[test]
    fn webhook_missing_envelope_fields_are_named() {
        for field in WEBHOOK_REQUIRED_FIELDS {
            let mut envelope = json!({
                "webhook_type": "status_update",
                "webhook_id": "w1",
                "timestamp": 1700000000,
                "webhook_body": {
                    "transaction_id": "t1",
                    "status": "success",
                    "order_id": "123-k"
                }
            });
            envelope.as_object_mut().expect("object").remove(field);
            let body = envelope.to_string();
            let error = verifier()
                .get_webhook_data(body.as_bytes(), &webhook_hash(&body))
                .expect_err("missing field must fail");
            assert_eq!(
                error.current_context(),
                &VerificationError::MissingWebhookFields(vec![field.to_string()]),
                "field: {field}"
            );
        }
    }

    #[test]
    fn webhook_wrong_type_is_reported_with_id() {
        let envelope = json!({
            "webhook_type": "account_closed",
            "webhook_id": "w9",
            "timestamp": 1700000000,
            "webhook_body": {}
        });
        let body = envelope.to_string();
        let error = verifier()
            .get_webhook_data(body.as_bytes(), &webhook_hash(&body))
            .expect_err("unknown type must fail");
        assert_eq!(
            error.current_context().to_string(),
            "Wrong webhook type sent. Webhook type \"account_closed\". Webhook ID: w9."
        );
    }

    #[test]
    fn webhook_body_fields_per_type() {
        for (webhook_type, fields) in [
            ("status_update", &STATUS_UPDATE_BODY_FIELDS[..]),
            ("card_new", &CARD_NEW_BODY_FIELDS[..]),
        ] {
            for field in fields {
                let mut body = json!({
                    "transaction_id": "t1",
                    "status": "success",
                    "order_id": "123-k",
                    "card_id": "c1"
                });
                body.as_object_mut().expect("object").remove(*field);
                let envelope = json!({
                    "webhook_type": webhook_type,
                    "webhook_id": "w1",
                    "timestamp": 1700000000,
                    "webhook_body": body
                });
                let raw = envelope.to_string();
                let error = verifier()
                    .get_webhook_data(raw.as_bytes(), &webhook_hash(&raw))
                    .expect_err("missing body field must fail");
                assert_eq!(
                    error.current_context(),
                    &VerificationError::MissingWebhookBodyFields(vec![field.to_string()]),
                    "type: {webhook_type}, field: {field}"
                );
            }
        }
    }

    #[test]
    fn card_update_requires_nested_card_fields() {
        let envelope = json!({
            "webhook_type": "card_update",
            "webhook_id": "w1",
            "timestamp": 1700000000,
            "webhook_body": {
                "card_id": "c1",
                "update_type": "expiry",
                "update_detail": "renewed",
                "card": {
                    "holder_name": "Ada",
                    "scheme": "visa",
                    "expiry_month": 4,
                    "expiry_year": 2030
                }
            }
        });
        let raw = envelope.to_string();
        let error = verifier()
            .get_webhook_data(raw.as_bytes(), &webhook_hash(&raw))
            .expect_err("missing nested field must fail");
        assert_eq!(
            error.current_context(),
            &VerificationError::MissingWebhookBodyFields(vec!["number".to_string()])
        );
    }

    #[test]
    fn card_update_carries_card_id_but_no_transaction() {
        let envelope = json!({
            "webhook_type": "card_update",
            "webhook_id": "w1",
            "timestamp": 1700000000,
            "webhook_body": {
                "card_id": "c1",
                "update_type": "expiry",
                "update_detail": "renewed",
                "card": {
                    "holder_name": "Ada",
                    "scheme": "visa",
                    "number": "XXXX1111",
                    "expiry_month": 4,
                    "expiry_year": 2030
                }
            }
        });
        let raw = envelope.to_string();
        let data = verifier()
            .get_webhook_data(raw.as_bytes(), &webhook_hash(&raw))
            .expect("verified webhook data");
        assert_eq!(data.card_id(), Some("c1"));
        assert!(data.transaction_id().is_none());
        assert!(data.order_id().is_none());
    }

    #[test]
    fn sanitize_strips_unsafe_characters_after_verification() {
        let envelope = json!({
            "webhook_type": "status_update",
            "webhook_id": "w1",
            "timestamp": 1700000000,
            "webhook_body": {
                "transaction_id": "t1",
                "status": "success<script>",
                "order_id": "123-k"
            }
        });
        let raw = envelope.to_string();
        let data = verifier()
            .get_webhook_data(raw.as_bytes(), &webhook_hash(&raw))
            .expect("verified webhook data");
        assert_eq!(data.transaction_status(), Some("successscript"));
    }
}
