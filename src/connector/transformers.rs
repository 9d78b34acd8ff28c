//! Wire types for the Covepay API: request bodies, typed response payloads
//! with their required-field checks, and status mapping.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::responses::{ApiResponse, PayloadError, ResponsePayload};

/// Body of a bearer-token request against the `login` endpoint.
///
/// The private key is exposed here once; the Token payload suppresses both
/// bodies from log output.
#[derive(Clone, Debug, Serialize)]
pub struct CovepayTokenRequest {
    /// Public credential identifier.
    pub app_id: String,
    /// Private credential key.
    pub app_key: String,
}

/// Token issued by the `login` endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenPayload {
    /// Token scheme, e.g. `Bearer`.
    pub token_type: Option<String>,
    /// The token itself.
    pub access_token: Option<String>,
}

impl ResponsePayload for TokenPayload {
    const VARIANT_NAME: &'static str = "Token";
    const SUPPRESS_BODY_LOG: bool = true;

    fn validate(&self) -> Result<(), PayloadError> {
        let complete = self.token_type.as_deref().is_some_and(|t| !t.is_empty())
            && self.access_token.as_deref().is_some_and(|t| !t.is_empty());
        if complete {
            Ok(())
        } else {
            Err(PayloadError("Access token creation failed.".to_string()))
        }
    }
}

impl ApiResponse<TokenPayload> {
    /// The `"<type> <token>"` header value, present only on success.
    pub fn formatted_token(&self) -> Option<SecretString> {
        let payload = self.data()?;
        let token_type = payload.token_type.as_deref()?;
        let access_token = payload.access_token.as_deref()?;
        Some(SecretString::new(format!("{token_type} {access_token}")))
    }
}

/// A transaction as returned by transaction reads.
#[derive(Clone, Debug, Deserialize)]
pub struct TransactionPayload {
    /// Processor transaction id.
    pub transaction_id: Option<String>,
    /// Processor-side transaction status string.
    pub status: Option<String>,
    /// Amount in minor units.
    pub amount: Option<i64>,
    /// ISO currency code.
    pub currency: Option<String>,
    /// The order link the transaction was created for.
    pub order_id: Option<String>,
    /// Funding source kind, e.g. `card` or `wallet`.
    pub payment_source: Option<String>,
}

impl ResponsePayload for TransactionPayload {
    const VARIANT_NAME: &'static str = "Transaction";

    fn validate(&self) -> Result<(), PayloadError> {
        validate_transaction_core(self.transaction_id.as_deref(), self.status.as_deref())
    }
}

impl ApiResponse<TransactionPayload> {
    /// Processor transaction id, on success only.
    pub fn transaction_id(&self) -> Option<&str> {
        self.data()?.transaction_id.as_deref()
    }

    /// Transaction status string, on success only.
    pub fn transaction_status(&self) -> Option<&str> {
        self.data()?.status.as_deref()
    }

    /// Whether the transaction was funded through a wallet.
    pub fn is_wallet_funded(&self) -> bool {
        self.data()
            .and_then(|payload| payload.payment_source.as_deref())
            .is_some_and(|source| source.eq_ignore_ascii_case("wallet"))
    }
}

/// Result of a capture, refund, or cancel action on a transaction.
#[derive(Clone, Debug, Deserialize)]
pub struct TransactionActionPayload {
    /// Processor transaction id.
    pub transaction_id: Option<String>,
    /// Status after the action.
    pub status: Option<String>,
    /// Amount the action applied to, in minor units.
    pub amount: Option<i64>,
}

impl ResponsePayload for TransactionActionPayload {
    const VARIANT_NAME: &'static str = "TransactionAction";

    fn validate(&self) -> Result<(), PayloadError> {
        validate_transaction_core(self.transaction_id.as_deref(), self.status.as_deref())
    }
}

impl ApiResponse<TransactionActionPayload> {
    /// Processor transaction id, on success only.
    pub fn transaction_id(&self) -> Option<&str> {
        self.data()?.transaction_id.as_deref()
    }

    /// Status after the action, on success only.
    pub fn action_status(&self) -> Option<&str> {
        self.data()?.status.as_deref()
    }

    /// Whether the action left the transaction captured.
    pub fn is_captured(&self) -> bool {
        self.action_status()
            .is_some_and(|status| matches!(status.to_lowercase().as_str(), "complete" | "captured"))
    }
}

fn validate_transaction_core(
    transaction_id: Option<&str>,
    status: Option<&str>,
) -> Result<(), PayloadError> {
    let complete = transaction_id.is_some_and(|id| !id.is_empty())
        && status.is_some_and(|status| !status.is_empty());
    if complete {
        Ok(())
    } else {
        Err(PayloadError("Required transaction data not found.".to_string()))
    }
}

/// Card detail fields nested in card payloads.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CardDetails {
    /// Cardholder name.
    pub holder_name: Option<String>,
    /// Card scheme, e.g. `visa`.
    pub scheme: Option<String>,
    /// Masked card number.
    pub number: Option<String>,
    /// Expiry month, 1-12.
    pub expiry_month: Option<u32>,
    /// Four-digit expiry year.
    pub expiry_year: Option<u32>,
}

/// Order in which nested card fields are checked and reported.
const CARD_DETAIL_FIELDS: [&str; 5] = [
    "holder_name",
    "scheme",
    "number",
    "expiry_month",
    "expiry_year",
];

impl CardDetails {
    fn missing_field(&self) -> Option<&'static str> {
        let present = [
            self.holder_name.is_some(),
            self.scheme.is_some(),
            self.number.is_some(),
            self.expiry_month.is_some(),
            self.expiry_year.is_some(),
        ];
        CARD_DETAIL_FIELDS
            .iter()
            .zip(present)
            .find(|(_, is_present)| !is_present)
            .map(|(field, _)| *field)
    }
}

/// A stored card as returned by card reads and updates.
#[derive(Clone, Debug, Deserialize)]
pub struct CardPayload {
    /// Processor card id.
    pub card_id: Option<String>,
    /// Owning processor customer id.
    pub customer_id: Option<String>,
    /// Card details.
    pub card: Option<CardDetails>,
}

impl ResponsePayload for CardPayload {
    const VARIANT_NAME: &'static str = "Card";

    fn validate(&self) -> Result<(), PayloadError> {
        let (Some(_), Some(_), Some(card)) = (
            self.card_id.as_deref(),
            self.customer_id.as_deref(),
            self.card.as_ref(),
        ) else {
            return Err(PayloadError("Required card data not found.".to_string()));
        };
        match card.missing_field() {
            None => Ok(()),
            Some(field) => Err(PayloadError(format!(
                "Required card field \"{field}\" not found."
            ))),
        }
    }
}

impl ApiResponse<CardPayload> {
    /// Processor card id, on success only.
    pub fn card_id(&self) -> Option<&str> {
        self.data()?.card_id.as_deref()
    }

    /// Owning customer id, on success only.
    pub fn customer_id(&self) -> Option<&str> {
        self.data()?.customer_id.as_deref()
    }

    /// Card details, on success only.
    pub fn card(&self) -> Option<&CardDetails> {
        self.data()?.card.as_ref()
    }
}

/// A customer as returned by customer reads. Status extraction only; reads
/// carry no hard schema.
#[derive(Clone, Debug, Deserialize)]
pub struct CustomerPayload {
    /// Processor customer id.
    pub customer_id: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Default stored card, when set.
    pub default_card_id: Option<String>,
}

impl ResponsePayload for CustomerPayload {
    const VARIANT_NAME: &'static str = "Customer";

    fn validate(&self) -> Result<(), PayloadError> {
        Ok(())
    }
}

/// Result of creating a customer.
#[derive(Clone, Debug, Deserialize)]
pub struct CustomerCreatePayload {
    /// Processor customer id of the created record.
    pub customer_id: Option<String>,
}

impl ResponsePayload for CustomerCreatePayload {
    const VARIANT_NAME: &'static str = "CustomerCreate";

    fn validate(&self) -> Result<(), PayloadError> {
        if self.customer_id.as_deref().is_some_and(|id| !id.is_empty()) {
            Ok(())
        } else {
            Err(PayloadError("Required customer data not found.".to_string()))
        }
    }
}

impl ApiResponse<CustomerCreatePayload> {
    /// Created customer id, on success only.
    pub fn customer_id(&self) -> Option<&str> {
        self.data()?.customer_id.as_deref()
    }
}

/// A hosted checkout link.
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentLinkPayload {
    /// Processor link id.
    pub link_id: Option<String>,
    /// Hosted checkout URL.
    pub url: Option<String>,
    /// Link status string.
    pub status: Option<String>,
}

impl ResponsePayload for PaymentLinkPayload {
    const VARIANT_NAME: &'static str = "PaymentLink";

    fn validate(&self) -> Result<(), PayloadError> {
        if self.link_id.as_deref().is_some_and(|id| !id.is_empty()) {
            Ok(())
        } else {
            Err(PayloadError(
                "Payment link ID not found in response.".to_string(),
            ))
        }
    }
}

impl ApiResponse<PaymentLinkPayload> {
    /// Processor link id, on success only.
    pub fn link_id(&self) -> Option<&str> {
        self.data()?.link_id.as_deref()
    }

    /// Hosted checkout URL, on success only.
    pub fn checkout_url(&self) -> Option<&str> {
        self.data()?.url.as_deref()
    }
}

/// 3-D Secure preference carried on payment-link creation.
#[derive(Clone, Debug, Serialize)]
pub struct ThreeDsPreference {
    /// Force a challenge rather than allowing frictionless flows.
    pub force_challenge: bool,
}

/// Customer fields carried on customer writes and payment links.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CovepayCustomerRequest {
    /// First name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Body of a payment-link creation request.
#[derive(Clone, Debug, Serialize)]
pub struct CovepayPaymentLinkRequest {
    /// Amount in minor units.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Merchant payment reference shown on statements.
    pub reference: String,
    /// Capture immediately rather than authorize only.
    pub capture: bool,
    /// 3-D Secure preference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub three_ds: Option<ThreeDsPreference>,
    /// Offer card tokenization on the hosted page.
    pub tokenize: bool,
    /// Browser return URL after the hosted flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    /// Customer prefill data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CovepayCustomerRequest>,
}

/// Body of a capture request.
#[derive(Clone, Debug, Serialize)]
pub struct CovepayCaptureRequest {
    /// Amount to capture in minor units; full amount when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

/// Which action a reversal performs. The processor exposes one endpoint for
/// both; the body disambiguates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReversalKind {
    /// Return funds on a captured transaction.
    Refund,
    /// Void an uncaptured transaction.
    Cancel,
}

/// Body of a reversal request.
#[derive(Clone, Debug, Serialize)]
pub struct CovepayReversalRequest {
    /// Refund or cancel.
    #[serde(rename = "type")]
    pub kind: ReversalKind,
    /// Amount to refund in minor units; full amount when absent. Unused for
    /// cancel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

/// Body of a card metadata update.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CovepayCardUpdateRequest {
    /// New cardholder name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<String>,
    /// New expiry month.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_month: Option<u32>,
    /// New expiry year.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_year: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses::{CallOutcome, HttpResponse, ResponseStatus};
    use bytes::Bytes;

    fn ok_outcome(body: &str) -> CallOutcome {
        Ok(HttpResponse {
            status_code: 200,
            reason_phrase: "OK".to_string(),
            headers: None,
            body: Bytes::from(body.to_string()),
        })
    }

    #[test]
    fn token_requires_type_and_token() {
        let response: ApiResponse<TokenPayload> = ApiResponse::normalize(
            ok_outcome(r#"{"token_type":"Bearer","access_token":"tok_1"}"#),
            None,
        );
        assert!(response.is_success());
        assert!(response.formatted_token().is_some());

        let missing: ApiResponse<TokenPayload> =
            ApiResponse::normalize(ok_outcome(r#"{"token_type":"Bearer"}"#), None);
        assert_eq!(missing.status(), ResponseStatus::Error);
        assert_eq!(missing.error_message(), Some("Access token creation failed."));
        assert!(missing.formatted_token().is_none());
    }

    #[test]
    fn token_log_data_suppresses_bodies() {
        let response: ApiResponse<TokenPayload> = ApiResponse::normalize(
            ok_outcome(r#"{"token_type":"Bearer","access_token":"tok_1"}"#),
            Some(serde_json::json!({"app_id":"a","app_key":"k"})),
        );
        let log = response.log_data();
        assert!(log.get("request_body").is_none());
        assert!(log.get("response_body").is_none());
        assert_eq!(log["status"], "success");
        assert_eq!(log["response_code"], 200);
    }

    #[test]
    fn transaction_requires_id_and_status() {
        let missing: ApiResponse<TransactionPayload> =
            ApiResponse::normalize(ok_outcome(r#"{"transaction_id":"t1"}"#), None);
        assert_eq!(
            missing.error_message(),
            Some("Required transaction data not found.")
        );

        let complete: ApiResponse<TransactionPayload> = ApiResponse::normalize(
            ok_outcome(r#"{"transaction_id":"t1","status":"success","payment_source":"wallet"}"#),
            None,
        );
        assert!(complete.is_success());
        assert_eq!(complete.transaction_id(), Some("t1"));
        assert!(complete.is_wallet_funded());
    }

    #[test]
    fn card_reports_missing_nested_field_by_name() {
        let no_card: ApiResponse<CardPayload> = ApiResponse::normalize(
            ok_outcome(r#"{"card_id":"c1","customer_id":"cu1"}"#),
            None,
        );
        assert_eq!(no_card.error_message(), Some("Required card data not found."));

        let body = r#"{
            "card_id": "c1",
            "customer_id": "cu1",
            "card": {
                "holder_name": "Ada",
                "scheme": "visa",
                "expiry_month": 4,
                "expiry_year": 2030
            }
        }"#;
        let missing_number: ApiResponse<CardPayload> = ApiResponse::normalize(ok_outcome(body), None);
        assert_eq!(
            missing_number.error_message(),
            Some("Required card field \"number\" not found.")
        );
        assert!(missing_number.card_id().is_none());
    }

    #[test]
    fn payment_link_requires_link_id() {
        let missing: ApiResponse<PaymentLinkPayload> =
            ApiResponse::normalize(ok_outcome(r#"{"url":"https://pay.test/l1"}"#), None);
        assert_eq!(
            missing.error_message(),
            Some("Payment link ID not found in response.")
        );

        let complete: ApiResponse<PaymentLinkPayload> = ApiResponse::normalize(
            ok_outcome(r#"{"link_id":"l1","url":"https://pay.test/l1"}"#),
            None,
        );
        assert_eq!(complete.link_id(), Some("l1"));
    }

    #[test]
    fn customer_create_requires_customer_id() {
        let missing: ApiResponse<CustomerCreatePayload> =
            ApiResponse::normalize(ok_outcome(r#"{}"#), None);
        assert_eq!(
            missing.error_message(),
            Some("Required customer data not found.")
        );
    }

    #[test]
    fn customer_read_has_no_hard_schema() {
        let response: ApiResponse<CustomerPayload> =
            ApiResponse::normalize(ok_outcome(r#"{"email":"ada@example.test"}"#), None);
        assert!(response.is_success());
    }

    #[test]
    fn reversal_kind_serializes_as_type() {
        let refund = CovepayReversalRequest {
            kind: ReversalKind::Refund,
            amount: Some(250),
        };
        let value = serde_json::to_value(&refund).expect("serializable");
        assert_eq!(value, serde_json::json!({"type": "refund", "amount": 250}));

        let cancel = CovepayReversalRequest {
            kind: ReversalKind::Cancel,
            amount: None,
        };
        let value = serde_json::to_value(&cancel).expect("serializable");
        assert_eq!(value, serde_json::json!({"type": "cancel"}));
    }

    #[test]
    fn capture_action_status_mapping() {
        let captured: ApiResponse<TransactionActionPayload> = ApiResponse::normalize(
            ok_outcome(r#"{"transaction_id":"t1","status":"complete"}"#),
            None,
        );
        assert!(captured.is_captured());

        let pending: ApiResponse<TransactionActionPayload> = ApiResponse::normalize(
            ok_outcome(r#"{"transaction_id":"t1","status":"pending"}"#),
            None,
        );
        assert!(!pending.is_captured());
    }
}
