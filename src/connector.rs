//! Remote API client for the Covepay processor.
//!
//! Owns authentication (bearer-token retrieval per authorized call), URL and
//! request construction, dispatch, and normalization of every outcome into
//! an [`ApiResponse`]. Endpoint operations never fail past the
//! authorization-header step; remote rejections and transport failures are
//! carried as response values.

pub mod transformers;

use error_stack::report;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::{
    configs::CovepaySettings,
    consts::{self, endpoints, headers},
    errors::{AuthError, CustomResult},
    ext_traits::encode_to_value,
    request::{Method, Request, RequestBuilder, RequestContent},
    responses::{ApiResponse, CallOutcome, HttpResponse, ResponsePayload, TransportFailure},
};
use transformers as covepay;

/// Covepay API client.
#[derive(Clone, Debug)]
pub struct Covepay {
    settings: CovepaySettings,
    http_client: reqwest::Client,
}

impl Covepay {
    /// Creates a client over the given settings.
    pub fn new(settings: CovepaySettings) -> Self {
        Self {
            settings,
            http_client: reqwest::Client::new(),
        }
    }

    /// Settings the client was built with.
    pub fn settings(&self) -> &CovepaySettings {
        &self.settings
    }

    fn url(&self, segments: &[&str], filter: Option<&[&str]>) -> String {
        let mut url = self.settings.api_base_url().to_string();
        for segment in segments {
            url.push('/');
            url.push_str(segment);
        }
        if let Some(fields) = filter.filter(|fields| !fields.is_empty()) {
            url.push('?');
            url.push_str(consts::FILTER_QUERY_KEY);
            url.push('=');
            url.push_str(&fields.join(","));
        }
        url
    }

    /// Requests a bearer token with the configured credentials.
    ///
    /// Returns the formatted `"<type> <token>"` value, or `None` after
    /// logging the failure. Tokens are not cached across calls; callers
    /// needing reuse cache externally.
    pub async fn get_access_token(&self) -> Option<SecretString> {
        let token_request = covepay::CovepayTokenRequest {
            app_id: self.settings.app_id.clone(),
            app_key: self.settings.app_key.expose_secret().clone(),
        };
        let request_body = encode_to_value(&token_request, "CovepayTokenRequest").ok()?;

        let request = RequestBuilder::new()
            .method(Method::Post)
            .url(&self.url(&[endpoints::LOGIN], None))
            .header(headers::CONTENT_TYPE, consts::APPLICATION_JSON)
            .set_body(request_body.clone())
            .build();

        let outcome = self.send(request).await;
        let response: ApiResponse<covepay::TokenPayload> =
            ApiResponse::normalize(outcome, Some(request_body));
        tracing::info!(token_response = ?response.log_data());

        let token = response.formatted_token();
        if token.is_none() {
            tracing::error!(
                error = %response.error_message_formatted(true),
                "access token request failed"
            );
        }
        token
    }

    /// Headers for an authorized call; fails when no token is obtainable.
    pub async fn get_authorization_header(
        &self,
        add_company_id: bool,
    ) -> CustomResult<Vec<(String, String)>, AuthError> {
        let token = self
            .get_access_token()
            .await
            .ok_or_else(|| report!(AuthError::AccessTokenFetchFailed))?;

        let mut auth_headers = vec![
            (
                headers::CONTENT_TYPE.to_string(),
                consts::APPLICATION_JSON.to_string(),
            ),
            (
                headers::AUTHORIZATION.to_string(),
                token.expose_secret().clone(),
            ),
        ];
        if add_company_id {
            if let Some(company_id) = self.settings.company_id.as_deref() {
                auth_headers.push((headers::COMPANY_ID.to_string(), company_id.to_string()));
            }
        }
        Ok(auth_headers)
    }

    async fn send(&self, request: Request) -> CallOutcome {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.http_client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(RequestContent::Json(body)) = &request.body {
            builder = builder.json(body);
        }

        match builder.send().await {
            Err(error) => Err(TransportFailure {
                message: error.to_string(),
            }),
            Ok(response) => {
                let status_code = response.status().as_u16();
                let reason_phrase = response
                    .status()
                    .canonical_reason()
                    .unwrap_or_default()
                    .to_string();
                let response_headers = Some(response.headers().clone());
                match response.bytes().await {
                    // A stream that fails mid-read never produced a usable
                    // response; treat it like any other transport failure.
                    Err(error) => Err(TransportFailure {
                        message: error.to_string(),
                    }),
                    Ok(body) => Ok(HttpResponse {
                        status_code,
                        reason_phrase,
                        headers: response_headers,
                        body,
                    }),
                }
            }
        }
    }

    async fn execute<T: ResponsePayload>(
        &self,
        method: Method,
        segments: &[&str],
        filter: Option<&[&str]>,
        body: Option<Value>,
        add_company_id: bool,
    ) -> CustomResult<ApiResponse<T>, AuthError> {
        let auth_headers = self.get_authorization_header(add_company_id).await?;

        let mut builder = RequestBuilder::new()
            .method(method)
            .url(&self.url(segments, filter))
            .headers(auth_headers);
        if let Some(request_body) = body.clone() {
            builder = builder.set_body(request_body);
        }

        let outcome = self.send(builder.build()).await;
        let response = ApiResponse::normalize(outcome, body);
        tracing::info!(
            variant = T::VARIANT_NAME,
            connector_response = ?response.log_data()
        );
        Ok(response)
    }

    /// Creates a hosted checkout link.
    pub async fn create_payment_link(
        &self,
        link_request: covepay::CovepayPaymentLinkRequest,
    ) -> CustomResult<ApiResponse<covepay::PaymentLinkPayload>, AuthError> {
        let body = encode_to_value(&link_request, "CovepayPaymentLinkRequest").ok();
        self.execute(Method::Post, &[endpoints::PAYMENT_LINKS], None, body, true)
            .await
    }

    /// Fetches a payment link, optionally selecting response fields.
    pub async fn get_payment_link(
        &self,
        link_id: &str,
        fields: Option<&[&str]>,
    ) -> CustomResult<ApiResponse<covepay::PaymentLinkPayload>, AuthError> {
        self.execute(
            Method::Get,
            &[endpoints::PAYMENT_LINKS, link_id],
            fields,
            None,
            true,
        )
        .await
    }

    /// Fetches transaction detail, optionally selecting response fields.
    pub async fn get_transaction(
        &self,
        transaction_id: &str,
        fields: Option<&[&str]>,
    ) -> CustomResult<ApiResponse<covepay::TransactionPayload>, AuthError> {
        self.execute(
            Method::Get,
            &[endpoints::TRANSACTIONS, transaction_id],
            fields,
            None,
            true,
        )
        .await
    }

    /// Captures an authorized transaction, fully or partially.
    pub async fn capture_transaction(
        &self,
        transaction_id: &str,
        amount: Option<i64>,
    ) -> CustomResult<ApiResponse<covepay::TransactionActionPayload>, AuthError> {
        let body = encode_to_value(
            &covepay::CovepayCaptureRequest { amount },
            "CovepayCaptureRequest",
        )
        .ok();
        self.execute(
            Method::Post,
            &[endpoints::TRANSACTIONS, transaction_id, endpoints::CAPTURE],
            None,
            body,
            true,
        )
        .await
    }

    /// Refunds a captured transaction through the unified reversal endpoint.
    pub async fn refund_transaction(
        &self,
        transaction_id: &str,
        amount: Option<i64>,
    ) -> CustomResult<ApiResponse<covepay::TransactionActionPayload>, AuthError> {
        self.reverse_transaction(transaction_id, covepay::ReversalKind::Refund, amount)
            .await
    }

    /// Cancels an uncaptured transaction through the unified reversal
    /// endpoint; distinguished from a refund only by the request body.
    pub async fn cancel_transaction(
        &self,
        transaction_id: &str,
    ) -> CustomResult<ApiResponse<covepay::TransactionActionPayload>, AuthError> {
        self.reverse_transaction(transaction_id, covepay::ReversalKind::Cancel, None)
            .await
    }

    async fn reverse_transaction(
        &self,
        transaction_id: &str,
        kind: covepay::ReversalKind,
        amount: Option<i64>,
    ) -> CustomResult<ApiResponse<covepay::TransactionActionPayload>, AuthError> {
        let body = encode_to_value(
            &covepay::CovepayReversalRequest { kind, amount },
            "CovepayReversalRequest",
        )
        .ok();
        self.execute(
            Method::Post,
            &[endpoints::TRANSACTIONS, transaction_id, endpoints::REVERSAL],
            None,
            body,
            true,
        )
        .await
    }

    /// Fetches a customer, optionally selecting response fields.
    pub async fn get_customer(
        &self,
        customer_id: &str,
        fields: Option<&[&str]>,
    ) -> CustomResult<ApiResponse<covepay::CustomerPayload>, AuthError> {
        self.execute(
            Method::Get,
            &[endpoints::CUSTOMERS, customer_id],
            fields,
            None,
            true,
        )
        .await
    }

    /// Creates a customer.
    pub async fn create_customer(
        &self,
        customer_request: covepay::CovepayCustomerRequest,
    ) -> CustomResult<ApiResponse<covepay::CustomerCreatePayload>, AuthError> {
        let body = encode_to_value(&customer_request, "CovepayCustomerRequest").ok();
        self.execute(Method::Post, &[endpoints::CUSTOMERS], None, body, true)
            .await
    }

    /// Updates a customer. Simple write; status extraction only.
    pub async fn update_customer(
        &self,
        customer_id: &str,
        customer_request: covepay::CovepayCustomerRequest,
    ) -> CustomResult<ApiResponse<Value>, AuthError> {
        let body = encode_to_value(&customer_request, "CovepayCustomerRequest").ok();
        self.execute(
            Method::Put,
            &[endpoints::CUSTOMERS, customer_id],
            None,
            body,
            true,
        )
        .await
    }

    /// Fetches a stored card, optionally selecting response fields.
    pub async fn get_card(
        &self,
        card_id: &str,
        fields: Option<&[&str]>,
    ) -> CustomResult<ApiResponse<covepay::CardPayload>, AuthError> {
        self.execute(Method::Get, &[endpoints::CARDS, card_id], fields, None, true)
            .await
    }

    /// Updates a stored card's metadata.
    pub async fn update_card(
        &self,
        card_id: &str,
        update: covepay::CovepayCardUpdateRequest,
    ) -> CustomResult<ApiResponse<covepay::CardPayload>, AuthError> {
        let body = encode_to_value(&update, "CovepayCardUpdateRequest").ok();
        self.execute(Method::Put, &[endpoints::CARDS, card_id], None, body, true)
            .await
    }

    /// Checks that the configured credentials work.
    ///
    /// With a company id the authorization model is scoped, so a bare token
    /// is not proof enough; a zero-amount, non-capturing payment-link
    /// request probes the scoped path instead.
    pub async fn validate_credentials(&self) -> bool {
        if self.settings.company_id.is_some() {
            let probe = covepay::CovepayPaymentLinkRequest {
                amount: 0,
                currency: consts::CREDENTIAL_PROBE_CURRENCY.to_string(),
                reference: consts::CREDENTIAL_PROBE_REFERENCE.to_string(),
                capture: false,
                three_ds: None,
                tokenize: false,
                return_url: None,
                customer: None,
            };
            match self.create_payment_link(probe).await {
                Ok(response) => response.is_success(),
                Err(_) => false,
            }
        } else {
            self.get_access_token().await.is_some()
        }
    }
}
