//! Response normalization.
//!
//! Every outbound call ends in one of three ways: a completed 2xx exchange, a
//! completed non-2xx exchange, or a transport failure with no response at
//! all. [`ApiResponse::normalize`] folds all three into one immutable value
//! so calling code never handles transport exceptions itself.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::consts;

/// Uniform status of a normalized response.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ResponseStatus {
    /// Completed exchange with a valid, schema-complete body.
    Success,
    /// Completed exchange the processor rejected, or a body that failed
    /// decoding or variant validation.
    Error,
    /// No response at all: network failure, malformed stream.
    ErrorUnknown,
}

/// A completed HTTP exchange, before normalization.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Reason phrase for the status code.
    pub reason_phrase: String,
    /// Response headers, when the transport exposes them.
    pub headers: Option<http::HeaderMap>,
    /// Raw response body.
    pub body: Bytes,
}

/// A call that produced no HTTP response.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportFailure {
    /// Transport-level failure description.
    pub message: String,
}

/// Outcome of dispatching one outbound request.
pub type CallOutcome = Result<HttpResponse, TransportFailure>;

/// One invalid request parameter reported by the processor.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct InvalidParameter {
    /// Field the processor rejected.
    pub field: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Error body shape the processor uses on rejected requests.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ErrorBody {
    /// Short error title.
    pub title: Option<String>,
    /// Longer error description.
    pub description: Option<String>,
    /// Per-field validation failures, when present.
    pub invalid_parameters: Option<Vec<InvalidParameter>>,
}

/// Validation failure of a typed payload; `Display` is the exact message
/// carried on the normalized response.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct PayloadError(pub String);

/// A typed response payload with its variant-specific required-field check.
///
/// One implementation per endpoint family replaces the dynamic
/// construct-by-name dispatch of loosely typed integrations.
pub trait ResponsePayload: serde::de::DeserializeOwned {
    /// Name used when logging parse failures.
    const VARIANT_NAME: &'static str;
    /// Suppress request/response bodies in [`ApiResponse::log_data`].
    const SUPPRESS_BODY_LOG: bool = false;

    /// Checks the variant's required fields, returning the exact failure
    /// message on a miss.
    fn validate(&self) -> Result<(), PayloadError>;
}

/// Payload for calls where the caller needs no typed data back; performs
/// status extraction only.
impl ResponsePayload for Value {
    const VARIANT_NAME: &'static str = "Generic";

    fn validate(&self) -> Result<(), PayloadError> {
        Ok(())
    }
}

/// A normalized response. Fully determined at construction; never mutates.
#[derive(Clone, Debug)]
pub struct ApiResponse<T: ResponsePayload> {
    status: ResponseStatus,
    status_code: u16,
    reason_phrase: String,
    error_message: Option<String>,
    invalid_parameters: Vec<InvalidParameter>,
    request_body: Option<Value>,
    response_body: Option<Value>,
    data: Option<T>,
}

impl<T: ResponsePayload> ApiResponse<T> {
    /// Folds a call outcome into a normalized response.
    pub fn normalize(outcome: CallOutcome, request_body: Option<Value>) -> Self {
        match outcome {
            Err(failure) => Self {
                status: ResponseStatus::ErrorUnknown,
                status_code: 0,
                reason_phrase: String::new(),
                error_message: Some(failure.message),
                invalid_parameters: Vec::new(),
                request_body,
                response_body: None,
                data: None,
            },
            Ok(response) => {
                let decoded = decode_body(&response.body);
                if (200..300).contains(&response.status_code) {
                    Self::from_completed(response, decoded, request_body)
                } else {
                    Self::from_rejected(response, decoded, request_body)
                }
            }
        }
    }

    fn from_completed(
        response: HttpResponse,
        decoded: Option<Value>,
        request_body: Option<Value>,
    ) -> Self {
        let mut normalized = Self {
            status: ResponseStatus::Success,
            status_code: response.status_code,
            reason_phrase: response.reason_phrase,
            error_message: None,
            invalid_parameters: Vec::new(),
            request_body,
            response_body: decoded.clone(),
            data: None,
        };

        let Some(body) = decoded.filter(|value| !value.is_null()) else {
            normalized.status = ResponseStatus::Error;
            normalized.error_message = Some(consts::INVALID_RESPONSE_BODY.to_string());
            return normalized;
        };

        match serde_json::from_value::<T>(body) {
            Err(_) => {
                normalized.status = ResponseStatus::Error;
                normalized.error_message = Some(consts::INVALID_RESPONSE_BODY.to_string());
            }
            Ok(payload) => match payload.validate() {
                Ok(()) => normalized.data = Some(payload),
                Err(PayloadError(message)) => {
                    normalized.status = ResponseStatus::Error;
                    normalized.error_message = Some(message);
                }
            },
        }
        normalized
    }

    fn from_rejected(
        response: HttpResponse,
        decoded: Option<Value>,
        request_body: Option<Value>,
    ) -> Self {
        let error_body: ErrorBody = decoded
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();

        let error_message = error_body
            .title
            .or(error_body.description)
            .unwrap_or_else(|| response.reason_phrase.clone());

        Self {
            status: ResponseStatus::Error,
            status_code: response.status_code,
            reason_phrase: response.reason_phrase,
            error_message: Some(error_message),
            invalid_parameters: error_body.invalid_parameters.unwrap_or_default(),
            request_body,
            response_body: decoded,
            data: None,
        }
    }

    /// Uniform status of the call.
    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// Whether the call completed with a valid payload.
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// HTTP status code; `0` when no response was received.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Reason phrase; empty when no response was received.
    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    /// Top-level error message, absent on success.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Per-field validation failures reported by the processor.
    pub fn invalid_parameters(&self) -> &[InvalidParameter] {
        &self.invalid_parameters
    }

    /// Typed payload; `Some` exactly when the status is success.
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Human-readable error block: the top-level message plus, optionally,
    /// one `field - reason` line per invalid parameter. Empty on success.
    pub fn error_message_formatted(&self, include_invalid_parameters: bool) -> String {
        if self.is_success() {
            return String::new();
        }
        let mut formatted = self.error_message.clone().unwrap_or_default();
        if include_invalid_parameters {
            for parameter in &self.invalid_parameters {
                if !formatted.is_empty() {
                    formatted.push('\n');
                }
                formatted.push_str(&format!("{} - {}", parameter.field, parameter.reason));
            }
        }
        formatted
    }

    /// Structured log representation.
    ///
    /// Variants with `SUPPRESS_BODY_LOG` expose only status, code, and
    /// reason; the error message is present whenever the status is not
    /// success.
    pub fn log_data(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("status".into(), Value::from(self.status.to_string()));
        map.insert("response_code".into(), Value::from(self.status_code));
        map.insert("reason_phrase".into(), Value::from(self.reason_phrase.clone()));
        if !T::SUPPRESS_BODY_LOG {
            map.insert(
                "request_body".into(),
                self.request_body.clone().unwrap_or(Value::Null),
            );
            map.insert(
                "response_body".into(),
                self.response_body.clone().unwrap_or(Value::Null),
            );
        }
        if !self.is_success() {
            map.insert(
                "error_message".into(),
                Value::from(self.error_message.clone().unwrap_or_default()),
            );
        }
        Value::Object(map)
    }
}

fn decode_body(body: &Bytes) -> Option<Value> {
    use crate::ext_traits::BytesExt;

    if body.is_empty() {
        return None;
    }
    body.parse_struct("ResponseBody").ok()
}
