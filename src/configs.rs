//! Integration settings.
//!
//! Everything the verifier, client, and reconciler need is carried on one
//! explicit struct; nothing is read out of a string-keyed settings bag.

use std::sync::LazyLock;

use error_stack::report;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::errors::{CustomResult, ValidationError};

/// Processor environment the integration talks to.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Environment {
    /// Sandbox environment for test traffic.
    #[default]
    Staging,
    /// Live environment.
    Production,
}

impl Environment {
    /// Default API base URL for the environment.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Staging => "https://api.staging.covepay.com",
            Self::Production => "https://api.covepay.com",
        }
    }
}

/// Configuration consumed by the verifier, client, and reconciler.
#[derive(Clone, Debug, Deserialize)]
pub struct CovepaySettings {
    /// Which processor environment to call.
    #[serde(default)]
    pub environment: Environment,
    /// Overrides the environment's default API base URL when set.
    #[serde(default)]
    pub base_url: Option<String>,
    /// API credential pair: public identifier.
    pub app_id: String,
    /// API credential pair: private key, sent on token requests only.
    pub app_key: SecretString,
    /// Shared secret verifying webhook and redirect callbacks.
    pub shared_secret: SecretString,
    /// Processor-side tenant id; selects the credential-validation path.
    #[serde(default)]
    pub company_id: Option<String>,
    /// Prefer a 3-D Secure challenge on hosted checkout.
    #[serde(default)]
    pub force_3ds_challenge: bool,
    /// Offer card tokenization (save card) on hosted checkout.
    #[serde(default)]
    pub tokenize_cards: bool,
    /// Allow refunding wallet-funded transactions.
    #[serde(default)]
    pub wallet_refunds_enabled: bool,
}

static PAYMENT_REFERENCE_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[\w \-]{1,18}$").ok());

impl CovepaySettings {
    /// Effective API base URL, without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .unwrap_or_else(|| self.environment.default_base_url())
    }

    /// Checks credential presence and the company-id shape.
    pub fn validate(&self) -> CustomResult<(), ValidationError> {
        if self.app_id.trim().is_empty() {
            return Err(report!(ValidationError::MissingRequiredField {
                field_name: "app_id",
            }));
        }
        if self.app_key.expose_secret().is_empty() {
            return Err(report!(ValidationError::MissingRequiredField {
                field_name: "app_key",
            }));
        }
        if let Some(company_id) = self.company_id.as_deref() {
            validate_company_id(company_id)?;
        }
        Ok(())
    }
}

/// Validates the payment reference sent on hosted checkout links.
///
/// The processor restricts references to word characters, spaces, and
/// hyphens, at most 18 characters.
pub fn validate_payment_reference(reference: &str) -> CustomResult<(), ValidationError> {
    let is_valid = PAYMENT_REFERENCE_REGEX
        .as_ref()
        .is_some_and(|regex| regex.is_match(reference));
    if is_valid {
        Ok(())
    } else {
        Err(report!(ValidationError::InvalidValue {
            message: format!("Payment reference \"{reference}\" is not in the allowed format"),
        }))
    }
}

/// Validates that a company id is shaped like a UUID v4.
pub fn validate_company_id(company_id: &str) -> CustomResult<(), ValidationError> {
    let parsed = uuid::Uuid::parse_str(company_id).map_err(|_| {
        report!(ValidationError::InvalidValue {
            message: format!("Company id \"{company_id}\" is not a UUID"),
        })
    })?;
    if parsed.get_version_num() != 4 {
        return Err(report!(ValidationError::InvalidValue {
            message: format!("Company id \"{company_id}\" is not a version 4 UUID"),
        }));
    }
    Ok(())
}
