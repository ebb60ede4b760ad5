//! Merchant details returned by Checkout POS after a successful handshake.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors that can occur when decoding a merchant callback payload.
#[derive(Debug, Error)]
pub enum MerchantError {
    /// The payload is not valid base64.
    #[error("payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The decoded payload is not a JSON merchant object.
    #[error("payload is not a merchant object: {0}")]
    Json(#[from] serde_json::Error),

    /// The merchant has no owner email.
    #[error("merchant owner email is missing")]
    MissingOwnerEmail,
}

/// Remote merchant account metadata.
///
/// Replaced wholesale on every successful handshake. A value is only
/// considered valid when it carries an owner email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantDetails {
    pub merchant_id: Option<i64>,
    pub owner_email: String,
    pub merchant_mode: Option<String>,
    pub owner_phone_number: Option<String>,
    pub merchant_name: Option<String>,
    pub billing_street: Option<String>,
    pub billing_zip: Option<String>,
    pub billing_city: Option<String>,
}

/// Wire shape of the `merchant_details` callback blob.
///
/// Fields Checkout POS may add later are collected into `unknown` and
/// dropped after logging, never copied onto [`MerchantDetails`].
#[derive(Debug, Deserialize)]
struct MerchantPayload {
    #[serde(default, deserialize_with = "lenient_id")]
    merchant_id: Option<i64>,
    #[serde(default)]
    owner_email: Option<String>,
    #[serde(default)]
    merchant_mode: Option<String>,
    #[serde(default)]
    owner_phone_number: Option<String>,
    #[serde(default)]
    merchant_name: Option<String>,
    #[serde(default)]
    merchant_billing_street_name: Option<String>,
    #[serde(default)]
    merchant_billing_zip: Option<String>,
    #[serde(default)]
    merchant_billing_city: Option<String>,
    #[serde(flatten)]
    unknown: BTreeMap<String, serde_json::Value>,
}

/// Checkout POS sends the merchant id either as a number or a numeric string.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(i64),
        Text(String),
    }

    match Option::<Repr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Repr::Number(id)) => Ok(Some(id)),
        Some(Repr::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Repr::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl MerchantDetails {
    /// Decode the base64 + JSON `merchant_details` query parameter.
    ///
    /// Query string decoding turns `+` into a space, so spaces are mapped
    /// back before decoding. Both the standard and URL-safe alphabets are
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns [`MerchantError`] if the blob is not base64, not a JSON object
    /// of the expected shape, or has no owner email.
    pub fn from_callback_payload(encoded: &str) -> Result<Self, MerchantError> {
        let normalized = encoded.trim().replace(' ', "+");
        let bytes = STANDARD
            .decode(&normalized)
            .or_else(|_| URL_SAFE.decode(&normalized))
            .or_else(|_| URL_SAFE_NO_PAD.decode(normalized.trim_end_matches('=')))?;

        let payload: MerchantPayload = serde_json::from_slice(&bytes)?;
        Self::from_payload(payload)
    }

    /// Whether the details satisfy the validity invariant.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.owner_email.trim().is_empty()
    }

    /// Billing address as a single line.
    ///
    /// Empty parts are skipped; the remaining ones are joined with `", "`.
    #[must_use]
    pub fn formatted_address(&self) -> String {
        [&self.billing_street, &self.billing_zip, &self.billing_city]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl MerchantDetails {
    fn from_payload(payload: MerchantPayload) -> Result<Self, MerchantError> {
        if !payload.unknown.is_empty() {
            tracing::debug!(
                fields = ?payload.unknown.keys().collect::<Vec<_>>(),
                "Ignoring unknown merchant payload fields"
            );
        }

        let owner_email = non_empty(payload.owner_email).ok_or(MerchantError::MissingOwnerEmail)?;

        Ok(Self {
            merchant_id: payload.merchant_id,
            owner_email,
            merchant_mode: non_empty(payload.merchant_mode),
            owner_phone_number: non_empty(payload.owner_phone_number),
            merchant_name: non_empty(payload.merchant_name),
            billing_street: non_empty(payload.merchant_billing_street_name),
            billing_zip: non_empty(payload.merchant_billing_zip),
            billing_city: non_empty(payload.merchant_billing_city),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode(json: &str) -> String {
        STANDARD.encode(json)
    }

    #[test]
    fn test_decode_full_payload() {
        let blob = encode(
            r#"{
                "merchant_id": 1234,
                "owner_email": "owner@shop.fi",
                "merchant_mode": "live",
                "owner_phone_number": "+358401234567",
                "merchant_name": "Shop Oy",
                "merchant_billing_street_name": "Mannerheimintie 1",
                "merchant_billing_zip": "00100",
                "merchant_billing_city": "Helsinki"
            }"#,
        );

        let merchant = MerchantDetails::from_callback_payload(&blob).unwrap();
        assert_eq!(merchant.merchant_id, Some(1234));
        assert_eq!(merchant.owner_email, "owner@shop.fi");
        assert_eq!(merchant.merchant_name.as_deref(), Some("Shop Oy"));
        assert!(merchant.is_valid());
        assert_eq!(
            merchant.formatted_address(),
            "Mannerheimintie 1, 00100, Helsinki"
        );
    }

    #[test]
    fn test_decode_string_merchant_id() {
        let blob = encode(r#"{"merchant_id": "77", "owner_email": "a@b.fi"}"#);
        let merchant = MerchantDetails::from_callback_payload(&blob).unwrap();
        assert_eq!(merchant.merchant_id, Some(77));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let blob = encode(r#"{"owner_email": "a@b.fi", "plan": "pro", "flags": [1, 2]}"#);
        let merchant = MerchantDetails::from_callback_payload(&blob).unwrap();
        assert_eq!(merchant.owner_email, "a@b.fi");
        assert_eq!(merchant.merchant_id, None);
    }

    #[test]
    fn test_missing_owner_email_is_invalid() {
        let blob = encode(r#"{"merchant_id": 1, "merchant_name": "No Owner"}"#);
        assert!(matches!(
            MerchantDetails::from_callback_payload(&blob),
            Err(MerchantError::MissingOwnerEmail)
        ));

        let blob = encode(r#"{"owner_email": "   "}"#);
        assert!(matches!(
            MerchantDetails::from_callback_payload(&blob),
            Err(MerchantError::MissingOwnerEmail)
        ));
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            MerchantDetails::from_callback_payload("!!not base64!!"),
            Err(MerchantError::Decode(_))
        ));
        assert!(matches!(
            MerchantDetails::from_callback_payload(&encode("[1,2,3]")),
            Err(MerchantError::Json(_))
        ));
        assert!(MerchantDetails::from_callback_payload("").is_err());
    }

    #[test]
    fn test_plus_signs_mangled_by_query_decoding() {
        let json = r#"{"owner_email":"x@y.fi","merchant_name":">>>"}"#;
        let blob = encode(json);
        assert!(blob.contains('+'));
        let mangled = blob.replace('+', " ");
        let merchant = MerchantDetails::from_callback_payload(&mangled).unwrap();
        assert_eq!(merchant.merchant_name.as_deref(), Some(">>>"));
    }

    #[test]
    fn test_formatted_address_skips_empty_parts() {
        let merchant = MerchantDetails {
            merchant_id: None,
            owner_email: "a@b.fi".to_string(),
            merchant_mode: None,
            owner_phone_number: None,
            merchant_name: None,
            billing_street: Some("Street 1".to_string()),
            billing_zip: Some(String::new()),
            billing_city: Some("Turku".to_string()),
        };
        assert_eq!(merchant.formatted_address(), "Street 1, Turku");
    }
}
