//! Id-token claim extraction.
//!
//! The payload segment is decoded without verifying the signature: the token
//! was just received from the identity provider over TLS.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;

use crate::error::IdentityError;

/// User attributes carried in the id token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserAttributes {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub store_name: String,
    pub customer_id: String,
    pub location_status: String,
    /// Stable subject id (`custom:recordId`, else `sub`).
    pub record_id: String,
}

impl UserAttributes {
    /// Read attributes from the id token's claims.
    pub fn from_id_token(id_token: &str) -> Result<Self, IdentityError> {
        let claims = decode_claims(id_token)?;
        Ok(Self::from_claims(&claims))
    }

    fn from_claims(claims: &Value) -> Self {
        let claim = |names: &[&str]| -> Option<String> {
            names
                .iter()
                .find_map(|name| claims.get(*name).and_then(Value::as_str))
                .map(str::to_string)
        };

        Self {
            email: claim(&["email"]).unwrap_or_default(),
            first_name: claim(&["custom:firstName", "given_name"]).unwrap_or_default(),
            last_name: claim(&["custom:lastName", "family_name"]).unwrap_or_default(),
            store_name: claim(&["custom:storeName"]).unwrap_or_default(),
            customer_id: claim(&["custom:customerId"]).unwrap_or_default(),
            location_status: claim(&["custom:locationStatus"])
                .unwrap_or_else(|| "Active".to_string()),
            record_id: claim(&["custom:recordId", "sub"]).unwrap_or_default(),
        }
    }
}

/// Decode the JSON payload of a three-segment JWT.
pub fn decode_claims(token: &str) -> Result<Value, IdentityError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(IdentityError::Unknown("Malformed id token".to_string()));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|_| IdentityError::Unknown("Id token payload is not base64url".to_string()))?;
    serde_json::from_slice(&payload)
        .map_err(|_| IdentityError::Unknown("Id token payload is not JSON".to_string()))
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","kid":"test"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_custom_claims_take_precedence() {
        let token = encode_test_token(&json!({
            "sub": "sub-123",
            "email": "user@x.com",
            "given_name": "Given",
            "custom:firstName": "Ana",
            "custom:lastName": "López",
            "custom:storeName": "Centro",
            "custom:customerId": "C-9",
            "custom:locationStatus": "Inactive",
            "custom:recordId": "77"
        }));

        let attrs = UserAttributes::from_id_token(&token).unwrap();
        assert_eq!(
            attrs,
            UserAttributes {
                email: "user@x.com".to_string(),
                first_name: "Ana".to_string(),
                last_name: "López".to_string(),
                store_name: "Centro".to_string(),
                customer_id: "C-9".to_string(),
                location_status: "Inactive".to_string(),
                record_id: "77".to_string(),
            }
        );
    }

    #[test]
    fn test_standard_claims_and_defaults() {
        let token = encode_test_token(&json!({
            "sub": "sub-123",
            "email": "user@x.com",
            "given_name": "Given",
            "family_name": "Family"
        }));

        let attrs = UserAttributes::from_id_token(&token).unwrap();
        assert_eq!(attrs.first_name, "Given");
        assert_eq!(attrs.last_name, "Family");
        assert_eq!(attrs.location_status, "Active");
        assert_eq!(attrs.record_id, "sub-123");
        assert_eq!(attrs.store_name, "");
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"email":"a@b.c"}"#);
        let token = format!("h.{payload}.s");
        assert_eq!(decode_claims(&token).unwrap()["email"], "a@b.c");
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        assert!(decode_claims("only.two").is_err());
        assert!(decode_claims("a.!!!.c").is_err());
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("plain"));
        assert!(decode_claims(&not_json).is_err());
    }
}
