//! AWS Signature Version 4 signing for JSON-over-HTTPS service calls.
//!
//! Signing is a pure function of its inputs: same request, credentials and
//! timestamp always yield the same `Authorization` header.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Signing algorithm identifier.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Header carrying the request timestamp.
pub const AMZ_DATE_HEADER: &str = "x-amz-date";

/// Header carrying the temporary-credential session token.
pub const SECURITY_TOKEN_HEADER: &str = "x-amz-security-token";

const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const DATE_STAMP_FORMAT: &str = "%Y%m%d";

/// Keys used to sign a request.
#[derive(Clone, Copy)]
pub struct SigningCredentials<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub session_token: Option<&'a str>,
}

impl std::fmt::Debug for SigningCredentials<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field(
                "session_token",
                &self.session_token.map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// The parts of an HTTP request that participate in the signature.
#[derive(Debug, Clone)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    /// Canonical URI, e.g. `/`.
    pub path: &'a str,
    /// Canonical query string, already encoded and sorted. Empty when absent.
    pub query: &'a str,
    /// Headers to sign. Names are lower-cased and values trimmed during
    /// canonicalization; `x-amz-date` and `x-amz-security-token` are added
    /// by [`sign`].
    pub headers: BTreeMap<String, String>,
    pub body: &'a [u8],
    pub service: &'a str,
    pub region: &'a str,
    pub timestamp: DateTime<Utc>,
}

/// Headers to attach to the outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub security_token: Option<String>,
}

impl<'a> SigningRequest<'a> {
    /// Start a request for `url`, taking the `host` header and canonical path
    /// from it.
    pub fn for_url(
        method: &'a str,
        url: &'a Url,
        service: &'a str,
        region: &'a str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut headers = BTreeMap::new();
        if let Some(host) = host_header(url) {
            headers.insert("host".to_string(), host);
        }
        Self {
            method,
            path: url.path(),
            query: url.query().unwrap_or(""),
            headers,
            body: b"",
            service,
            region,
            timestamp,
        }
    }

    /// Add a header to the signed set.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Attach the payload.
    pub fn body(mut self, body: &'a [u8]) -> Self {
        self.body = body;
        self
    }
}

/// `host[:port]` as sent on the wire; default ports are omitted.
pub fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Format a timestamp as `YYYYMMDDTHHMMSSZ`.
pub fn amz_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format(AMZ_DATE_FORMAT).to_string()
}

/// Lower-case hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the per-day, per-region, per-service signing key.
pub fn signing_key(secret_access_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{secret_access_key}").as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn normalized_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect()
}

/// Semicolon-joined sorted header names.
fn signed_header_names(headers: &BTreeMap<String, String>) -> String {
    headers.keys().map(String::as_str).collect::<Vec<_>>().join(";")
}

/// Build the canonical request string.
pub fn canonical_request(request: &SigningRequest<'_>) -> String {
    let headers = normalized_headers(&request.headers);
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let path = if request.path.is_empty() { "/" } else { request.path };

    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method.to_ascii_uppercase(),
        path,
        request.query,
        canonical_headers,
        signed_header_names(&headers),
        sha256_hex(request.body),
    )
}

/// Sign `request`, returning the headers to attach.
pub fn sign(request: &SigningRequest<'_>, credentials: &SigningCredentials<'_>) -> SignedHeaders {
    let amz_date = amz_date(request.timestamp);
    let date_stamp = request.timestamp.format(DATE_STAMP_FORMAT).to_string();

    let mut request = request.clone();
    request
        .headers
        .insert(AMZ_DATE_HEADER.to_string(), amz_date.clone());
    if let Some(token) = credentials.session_token {
        request
            .headers
            .insert(SECURITY_TOKEN_HEADER.to_string(), token.to_string());
    }

    let canonical = canonical_request(&request);
    let scope = format!(
        "{date_stamp}/{}/{}/aws4_request",
        request.region, request.service
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical.as_bytes())
    );

    let key = signing_key(
        credentials.secret_access_key,
        &date_stamp,
        request.region,
        request.service,
    );
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    SignedHeaders {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
            credentials.access_key_id,
            signed_header_names(&normalized_headers(&request.headers)),
        ),
        amz_date,
        security_token: credentials.session_token.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const ACCESS_KEY: &str = "AKIDEXAMPLE";
    const SECRET_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn vanilla_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    fn vanilla_request(url: &Url) -> SigningRequest<'_> {
        SigningRequest::for_url("GET", url, "service", "us-east-1", vanilla_time())
    }

    fn credentials() -> SigningCredentials<'static> {
        SigningCredentials {
            access_key_id: ACCESS_KEY,
            secret_access_key: SECRET_KEY,
            session_token: None,
        }
    }

    #[test]
    fn test_signing_key_matches_published_derivation() {
        let key = signing_key(SECRET_KEY, "20150830", "us-east-1", "iam");
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_get_vanilla_canonical_request() {
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let request = vanilla_request(&url).header(AMZ_DATE_HEADER, "20150830T123600Z");
        let canonical = canonical_request(&request);
        assert_eq!(
            canonical,
            "GET\n/\n\nhost:example.amazonaws.com\nx-amz-date:20150830T123600Z\n\nhost;x-amz-date\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(canonical.as_bytes()),
            "bb579772317eb040ac9ed261061d46c1f17a8133879d6129b6e1c25292927e63"
        );
    }

    #[test]
    fn test_get_vanilla_signature() {
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let signed = sign(&vanilla_request(&url), &credentials());

        assert_eq!(signed.amz_date, "20150830T123600Z");
        assert_eq!(
            signed.authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert!(signed.security_token.is_none());
    }

    #[test]
    fn test_signature_is_deterministic() {
        let url = Url::parse("https://secretsmanager.us-east-1.amazonaws.com/").unwrap();
        let body = br#"{"SecretId":"prod/legacy"}"#;
        let creds = SigningCredentials {
            session_token: Some("session"),
            ..credentials()
        };
        let build = || {
            SigningRequest::for_url("POST", &url, "secretsmanager", "us-east-1", vanilla_time())
                .header("Content-Type", "application/x-amz-json-1.1")
                .header("X-Amz-Target", "secretsmanager.GetSecretValue")
                .body(body)
        };

        let first = sign(&build(), &creds);
        let second = sign(&build(), &creds);
        assert_eq!(first, second);

        let later = sign(
            &SigningRequest {
                timestamp: vanilla_time() + chrono::Duration::seconds(1),
                ..build()
            },
            &creds,
        );
        assert_ne!(first.authorization, later.authorization);
    }

    #[test]
    fn test_session_token_is_signed() {
        let url = Url::parse("https://secretsmanager.us-east-1.amazonaws.com/").unwrap();
        let creds = SigningCredentials {
            session_token: Some("token"),
            ..credentials()
        };
        let request = SigningRequest::for_url("POST", &url, "secretsmanager", "us-east-1", vanilla_time())
            .header("content-type", "application/x-amz-json-1.1")
            .header("x-amz-target", "secretsmanager.GetSecretValue");
        let signed = sign(&request, &creds);

        assert!(signed.authorization.contains(
            "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token;x-amz-target"
        ));
        assert_eq!(signed.security_token.as_deref(), Some("token"));
    }

    #[test]
    fn test_header_values_are_trimmed_and_names_lowercased() {
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let mut request = vanilla_request(&url);
        request
            .headers
            .insert("X-Custom".to_string(), "  padded  ".to_string());
        let canonical = canonical_request(&request);
        assert!(canonical.contains("x-custom:padded\n"));
    }

    #[test]
    fn test_host_header_keeps_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/path").unwrap();
        assert_eq!(host_header(&url).as_deref(), Some("127.0.0.1:8080"));
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(host_header(&url).as_deref(), Some("example.com"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains(SECRET_KEY));
        assert!(rendered.contains(ACCESS_KEY));
    }
}
