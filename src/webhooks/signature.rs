//! HMAC verification of webhook deliveries
//!
//! Both processors sign with HMAC-SHA256 and send a `ts`/`t` timestamp plus
//! one or more hex `v1` digests in a comma separated header.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the intent processor's signature
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Header carrying the direct processor's signature
pub const MERCADO_PAGO_SIGNATURE_HEADER: &str = "x-signature";

/// Header whose value the direct processor folds into its manifest
pub const MERCADO_PAGO_REQUEST_ID_HEADER: &str = "x-request-id";

/// Maximum age of a signed intent processor delivery, in seconds
pub const STRIPE_TOLERANCE_SECS: i64 = 300;

/// Maximum age of a signed direct processor delivery, in seconds
pub const MERCADO_PAGO_TOLERANCE_SECS: i64 = 300;

// `ts` values above this are milliseconds
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing signature header")]
    MissingHeader,

    #[error("Malformed signature header: {0}")]
    Malformed(&'static str),

    #[error("Signature timestamp outside tolerance")]
    Expired,

    #[error("Signature mismatch")]
    Mismatch,

    #[error("Invalid signing secret")]
    InvalidSecret,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SignatureHeader<'a> {
    timestamp: Option<&'a str>,
    signatures: Vec<&'a str>,
}

/// Split `t=123,v1=abc,v1=def` style headers; unknown keys are ignored
fn parse_header<'a>(header: &'a str, timestamp_key: &str) -> SignatureHeader<'a> {
    let mut parsed = SignatureHeader::default();
    for part in header.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key == timestamp_key {
            parsed.timestamp = Some(value);
        } else if key == "v1" {
            parsed.signatures.push(value);
        }
    }
    parsed
}

pub fn sign(secret: &str, message: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_eq(expected: &str, provided: &str) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    expected
        .as_bytes()
        .iter()
        .zip(provided.as_bytes().iter())
        .fold(0, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn any_matches(expected: &str, signatures: &[&str]) -> bool {
    // evaluate every candidate so timing doesn't reveal which one matched
    signatures
        .iter()
        .fold(false, |found, candidate| {
            constant_time_eq(expected, &candidate.to_ascii_lowercase()) | found
        })
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// The signed payload is `"{t}.{body}"`; deliveries older (or newer) than
/// [`STRIPE_TOLERANCE_SECS`] relative to `now` are rejected.
pub fn verify_stripe(
    secret: &str,
    header: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;
    let parsed = parse_header(header, "t");

    let timestamp = parsed
        .timestamp
        .ok_or(SignatureError::Malformed("missing timestamp"))?;
    let issued_at: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::Malformed("timestamp is not numeric"))?;
    if parsed.signatures.is_empty() {
        return Err(SignatureError::Malformed("missing v1 signature"));
    }
    if (now - issued_at).abs() > STRIPE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let mut signed = Vec::with_capacity(timestamp.len() + 1 + body.len());
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(body);

    let expected = sign(secret, &signed)?;
    if any_matches(&expected, &parsed.signatures) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Manifest the direct processor signs; absent parts are left out
pub fn mercado_pago_manifest(data_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
    let mut manifest = String::new();
    if let Some(id) = data_id.filter(|id| !id.is_empty()) {
        // alphanumeric ids are signed in lowercase
        manifest.push_str(&format!("id:{};", id.to_lowercase()));
    }
    if let Some(request_id) = request_id.filter(|r| !r.is_empty()) {
        manifest.push_str(&format!("request-id:{};", request_id));
    }
    manifest.push_str(&format!("ts:{};", ts));
    manifest
}

/// Verify an `x-signature` header.
///
/// `data_id` is the notified resource id, taken from the `data.id` query
/// parameter when present. `ts` may be seconds or milliseconds and must be
/// within [`MERCADO_PAGO_TOLERANCE_SECS`] of `now`.
pub fn verify_mercado_pago(
    secret: &str,
    header: Option<&str>,
    request_id: Option<&str>,
    data_id: Option<&str>,
    now: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;
    let parsed = parse_header(header, "ts");

    let ts = parsed
        .timestamp
        .ok_or(SignatureError::Malformed("missing ts"))?;
    let issued_at: i64 = ts
        .parse()
        .map_err(|_| SignatureError::Malformed("ts is not numeric"))?;
    if parsed.signatures.is_empty() {
        return Err(SignatureError::Malformed("missing v1 signature"));
    }
    let issued_at = if issued_at > MILLIS_THRESHOLD {
        issued_at / 1000
    } else {
        issued_at
    };
    if (now - issued_at).abs() > MERCADO_PAGO_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let manifest = mercado_pago_manifest(data_id, request_id, ts);
    let expected = sign(secret, manifest.as_bytes())?;
    if any_matches(&expected, &parsed.signatures) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    fn stripe_header(body: &[u8], t: i64) -> String {
        let mut signed = format!("{}.", t).into_bytes();
        signed.extend_from_slice(body);
        format!("t={},v1={}", t, sign(SECRET, &signed).unwrap())
    }

    #[test]
    fn test_parse_header_collects_signatures() {
        let parsed = parse_header("t=12, v1=aa,v0=zz,v1=bb", "t");
        assert_eq!(parsed.timestamp, Some("12"));
        assert_eq!(parsed.signatures, vec!["aa", "bb"]);
    }

    #[test]
    fn test_stripe_valid_signature() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let header = stripe_header(body, NOW - 10);
        assert_eq!(verify_stripe(SECRET, Some(&header), body, NOW), Ok(()));
    }

    #[test]
    fn test_stripe_accepts_any_listed_signature() {
        let body = b"{}";
        let valid = stripe_header(body, NOW);
        let header = format!("t={},v1=deadbeef,{}", NOW, valid.split_once(',').unwrap().1);
        assert_eq!(verify_stripe(SECRET, Some(&header), body, NOW), Ok(()));
    }

    #[test]
    fn test_stripe_tampered_body() {
        let header = stripe_header(b"{\"amount\":1}", NOW);
        assert_eq!(
            verify_stripe(SECRET, Some(&header), b"{\"amount\":2}", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stripe_expired() {
        let body = b"{}";
        let header = stripe_header(body, NOW - STRIPE_TOLERANCE_SECS - 1);
        assert_eq!(
            verify_stripe(SECRET, Some(&header), body, NOW),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_stripe_missing_or_malformed_header() {
        assert_eq!(
            verify_stripe(SECRET, None, b"{}", NOW),
            Err(SignatureError::MissingHeader)
        );
        assert!(matches!(
            verify_stripe(SECRET, Some("v1=abc"), b"{}", NOW),
            Err(SignatureError::Malformed(_))
        ));
        assert!(matches!(
            verify_stripe(SECRET, Some(&format!("t={}", NOW)), b"{}", NOW),
            Err(SignatureError::Malformed(_))
        ));
    }

    #[test]
    fn test_mercado_pago_manifest() {
        assert_eq!(
            mercado_pago_manifest(Some("ABC123"), Some("req-1"), "1704908010"),
            "id:abc123;request-id:req-1;ts:1704908010;"
        );
        assert_eq!(mercado_pago_manifest(None, None, "1"), "ts:1;");
    }

    fn mercado_pago_header(data_id: &str, request_id: &str, ts: i64) -> String {
        let manifest = mercado_pago_manifest(Some(data_id), Some(request_id), &ts.to_string());
        format!("ts={},v1={}", ts, sign(SECRET, manifest.as_bytes()).unwrap())
    }

    #[test]
    fn test_mercado_pago_valid_signature() {
        let header = mercado_pago_header("1325871234", "req-9", NOW - 5);
        assert_eq!(
            verify_mercado_pago(SECRET, Some(&header), Some("req-9"), Some("1325871234"), NOW),
            Ok(())
        );
    }

    #[test]
    fn test_mercado_pago_wrong_id() {
        let header = mercado_pago_header("1", "req-9", NOW);
        assert_eq!(
            verify_mercado_pago(SECRET, Some(&header), Some("req-9"), Some("2"), NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_mercado_pago_stale_signature_is_expired() {
        let header = mercado_pago_header("1", "req-9", NOW - MERCADO_PAGO_TOLERANCE_SECS - 1);
        assert_eq!(
            verify_mercado_pago(SECRET, Some(&header), Some("req-9"), Some("1"), NOW),
            Err(SignatureError::Expired)
        );

        let header = mercado_pago_header("1", "req-9", 1_704_908_010);
        assert_eq!(
            verify_mercado_pago(SECRET, Some(&header), Some("req-9"), Some("1"), NOW),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_mercado_pago_millisecond_ts() {
        let header = mercado_pago_header("1", "req-9", NOW * 1000 + 250);
        assert_eq!(
            verify_mercado_pago(SECRET, Some(&header), Some("req-9"), Some("1"), NOW),
            Ok(())
        );
        assert!(matches!(
            verify_mercado_pago(SECRET, Some("ts=soon,v1=abc"), None, Some("1"), NOW),
            Err(SignatureError::Malformed(_))
        ));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
    }
}
