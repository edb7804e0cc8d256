use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The header carrying the webhook signature: `sha256=<hex hmac of the raw body>`.
pub const SIGNATURE_HEADER: &str = "x-pi-signature";
const SIGNATURE_PREFIX: &str = "sha256=";

/// Computes the expected signature header value for a body.
pub fn calculate_signature(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a signature header against the raw body. The comparison runs in constant time via
/// [`Mac::verify_slice`], so the check leaks no timing information about the expected value.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(hex_sig) = header_value.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(sig) = hex::decode(hex_sig) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(body);
    mac.verify_slice(&sig).is_ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip() {
        let body = br#"{"paymentId":"pay-1","txid":"tx-1"}"#;
        let header = calculate_signature("topsecret", body);
        assert!(header.starts_with("sha256="));
        assert!(verify_signature("topsecret", body, &header));
    }

    #[test]
    fn rejects_bad_signatures() {
        let body = b"payload";
        let header = calculate_signature("topsecret", body);
        assert!(!verify_signature("othersecret", body, &header));
        assert!(!verify_signature("topsecret", b"tampered", &header));
        assert!(!verify_signature("topsecret", body, "sha256=zzzz"));
        assert!(!verify_signature("topsecret", body, "md5=abcd"));
    }
}
